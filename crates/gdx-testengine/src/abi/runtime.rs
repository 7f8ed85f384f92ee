use std::alloc::{Layout, alloc, dealloc};
use std::ffi::{c_char, c_void};
use std::sync::Mutex;

use gdx_sys::{Bool, EngineVersion};

use super::c_text;
use crate::classes::engine::VERSION_STRING;
use crate::hooks;
use crate::value::lock;

const HEADER: usize = 16;

static VERSION: Mutex<(u32, u32, u32)> = Mutex::new((4, 2, 0));

/// Make `get_version` report another engine version from now on.
pub fn override_version(major: u32, minor: u32, patch: u32) {
    *lock(&VERSION) = (major, minor, patch);
}

pub(super) unsafe extern "C" fn get_version(version: *mut EngineVersion) {
    if version.is_null() {
        return;
    }
    let (major, minor, patch) = *lock(&VERSION);
    unsafe {
        *version = EngineVersion {
            major,
            minor,
            patch,
            string: VERSION_STRING.as_ptr(),
        };
    }
}

/// Allocations carry their size in a 16-byte header so `mem_free` can
/// rebuild the layout.
pub(super) unsafe extern "C" fn mem_alloc(bytes: usize) -> *mut c_void {
    let Ok(layout) = Layout::from_size_align(bytes + HEADER, HEADER) else {
        return std::ptr::null_mut();
    };
    unsafe {
        let base = alloc(layout);
        if base.is_null() {
            return std::ptr::null_mut();
        }
        base.cast::<usize>().write(bytes);
        base.add(HEADER).cast()
    }
}

pub(super) unsafe extern "C" fn mem_free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let base = ptr.cast::<u8>().sub(HEADER);
        let bytes = base.cast::<usize>().read();
        let layout = Layout::from_size_align_unchecked(bytes + HEADER, HEADER);
        dealloc(base, layout);
    }
}

unsafe fn describe(
    description: *const c_char,
    function: *const c_char,
    file: *const c_char,
    line: i32,
) -> String {
    let (description, function, file) =
        unsafe { (c_text(description), c_text(function), c_text(file)) };
    if function.is_empty() && file.is_empty() {
        description
    } else {
        format!("{description} (at {function} in {file}:{line})")
    }
}

pub(super) unsafe extern "C" fn print_error(
    description: *const c_char,
    function: *const c_char,
    file: *const c_char,
    line: i32,
    _notify_editor: Bool,
) {
    hooks::report_error(unsafe { describe(description, function, file, line) });
}

pub(super) unsafe extern "C" fn print_warning(
    description: *const c_char,
    function: *const c_char,
    file: *const c_char,
    line: i32,
    _notify_editor: Bool,
) {
    hooks::report_warning(unsafe { describe(description, function, file, line) });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_round_trip() {
        unsafe {
            let ptr = mem_alloc(24).cast::<u64>();
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % HEADER, 0);
            ptr.write(7);
            assert_eq!(ptr.read(), 7);
            mem_free(ptr.cast());
            mem_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn errors_carry_their_location() {
        unsafe {
            print_error(c"boom".as_ptr(), c"run".as_ptr(), c"lib.rs".as_ptr(), 3, 0);
        }
        assert!(hooks::captured_errors().iter().any(|e| e == "boom (at run in lib.rs:3)"));
    }
}
