//! File access over an in-memory file system.
//!
//! Paths use the `res://` or `user://` scheme, or are relative to `res://`.
//! Writes go through to the file system immediately; values are
//! little-endian.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use gdx_sys::{CallError, ObjectPtr};
use rustc_hash::FxHashMap;

use super::{int_arg, object_result, text_arg, this_id};
use crate::classdb::ClassInfo;
use crate::error::code;
use crate::hooks::report_error;
use crate::objects;
use crate::value::{PackedBody, Var, lock};

pub const READ: i64 = 1;
pub const WRITE: i64 = 2;
pub const READ_WRITE: i64 = 3;
pub const WRITE_READ: i64 = 7;

#[derive(Debug, Default)]
pub struct FileState {
    pub path: String,
    pub data: Vec<u8>,
    pub position: usize,
    pub eof: bool,
    pub read: bool,
    pub write: bool,
    pub open: bool,
}

static FILES: LazyLock<Mutex<FxHashMap<String, Vec<u8>>>> = LazyLock::new(Default::default);
static OPEN_ERROR: AtomicI64 = AtomicI64::new(code::OK);

/// Contents of a file in the in-memory file system.
pub fn vfs_read(path: &str) -> Option<Vec<u8>> {
    lock(&FILES).get(path).cloned()
}

/// The file system key for `path`, or `None` when the path cannot name a
/// file. Relative paths resolve against `res://`.
fn resolve_path(path: &str) -> Option<String> {
    if path.is_empty() || path.ends_with('/') {
        return None;
    }
    if path.starts_with("res://") || path.starts_with("user://") {
        return Some(path.to_string());
    }
    let drive = path.as_bytes().get(1) == Some(&b':');
    if path.starts_with('/') || path.contains("://") || drive {
        return None;
    }
    Some(format!("res://{}", path.trim_start_matches("./")))
}

pub fn file_access_class() -> ClassInfo {
    ClassInfo::engine("FileAccess", Some("RefCounted"))
        .refcounted()
        .not_instantiable()
        .constant("READ", READ)
        .constant("WRITE", WRITE)
        .constant("READ_WRITE", READ_WRITE)
        .constant("WRITE_READ", WRITE_READ)
        .method("open", "FileAccess(String,enum::FileAccess.ModeFlags) static", open)
        .method("get_open_error", "enum::Error() static", get_open_error)
        .method("file_exists", "bool(String) static", file_exists)
        .method("close", "void()", close)
        .method("get_length", "int() const", get_length)
        .method("get_position", "int() const", get_position)
        .method("seek", "void(int)", seek)
        .method("eof_reached", "bool() const", eof_reached)
        .method("store_buffer", "bool(PackedByteArray)", store_buffer)
        .method("get_buffer", "PackedByteArray(int) const", get_buffer)
        .method("store_8", "bool(int)", |this, args| store_int(this, args, 1))
        .method("store_16", "bool(int)", |this, args| store_int(this, args, 2))
        .method("store_32", "bool(int)", |this, args| store_int(this, args, 4))
        .method("store_64", "bool(int)", |this, args| store_int(this, args, 8))
        .method("get_8", "int() const", |this, _| get_int(this, 1))
        .method("get_16", "int() const", |this, _| get_int(this, 2))
        .method("get_32", "int() const", |this, _| get_int(this, 4))
        .method("get_64", "int() const", |this, _| get_int(this, 8))
}

fn open(_: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let path = text_arg(args, 0);
    let mode = int_arg(args, 1);
    match open_state(&path, mode) {
        Ok(state) => {
            OPEN_ERROR.store(code::OK, Ordering::Relaxed);
            let object = objects::create("FileAccess");
            let id = objects::id_of_ptr(object);
            if let Some(id) = id {
                objects::with(id, |data| data.file = Some(state));
            }
            tracing::debug!(path, mode, "file opened");
            Ok(object_result(id))
        }
        Err(error) => {
            OPEN_ERROR.store(error, Ordering::Relaxed);
            report_error(format!("cannot open file `{path}` (mode {mode}): error {error}"));
            Ok(object_result(None))
        }
    }
}

fn open_state(path: &str, mode: i64) -> Result<FileState, i64> {
    let path = resolve_path(path).ok_or(code::ERR_FILE_BAD_PATH)?;
    let existing = vfs_read(&path);
    let data = match mode {
        READ | READ_WRITE => existing.ok_or(code::ERR_FILE_NOT_FOUND)?,
        WRITE | WRITE_READ => {
            lock(&FILES).insert(path.clone(), Vec::new());
            Vec::new()
        }
        _ => return Err(code::ERR_INVALID_PARAMETER),
    };
    Ok(FileState {
        path,
        data,
        position: 0,
        eof: false,
        read: mode & READ != 0,
        write: mode & WRITE != 0,
        open: true,
    })
}

fn get_open_error(_: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    Ok(Var::from_int(OPEN_ERROR.load(Ordering::Relaxed)))
}

fn file_exists(_: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let exists = resolve_path(&text_arg(args, 0)).and_then(|path| vfs_read(&path));
    Ok(Var::from_bool(exists.is_some()))
}

fn with_file<R>(
    this: ObjectPtr,
    f: impl FnOnce(&mut FileState) -> R,
) -> Result<Option<R>, CallError> {
    let id = this_id(this)?;
    let result = objects::with(id, |object| {
        object.file.as_mut().filter(|file| file.open).map(f)
    });
    Ok(result.flatten())
}

fn flush(file: &FileState) {
    if file.write {
        lock(&FILES).insert(file.path.clone(), file.data.clone());
    }
}

fn close(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    with_file(this, |file| {
        flush(file);
        file.open = false;
    })?;
    Ok(Var::nil())
}

fn get_length(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let length = with_file(this, |file| file.data.len() as i64)?;
    Ok(Var::from_int(length.unwrap_or(0)))
}

fn get_position(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let position = with_file(this, |file| file.position as i64)?;
    Ok(Var::from_int(position.unwrap_or(0)))
}

fn seek(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let position = int_arg(args, 0).max(0) as usize;
    with_file(this, |file| {
        file.position = position;
        file.eof = false;
    })?;
    Ok(Var::nil())
}

fn eof_reached(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let eof = with_file(this, |file| file.eof)?;
    Ok(Var::from_bool(eof.unwrap_or(false)))
}

/// Write `bytes` at the cursor; false when the file is not writable.
fn store(this: ObjectPtr, bytes: &[u8]) -> Result<bool, CallError> {
    let stored = with_file(this, |file| {
        if !file.write {
            return false;
        }
        let end = file.position + bytes.len();
        if file.data.len() < end {
            file.data.resize(end, 0);
        }
        file.data[file.position..end].copy_from_slice(bytes);
        file.position = end;
        flush(file);
        true
    })?
    .unwrap_or(false);
    if !stored {
        report_error("File must be opened before use and have write permission.".to_string());
    }
    Ok(stored)
}

/// Read up to `len` bytes at the cursor. A short read sets the end-of-file
/// flag and zero-pads the result to `pad` bytes.
fn fetch(this: ObjectPtr, len: usize, pad: usize) -> Result<Option<Vec<u8>>, CallError> {
    let bytes = with_file(this, |file| {
        if !file.read {
            return None;
        }
        let start = file.position.min(file.data.len());
        let end = (start + len).min(file.data.len());
        let mut bytes = file.data[start..end].to_vec();
        if bytes.len() < len {
            file.eof = true;
        }
        file.position = start + bytes.len();
        if bytes.len() < pad {
            bytes.resize(pad, 0);
        }
        Some(bytes)
    })?
    .flatten();
    if bytes.is_none() {
        report_error("File must be opened before use and have read permission.".to_string());
    }
    Ok(bytes)
}

fn store_buffer(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let bytes = match args.first().and_then(Var::packed) {
        Some(body) => match &*body {
            PackedBody::Byte(bytes) => bytes.clone(),
            _ => Vec::new(),
        },
        None => Vec::new(),
    };
    Ok(Var::from_bool(store(this, &bytes)?))
}

fn get_buffer(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let len = int_arg(args, 0).max(0) as usize;
    let bytes = fetch(this, len, 0)?.unwrap_or_default();
    Ok(Var::from_packed(Arc::new(PackedBody::Byte(bytes))))
}

fn store_int(this: ObjectPtr, args: &[Var], width: usize) -> Result<Var, CallError> {
    let value = int_arg(args, 0).to_le_bytes();
    Ok(Var::from_bool(store(this, &value[..width])?))
}

fn get_int(this: ObjectPtr, width: usize) -> Result<Var, CallError> {
    let Some(bytes) = fetch(this, width, width)? else {
        return Ok(Var::from_int(0));
    };
    let mut word = [0u8; 8];
    word[..width].copy_from_slice(&bytes[..width]);
    Ok(Var::from_int(i64::from_le_bytes(word)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classdb;

    fn call(this: ObjectPtr, method: &str, args: &[Var]) -> Var {
        let method = classdb::find_method("FileAccess", method).unwrap();
        classdb::call(&method, this, args).unwrap()
    }

    fn open_file(path: &str, mode: i64) -> ObjectPtr {
        let args = [Var::from_str(path), Var::from_int(mode)];
        let opened = call(std::ptr::null_mut(), "open", &args);
        opened.object().map(|(address, _)| address).unwrap_or_default() as ObjectPtr
    }

    #[test]
    fn integers_are_little_endian() {
        let file = open_file("user://ints.bin", WRITE);
        assert!(call(file, "store_16", &[Var::from_int(0x0102)]).as_bool().unwrap());
        assert!(call(file, "store_32", &[Var::from_int(-1)]).as_bool().unwrap());
        call(file, "close", &[]);
        let stored = vfs_read("user://ints.bin").unwrap();
        assert_eq!(stored, vec![2, 1, 0xff, 0xff, 0xff, 0xff]);

        let file = open_file("user://ints.bin", READ);
        assert_eq!(call(file, "get_16", &[]).as_int(), Some(0x0102));
        assert_eq!(call(file, "get_32", &[]).as_int(), Some(0xffff_ffff));
        assert!(!call(file, "eof_reached", &[]).as_bool().unwrap());
        assert_eq!(call(file, "get_8", &[]).as_int(), Some(0));
        assert!(call(file, "eof_reached", &[]).as_bool().unwrap());
    }

    #[test]
    fn missing_files_set_open_error() {
        let file = open_file("res://missing.txt", READ);
        assert!(file.is_null());
        let error = call(std::ptr::null_mut(), "get_open_error", &[]);
        assert_eq!(error.as_int(), Some(code::ERR_FILE_NOT_FOUND));

        let file = open_file("C:/absolute.txt", WRITE);
        assert!(file.is_null());
        let error = call(std::ptr::null_mut(), "get_open_error", &[]);
        assert_eq!(error.as_int(), Some(code::ERR_FILE_BAD_PATH));
    }

    #[test]
    fn read_only_files_reject_stores() {
        let file = open_file("user://ro.bin", WRITE);
        call(file, "store_8", &[Var::from_int(9)]);
        call(file, "close", &[]);
        let file = open_file("user://ro.bin", READ);
        assert!(!call(file, "store_8", &[Var::from_int(1)]).as_bool().unwrap());
        assert_eq!(vfs_read("user://ro.bin").unwrap(), vec![9]);
    }

    #[test]
    fn relative_paths_resolve_against_the_project() {
        let file = open_file("data/x.bin", WRITE);
        assert!(!file.is_null());
        let bytes = Var::from_packed(Arc::new(PackedBody::Byte(vec![1, 2, 3, 4])));
        assert!(call(file, "store_buffer", &[bytes]).as_bool().unwrap());
        call(file, "close", &[]);
        assert_eq!(vfs_read("res://data/x.bin").unwrap(), vec![1, 2, 3, 4]);

        let exists = call(std::ptr::null_mut(), "file_exists", &[Var::from_str("data/x.bin")]);
        assert_eq!(exists.as_bool(), Some(true));
        let file = open_file("./data/x.bin", READ);
        assert_eq!(call(file, "get_length", &[]).as_int(), Some(4));
        let read = call(file, "get_buffer", &[Var::from_int(4)]);
        let Some(body) = read.packed() else { panic!("get_buffer returned {read:?}") };
        assert!(matches!(&*body, PackedBody::Byte(bytes) if bytes == &[1, 2, 3, 4]));

        assert!(open_file("/etc/x.bin", WRITE).is_null());
        assert!(open_file("http://x.bin", WRITE).is_null());
    }
}
