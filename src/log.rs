//! Diagnostics that should reach the engine's own error console.
//!
//! [`engine_error!`](crate::engine_error) and [`engine_warn!`](crate::engine_warn)
//! emit a `tracing` event and, once the interface is installed, forward the
//! message to the engine's `print_error` / `print_warning` entries.

use std::ffi::CString;

#[doc(hidden)]
pub use tracing as __tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Error,
    Warning,
}

/// Report an error through `tracing` and the engine.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::__tracing::error!("{}", message);
        $crate::log::forward_error(&message, module_path!(), file!(), line!());
    }};
}

/// Report a warning through `tracing` and the engine.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::__tracing::warn!("{}", message);
        $crate::log::forward_warning(&message, module_path!(), file!(), line!());
    }};
}

#[doc(hidden)]
pub fn forward_error(message: &str, function: &str, file: &str, line: u32) {
    forward(Severity::Error, message, function, file, line);
}

#[doc(hidden)]
pub fn forward_warning(message: &str, function: &str, file: &str, line: u32) {
    forward(Severity::Warning, message, function, file, line);
}

fn c_string(text: &str) -> CString {
    CString::new(text.replace('\0', "\\0")).unwrap_or_default()
}

fn forward(severity: Severity, message: &str, function: &str, file: &str, line: u32) {
    let Some(interface) = gdx_sys::try_interface() else {
        return;
    };
    let entry = match severity {
        Severity::Error => interface.print_error,
        Severity::Warning => interface.print_warning,
    };
    let Some(print) = entry else {
        return;
    };

    let (message, function, file) = (c_string(message), c_string(function), c_string(file));
    let line = i32::try_from(line).unwrap_or(i32::MAX);
    unsafe { print(message.as_ptr(), function.as_ptr(), file.as_ptr(), line, gdx_sys::FALSE) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_bytes_are_escaped() {
        assert_eq!(c_string("a\0b").as_bytes(), b"a\\0b");
    }

    #[test]
    fn forwarding_without_an_interface_is_silent() {
        forward_error("no engine yet", "tests", file!(), line!());
        engine_warn!("still no engine: {}", 42);
    }
}
