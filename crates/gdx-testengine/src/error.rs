use thiserror::Error;

/// Status codes of the engine's global `Error` enum.
pub mod code {
    pub const OK: i64 = 0;
    pub const FAILED: i64 = 1;
    pub const ERR_FILE_NOT_FOUND: i64 = 7;
    pub const ERR_FILE_BAD_PATH: i64 = 9;
    pub const ERR_FILE_CANT_OPEN: i64 = 12;
    pub const ERR_INVALID_PARAMETER: i64 = 31;
    pub const ERR_ALREADY_EXISTS: i64 = 32;
    pub const ERR_DOES_NOT_EXIST: i64 = 33;
}

/// Failure to load an extension library.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("extension entry point rejected initialization")]
    EntryRejected,

    #[error("an extension library is already loaded")]
    AlreadyBooted,

    #[error("no extension library is loaded")]
    NotBooted,
}
