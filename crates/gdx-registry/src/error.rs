use gdx_sys::VariantType;
use thiserror::Error;

/// Failure to resolve an engine symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("engine interface is not loaded")]
    InterfaceNotLoaded,

    #[error("ABI mismatch for {class}::{method}: manifest hash {expected}, engine hash {actual}")]
    AbiMismatch {
        class: String,
        method: String,
        expected: i64,
        actual: i64,
    },

    #[error("engine has no method {class}::{method}")]
    UnknownMethod { class: String, method: String },

    #[error("engine has no utility function `{name}` with hash {hash}")]
    UnknownUtility { name: String, hash: i64 },

    #[error("engine has no builtin method {kind}::{method} with hash {hash}")]
    UnknownBuiltinMethod {
        kind: VariantType,
        method: String,
        hash: i64,
    },

    #[error("engine has no constructor #{index} for {kind}")]
    UnknownConstructor { kind: VariantType, index: i32 },

    #[error("method bind cache already installed")]
    AlreadyInstalled,
}

impl BindError {
    /// ABI mismatches are never downgraded, even for optional symbols.
    pub fn is_abi_mismatch(&self) -> bool {
        matches!(self, BindError::AbiMismatch { .. })
    }
}

/// Failure to record a class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("class `{0}` is already registered")]
    DuplicateClass(String),

    #[error("class `{0}` is not registered")]
    UnknownClass(String),

    #[error("class `{class}` names unregistered parent `{parent}`")]
    UnknownParent { class: String, parent: String },

    #[error("class `{class}` would be a second root next to `{root}`")]
    MultipleRoots { class: String, root: String },

    #[error("class hierarchy contains a cycle through `{0}`")]
    Cycle(String),

    #[error("class `{class}` still has subclasses: {subclasses:?}")]
    HasSubclasses {
        class: String,
        subclasses: Vec<String>,
    },
}
