use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("class `{0}` is declared twice")]
    DuplicateClass(String),

    #[error("class `{class}` inherits from unknown class `{parent}`")]
    UnknownParent { class: String, parent: String },

    #[error("manifest has {0} root classes; exactly one is required")]
    RootCount(usize),

    #[error("class hierarchy contains a cycle through `{0}`")]
    Cycle(String),

    #[error("unknown type `{ty}` in {context}")]
    UnknownType { context: String, ty: String },

    #[error("method {class}::{method} has no hash")]
    MissingHash { class: String, method: String },

    #[error("manifest has no builtin sizes for build configuration `{0}`")]
    MissingBuildConfiguration(String),

    #[error("singleton `{name}` refers to unknown class `{class}`")]
    UnknownSingleton { name: String, class: String },
}
