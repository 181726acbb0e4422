use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid project root {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("AST provider failed to initialize: {0}")]
    ProviderInit(#[source] sigscope_gdscript::AstError),

    #[error("Graph error: {0}")]
    GraphError(#[from] sigscope_graph::GraphError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanError {
    pub(crate) fn invalid_root(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidRoot {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
