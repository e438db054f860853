use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = ContextError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ContextError {
    /// A directory could not be listed. Callers treat it as empty.
    #[error("Traversal Error: Path '{path}', Error: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File '{0}' is not valid UTF-8 text")]
    NotText(PathBuf),

    #[error("Persistence Error: {0}")]
    Persistence(String),

    #[error("Export Error: {0}")]
    Export(String),

    #[error("Path '{0}' does not exist")]
    NotFound(PathBuf),

    /// Checking an excluded directory would select nothing.
    #[error("Directory '{0}' is excluded; check the files inside it instead")]
    Excluded(PathBuf),

    #[error("Path '{path}' is outside of the workspace root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Serialization Error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tempfile::PersistError> for ContextError {
    fn from(err: tempfile::PersistError) -> Self {
        ContextError::Persistence(format!("Could not replace state file: {}", err))
    }
}
