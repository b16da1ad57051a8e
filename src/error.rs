use crate::grid::GridError;
use thiserror::Error;

/// Failures that end an import. Row-level problems never show up here; they
/// are reported in the summary instead.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unreadable spreadsheet: {0}")]
    UnreadableFile(String),

    #[error("no usable participant rows found")]
    EmptyResult,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnreadableFile(_) => "unreadable_file",
            Self::EmptyResult => "empty_result",
            Self::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<GridError> for ImportError {
    fn from(e: GridError) -> Self {
        Self::UnreadableFile(e.to_string())
    }
}
