//! Error types for the block layer

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlockError>;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Error allocating writable memory ({bytes_required} bytes, alignment {alignment}): {message}")]
    Allocation {
        bytes_required: u64,
        alignment: usize,
        message: String,
    },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported scheme '{0}': only file:// locations can be memory mapped")]
    UnsupportedScheme(String),

    #[error("Entry '{name}' not found in {context}")]
    NotFound { context: String, name: String },

    #[error("Entry '{0}' already exists")]
    EntryExists(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BlockError {
    /// Build an `InvalidArgument` error from any message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        BlockError::InvalidArgument(message.into())
    }

    /// Attach a path to an OS-level I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BlockError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable error code, used by tools that report errors by name.
    pub fn code(&self) -> &'static str {
        match self {
            BlockError::InvalidArgument(_) => "INVALID_ARGUMENT",
            BlockError::Allocation { .. } => "ALLOCATION_FAILED",
            BlockError::Io { .. } => "IO_ERROR",
            BlockError::UnsupportedScheme(_) => "UNSUPPORTED_SCHEME",
            BlockError::NotFound { .. } => "NOT_FOUND",
            BlockError::EntryExists(_) => "ENTRY_EXISTS",
            BlockError::Json(_) => "PARSE_ERROR",
        }
    }

    /// HTTP-style status class.
    ///
    /// 500 marks a limitation of this layer (an unsupported scheme), 400
    /// marks bad input or an environmental failure caused by the input.
    pub fn status(&self) -> u16 {
        match self {
            BlockError::UnsupportedScheme(_) => 500,
            BlockError::NotFound { .. } => 404,
            _ => 400,
        }
    }
}
