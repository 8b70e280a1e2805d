//! Error type for tree materialization and lazy reads.

use std::path::PathBuf;
use std::sync::Arc;

use hdftree_format::message_type::MessageType;
use hdftree_format::FormatError;
use hdftree_io::OpenError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("{} is not a readable container: {reason}", path.display())]
    InvalidContainer { path: PathBuf, reason: String },

    #[error("corrupt node at {path}: {reason}")]
    CorruptNode { path: String, reason: String },

    #[error("no node at {0}")]
    NoSuchNode(String),

    #[error("link {path} could not be resolved: {reason}")]
    LinkUnresolved { path: String, reason: String },

    #[error("link depth {depth} exceeded at {path}")]
    LinkDepthExceeded { path: String, depth: usize },

    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("slice out of bounds on axis {axis}: {index} > {len}")]
    SliceOutOfBounds { axis: usize, index: usize, len: usize },

    #[error("invalid slice: {0}")]
    InvalidSlice(String),

    #[error("asynchronous materialization failed: {0}")]
    AsyncMaterializationFailed(#[source] Arc<Error>),

    #[error("HDF5 format error: {0}")]
    Format(#[from] FormatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required message: {0:?}")]
    MissingMessage(MessageType),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("tree is closed")]
    Closed,
}

impl From<OpenError> for Error {
    fn from(e: OpenError) -> Self {
        match e {
            OpenError::NotFound(path) => Error::FileNotFound(path),
            OpenError::Io { path, source } => Error::InvalidContainer {
                path,
                reason: source.to_string(),
            },
            OpenError::Format { path, source } => Error::InvalidContainer {
                path,
                reason: source.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
