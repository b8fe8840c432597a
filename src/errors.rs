//! Typed failures raised by the storage core
//!
//! Everything below the command layer returns [`Result`]; commands wrap these
//! into `anyhow::Error` and callers can get the typed value back with
//! `downcast_ref::<Error>()`.

use crate::artifacts::objects::object_id::ObjectId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Length or hash mismatch while decoding an object, or a malformed payload
    #[error("corrupted object: {0}")]
    CorruptedObject(String),

    /// Checksum mismatch or malformed structure in the index file
    #[error("corrupted index: {0}")]
    CorruptedIndex(String),

    #[error("unsupported index version {0}")]
    UnsupportedIndexVersion(u32),

    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    /// A tree read would introduce a path that is already staged
    #[error("entry '{0}' overlaps with an existing index entry")]
    OverlappingEntry(String),

    #[error("invalid object id '{0}'")]
    InvalidHashString(String),

    #[error("not a repository (or missing objects directory): {}", .0.display())]
    RepositoryNotInitialized(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn corrupted_object(reason: impl Into<String>) -> Self {
        Error::CorruptedObject(reason.into())
    }

    pub(crate) fn corrupted_index(reason: impl Into<String>) -> Self {
        Error::CorruptedIndex(reason.into())
    }
}
