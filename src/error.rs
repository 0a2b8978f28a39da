use crate::card::CardId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the document log engine.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot open {}: another writer holds the lock", path.display())]
    Locked { path: PathBuf },

    #[error("corrupt record at line {line}: {reason}")]
    Corrupt { line: u64, reason: String },

    #[error("document is not a JSON object")]
    NotAnObject,
}

/// Failures surfaced by [`CardCatalog`](crate::CardCatalog) operations.
///
/// Callers at the request boundary should map [`CatalogError::NotFound`] to a
/// missing-resource response and everything else to a generic failure.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("store error: {0}")]
    Store(#[from] LogError),

    #[error("card {0} not found")]
    NotFound(CardId),

    #[error("invalid card id: {0:?}")]
    InvalidId(String),

    #[error("no card id left after {}", u64::MAX)]
    IdsExhausted,

    #[error("stored card could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("compaction worker exited without reporting a result")]
    CompactionAborted,
}

impl CatalogError {
    /// Returns `true` if the target card did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}
