use crate::error::LogError;
use crate::query::{FindOptions, Query};
use serde_json::{Map, Value};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A stored document: a top-level JSON object.
pub type Document = Map<String, Value>;

/// The storage operations the catalog consumes.
///
/// [`DocumentLog`](crate::DocumentLog) is the file-backed implementation.
/// Anything else implementing this trait (an in-memory double, a store with
/// injected faults) can be handed to [`CardCatalog::new`](crate::CardCatalog::new).
pub trait DocumentStore: Send {
    /// All live documents matching `query`, sorted and limited per `options`.
    fn find(&self, query: &Query, options: &FindOptions) -> Result<Vec<Document>, LogError>;

    /// The first live document matching `query`.
    fn find_one(&self, query: &Query) -> Result<Option<Document>, LogError> {
        Ok(self
            .find(query, &FindOptions::new().limit(1))?
            .into_iter()
            .next())
    }

    /// Persist new documents and return them as stored.
    fn insert(&mut self, docs: Vec<Document>) -> Result<Vec<Document>, LogError>;

    /// Shallow-merge `patch` into the first match (or every match when
    /// `multi`). Fields absent from `patch` are left untouched. Returns the
    /// number of documents matched.
    fn update(&mut self, query: &Query, patch: &Document, multi: bool) -> Result<usize, LogError>;

    /// Remove the first match (or every match when `multi`). Returns the
    /// number of documents removed.
    fn remove(&mut self, query: &Query, multi: bool) -> Result<usize, LogError>;

    /// Rewrite storage so it holds only live documents.
    fn compact(&mut self) -> Result<(), LogError>;
}

/// Convert a JSON value into a [`Document`], rejecting non-objects.
pub fn into_document(value: Value) -> Result<Document, LogError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(LogError::NotAnObject),
    }
}

/// Lock a shared handle, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
