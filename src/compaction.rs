//! Background compaction with a bounded completion wait.
//!
//! A compaction runs on its own worker thread, which locks the store for the
//! duration of the rewrite. The scheduling side waits for the worker's result
//! up to a fixed interval; past that, the compaction is *assumed* complete and
//! the caller moves on while the worker keeps running. Callers issuing store
//! operations afterwards simply block on the store lock until the rewrite is
//! done, so an assumed-complete compaction never interleaves with them.

use crate::error::{CatalogError, LogError};
use crate::store::{lock, DocumentStore};
use log::warn;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Lifecycle of one compaction task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionState {
    Scheduled,
    Running,
    /// The worker finished and the store reported success.
    Completed,
    /// The wait elapsed before the worker reported back.
    AssumedComplete,
    Failed,
}

/// How a waited-on compaction resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    Completed,
    AssumedComplete,
}

/// Handle to a compaction running in the background.
pub struct CompactionTask {
    state: Arc<Mutex<CompactionState>>,
    result: Receiver<Result<(), LogError>>,
}

impl CompactionTask {
    /// Start compacting `store` on a worker thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the worker thread cannot be spawned.
    pub fn schedule<S>(store: Arc<Mutex<S>>) -> Result<Self, CatalogError>
    where
        S: DocumentStore + 'static,
    {
        let state = Arc::new(Mutex::new(CompactionState::Scheduled));
        let (tx, rx) = mpsc::channel();

        let worker_state = Arc::clone(&state);
        thread::Builder::new()
            .name("cardlog-compaction".to_string())
            .spawn(move || {
                {
                    let mut state = lock(&worker_state);
                    if *state == CompactionState::Scheduled {
                        *state = CompactionState::Running;
                    }
                }
                let result = lock(&store).compact();
                // The store handle must be gone before the result is sent.
                drop(store);
                set_state(
                    &worker_state,
                    if result.is_ok() {
                        CompactionState::Completed
                    } else {
                        CompactionState::Failed
                    },
                );
                // The waiter may have given up already.
                let _ = tx.send(result);
            })
            .map_err(LogError::from)?;

        Ok(CompactionTask { state, result: rx })
    }

    pub fn state(&self) -> CompactionState {
        *lock(&self.state)
    }

    /// Wait up to `timeout` for the worker to finish.
    ///
    /// After an assumed-complete return the task can be waited on again to
    /// collect the real result.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Store`] if the store's compaction failed within the
    /// wait, [`CatalogError::CompactionAborted`] if the worker died without
    /// reporting.
    pub fn wait(&self, timeout: Duration) -> Result<CompactionOutcome, CatalogError> {
        match self.result.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(CompactionOutcome::Completed),
            Ok(Err(e)) => Err(CatalogError::Store(e)),
            Err(RecvTimeoutError::Timeout) => {
                let mut state = lock(&self.state);
                if matches!(
                    *state,
                    CompactionState::Scheduled | CompactionState::Running
                ) {
                    *state = CompactionState::AssumedComplete;
                }
                warn!("compaction still running after {timeout:?}, assuming complete");
                Ok(CompactionOutcome::AssumedComplete)
            }
            Err(RecvTimeoutError::Disconnected) => Err(CatalogError::CompactionAborted),
        }
    }
}

fn set_state(state: &Mutex<CompactionState>, next: CompactionState) {
    *lock(state) = next;
}
