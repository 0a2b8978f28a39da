#![allow(dead_code)]

use cardlog::{
    CardCatalog, CardStatus, Document, DocumentLog, DocumentStore, FindOptions, LogError, NewCard,
    Query,
};
use serde_json::Value;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Generous enough that a real compaction always reports back in time.
pub const TEST_COMPACTION_WAIT: Duration = Duration::from_secs(5);

pub fn new_card(title: &str) -> NewCard {
    NewCard {
        title: title.to_string(),
        description: format!("{title} tutorial"),
        path: format!("/extra/{}", title.to_lowercase()),
        date: "2025-08-01".to_string(),
        status: CardStatus::Planned,
        color: "#16a085".to_string(),
    }
}

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Seeded catalog over a fresh log in `dir`.
pub fn open_catalog(dir: &Path) -> CardCatalog<DocumentLog> {
    CardCatalog::builder(dir)
        .compaction_wait(TEST_COMPACTION_WAIT)
        .open()
        .unwrap()
}

/// Seeded catalog over an in-memory store.
pub fn memory_catalog(store: MemoryStore) -> CardCatalog<MemoryStore> {
    let catalog = CardCatalog::new(store).with_compaction_wait(TEST_COMPACTION_WAIT);
    assert!(catalog.initialize_if_empty().unwrap());
    catalog
}

/// In-memory [`DocumentStore`] with fault injection and call counters.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub docs: Vec<Document>,
    pub mutations: usize,
    pub compactions: usize,
    pub compact_delay: Duration,
    pub fail_compact: bool,
    pub fail_reads: bool,
}

impl MemoryStore {
    pub fn slow_compaction(delay: Duration) -> Self {
        MemoryStore {
            compact_delay: delay,
            ..Self::default()
        }
    }

    pub fn failing_compaction() -> Self {
        MemoryStore {
            fail_compact: true,
            ..Self::default()
        }
    }
}

impl DocumentStore for MemoryStore {
    fn find(&self, query: &Query, options: &FindOptions) -> Result<Vec<Document>, LogError> {
        if self.fail_reads {
            return Err(io::Error::other("injected read failure").into());
        }
        let docs = self
            .docs
            .iter()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect();
        Ok(options.apply(docs))
    }

    fn insert(&mut self, docs: Vec<Document>) -> Result<Vec<Document>, LogError> {
        self.mutations += 1;
        self.docs.extend(docs.iter().cloned());
        Ok(docs)
    }

    fn update(&mut self, query: &Query, patch: &Document, multi: bool) -> Result<usize, LogError> {
        self.mutations += 1;
        let mut matched = 0;
        for doc in self.docs.iter_mut() {
            if !query.matches(doc) {
                continue;
            }
            doc.extend(patch.clone());
            matched += 1;
            if !multi {
                break;
            }
        }
        Ok(matched)
    }

    fn remove(&mut self, query: &Query, multi: bool) -> Result<usize, LogError> {
        self.mutations += 1;
        let mut removed = 0;
        self.docs.retain(|doc| {
            if (multi || removed == 0) && query.matches(doc) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    fn compact(&mut self) -> Result<(), LogError> {
        thread::sleep(self.compact_delay);
        self.compactions += 1;
        if self.fail_compact {
            return Err(io::Error::other("injected compaction failure").into());
        }
        Ok(())
    }
}
