use crate::store::Document;
use serde::{Deserialize, Serialize};

/// One line of the document log.
///
/// Records are serialized as single JSON lines in `cards.jsonl`, tagged by
/// `op`. Inserts and updates carry the full document body plus an xxh64
/// checksum of its canonical JSON; removals are bare tombstones.
///
/// ```text
/// {"op":"insert","key":0,"doc":{"id":1,"title":"..."},"sum":"9ae16a3b2f90404f"}
/// {"op":"update","key":0,"doc":{"id":1,"title":"..."},"sum":"5f1a7c0e2d4b8a13"}
/// {"op":"remove","key":0}
/// ```
///
/// `key` is internal to the engine. It is unrelated to any `id` field the
/// document itself carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Record {
    Insert { key: u64, doc: Document, sum: String },
    Update { key: u64, doc: Document, sum: String },
    Remove { key: u64 },
}

/// Compute the xxh64 checksum of a document's canonical JSON, hex-encoded.
///
/// `serde_json` keeps object keys sorted and, with `float_roundtrip`, parses
/// every float back to the same bits, so re-serializing a parsed document
/// yields the same bytes and therefore the same checksum.
fn doc_hash(doc: &Document) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(doc)?;
    Ok(format!("{:016x}", xxhash_rust::xxh64::xxh64(&bytes, 0)))
}

impl Record {
    pub fn insert(key: u64, doc: Document) -> Result<Self, serde_json::Error> {
        let sum = doc_hash(&doc)?;
        Ok(Record::Insert { key, doc, sum })
    }

    pub fn update(key: u64, doc: Document) -> Result<Self, serde_json::Error> {
        let sum = doc_hash(&doc)?;
        Ok(Record::Update { key, doc, sum })
    }

    pub fn remove(key: u64) -> Self {
        Record::Remove { key }
    }

    /// The engine key this record applies to.
    pub fn key(&self) -> u64 {
        match self {
            Record::Insert { key, .. } | Record::Update { key, .. } | Record::Remove { key } => {
                *key
            }
        }
    }

    /// Check the stored checksum against the document body.
    ///
    /// Returns a human-readable reason on mismatch.
    pub fn verify(&self) -> Result<(), String> {
        match self {
            Record::Insert { doc, sum, .. } | Record::Update { doc, sum, .. } => {
                let actual = doc_hash(doc).map_err(|e| e.to_string())?;
                if &actual == sum {
                    Ok(())
                } else {
                    Err(format!("checksum mismatch: stored {sum}, computed {actual}"))
                }
            }
            Record::Remove { .. } => Ok(()),
        }
    }
}
