mod archive;
mod card;
mod catalog;
mod compaction;
mod document_log;
mod error;
mod query;
mod record;
mod store;

pub use card::{seed_cards, Card, CardId, CardPatch, CardStatus, NewCard, PatchedCard};
pub use catalog::{CardCatalog, CardCatalogBuilder, DEFAULT_COMPACTION_WAIT};
pub use compaction::{CompactionOutcome, CompactionState, CompactionTask};
pub use document_log::{DocumentLog, DocumentLogBuilder, LockMode, LogStats};
pub use error::{CatalogError, LogError};
pub use query::{compare_values, FindOptions, Query, SortOrder};
pub use record::Record;
pub use store::{into_document, Document, DocumentStore};
