use crate::card::{seed_cards, Card, CardId, CardPatch, NewCard, PatchedCard};
use crate::compaction::{CompactionOutcome, CompactionTask};
use crate::error::{CatalogError, LogError};
use crate::document_log::{DocumentLog, DocumentLogBuilder, LockMode};
use crate::query::{FindOptions, Query, SortOrder};
use crate::store::{into_document, lock, Document, DocumentStore};
use log::{debug, error, info};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How long a caller waits for a compaction before assuming it finished.
pub const DEFAULT_COMPACTION_WAIT: Duration = Duration::from_secs(1);

/// The card catalog: CRUD, id allocation, reseeding and compaction over a
/// single collection in a [`DocumentStore`].
///
/// Each operation runs its store calls in order and resolves exactly once.
/// Independent operations are not ordered against each other, with one
/// exception: allocating an id and inserting the card happen under one
/// allocation lock, which reseeding also takes, so live ids stay unique
/// under concurrent callers.
///
/// # Examples
///
/// ```
/// use cardlog::{CardCatalog, CardStatus, NewCard};
///
/// let dir = tempfile::tempdir().unwrap();
/// let catalog = CardCatalog::open(dir.path()).unwrap();
/// assert_eq!(catalog.get_all().unwrap().len(), 6);
///
/// let card = catalog
///     .create(NewCard {
///         title: "Shaders".into(),
///         description: "Write custom GLSL materials.".into(),
///         path: "/advanced/shaders".into(),
///         date: "2025-09-01".into(),
///         status: CardStatus::Planned,
///         color: "#16a085".into(),
///     })
///     .unwrap();
/// assert_eq!(card.id.get(), 7);
/// ```
pub struct CardCatalog<S> {
    store: Arc<Mutex<S>>,
    compaction_wait: Duration,
    allocator: Mutex<()>,
}

impl<S> std::fmt::Debug for CardCatalog<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardCatalog")
            .field("compaction_wait", &self.compaction_wait)
            .finish_non_exhaustive()
    }
}

impl CardCatalog<DocumentLog> {
    /// Open the catalog stored in `dir` with default settings, seeding it if
    /// it holds no cards.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        CardCatalogBuilder::new(dir).open()
    }

    pub fn builder(dir: impl AsRef<Path>) -> CardCatalogBuilder {
        CardCatalogBuilder::new(dir)
    }
}

impl<S> CardCatalog<S>
where
    S: DocumentStore + 'static,
{
    /// Wrap an already-open store. No seeding happens here; call
    /// [`initialize_if_empty`](Self::initialize_if_empty) to bootstrap.
    pub fn new(store: S) -> Self {
        CardCatalog {
            store: Arc::new(Mutex::new(store)),
            compaction_wait: DEFAULT_COMPACTION_WAIT,
            allocator: Mutex::new(()),
        }
    }

    pub fn with_compaction_wait(mut self, wait: Duration) -> Self {
        self.compaction_wait = wait;
        self
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    /// Every card, sorted ascending by `date` compared as plain strings.
    pub fn get_all(&self) -> Result<Vec<Card>, CatalogError> {
        let docs = self.lock_store().find(
            &Query::all(),
            &FindOptions::new().sort("date", SortOrder::Ascending),
        )?;
        docs.into_iter().map(decode).collect()
    }

    /// The card with this id, or `None` if there is none.
    pub fn get_by_id(&self, id: CardId) -> Result<Option<Card>, CatalogError> {
        let doc = self.lock_store().find_one(&Query::eq("id", id))?;
        doc.map(decode).transpose()
    }

    /// Store a new card under the next free id: one more than the current
    /// maximum, or 1 in an empty catalog.
    ///
    /// # Errors
    ///
    /// [`CatalogError::IdsExhausted`] if the current maximum is `u64::MAX`.
    pub fn create(&self, card: NewCard) -> Result<Card, CatalogError> {
        let _alloc = lock(&self.allocator);

        let newest = self.lock_store().find(
            &Query::all(),
            &FindOptions::new().sort("id", SortOrder::Descending).limit(1),
        )?;
        let id = match newest.into_iter().next() {
            Some(doc) => decode(doc)?.id.next().ok_or(CatalogError::IdsExhausted)?,
            None => CardId::new(1),
        };

        let card = card.with_id(id);
        self.lock_store().insert(vec![encode(&card)?])?;
        debug!("created card {id}");
        Ok(card)
    }

    /// Merge `patch` into the stored card. The id never changes.
    ///
    /// The returned [`PatchedCard`] echoes the patch; it is not a re-read of
    /// the merged card.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] if no card has this id.
    pub fn update(&self, id: CardId, patch: CardPatch) -> Result<PatchedCard, CatalogError> {
        let fields = encode(&patch)?;
        let matched = self
            .lock_store()
            .update(&Query::eq("id", id), &fields, false)?;
        if matched == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(PatchedCard { id, patch })
    }

    /// Remove a card, then compact.
    ///
    /// A failed compaction is logged and does not fail the delete.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] if no card has this id.
    pub fn delete(&self, id: CardId) -> Result<CardId, CatalogError> {
        let removed = self.lock_store().remove(&Query::eq("id", id), false)?;
        if removed == 0 {
            return Err(CatalogError::NotFound(id));
        }

        match self.compact_database() {
            Ok(outcome) => debug!("compaction after deleting card {id}: {outcome:?}"),
            Err(e) => error!("compaction after deleting card {id} failed: {e}"),
        }
        Ok(id)
    }

    /// Replace the whole catalog with the seed cards.
    ///
    /// Removes everything, compacts, then inserts the seed set. A compaction
    /// failure aborts before reseeding and can leave the catalog empty.
    pub fn reset_data(&self) -> Result<(), CatalogError> {
        let _alloc = lock(&self.allocator);

        let removed = self.lock_store().remove(&Query::all(), true)?;
        self.compact_database()?;
        let seeded = self.insert_seed()?;
        info!("catalog reset: removed {removed} cards, restored {seeded} seed cards");
        Ok(())
    }

    /// Seed an empty catalog. Returns `true` if the seed cards were inserted,
    /// `false` (and touches nothing) if any card already exists.
    pub fn initialize_if_empty(&self) -> Result<bool, CatalogError> {
        let _alloc = lock(&self.allocator);

        let existing = self.lock_store().find(&Query::all(), &FindOptions::new())?;
        if !existing.is_empty() {
            return Ok(false);
        }
        self.insert_seed()?;
        Ok(true)
    }

    /// Compact the store and wait for it, up to the configured compaction wait.
    pub fn compact_database(&self) -> Result<CompactionOutcome, CatalogError> {
        CompactionTask::schedule(Arc::clone(&self.store))?.wait(self.compaction_wait)
    }

    fn insert_seed(&self) -> Result<usize, CatalogError> {
        let docs = seed_cards()
            .iter()
            .map(encode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.lock_store().insert(docs)?.len())
    }

    fn lock_store(&self) -> MutexGuard<'_, S> {
        lock(&self.store)
    }
}

/// Configures and opens a [`CardCatalog`] backed by a [`DocumentLog`].
#[derive(Debug, Clone)]
pub struct CardCatalogBuilder {
    log: DocumentLogBuilder,
    compaction_wait: Duration,
    seed_on_open: bool,
}

impl CardCatalogBuilder {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        CardCatalogBuilder {
            log: DocumentLogBuilder::new(dir),
            compaction_wait: DEFAULT_COMPACTION_WAIT,
            seed_on_open: true,
        }
    }

    /// Upper bound on how long delete, reset and explicit compaction wait
    /// for the rewrite to finish.
    pub fn compaction_wait(mut self, wait: Duration) -> Self {
        self.compaction_wait = wait;
        self
    }

    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.log = self.log.lock_mode(mode);
        self
    }

    pub fn compact_on_open(mut self, enabled: bool) -> Self {
        self.log = self.log.compact_on_open(enabled);
        self
    }

    pub fn archive(mut self, enabled: bool) -> Self {
        self.log = self.log.archive(enabled);
        self
    }

    /// Load the seed cards when the catalog opens empty. Enabled by default.
    pub fn seed_on_open(mut self, enabled: bool) -> Self {
        self.seed_on_open = enabled;
        self
    }

    pub fn open(self) -> Result<CardCatalog<DocumentLog>, CatalogError> {
        let catalog =
            CardCatalog::new(self.log.open()?).with_compaction_wait(self.compaction_wait);
        if self.seed_on_open && catalog.initialize_if_empty()? {
            info!("empty catalog initialized with seed cards");
        }
        Ok(catalog)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Document, LogError> {
    into_document(serde_json::to_value(value)?)
}

fn decode(doc: Document) -> Result<Card, CatalogError> {
    serde_json::from_value(doc.into()).map_err(CatalogError::Decode)
}
