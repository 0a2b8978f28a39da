mod common;

use cardlog::{
    seed_cards, CardCatalog, CardId, CatalogError, CompactionOutcome, CompactionState,
    CompactionTask,
};
use common::{memory_catalog, new_card, MemoryStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SLOW: Duration = Duration::from_millis(400);
const SHORT_WAIT: Duration = Duration::from_millis(20);

#[test]
fn test_slow_compaction_is_assumed_complete() {
    let catalog = memory_catalog(MemoryStore::slow_compaction(SLOW))
        .with_compaction_wait(SHORT_WAIT);

    assert_eq!(
        catalog.compact_database().unwrap(),
        CompactionOutcome::AssumedComplete
    );

    assert_eq!(catalog.get_all().unwrap().len(), 6);
}

#[test]
fn test_task_states_across_waits() {
    let store = Arc::new(Mutex::new(MemoryStore::slow_compaction(SLOW)));
    let task = CompactionTask::schedule(Arc::clone(&store)).unwrap();

    assert_eq!(task.wait(SHORT_WAIT).unwrap(), CompactionOutcome::AssumedComplete);
    assert_eq!(task.state(), CompactionState::AssumedComplete);

    assert_eq!(
        task.wait(Duration::from_secs(5)).unwrap(),
        CompactionOutcome::Completed
    );
    assert_eq!(task.state(), CompactionState::Completed);
}

#[test]
fn test_failed_task_reports_error() {
    let store = Arc::new(Mutex::new(MemoryStore::failing_compaction()));
    let task = CompactionTask::schedule(store).unwrap();

    let err = task.wait(Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, CatalogError::Store(_)));
    assert_eq!(task.state(), CompactionState::Failed);
}

#[test]
fn test_delete_succeeds_when_compaction_fails() {
    let catalog = memory_catalog(MemoryStore::failing_compaction());

    assert_eq!(catalog.delete(CardId::new(2)).unwrap(), CardId::new(2));
    assert!(catalog.get_by_id(CardId::new(2)).unwrap().is_none());
    assert_eq!(catalog.store().lock().unwrap().compactions, 1);
}

#[test]
fn test_delete_returns_while_compaction_still_running() {
    let catalog = memory_catalog(MemoryStore::slow_compaction(SLOW))
        .with_compaction_wait(SHORT_WAIT);

    assert_eq!(catalog.delete(CardId::new(6)).unwrap(), CardId::new(6));
    assert_eq!(catalog.get_all().unwrap().len(), 5);
}

#[test]
fn test_reset_aborts_when_compaction_fails() {
    let catalog = memory_catalog(MemoryStore::failing_compaction());
    catalog.create(new_card("Extra")).unwrap();

    let err = catalog.reset_data().unwrap_err();
    assert!(matches!(err, CatalogError::Store(_)), "unexpected error: {err}");

    // Removal went through, reseeding never happened
    assert!(catalog.get_all().unwrap().is_empty());
}

#[test]
fn test_explicit_compaction_propagates_failure() {
    let catalog = memory_catalog(MemoryStore::failing_compaction());

    assert!(matches!(
        catalog.compact_database(),
        Err(CatalogError::Store(_))
    ));
}

#[test]
fn test_reset_after_slow_compaction_still_reseeds() {
    let catalog = memory_catalog(MemoryStore::slow_compaction(SLOW))
        .with_compaction_wait(SHORT_WAIT);
    catalog.delete(CardId::new(1)).unwrap();

    catalog.reset_data().unwrap();
    assert_eq!(catalog.get_all().unwrap(), seed_cards());
}

#[test]
fn test_bootstrap_guard_counts_mutations() {
    let catalog = CardCatalog::new(MemoryStore::default());
    assert!(catalog.initialize_if_empty().unwrap());
    assert_eq!(catalog.store().lock().unwrap().mutations, 1);
    assert_eq!(catalog.store().lock().unwrap().docs.len(), 6);

    assert!(!catalog.initialize_if_empty().unwrap());
    assert_eq!(catalog.store().lock().unwrap().mutations, 1);
}

#[test]
fn test_read_failure_surfaces_as_store_error() {
    let store = MemoryStore {
        fail_reads: true,
        ..MemoryStore::default()
    };
    let catalog = CardCatalog::new(store);

    assert!(matches!(catalog.get_all(), Err(CatalogError::Store(_))));
    assert!(matches!(
        catalog.create(new_card("Never")),
        Err(CatalogError::Store(_))
    ));
    assert_eq!(catalog.store().lock().unwrap().mutations, 0);
}
