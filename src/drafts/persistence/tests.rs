//! Tests for draft persistence

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::*;
use crate::drafts::MemoryDraftStore;
use crate::wizard::{StepId, WizardStep};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
struct Plan {
    #[serde(skip_serializing_if = "Option::is_none")]
    seats: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum Signup {
    Contact(Contact),
    Plan(Plan),
    Review(Plan),
}

impl StepPayload for Signup {
    fn step_id(&self) -> StepId {
        match self {
            Signup::Contact(_) => 1,
            Signup::Plan(_) => 2,
            Signup::Review(_) => 3,
        }
    }
}

fn definition() -> WizardDefinition<Signup> {
    WizardDefinition::new(
        "signup",
        vec![
            WizardStep::new(1, "contact", "Contact"),
            WizardStep::new(2, "plan", "Plan"),
            WizardStep::new(3, "review", "Review"),
        ],
    )
    .unwrap()
}

fn key(raw: &str) -> DraftKey {
    DraftKey::new(raw).unwrap()
}

fn state_with_seats(seats: u32) -> WizardState<Signup> {
    let mut state = WizardState::at(2);
    state.step_data.insert(
        1,
        Signup::Contact(Contact {
            name: Some("Noor Trading LLC".into()),
            email: Some("accounts@noor.ae".into()),
        }),
    );
    state
        .step_data
        .insert(2, Signup::Plan(Plan { seats: Some(seats) }));
    state.completed.insert(1);
    state
}

/// Memory store that records call counts, overlaps and scripted fetch failures
#[derive(Default)]
struct InstrumentedStore {
    inner: MemoryDraftStore,
    delay: Duration,
    upserts: AtomicUsize,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetch_failures: std::sync::Mutex<Vec<StoreError>>,
}

impl InstrumentedStore {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn failing_fetches(failures: Vec<StoreError>) -> Self {
        Self {
            fetch_failures: std::sync::Mutex::new(failures),
            ..Self::default()
        }
    }
}

#[async_trait]
impl DraftStore for InstrumentedStore {
    fn name(&self) -> &str {
        "instrumented"
    }

    async fn upsert_draft(&self, record: &DraftRecord) -> Result<(), StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.upsert_draft(record).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.upserts.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn fetch_draft(&self, key: &DraftKey) -> Result<Option<DraftRecord>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let failure = self.fetch_failures.lock().unwrap().pop();
        match failure {
            Some(err) => Err(err),
            None => self.inner.fetch_draft(key).await,
        }
    }

    async fn delete_draft(&self, key: &DraftKey) -> Result<bool, StoreError> {
        self.inner.delete_draft(key).await
    }

    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, StoreError> {
        self.inner.list_drafts().await
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn test_autosave_then_load_round_trip() {
    let persistence = DraftPersistence::new(Arc::new(MemoryDraftStore::new()));
    let state = state_with_seats(4);

    let outcome = persistence
        .autosave(&key("signup-1"), WizardKind::Onboarding, &state)
        .await
        .unwrap();
    assert_eq!(outcome, SaveOutcome::Saved);

    let restored = persistence
        .load_draft(&key("signup-1"), WizardKind::Onboarding, &definition())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.current_step, 2);
    assert_eq!(restored.step_data, state.step_data);
    // Both records hold data, so both count as completed on resume
    assert_eq!(restored.completed.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn test_load_missing_draft_is_none() {
    let persistence = DraftPersistence::new(Arc::new(MemoryDraftStore::new()));
    let restored = persistence
        .load_draft(&key("nobody"), WizardKind::Onboarding, &definition())
        .await
        .unwrap();
    assert!(restored.is_none());
}

#[tokio::test]
async fn test_unchanged_content_skips_store() {
    let store = Arc::new(InstrumentedStore::default());
    let persistence = DraftPersistence::new(store.clone());
    let state = state_with_seats(4);

    let first = persistence
        .autosave(&key("signup-1"), WizardKind::Onboarding, &state)
        .await
        .unwrap();
    let second = persistence
        .autosave(&key("signup-1"), WizardKind::Onboarding, &state)
        .await
        .unwrap();

    assert_eq!(first, SaveOutcome::Saved);
    assert_eq!(second, SaveOutcome::Unchanged);
    assert_eq!(store.upserts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rapid_saves_never_overlap_for_one_key() {
    let store = Arc::new(InstrumentedStore::slow(Duration::from_millis(10)));
    let persistence = Arc::new(DraftPersistence::new(store.clone()));

    let mut handles = Vec::new();
    for seats in 1..=8 {
        let persistence = persistence.clone();
        handles.push(tokio::spawn(async move {
            persistence
                .autosave(&key("signup-1"), WizardKind::Onboarding, &state_with_seats(seats))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);

    // The stored record is always one complete snapshot
    let record = store.inner.fetch_draft(&key("signup-1")).await.unwrap().unwrap();
    let data: StepData<Signup> = serde_json::from_value(record.data).unwrap();
    assert!(matches!(data.get(&2), Some(Signup::Plan(Plan { seats: Some(1..=8) }))));

    // A later save always wins
    persistence
        .autosave(&key("signup-1"), WizardKind::Onboarding, &state_with_seats(42))
        .await
        .unwrap();
    let record = store.inner.fetch_draft(&key("signup-1")).await.unwrap().unwrap();
    let data: StepData<Signup> = serde_json::from_value(record.data).unwrap();
    assert_eq!(data.get(&2), Some(&Signup::Plan(Plan { seats: Some(42) })));
}

#[tokio::test]
async fn test_different_keys_save_concurrently() {
    let store = Arc::new(InstrumentedStore::slow(Duration::from_millis(30)));
    let persistence = Arc::new(DraftPersistence::new(store.clone()));

    let a = {
        let persistence = persistence.clone();
        tokio::spawn(async move {
            persistence
                .autosave(&key("a"), WizardKind::Onboarding, &state_with_seats(1))
                .await
        })
    };
    let b = {
        let persistence = persistence.clone();
        tokio::spawn(async move {
            persistence
                .autosave(&key("b"), WizardKind::Onboarding, &state_with_seats(2))
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_load_rejects_draft_of_another_wizard() {
    let persistence = DraftPersistence::new(Arc::new(MemoryDraftStore::new()));
    persistence
        .autosave(&key("signup-1"), WizardKind::Onboarding, &state_with_seats(4))
        .await
        .unwrap();

    let err = persistence
        .load_draft(&key("signup-1"), WizardKind::Cpq, &definition())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::KindMismatch {
            found: WizardKind::Onboarding,
            ..
        }
    ));
}

#[tokio::test]
async fn test_save_final_deletes_draft_by_default() {
    let store = Arc::new(MemoryDraftStore::new());
    let persistence = DraftPersistence::new(store.clone());
    let state = state_with_seats(4);
    persistence
        .autosave(&key("signup-1"), WizardKind::Onboarding, &state)
        .await
        .unwrap();

    persistence
        .save_final(&key("signup-1"), WizardKind::Onboarding, &state)
        .await
        .unwrap();
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let persistence = DraftPersistence::new(Arc::new(MemoryDraftStore::new()));
    for (raw, seats) in [("a", 1), ("b", 2), ("c", 3)] {
        persistence
            .autosave(&key(raw), WizardKind::Onboarding, &state_with_seats(seats))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let keys: Vec<String> = persistence
        .list_drafts()
        .await
        .unwrap()
        .iter()
        .map(|d| d.key.as_str().to_string())
        .collect();
    assert_eq!(keys, ["c", "b", "a"]);
}

#[tokio::test]
async fn test_finished_keys_release_their_slots() {
    let persistence = DraftPersistence::new(Arc::new(MemoryDraftStore::new()));
    let state = state_with_seats(2);
    for raw in ["signup-1", "signup-2", "signup-3"] {
        persistence
            .autosave(&key(raw), WizardKind::Onboarding, &state)
            .await
            .unwrap();
    }
    assert_eq!(persistence.slots.lock().await.len(), 3);

    persistence
        .save_final(&key("signup-1"), WizardKind::Onboarding, &state)
        .await
        .unwrap();
    assert!(persistence.delete_draft(&key("signup-2")).await.unwrap());
    persistence.release(&key("signup-3")).await;

    assert!(persistence.slots.lock().await.is_empty());
}

#[tokio::test]
async fn test_release_keeps_slot_in_use() {
    let persistence = DraftPersistence::new(Arc::new(MemoryDraftStore::new()));
    let held = persistence.slot(&key("busy")).await;
    let _guard = held.lock().await;

    persistence.release(&key("busy")).await;
    assert!(persistence.slots.lock().await.contains_key(&key("busy")));
}

#[tokio::test]
async fn test_retained_complete_draft_is_not_resumed() {
    let store = Arc::new(MemoryDraftStore::new());
    let persistence = DraftPersistence::new(store.clone()).with_retain_completed(true);
    let state = state_with_seats(4);

    persistence
        .save_final(&key("signup-1"), WizardKind::Onboarding, &state)
        .await
        .unwrap();

    let record = store.fetch_draft(&key("signup-1")).await.unwrap().unwrap();
    assert_eq!(record.status, DraftStatus::Complete);

    let restored = persistence
        .load_draft(&key("signup-1"), WizardKind::Onboarding, &definition())
        .await
        .unwrap();
    assert!(restored.is_none());
}

#[tokio::test]
async fn test_transient_load_failures_are_retried() {
    let store = Arc::new(InstrumentedStore::failing_fetches(vec![
        StoreError::Network("connection reset".into()),
        StoreError::Http {
            status: 503,
            message: "unavailable".into(),
        },
    ]));
    let persistence = DraftPersistence::new(store.clone()).with_load_retry(fast_retry());
    persistence
        .autosave(&key("signup-1"), WizardKind::Onboarding, &state_with_seats(4))
        .await
        .unwrap();

    let restored = persistence
        .load_draft(&key("signup-1"), WizardKind::Onboarding, &definition())
        .await
        .unwrap();
    assert!(restored.is_some());
    assert_eq!(store.fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_permanent_load_failure_is_not_retried() {
    let store = Arc::new(InstrumentedStore::failing_fetches(vec![StoreError::Unauthorized]));
    let persistence = DraftPersistence::new(store.clone()).with_load_retry(fast_retry());

    let err = persistence
        .load_draft(&key("signup-1"), WizardKind::Onboarding, &definition())
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Store(StoreError::Unauthorized)));
    assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreadable_draft_reports_corrupt() {
    let store = Arc::new(MemoryDraftStore::new());
    store
        .upsert_draft(&DraftRecord {
            key: key("signup-1"),
            kind: WizardKind::Onboarding,
            current_step: 1,
            data: serde_json::json!({"1": {"step": "no_such_step"}}),
            status: DraftStatus::Draft,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    let persistence = DraftPersistence::new(store);

    let err = persistence
        .load_draft(&key("signup-1"), WizardKind::Onboarding, &definition())
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Corrupt { .. }));
}

#[tokio::test]
async fn test_record_under_wrong_step_is_dropped() {
    let store = Arc::new(MemoryDraftStore::new());
    store
        .upsert_draft(&DraftRecord {
            key: key("signup-1"),
            kind: WizardKind::Onboarding,
            current_step: 2,
            data: serde_json::json!({
                "1": {"step": "contact", "name": "Noor"},
                "3": {"step": "plan", "seats": 2}
            }),
            status: DraftStatus::Draft,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    let persistence = DraftPersistence::new(store);

    let restored = persistence
        .load_draft(&key("signup-1"), WizardKind::Onboarding, &definition())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.step_data.len(), 1);
    assert!(restored.step_data.contains_key(&1));
}
