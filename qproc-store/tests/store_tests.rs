//! Store behavior tests with a scripted gateway
//!
//! Drives `ProcessingStateStore` through route changes and gateway
//! completions using a mock gateway whose responses are immediate (or, for
//! cancellation tests, hang until cancelled). `store.tick()` applies one
//! completion at a time, so every test is deterministic.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use qproc_common::types::{
    ProcessingRow, QuestionPath, RouteKey, SubmissionRecord, Transx, TransxDraft,
};
use qproc_store::asset::AssetSource;
use qproc_store::gateway::{
    GatewayError, GatewayResult, ProcessingDataGateway, ProcessingDataResponse,
    ProcessingSubmissionsResponse, QuestionProcessingData, TransxPayload,
};
use qproc_store::{GatewayReply, ProcessingStateStore};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn transx(language: &str, value: &str, minute: u32) -> Transx {
    let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap();
    Transx {
        value: value.to_string(),
        language_code: language.to_string(),
        date_created: created,
        date_modified: created,
    }
}

struct MockGateway {
    calls: Mutex<Vec<String>>,
    rows: Mutex<Vec<ProcessingRow>>,
    processing: Mutex<ProcessingDataResponse>,
    /// Number of upcoming processing-data calls that hang until cancelled
    hang_processing: AtomicUsize,
    fail_submission: AtomicBool,
    fail_transcript_save: AtomicBool,
    fail_activation: AtomicBool,
    translations_after_delete: Mutex<Vec<Transx>>,
}

impl MockGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            rows: Mutex::new(Vec::new()),
            processing: Mutex::new(HashMap::new()),
            hang_processing: AtomicUsize::new(0),
            fail_submission: AtomicBool::new(false),
            fail_transcript_save: AtomicBool::new(false),
            fail_activation: AtomicBool::new(false),
            translations_after_delete: Mutex::new(Vec::new()),
        })
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn set_rows(&self, rows: serde_json::Value) {
        *self.rows.lock().unwrap() = serde_json::from_value(rows).unwrap();
    }

    fn set_processing(&self, question: &str, data: QuestionProcessingData) {
        self.processing
            .lock()
            .unwrap()
            .insert(question.to_string(), data);
    }
}

#[async_trait]
impl ProcessingDataGateway for MockGateway {
    async fn get_submission_by_uuid(
        &self,
        _asset_uid: &str,
        submission_uuid: &str,
    ) -> GatewayResult<SubmissionRecord> {
        self.log(format!("submission:{}", submission_uuid));
        if self.fail_submission.load(Ordering::Relaxed) {
            return Err(GatewayError::Api {
                status: 404,
                detail: "Failed to get submission.".to_string(),
            });
        }
        Ok(SubmissionRecord {
            uuid: submission_uuid.to_string(),
            fields: HashMap::new(),
        })
    }

    async fn get_processing_submissions(
        &self,
        asset_uid: &str,
        _question_paths: &[QuestionPath],
    ) -> GatewayResult<ProcessingSubmissionsResponse> {
        self.log(format!("uuids:{}", asset_uid));
        Ok(ProcessingSubmissionsResponse {
            results: self.rows.lock().unwrap().clone(),
        })
    }

    async fn get_processing_data(
        &self,
        _asset_uid: &str,
        submission_uuid: &str,
    ) -> GatewayResult<ProcessingDataResponse> {
        self.log(format!("processing:{}", submission_uuid));
        if self.hang_processing.load(Ordering::Relaxed) > 0 {
            self.hang_processing.fetch_sub(1, Ordering::Relaxed);
            std::future::pending::<()>().await;
            unreachable!();
        }
        Ok(self.processing.lock().unwrap().clone())
    }

    async fn set_transcript(
        &self,
        _key: &RouteKey,
        payload: &TransxPayload,
    ) -> GatewayResult<Transx> {
        self.log("set_transcript".to_string());
        if self.fail_transcript_save.load(Ordering::Relaxed) {
            return Err(GatewayError::Api {
                status: 500,
                detail: "Save failed.".to_string(),
            });
        }
        Ok(transx(&payload.language_code, &payload.value, 59))
    }

    async fn delete_transcript(&self, _key: &RouteKey) -> GatewayResult<()> {
        self.log("delete_transcript".to_string());
        Ok(())
    }

    async fn set_translation(
        &self,
        _key: &RouteKey,
        payload: &TransxPayload,
    ) -> GatewayResult<Transx> {
        self.log(format!("set_translation:{}", payload.language_code));
        Ok(transx(&payload.language_code, &payload.value, 59))
    }

    async fn delete_translation(
        &self,
        _key: &RouteKey,
        language_code: &str,
    ) -> GatewayResult<Vec<Transx>> {
        self.log(format!("delete_translation:{}", language_code));
        Ok(self.translations_after_delete.lock().unwrap().clone())
    }

    async fn activate_asset(
        &self,
        asset_uid: &str,
        _enable: bool,
        _languages: &[String],
    ) -> GatewayResult<()> {
        self.log(format!("activate:{}", asset_uid));
        if self.fail_activation.load(Ordering::Relaxed) {
            return Err(GatewayError::Api {
                status: 500,
                detail: "Activation failed.".to_string(),
            });
        }
        Ok(())
    }
}

struct TestAssets {
    activated: HashSet<String>,
    questions: HashMap<String, Vec<QuestionPath>>,
}

impl TestAssets {
    fn activated_with_question(asset_uid: &str, questions: &[&str]) -> Arc<Self> {
        let mut map = HashMap::new();
        map.insert(
            asset_uid.to_string(),
            questions
                .iter()
                .map(|q| QuestionPath {
                    name: q.to_string(),
                    flat_path: q.to_string(),
                })
                .collect(),
        );
        Arc::new(Self {
            activated: [asset_uid.to_string()].into_iter().collect(),
            questions: map,
        })
    }

    fn not_activated_with_question(asset_uid: &str, questions: &[&str]) -> Arc<Self> {
        let mut assets = Self::activated_with_question(asset_uid, questions);
        Arc::get_mut(&mut assets).unwrap().activated.clear();
        assets
    }
}

impl AssetSource for TestAssets {
    fn is_processing_activated(&self, asset_uid: &str) -> bool {
        self.activated.contains(asset_uid)
    }

    fn processing_questions(&self, asset_uid: &str) -> Vec<QuestionPath> {
        self.questions.get(asset_uid).cloned().unwrap_or_default()
    }
}

/// Gateway with three submissions answering question "q" plus processing
/// data holding an English transcript and pl/de translations
fn standard_gateway() -> Arc<MockGateway> {
    let gateway = MockGateway::new();
    gateway.set_rows(json!([
        {"_uuid": "u1", "q": "a.mp3"},
        {"_uuid": "u2", "q": "b.mp3"},
        {"_uuid": "u3", "q": "c.mp3"},
    ]));
    let mut translated = HashMap::new();
    translated.insert("pl".to_string(), transx("pl", "czesc", 1));
    translated.insert("de".to_string(), transx("de", "hallo", 2));
    gateway.set_processing(
        "q",
        QuestionProcessingData {
            transcript: Some(transx("en", "hello", 0)),
            translated,
        },
    );
    gateway
}

async fn ticks(store: &mut ProcessingStateStore, n: usize) {
    for _ in 0..n {
        assert!(store.tick().await, "reply inbox closed unexpectedly");
    }
}

#[tokio::test]
async fn uuid_index_is_fetched_once_per_asset() {
    let gateway = standard_gateway();
    let assets = TestAssets::activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);

    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 3).await;
    assert!(store.is_ready());
    assert_eq!(gateway.count("uuids:"), 1);

    // Submission-only change: uuid index is asset-scoped and kept.
    store.handle_path_change("/forms/a1/data/processing/q/u2");
    assert!(!store.is_ready());
    ticks(&mut store, 2).await;
    assert!(store.is_ready());
    assert_eq!(gateway.count("uuids:"), 1);
    assert_eq!(gateway.count("submission:"), 2);
    assert_eq!(gateway.count("processing:"), 2);

    // Question-only change: submission data is kept too.
    store.handle_path_change("/forms/a1/data/processing/q2/u2");
    ticks(&mut store, 1).await;
    assert_eq!(gateway.count("uuids:"), 1);
    assert_eq!(gateway.count("submission:"), 2);
    assert_eq!(gateway.count("processing:"), 3);
}

#[tokio::test]
async fn asset_change_invalidates_every_cache_before_new_fetches_complete() {
    let gateway = standard_gateway();
    let assets = Arc::new(TestAssets {
        activated: ["a1".to_string(), "b1".to_string()].into_iter().collect(),
        questions: [
            (
                "a1".to_string(),
                vec![QuestionPath {
                    name: "q".into(),
                    flat_path: "q".into(),
                }],
            ),
            (
                "b1".to_string(),
                vec![QuestionPath {
                    name: "q".into(),
                    flat_path: "q".into(),
                }],
            ),
        ]
        .into_iter()
        .collect(),
    });
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);

    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 3).await;
    assert!(store.is_ready());

    store.handle_path_change("/forms/b1/data/processing/q/u2");

    // Everything previously cached is gone before any new fetch lands.
    assert!(!store.is_ready());
    assert!(store.uuid_index().is_none());
    assert!(store.submission().is_none());
    assert!(store.transcript().is_none());
    assert!(store.translations().is_empty());

    ticks(&mut store, 3).await;
    assert!(store.is_ready());
    assert_eq!(gateway.count("uuids:b1"), 1);
}

#[tokio::test]
async fn superseded_processing_fetch_is_cancelled_and_stale_reply_ignored() {
    let gateway = standard_gateway();
    gateway.set_processing(
        "q2",
        QuestionProcessingData {
            transcript: Some(transx("en", "hello2", 0)),
            translated: HashMap::new(),
        },
    );
    let assets = TestAssets::activated_with_question("a1", &["q", "q2"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);

    // First processing-data fetch hangs until cancelled.
    gateway.hang_processing.store(1, Ordering::Relaxed);
    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 2).await; // uuid index + submission

    // Question-only change supersedes the hanging processing fetch.
    store.handle_path_change("/forms/a1/data/processing/q2/u1");
    ticks(&mut store, 1).await; // fresh processing data
    assert!(store.is_ready());
    assert_eq!(store.transcript().unwrap().value, "hello2");
    assert_eq!(gateway.count("processing:"), 2);

    // A late reply from the superseded fetch (seq 3: begins were uuids=1,
    // submission=2, processing=3, then processing=4) must not mutate state.
    let mut stale = HashMap::new();
    stale.insert(
        "q2".to_string(),
        QuestionProcessingData {
            transcript: Some(transx("en", "STALE", 0)),
            translated: HashMap::new(),
        },
    );
    store.handle_reply(GatewayReply::ProcessingData {
        seq: 3,
        result: Ok(stale),
    });
    assert_eq!(store.transcript().unwrap().value, "hello2");
}

#[tokio::test]
async fn navigation_skips_absent_submissions() {
    let gateway = standard_gateway();
    gateway.set_rows(json!([
        {"_uuid": "x0"},
        {"_uuid": "a", "q": "a.mp3"},
        {"_uuid": "x2"},
        {"_uuid": "b", "q": "b.mp3"},
        {"_uuid": "c", "q": "c.mp3"},
        {"_uuid": "x5"},
    ]));
    let assets = TestAssets::activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);

    store.handle_path_change("/forms/a1/data/processing/q/b");
    ticks(&mut store, 3).await;

    assert_eq!(store.prev_submission_uuid(), Some("a"));
    assert_eq!(store.next_submission_uuid(), Some("c"));
    assert_eq!(store.submission_ordinal(), Some((4, 6)));

    // "x0" never answered the question: position is unknown, nothing is
    // derivable.
    store.handle_path_change("/forms/a1/data/processing/q/x0");
    ticks(&mut store, 2).await;
    assert_eq!(store.prev_submission_uuid(), None);
    assert_eq!(store.next_submission_uuid(), None);
    assert_eq!(store.submission_ordinal(), None);
}

#[tokio::test]
async fn activation_is_requested_before_any_data_fetch() {
    let gateway = standard_gateway();
    let assets = TestAssets::not_activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);

    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 1).await; // activation completion fires the fetches
    ticks(&mut store, 3).await;

    assert!(store.is_ready());
    let calls = gateway.calls();
    assert_eq!(calls[0], "activate:a1");
    assert_eq!(gateway.count("activate:"), 1);
    assert_eq!(gateway.count("uuids:"), 1);
    assert_eq!(gateway.count("submission:"), 1);
    assert_eq!(gateway.count("processing:"), 1);
}

#[tokio::test]
async fn same_asset_navigation_retries_failed_activation() {
    let gateway = standard_gateway();
    gateway.fail_activation.store(true, Ordering::Relaxed);
    let assets = TestAssets::not_activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);

    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 1).await; // activation failure
    assert!(!store.is_ready());
    assert!(store
        .snapshot()
        .last_error
        .as_deref()
        .unwrap()
        .contains("Activation failed."));
    assert_eq!(gateway.count("activate:"), 1);
    assert_eq!(gateway.count("uuids:"), 0);

    // Navigating within the asset re-triggers activation rather than
    // dead-ending permanently not-ready.
    gateway.fail_activation.store(false, Ordering::Relaxed);
    store.handle_path_change("/forms/a1/data/processing/q/u2");
    ticks(&mut store, 1).await; // activation success fires the fetches
    ticks(&mut store, 3).await;

    assert!(store.is_ready());
    assert_eq!(gateway.count("activate:"), 2);
    assert_eq!(gateway.count("uuids:"), 1);
    assert_eq!(gateway.count("submission:"), 1);
    assert_eq!(gateway.count("processing:"), 1);
}

#[tokio::test]
async fn translation_save_upserts_and_ends_edit_session() {
    let gateway = standard_gateway();
    let assets = TestAssets::activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);
    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 3).await;

    store.set_translation_draft(TransxDraft {
        value: Some("czesc swiecie".into()),
        language_code: Some("pl".into()),
    });
    assert!(store.has_unsaved_translation_draft_value());

    store
        .set_translation(
            "pl",
            TransxPayload {
                value: "czesc swiecie".into(),
                language_code: "pl".into(),
            },
        )
        .unwrap();
    assert!(store.is_pending_save());
    ticks(&mut store, 1).await;

    // Committed in place: same language count, updated value, edit session
    // over.
    assert!(!store.is_pending_save());
    assert_eq!(store.translations().len(), 2);
    assert_eq!(store.translation("pl").unwrap().value, "czesc swiecie");
    assert!(store.translation_draft().is_none());
    assert!(!store.has_unsaved_translation_draft_value());
    assert_eq!(store.source(), None);

    // A language with no saved counterpart is appended.
    store
        .set_translation(
            "fr",
            TransxPayload {
                value: "salut".into(),
                language_code: "fr".into(),
            },
        )
        .unwrap();
    ticks(&mut store, 1).await;
    assert_eq!(store.translations().len(), 3);
    assert_eq!(store.translation("fr").unwrap().value, "salut");
}

#[tokio::test]
async fn deleting_translation_replaces_cached_set_wholesale() {
    let gateway = standard_gateway();
    let mut translated = HashMap::new();
    translated.insert("en".to_string(), transx("en", "hello", 0));
    translated.insert("pl".to_string(), transx("pl", "czesc", 1));
    translated.insert("de".to_string(), transx("de", "hallo", 2));
    gateway.set_processing(
        "q",
        QuestionProcessingData {
            transcript: None,
            translated,
        },
    );
    *gateway.translations_after_delete.lock().unwrap() =
        vec![transx("en", "hello", 0), transx("de", "hallo", 2)];

    let assets = TestAssets::activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);
    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 3).await;

    let cached: Vec<&str> = store
        .translations()
        .iter()
        .map(|t| t.language_code.as_str())
        .collect();
    assert_eq!(cached, vec!["en", "pl", "de"]);

    store.delete_translation("pl").unwrap();
    assert!(store.is_pending_save());
    ticks(&mut store, 1).await;

    // The backend's set is the sole source of truth: order and contents.
    let cached: Vec<&str> = store
        .translations()
        .iter()
        .map(|t| t.language_code.as_str())
        .collect();
    assert_eq!(cached, vec!["en", "de"]);
    assert!(!store.is_pending_save());
}

#[tokio::test]
async fn transcript_save_commits_and_ends_edit_session() {
    let gateway = standard_gateway();
    let assets = TestAssets::activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);
    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 3).await;

    store.set_transcript_draft(TransxDraft {
        value: Some("hello world".into()),
        language_code: Some("en".into()),
    });
    assert!(store.has_unsaved_transcript_draft_value());

    store
        .set_transcript(TransxPayload {
            value: "hello world".into(),
            language_code: "en".into(),
        })
        .unwrap();
    assert!(store.is_pending_save());
    ticks(&mut store, 1).await;

    assert!(!store.is_pending_save());
    assert_eq!(store.transcript().unwrap().value, "hello world");
    assert!(store.transcript_draft().is_none());
    assert!(!store.has_unsaved_transcript_draft_value());
}

#[tokio::test]
async fn failed_save_preserves_the_draft() {
    let gateway = standard_gateway();
    gateway.fail_transcript_save.store(true, Ordering::Relaxed);
    let assets = TestAssets::activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);
    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 3).await;

    store.set_transcript_draft(TransxDraft {
        value: Some("precious edit".into()),
        language_code: Some("en".into()),
    });
    store
        .set_transcript(TransxPayload {
            value: "precious edit".into(),
            language_code: "en".into(),
        })
        .unwrap();
    ticks(&mut store, 1).await;

    // Flag cleared, user text not lost, committed value untouched.
    assert!(!store.is_pending_save());
    assert_eq!(
        store.transcript_draft().unwrap().value.as_deref(),
        Some("precious edit")
    );
    assert_eq!(store.transcript().unwrap().value, "hello");
}

#[tokio::test]
async fn fetch_failure_blocks_readiness_and_records_detail() {
    let gateway = standard_gateway();
    gateway.fail_submission.store(true, Ordering::Relaxed);
    let assets = TestAssets::activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);

    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 3).await;

    assert!(!store.is_ready());
    let snapshot = store.snapshot();
    assert!(!snapshot.is_ready);
    assert!(snapshot
        .last_error
        .as_deref()
        .unwrap()
        .contains("Failed to get submission."));
}

#[tokio::test]
async fn duplicate_route_notification_is_a_noop() {
    let gateway = standard_gateway();
    let assets = TestAssets::activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);

    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 3).await;
    assert!(store.is_ready());

    // A second notification for the unchanged path must not reset anything.
    store.handle_path_change("/forms/a1/data/processing/q/u1");
    assert!(store.is_ready());
}

#[tokio::test]
async fn snapshots_are_published_after_every_transition() {
    let gateway = standard_gateway();
    let assets = TestAssets::activated_with_question("a1", &["q"]);
    let mut store = ProcessingStateStore::new(gateway.clone(), assets);
    let mut rx = store.subscribe();

    store.handle_path_change("/forms/a1/data/processing/q/u1");
    ticks(&mut store, 3).await;

    // Cold start publish plus one per completed fetch.
    let mut published = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        published.push(snapshot);
    }
    assert_eq!(published.len(), 4);
    assert!(!published[0].is_ready);
    assert!(published.last().unwrap().is_ready);

    // Snapshots are full states, never partial: the last one carries every
    // loaded piece at once.
    let last = published.last().unwrap();
    assert!(last.transcript.is_some());
    assert!(last.submission.is_some());
    assert!(last.uuid_index.is_some());
}
