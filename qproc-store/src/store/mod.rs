//! Route-driven processing state store
//!
//! Owns the cached transcript/translation/submission/uuid-index state for the
//! currently addressed question+submission. Reacts to route changes by
//! deciding which sub-fetches are stale, issues gateway calls as spawned
//! tasks racing a per-kind cancellation token, and republishes a full,
//! internally consistent snapshot after every state transition.
//!
//! Single-writer ownership: all mutation goes through `&mut self` methods,
//! driven sequentially by one task (see [`ProcessingStateStore::run`]).
//! Gateway completions come back as [`GatewayReply`] messages through an
//! internal mpsc inbox and are applied in arrival order; a reply whose
//! sequence number is no longer current for its fetch kind is discarded, so a
//! slow superseded response can never clobber fresher cached state.

mod slots;

pub use slots::FetchKind;
use slots::FetchSlots;

use crate::asset::AssetSource;
use crate::gateway::{
    GatewayResult, ProcessingDataGateway, ProcessingDataResponse, ProcessingSubmissionsResponse,
    TransxPayload,
};
use crate::index;
use crate::routes::parse_processing_path;
use qproc_common::types::{
    ProcessingSnapshot, ProcessingTab, QuestionPath, RouteKey, SubmissionRecord,
    SubmissionsUuidIndex, Transx, TransxDraft,
};
use qproc_common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Snapshot fan-out buffer; slow subscribers lag rather than block the store
const SNAPSHOT_CHANNEL_CAPACITY: usize = 32;

/// Completion message posted by a spawned gateway call
///
/// Fetch variants carry the sequence number handed out when the request was
/// started; mutation variants carry the route key they were issued under.
#[derive(Debug)]
pub enum GatewayReply {
    Activation {
        asset_uid: String,
        seq: u64,
        result: GatewayResult<()>,
    },
    Uuids {
        asset_uid: String,
        seq: u64,
        questions: Vec<QuestionPath>,
        result: GatewayResult<ProcessingSubmissionsResponse>,
    },
    Submission {
        seq: u64,
        result: GatewayResult<SubmissionRecord>,
    },
    ProcessingData {
        seq: u64,
        result: GatewayResult<ProcessingDataResponse>,
    },
    TranscriptSaved {
        key: RouteKey,
        result: GatewayResult<Transx>,
    },
    TranscriptDeleted {
        key: RouteKey,
        result: GatewayResult<()>,
    },
    TranslationSaved {
        key: RouteKey,
        result: GatewayResult<Transx>,
    },
    TranslationsReplaced {
        key: RouteKey,
        result: GatewayResult<Vec<Transx>>,
    },
}

/// Write-API commands for driving the store over a channel
///
/// Mirrors the public mutator methods so views on other tasks can reach the
/// single-writer loop.
#[derive(Debug)]
pub enum StoreCommand {
    SetSource(String),
    ActivateTab(ProcessingTab),
    SetTranscriptDraft(TransxDraft),
    DeleteTranscriptDraft,
    SetTranscript(TransxPayload),
    DeleteTranscript,
    SetTranslationDraft(TransxDraft),
    DeleteTranslationDraft,
    SetTranslation {
        language_code: String,
        payload: TransxPayload,
    },
    DeleteTranslation {
        language_code: String,
    },
}

/// Route-driven, cache-coherent store for single-submission processing state
pub struct ProcessingStateStore {
    gateway: Arc<dyn ProcessingDataGateway>,
    assets: Arc<dyn AssetSource>,

    reply_tx: mpsc::UnboundedSender<GatewayReply>,
    reply_rx: Option<mpsc::UnboundedReceiver<GatewayReply>>,
    snapshot_tx: broadcast::Sender<Arc<ProcessingSnapshot>>,
    last_snapshot: Arc<ProcessingSnapshot>,

    previous_path: Option<String>,
    current: Option<RouteKey>,

    // Route-scoped editing state, reset on every route-key change.
    transcript: Option<Transx>,
    transcript_draft: Option<TransxDraft>,
    translations: Vec<Transx>,
    translation_draft: Option<TransxDraft>,
    source: Option<String>,
    active_tab: ProcessingTab,

    // Independently invalidated caches.
    submission: Option<SubmissionRecord>,
    uuid_index: Option<SubmissionsUuidIndex>,

    // Assets whose activation this store has confirmed itself.
    activated: HashSet<String>,

    // Readiness preconditions; is_ready() is their conjunction, computed on
    // demand, never cached.
    is_activated: bool,
    uuids_loaded: bool,
    submission_loaded: bool,
    processing_loaded: bool,

    is_pending_save: bool,
    last_error: Option<String>,

    slots: FetchSlots,
}

impl ProcessingStateStore {
    /// Create a store bound to a gateway and a local asset metadata source
    ///
    /// Constructed once at application start; intended to be owned by a
    /// single driver task.
    pub fn new(gateway: Arc<dyn ProcessingDataGateway>, assets: Arc<dyn AssetSource>) -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            gateway,
            assets,
            reply_tx,
            reply_rx: Some(reply_rx),
            snapshot_tx,
            last_snapshot: Arc::new(ProcessingSnapshot::default()),
            previous_path: None,
            current: None,
            transcript: None,
            transcript_draft: None,
            translations: Vec::new(),
            translation_draft: None,
            source: None,
            active_tab: ProcessingTab::Transcript,
            submission: None,
            uuid_index: None,
            activated: HashSet::new(),
            is_activated: false,
            uuids_loaded: false,
            submission_loaded: false,
            processing_loaded: false,
            is_pending_save: false,
            last_error: None,
            slots: FetchSlots::default(),
        }
    }

    // ------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------

    /// Drive the store until the route or command channel closes
    ///
    /// Applies route changes, write commands and gateway completions in
    /// arrival order; this loop is the single writer.
    pub async fn run(
        mut self,
        mut route_rx: mpsc::UnboundedReceiver<String>,
        mut cmd_rx: mpsc::UnboundedReceiver<StoreCommand>,
    ) {
        let mut reply_rx = self
            .reply_rx
            .take()
            .expect("store run loop started twice");
        loop {
            tokio::select! {
                maybe_path = route_rx.recv() => match maybe_path {
                    Some(path) => self.handle_path_change(&path),
                    None => break,
                },
                maybe_cmd = cmd_rx.recv() => match maybe_cmd {
                    Some(cmd) => self.apply_command(cmd),
                    None => break,
                },
                maybe_reply = reply_rx.recv() => match maybe_reply {
                    Some(reply) => self.handle_reply(reply),
                    None => break,
                },
            }
        }
        info!("Processing state store loop ended");
    }

    /// Await and apply one gateway completion
    ///
    /// Returns false once the inbox is gone (after [`run`] consumed it).
    pub async fn tick(&mut self) -> bool {
        let reply = match self.reply_rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        };
        match reply {
            Some(reply) => {
                self.handle_reply(reply);
                true
            }
            None => false,
        }
    }

    /// Dispatch one write-API command
    pub fn apply_command(&mut self, cmd: StoreCommand) {
        let result = match cmd {
            StoreCommand::SetSource(language_code) => {
                self.set_source(language_code);
                Ok(())
            }
            StoreCommand::ActivateTab(tab) => {
                self.activate_tab(tab);
                Ok(())
            }
            StoreCommand::SetTranscriptDraft(draft) => {
                self.set_transcript_draft(draft);
                Ok(())
            }
            StoreCommand::DeleteTranscriptDraft => {
                self.delete_transcript_draft();
                Ok(())
            }
            StoreCommand::SetTranscript(payload) => self.set_transcript(payload),
            StoreCommand::DeleteTranscript => self.delete_transcript(),
            StoreCommand::SetTranslationDraft(draft) => {
                self.set_translation_draft(draft);
                Ok(())
            }
            StoreCommand::DeleteTranslationDraft => {
                self.delete_translation_draft();
                Ok(())
            }
            StoreCommand::SetTranslation {
                language_code,
                payload,
            } => self.set_translation(&language_code, payload),
            StoreCommand::DeleteTranslation { language_code } => {
                self.delete_translation(&language_code)
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Store command rejected");
        }
    }

    // ------------------------------------------------------------------
    // Route reconciliation
    // ------------------------------------------------------------------

    /// React to a location path change
    ///
    /// Duplicate notifications for an unchanged path are no-ops. Entering a
    /// processing path from elsewhere is a cold start; moving between
    /// processing paths of the same asset keeps the uuid index and re-fetches
    /// only what the changed key parts invalidate.
    pub fn handle_path_change(&mut self, path: &str) {
        if self.previous_path.as_deref() == Some(path) {
            debug!(path, "Duplicate route notification ignored");
            return;
        }
        self.previous_path = Some(path.to_string());

        let Some(key) = parse_processing_path(path) else {
            if self.current.is_some() {
                debug!(path, "Left processing route");
                self.leave_processing();
            }
            return;
        };

        match &self.current {
            Some(cur) if *cur == key => {}
            Some(cur) if cur.asset_uid == key.asset_uid => {
                let submission_changed = cur.submission_uuid != key.submission_uuid;
                debug!(
                    asset_uid = %key.asset_uid,
                    question = %key.question_name,
                    submission_uuid = %key.submission_uuid,
                    submission_changed,
                    "Route change within asset"
                );
                self.current = Some(key);
                self.reset_route_scoped();
                if submission_changed {
                    self.submission = None;
                    self.submission_loaded = false;
                }
                // Uuid index is asset-scoped and assumed stable while viewing
                // this asset; it is not re-fetched here.
                if self.is_activated {
                    if submission_changed {
                        self.fetch_submission();
                    }
                    self.fetch_processing_data();
                } else if !self.slots.is_in_flight(FetchKind::Activation) {
                    // Activation previously failed; the route change is the
                    // user's re-trigger. Completion fires the fetches.
                    self.fetch_activation();
                }
                self.publish();
            }
            _ => self.cold_start(key),
        }
    }

    /// Full cold start: reset everything, confirm activation, then fire the
    /// three data fetches
    fn cold_start(&mut self, key: RouteKey) {
        info!(
            asset_uid = %key.asset_uid,
            question = %key.question_name,
            submission_uuid = %key.submission_uuid,
            "Cold start for processing route"
        );
        self.slots.cancel_all();
        self.current = Some(key.clone());
        self.reset_route_scoped();
        self.submission = None;
        self.submission_loaded = false;
        self.uuid_index = None;
        self.uuids_loaded = false;
        self.is_activated = false;

        if self.activated.contains(&key.asset_uid)
            || self.assets.is_processing_activated(&key.asset_uid)
        {
            self.is_activated = true;
            self.fetch_all();
        } else {
            // Hard precondition: processing data of a non-activated asset is
            // undefined at the backend. Activation completion fires the
            // fetches.
            self.fetch_activation();
        }
        self.publish();
    }

    fn leave_processing(&mut self) {
        self.slots.cancel_all();
        self.current = None;
        self.reset_route_scoped();
        self.submission = None;
        self.submission_loaded = false;
        self.uuid_index = None;
        self.uuids_loaded = false;
        self.is_activated = false;
        self.publish();
    }

    /// Reset the transcript/translation/draft/source/tab portion of the
    /// state, which is scoped to one route key
    fn reset_route_scoped(&mut self) {
        self.transcript = None;
        self.transcript_draft = None;
        self.translations.clear();
        self.translation_draft = None;
        self.source = None;
        self.active_tab = ProcessingTab::Transcript;
        self.processing_loaded = false;
        self.is_pending_save = false;
        self.last_error = None;
    }

    fn fetch_all(&mut self) {
        self.fetch_uuids();
        self.fetch_submission();
        self.fetch_processing_data();
    }

    // ------------------------------------------------------------------
    // Fetch issuing
    // ------------------------------------------------------------------

    fn fetch_activation(&mut self) {
        let Some(key) = self.current.clone() else {
            return;
        };
        let (seq, token) = self.slots.begin(FetchKind::Activation);
        let gateway = Arc::clone(&self.gateway);
        let tx = self.reply_tx.clone();
        let asset_uid = key.asset_uid;
        debug!(asset_uid = %asset_uid, seq, "Requesting processing activation");
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!(asset_uid = %asset_uid, seq, "Activation request cancelled");
                    return;
                }
                result = gateway.activate_asset(&asset_uid, true, &[]) => result,
            };
            let _ = tx.send(GatewayReply::Activation {
                asset_uid,
                seq,
                result,
            });
        });
    }

    fn fetch_uuids(&mut self) {
        let Some(key) = self.current.clone() else {
            return;
        };
        let questions = self.assets.processing_questions(&key.asset_uid);
        if questions.is_empty() {
            debug!(asset_uid = %key.asset_uid, "No processing-enabled questions, empty index");
            self.uuid_index = Some(SubmissionsUuidIndex::default());
            self.uuids_loaded = true;
            return;
        }
        let (seq, token) = self.slots.begin(FetchKind::Uuids);
        let gateway = Arc::clone(&self.gateway);
        let tx = self.reply_tx.clone();
        let asset_uid = key.asset_uid;
        debug!(asset_uid = %asset_uid, seq, questions = questions.len(), "Fetching uuid index");
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!(asset_uid = %asset_uid, seq, "Uuid index fetch cancelled");
                    return;
                }
                result = gateway.get_processing_submissions(&asset_uid, &questions) => result,
            };
            let _ = tx.send(GatewayReply::Uuids {
                asset_uid,
                seq,
                questions,
                result,
            });
        });
    }

    fn fetch_submission(&mut self) {
        let Some(key) = self.current.clone() else {
            return;
        };
        let (seq, token) = self.slots.begin(FetchKind::Submission);
        let gateway = Arc::clone(&self.gateway);
        let tx = self.reply_tx.clone();
        debug!(
            asset_uid = %key.asset_uid,
            submission_uuid = %key.submission_uuid,
            seq,
            "Fetching submission data"
        );
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!(submission_uuid = %key.submission_uuid, seq, "Submission fetch cancelled");
                    return;
                }
                result = gateway.get_submission_by_uuid(&key.asset_uid, &key.submission_uuid) => result,
            };
            let _ = tx.send(GatewayReply::Submission { seq, result });
        });
    }

    fn fetch_processing_data(&mut self) {
        let Some(key) = self.current.clone() else {
            return;
        };
        let (seq, token) = self.slots.begin(FetchKind::ProcessingData);
        let gateway = Arc::clone(&self.gateway);
        let tx = self.reply_tx.clone();
        debug!(
            asset_uid = %key.asset_uid,
            submission_uuid = %key.submission_uuid,
            seq,
            "Fetching processing data"
        );
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!(submission_uuid = %key.submission_uuid, seq, "Processing data fetch cancelled");
                    return;
                }
                result = gateway.get_processing_data(&key.asset_uid, &key.submission_uuid) => result,
            };
            let _ = tx.send(GatewayReply::ProcessingData { seq, result });
        });
    }

    // ------------------------------------------------------------------
    // Reply handling
    // ------------------------------------------------------------------

    /// Apply one gateway completion
    ///
    /// Fetch replies are accepted only when their sequence number is still
    /// the current one for their kind; mutation replies only when their route
    /// key is still the addressed one.
    pub fn handle_reply(&mut self, reply: GatewayReply) {
        match reply {
            GatewayReply::Activation {
                asset_uid,
                seq,
                result,
            } => {
                if !self.slots.try_complete(FetchKind::Activation, seq) {
                    debug!(asset_uid = %asset_uid, seq, "Discarding stale activation reply");
                    return;
                }
                match result {
                    Ok(()) => {
                        info!(asset_uid = %asset_uid, "Processing activated");
                        self.activated.insert(asset_uid);
                        self.is_activated = true;
                        self.fetch_all();
                    }
                    Err(e) => {
                        warn!(asset_uid = %asset_uid, error = %e, "Activation failed");
                        self.last_error = Some(e.to_string());
                    }
                }
                self.publish();
            }
            GatewayReply::Uuids {
                asset_uid,
                seq,
                questions,
                result,
            } => {
                if !self.slots.try_complete(FetchKind::Uuids, seq) {
                    debug!(asset_uid = %asset_uid, seq, "Discarding stale uuid index reply");
                    return;
                }
                match result {
                    Ok(response) => {
                        info!(
                            asset_uid = %asset_uid,
                            submissions = response.results.len(),
                            questions = questions.len(),
                            "Uuid index rebuilt"
                        );
                        self.uuid_index =
                            Some(index::build_uuid_index(&questions, &response.results));
                        self.uuids_loaded = true;
                    }
                    Err(e) => {
                        warn!(asset_uid = %asset_uid, error = %e, "Uuid index fetch failed");
                        self.last_error = Some(e.to_string());
                    }
                }
                self.publish();
            }
            GatewayReply::Submission { seq, result } => {
                if !self.slots.try_complete(FetchKind::Submission, seq) {
                    debug!(seq, "Discarding stale submission reply");
                    return;
                }
                match result {
                    Ok(record) => {
                        debug!(submission_uuid = %record.uuid, "Submission data loaded");
                        self.submission = Some(record);
                        self.submission_loaded = true;
                    }
                    Err(e) => {
                        warn!(error = %e, "Submission fetch failed");
                        self.last_error = Some(e.to_string());
                    }
                }
                self.publish();
            }
            GatewayReply::ProcessingData { seq, result } => {
                if !self.slots.try_complete(FetchKind::ProcessingData, seq) {
                    debug!(seq, "Discarding stale processing data reply");
                    return;
                }
                let Some(key) = self.current.clone() else {
                    return;
                };
                match result {
                    Ok(mut response) => {
                        let question_data = response.remove(&key.question_name).unwrap_or_default();
                        self.transcript = question_data.transcript;
                        let mut translations: Vec<Transx> =
                            question_data.translated.into_values().collect();
                        translations.sort_by(|a, b| a.date_created.cmp(&b.date_created));
                        debug!(
                            question = %key.question_name,
                            has_transcript = self.transcript.is_some(),
                            translations = translations.len(),
                            "Processing data loaded"
                        );
                        self.translations = translations;
                        self.processing_loaded = true;
                    }
                    Err(e) => {
                        warn!(error = %e, "Processing data fetch failed");
                        self.last_error = Some(e.to_string());
                    }
                }
                self.publish();
            }
            GatewayReply::TranscriptSaved { key, result } => {
                if self.current.as_ref() != Some(&key) {
                    debug!("Discarding transcript save reply for superseded route");
                    return;
                }
                self.is_pending_save = false;
                match result {
                    Ok(transcript) => {
                        debug!(language = %transcript.language_code, "Transcript saved");
                        self.transcript = Some(transcript);
                        // Edit session implicitly ends on save.
                        self.transcript_draft = None;
                    }
                    Err(e) => {
                        // Draft preserved; the user's text is not lost.
                        warn!(error = %e, "Transcript save failed");
                        self.last_error = Some(e.to_string());
                    }
                }
                self.publish();
            }
            GatewayReply::TranscriptDeleted { key, result } => {
                if self.current.as_ref() != Some(&key) {
                    debug!("Discarding transcript delete reply for superseded route");
                    return;
                }
                self.is_pending_save = false;
                match result {
                    Ok(()) => {
                        debug!(question = %key.question_name, "Transcript deleted");
                        self.transcript = None;
                    }
                    Err(e) => {
                        warn!(error = %e, "Transcript delete failed");
                        self.last_error = Some(e.to_string());
                    }
                }
                self.publish();
            }
            GatewayReply::TranslationSaved { key, result } => {
                if self.current.as_ref() != Some(&key) {
                    debug!("Discarding translation save reply for superseded route");
                    return;
                }
                self.is_pending_save = false;
                match result {
                    Ok(translation) => {
                        debug!(language = %translation.language_code, "Translation saved");
                        match self
                            .translations
                            .iter_mut()
                            .find(|t| t.language_code == translation.language_code)
                        {
                            Some(existing) => *existing = translation,
                            None => self.translations.push(translation),
                        }
                        // Edit session implicitly ends on save.
                        self.translation_draft = None;
                        self.source = None;
                    }
                    Err(e) => {
                        warn!(error = %e, "Translation save failed");
                        self.last_error = Some(e.to_string());
                    }
                }
                self.publish();
            }
            GatewayReply::TranslationsReplaced { key, result } => {
                if self.current.as_ref() != Some(&key) {
                    debug!("Discarding translation delete reply for superseded route");
                    return;
                }
                self.is_pending_save = false;
                match result {
                    Ok(translations) => {
                        // The returned set is the sole source of truth; never
                        // filter locally.
                        debug!(translations = translations.len(), "Translation set replaced");
                        self.translations = translations;
                    }
                    Err(e) => {
                        warn!(error = %e, "Translation delete failed");
                        self.last_error = Some(e.to_string());
                    }
                }
                self.publish();
            }
        }
    }

    // ------------------------------------------------------------------
    // Committing mutations
    // ------------------------------------------------------------------

    /// Commit a transcript to the backend
    ///
    /// Flips the pending flag and publishes immediately; the committed record
    /// replaces the cache when the call completes.
    pub fn set_transcript(&mut self, payload: TransxPayload) -> Result<()> {
        let key = self.require_route()?;
        self.is_pending_save = true;
        self.publish();
        let gateway = Arc::clone(&self.gateway);
        let tx = self.reply_tx.clone();
        tokio::spawn(async move {
            let result = gateway.set_transcript(&key, &payload).await;
            let _ = tx.send(GatewayReply::TranscriptSaved { key, result });
        });
        Ok(())
    }

    /// Delete the committed transcript
    pub fn delete_transcript(&mut self) -> Result<()> {
        let key = self.require_route()?;
        self.is_pending_save = true;
        self.publish();
        let gateway = Arc::clone(&self.gateway);
        let tx = self.reply_tx.clone();
        tokio::spawn(async move {
            let result = gateway.delete_transcript(&key).await;
            let _ = tx.send(GatewayReply::TranscriptDeleted { key, result });
        });
        Ok(())
    }

    /// Commit a translation to the backend under `language_code`
    ///
    /// A payload whose own language code differs from `language_code` is a
    /// programmer error and is rejected before anything is touched.
    pub fn set_translation(&mut self, language_code: &str, payload: TransxPayload) -> Result<()> {
        if payload.language_code != language_code {
            return Err(Error::InvalidInput(format!(
                "translation language code mismatch: saving '{}' under '{}'",
                payload.language_code, language_code
            )));
        }
        let key = self.require_route()?;
        self.is_pending_save = true;
        self.publish();
        let gateway = Arc::clone(&self.gateway);
        let tx = self.reply_tx.clone();
        tokio::spawn(async move {
            let result = gateway.set_translation(&key, &payload).await;
            let _ = tx.send(GatewayReply::TranslationSaved { key, result });
        });
        Ok(())
    }

    /// Delete one translation
    ///
    /// The backend responds with the entire updated translation set, which
    /// replaces the cached list wholesale.
    pub fn delete_translation(&mut self, language_code: &str) -> Result<()> {
        let key = self.require_route()?;
        self.is_pending_save = true;
        self.publish();
        let gateway = Arc::clone(&self.gateway);
        let tx = self.reply_tx.clone();
        let language_code = language_code.to_string();
        tokio::spawn(async move {
            let result = gateway.delete_translation(&key, &language_code).await;
            let _ = tx.send(GatewayReply::TranslationsReplaced { key, result });
        });
        Ok(())
    }

    fn require_route(&self) -> Result<RouteKey> {
        self.current
            .clone()
            .ok_or_else(|| Error::InvalidInput("no processing route is active".to_string()))
    }

    // ------------------------------------------------------------------
    // Drafts, source and tabs
    // ------------------------------------------------------------------

    /// Store an unsaved transcript edit
    pub fn set_transcript_draft(&mut self, draft: TransxDraft) {
        self.transcript_draft = Some(draft);
        self.publish();
    }

    /// Discard the transcript draft
    pub fn delete_transcript_draft(&mut self) {
        self.transcript_draft = None;
        self.publish();
    }

    /// Store an unsaved translation edit
    ///
    /// Creating a translation draft defaults the source to the current
    /// transcript's language, if there is one.
    pub fn set_translation_draft(&mut self, draft: TransxDraft) {
        self.translation_draft = Some(draft);
        self.source = self.transcript.as_ref().map(|t| t.language_code.clone());
        self.publish();
    }

    /// Discard the translation draft; always clears the source selection
    pub fn delete_translation_draft(&mut self) {
        self.translation_draft = None;
        self.source = None;
        self.publish();
    }

    /// Select the reference language shown while editing a translation
    pub fn set_source(&mut self, language_code: String) {
        self.source = Some(language_code);
        self.publish();
    }

    /// Switch the active tab
    ///
    /// Unconditionally discards both drafts and the source selection; edits
    /// are not preserved across tab switches.
    pub fn activate_tab(&mut self, tab: ProcessingTab) {
        self.active_tab = tab;
        self.transcript_draft = None;
        self.translation_draft = None;
        self.source = None;
        self.publish();
    }

    // ------------------------------------------------------------------
    // Read API
    // ------------------------------------------------------------------

    /// Subscribe to published snapshots
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProcessingSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Most recently published snapshot
    pub fn snapshot(&self) -> Arc<ProcessingSnapshot> {
        Arc::clone(&self.last_snapshot)
    }

    /// Whether all four load preconditions hold and editing is allowed
    pub fn is_ready(&self) -> bool {
        self.is_activated && self.uuids_loaded && self.submission_loaded && self.processing_loaded
    }

    /// Whether a set/delete call is in flight
    pub fn is_pending_save(&self) -> bool {
        self.is_pending_save
    }

    /// Currently addressed route key, if on a processing route
    pub fn current_route(&self) -> Option<&RouteKey> {
        self.current.as_ref()
    }

    pub fn transcript(&self) -> Option<&Transx> {
        self.transcript.as_ref()
    }

    pub fn transcript_draft(&self) -> Option<&TransxDraft> {
        self.transcript_draft.as_ref()
    }

    pub fn translations(&self) -> &[Transx] {
        &self.translations
    }

    /// Committed translation for one language code
    pub fn translation(&self, language_code: &str) -> Option<&Transx> {
        self.translations
            .iter()
            .find(|t| t.language_code == language_code)
    }

    pub fn translation_draft(&self) -> Option<&TransxDraft> {
        self.translation_draft.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn active_tab(&self) -> ProcessingTab {
        self.active_tab
    }

    pub fn submission(&self) -> Option<&SubmissionRecord> {
        self.submission.as_ref()
    }

    pub fn uuid_index(&self) -> Option<&SubmissionsUuidIndex> {
        self.uuid_index.as_ref()
    }

    /// Selectable source language codes: the transcript's language first,
    /// then translation languages, omitting the one currently being drafted
    pub fn sources(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(transcript) = &self.transcript {
            out.push(transcript.language_code.clone());
        }
        let drafted = self
            .translation_draft
            .as_ref()
            .and_then(|d| d.language_code.as_deref());
        for translation in &self.translations {
            if Some(translation.language_code.as_str()) != drafted {
                out.push(translation.language_code.clone());
            }
        }
        out
    }

    /// Full record for the selected source language
    pub fn source_data(&self) -> Option<&Transx> {
        let source = self.source.as_deref()?;
        if self.transcript.as_ref().map(|t| t.language_code.as_str()) == Some(source) {
            self.transcript.as_ref()
        } else {
            self.translations.iter().find(|t| t.language_code == source)
        }
    }

    /// Uuid sequence of the currently addressed question
    pub fn current_question_uuids(&self) -> Option<&[Option<String>]> {
        let key = self.current.as_ref()?;
        self.uuid_index.as_ref()?.question(&key.question_name)
    }

    /// Closest earlier submission that answered the current question
    pub fn prev_submission_uuid(&self) -> Option<&str> {
        let key = self.current.as_ref()?;
        index::prev_uuid(self.current_question_uuids()?, &key.submission_uuid)
    }

    /// Closest later submission that answered the current question
    pub fn next_submission_uuid(&self) -> Option<&str> {
        let key = self.current.as_ref()?;
        index::next_uuid(self.current_question_uuids()?, &key.submission_uuid)
    }

    /// 1-based display ordinal and total count ("Submission K of N")
    pub fn submission_ordinal(&self) -> Option<(usize, usize)> {
        let key = self.current.as_ref()?;
        index::ordinal(self.current_question_uuids()?, &key.submission_uuid)
    }

    /// Whether the transcript draft holds text differing from the committed
    /// transcript
    pub fn has_unsaved_transcript_draft_value(&self) -> bool {
        let Some(draft) = &self.transcript_draft else {
            return false;
        };
        let Some(value) = &draft.value else {
            return false;
        };
        self.transcript.as_ref().map(|t| &t.value) != Some(value)
    }

    /// Whether the translation draft holds text differing from the saved
    /// translation sharing its language code
    pub fn has_unsaved_translation_draft_value(&self) -> bool {
        let Some(draft) = &self.translation_draft else {
            return false;
        };
        let Some(value) = &draft.value else {
            return false;
        };
        match draft
            .language_code
            .as_deref()
            .and_then(|lang| self.translation(lang))
        {
            Some(saved) => saved.value != *value,
            None => true,
        }
    }

    /// Whether either draft slot holds unsaved work
    pub fn has_any_unsaved_work(&self) -> bool {
        self.has_unsaved_transcript_draft_value() || self.has_unsaved_translation_draft_value()
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    /// Publish one full, internally consistent snapshot
    fn publish(&mut self) {
        let snapshot = Arc::new(ProcessingSnapshot {
            transcript: self.transcript.clone(),
            transcript_draft: self.transcript_draft.clone(),
            translations: self.translations.clone(),
            translation_draft: self.translation_draft.clone(),
            source: self.source.clone(),
            active_tab: self.active_tab,
            submission: self.submission.clone(),
            uuid_index: self.uuid_index.clone(),
            is_ready: self.is_ready(),
            is_pending_save: self.is_pending_save,
            last_error: self.last_error.clone(),
        });
        self.last_snapshot = Arc::clone(&snapshot);
        // No subscribers is fine.
        let _ = self.snapshot_tx.send(snapshot);
    }
}
