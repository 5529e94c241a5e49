//! Processing data model
//!
//! Core types shared between the store, the gateway and consumers: transcript
//! and translation records, unsaved drafts, the route key addressing the
//! currently edited question+submission, the per-question submission uuid
//! index and the published snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tabs of the processing view
///
/// Switching the active tab discards both drafts and the source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingTab {
    Transcript,
    Translations,
    Coding,
}

impl Default for ProcessingTab {
    fn default() -> Self {
        ProcessingTab::Transcript
    }
}

/// A transcript or translation record
///
/// Immutable once fetched; every mutation replaces the record wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transx {
    /// Transcribed/translated text
    pub value: String,
    /// Language of `value` (e.g. "en", "pl")
    pub language_code: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

/// An unsaved, locally-held transcript or translation edit
///
/// A draft with no `value` is considered absent for the purpose of
/// unsaved-work detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransxDraft {
    pub value: Option<String>,
    pub language_code: Option<String>,
}

impl TransxDraft {
    /// Whether this draft holds any text at all
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// Identifies what is being edited right now
///
/// Two route keys are equal iff all three fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub asset_uid: String,
    pub question_name: String,
    pub submission_uuid: String,
}

/// A processing-enabled question of an asset
///
/// `flat_path` is the flattened field path under which a submission row
/// carries this question's response (e.g. `group_a/audio_question`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPath {
    pub name: String,
    pub flat_path: String,
}

/// One row of the processing-submissions result set
///
/// Carries whichever flattened field paths the submission actually answered,
/// plus its uuid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRow {
    #[serde(rename = "_uuid")]
    pub uuid: String,
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

impl ProcessingRow {
    /// Whether this submission answered the question at `flat_path`
    pub fn has_field(&self, flat_path: &str) -> bool {
        self.fields.contains_key(flat_path)
    }
}

/// A full submission record fetched by uuid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(rename = "_uuid")]
    pub uuid: String,
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

/// Per-question submission uuid sequences
///
/// Maps each processing-enabled question name to an ordered sequence with one
/// entry per known submission, in the load-time submission order: the
/// submission's uuid if its row answered that question, `None` otherwise.
/// All sequences have equal length and share the same implicit ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionsUuidIndex(pub HashMap<String, Vec<Option<String>>>);

impl SubmissionsUuidIndex {
    /// Sequence for one question, if the question is known
    pub fn question(&self, question_name: &str) -> Option<&[Option<String>]> {
        self.0.get(question_name).map(|v| v.as_slice())
    }

    /// Names of questions that have at least one transcribable response
    pub fn questions_with_responses(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .0
            .iter()
            .filter(|(_, uuids)| uuids.iter().any(|u| u.is_some()))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// First submission uuid that answered the given question
    pub fn first_uuid_for(&self, question_name: &str) -> Option<&str> {
        self.0
            .get(question_name)?
            .iter()
            .find_map(|u| u.as_deref())
    }
}

/// The published unit of store state
///
/// Every store transition ends by publishing one full, internally consistent
/// snapshot, never a partial update, so subscribers never observe a torn
/// state. Subscribers must treat the snapshot as immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingSnapshot {
    pub transcript: Option<Transx>,
    pub transcript_draft: Option<TransxDraft>,
    /// Committed translations; language codes are unique among them
    pub translations: Vec<Transx>,
    pub translation_draft: Option<TransxDraft>,
    /// Language shown as reference while editing a translation
    pub source: Option<String>,
    pub active_tab: ProcessingTab,
    pub submission: Option<SubmissionRecord>,
    pub uuid_index: Option<SubmissionsUuidIndex>,
    /// All four load preconditions hold; editing is allowed
    pub is_ready: bool,
    /// A set/delete call is in flight
    pub is_pending_save: bool,
    /// Detail message of the most recent fetch failure, if any
    pub last_error: Option<String>,
}
