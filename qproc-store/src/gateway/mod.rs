//! Backend gateway contract
//!
//! Async façade over the backend processing endpoints. The store only talks
//! to this trait; the reqwest implementation lives in [`http`]. Every call
//! resolves to exactly one `Ok`/`Err`; cancellation is handled by the caller
//! racing the future against a token, never inside the gateway.

pub mod http;

use async_trait::async_trait;
use qproc_common::types::{ProcessingRow, QuestionPath, RouteKey, SubmissionRecord, Transx};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors reported by gateway calls
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Request could not be delivered or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status
    #[error("Backend returned {status}: {detail}")]
    Api { status: u16, detail: String },

    /// Backend answered but the payload did not match the contract
    #[error("Failed to parse backend response: {0}")]
    Parse(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result set of the processing-submissions query, one row per submission
/// in backend response order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSubmissionsResponse {
    pub results: Vec<ProcessingRow>,
}

/// Processing data of one question within one submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionProcessingData {
    pub transcript: Option<Transx>,
    /// Translations keyed by language code
    #[serde(default)]
    pub translated: HashMap<String, Transx>,
}

/// Processing data keyed by question name
pub type ProcessingDataResponse = HashMap<String, QuestionProcessingData>;

/// Client-authored transcript/translation content
///
/// Timestamps are assigned by the backend; the returned [`Transx`] is the
/// committed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransxPayload {
    pub value: String,
    pub language_code: String,
}

/// Async façade over the backend processing endpoints
#[async_trait]
pub trait ProcessingDataGateway: Send + Sync {
    /// Fetch one full submission record
    async fn get_submission_by_uuid(
        &self,
        asset_uid: &str,
        submission_uuid: &str,
    ) -> GatewayResult<SubmissionRecord>;

    /// Fetch all submissions projected onto the given question paths
    async fn get_processing_submissions(
        &self,
        asset_uid: &str,
        question_paths: &[QuestionPath],
    ) -> GatewayResult<ProcessingSubmissionsResponse>;

    /// Fetch transcript/translation data for one submission
    async fn get_processing_data(
        &self,
        asset_uid: &str,
        submission_uuid: &str,
    ) -> GatewayResult<ProcessingDataResponse>;

    /// Commit a transcript; returns the stored record
    async fn set_transcript(
        &self,
        key: &RouteKey,
        payload: &TransxPayload,
    ) -> GatewayResult<Transx>;

    /// Delete the transcript of the addressed question+submission
    async fn delete_transcript(&self, key: &RouteKey) -> GatewayResult<()>;

    /// Commit a translation; returns the stored record
    async fn set_translation(
        &self,
        key: &RouteKey,
        payload: &TransxPayload,
    ) -> GatewayResult<Transx>;

    /// Delete one translation; the backend returns the entire updated
    /// translation set, which is the sole source of truth for the caller
    async fn delete_translation(
        &self,
        key: &RouteKey,
        language_code: &str,
    ) -> GatewayResult<Vec<Transx>>;

    /// Enable or disable processing features for an asset
    async fn activate_asset(
        &self,
        asset_uid: &str,
        enable: bool,
        languages: &[String],
    ) -> GatewayResult<()>;
}
