//! HTTP gateway implementation
//!
//! reqwest client for the backend processing endpoints. Shapes only: the
//! backend is an opaque async data source; every call resolves to exactly
//! one `Ok`/`Err` and carries no retry logic.
//!
//! Endpoints:
//! - submission by uuid: `GET  /api/v2/assets/{uid}/data/{uuid}/`
//! - processing submissions: `GET  /api/v2/assets/{uid}/data/?fields=[...]`
//! - processing data: `GET  /api/v2/assets/{uid}/processing/{submission}/`
//! - `POST/DELETE /api/v2/assets/{uid}/processing/{question}/{submission}/transcript/`
//! - `POST /api/v2/assets/{uid}/processing/{question}/{submission}/translations/`
//! - `DELETE /api/v2/assets/{uid}/processing/{question}/{submission}/translations/{lang}/`
//! - activation: `POST /api/v2/assets/{uid}/advanced_features/`

use super::{
    GatewayError, GatewayResult, ProcessingDataGateway, ProcessingDataResponse,
    ProcessingSubmissionsResponse, TransxPayload,
};
use async_trait::async_trait;
use qproc_common::config::GatewayConfig;
use qproc_common::types::{QuestionPath, RouteKey, SubmissionRecord, Transx};
use qproc_common::{Error, Result};
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// HTTP gateway to the backend processing API
pub struct HttpGateway {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ActivationRequest<'a> {
    active: bool,
    languages: &'a [String],
}

/// Error body shape used by the backend for failure details
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

impl HttpGateway {
    /// Build a gateway from configuration
    ///
    /// Fails on an unusable token value or client construction error.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = header::HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| Error::Config(format!("Invalid API token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn processing_url(&self, key: &RouteKey, suffix: &str) -> String {
        self.url(&format!(
            "/api/v2/assets/{}/processing/{}/{}/{}",
            key.asset_uid, key.question_name, key.submission_uuid, suffix
        ))
    }

    /// Map a non-success response to a gateway error, extracting the
    /// backend's detail message when the body carries one
    async fn check(response: Response) -> GatewayResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> GatewayResult<T> {
        response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> GatewayResult<T> {
        debug!(url, "GET");
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Self::parse(Self::check(response).await?).await
    }
}

/// Build the Api error for a failed response
fn api_error(status: StatusCode, body: &str) -> GatewayError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.detail)
        .unwrap_or_else(|_| body.to_string());
    GatewayError::Api {
        status: status.as_u16(),
        detail,
    }
}

#[async_trait]
impl ProcessingDataGateway for HttpGateway {
    async fn get_submission_by_uuid(
        &self,
        asset_uid: &str,
        submission_uuid: &str,
    ) -> GatewayResult<SubmissionRecord> {
        let url = self.url(&format!(
            "/api/v2/assets/{}/data/{}/",
            asset_uid, submission_uuid
        ));
        self.get_json(&url).await
    }

    async fn get_processing_submissions(
        &self,
        asset_uid: &str,
        question_paths: &[QuestionPath],
    ) -> GatewayResult<ProcessingSubmissionsResponse> {
        // Project rows onto the uuid plus the processing-relevant paths.
        let mut fields: Vec<&str> = vec!["_uuid"];
        fields.extend(question_paths.iter().map(|q| q.flat_path.as_str()));
        let fields_json =
            serde_json::to_string(&fields).map_err(|e| GatewayError::Parse(e.to_string()))?;

        let url = self.url(&format!("/api/v2/assets/{}/data/", asset_uid));
        debug!(url = %url, fields = %fields_json, "GET processing submissions");
        let response = self
            .http_client
            .get(&url)
            .query(&[("fields", fields_json)])
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Self::parse(Self::check(response).await?).await
    }

    async fn get_processing_data(
        &self,
        asset_uid: &str,
        submission_uuid: &str,
    ) -> GatewayResult<ProcessingDataResponse> {
        let url = self.url(&format!(
            "/api/v2/assets/{}/processing/{}/",
            asset_uid, submission_uuid
        ));
        self.get_json(&url).await
    }

    async fn set_transcript(
        &self,
        key: &RouteKey,
        payload: &TransxPayload,
    ) -> GatewayResult<Transx> {
        let url = self.processing_url(key, "transcript");
        debug!(url = %url, language = %payload.language_code, "POST transcript");
        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Self::parse(Self::check(response).await?).await
    }

    async fn delete_transcript(&self, key: &RouteKey) -> GatewayResult<()> {
        let url = self.processing_url(key, "transcript");
        debug!(url = %url, "DELETE transcript");
        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn set_translation(
        &self,
        key: &RouteKey,
        payload: &TransxPayload,
    ) -> GatewayResult<Transx> {
        let url = self.processing_url(key, "translations");
        debug!(url = %url, language = %payload.language_code, "POST translation");
        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Self::parse(Self::check(response).await?).await
    }

    async fn delete_translation(
        &self,
        key: &RouteKey,
        language_code: &str,
    ) -> GatewayResult<Vec<Transx>> {
        let url = self.processing_url(key, &format!("translations/{}", language_code));
        debug!(url = %url, language = %language_code, "DELETE translation");
        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        // The backend answers with the entire updated translation set.
        Self::parse(Self::check(response).await?).await
    }

    async fn activate_asset(
        &self,
        asset_uid: &str,
        enable: bool,
        languages: &[String],
    ) -> GatewayResult<()> {
        let url = self.url(&format!("/api/v2/assets/{}/advanced_features/", asset_uid));
        debug!(url = %url, enable, "POST activation");
        let response = self
            .http_client
            .post(&url)
            .json(&ActivationRequest {
                active: enable,
                languages,
            })
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }
}
