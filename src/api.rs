use std::path::Path;

use reqwest::{RequestBuilder, Url};
use serde_json::{json, Value};

use crate::batch;
use crate::config::Config;
use crate::error::{Operation, PulseError, PulseResult};
use crate::models::StudentQuery;

/// Async client for the prediction backend. Every call is a single attempt and
/// returns the response body as untyped JSON; callers normalize it.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &Config) -> PulseResult<Self> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|err| PulseError::Config(format!("invalid API URL {}: {err}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(PulseError::Config(format!(
                "API URL {} cannot carry a path",
                config.api_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| PulseError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, operation: Operation, request: RequestBuilder) -> PulseResult<Value> {
        let response = request.send().await.map_err(|err| {
            tracing::warn!(?operation, %err, "backend request failed");
            PulseError::Request {
                operation,
                status: err.status().map(|s| s.as_u16()),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(?operation, status = status.as_u16(), "backend returned error status");
            return Err(PulseError::Request {
                operation,
                status: Some(status.as_u16()),
            });
        }

        let body = response.bytes().await.map_err(|err| {
            tracing::warn!(?operation, %err, "failed reading response body");
            PulseError::Request {
                operation,
                status: Some(status.as_u16()),
            }
        })?;
        tracing::debug!(?operation, bytes = body.len(), "backend responded");

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|source| PulseError::Decode { operation, source })
    }

    async fn get(&self, operation: Operation, segments: &[&str]) -> PulseResult<Value> {
        let request = self.http.get(self.endpoint(segments));
        self.send(operation, request).await
    }

    async fn post_json(
        &self,
        operation: Operation,
        segments: &[&str],
        body: &Value,
    ) -> PulseResult<Value> {
        let request = self.http.post(self.endpoint(segments)).json(body);
        self.send(operation, request).await
    }

    pub async fn dashboard_stats(&self) -> PulseResult<Value> {
        self.get(Operation::DashboardStats, &["dashboard"]).await
    }

    pub async fn students(&self, query: &StudentQuery) -> PulseResult<Value> {
        let request = self
            .http
            .get(self.endpoint(&["students"]))
            .query(&query.to_pairs());
        self.send(Operation::Students, request).await
    }

    pub async fn student(&self, id: &str) -> PulseResult<Value> {
        self.get(Operation::StudentDetails, &["student", id]).await
    }

    pub async fn predict(&self, features: &Value) -> PulseResult<Value> {
        self.post_json(Operation::Predict, &["predict"], features).await
    }

    pub async fn simulate(&self, scenario: &Value) -> PulseResult<Value> {
        self.post_json(Operation::Simulate, &["simulate"], scenario).await
    }

    pub async fn analytics(&self) -> PulseResult<Value> {
        self.get(Operation::Analytics, &["advanced_analytics"]).await
    }

    /// Uploads a CSV of students for bulk scoring as multipart field `file`.
    pub async fn upload_batch(&self, path: &Path) -> PulseResult<Value> {
        let file = batch::load_batch_file(path).await?;
        tracing::info!(
            file = %file.file_name,
            rows = file.rows,
            columns = file.columns.len(),
            "uploading batch file"
        );

        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str("text/csv")
            .map_err(|err| PulseError::InvalidPayload(err.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self.http.post(self.endpoint(&["upload"])).multipart(form);
        self.send(Operation::Upload, request).await
    }

    pub async fn shap_analysis(&self, student_id: &str) -> PulseResult<Value> {
        self.get(Operation::ShapAnalysis, &["shap_analysis", student_id])
            .await
    }

    pub async fn send_alert(&self, student_id: &str, alert_type: &str) -> PulseResult<Value> {
        let body = json!({ "student_id": student_id, "alert_type": alert_type });
        self.post_json(Operation::SendAlert, &["send_alert"], &body)
            .await
    }

    pub async fn model_performance(&self) -> PulseResult<Value> {
        self.get(Operation::ModelPerformance, &["model_performance"])
            .await
    }
}
