use reqwest::{Client, header};
use serde_json::Value;
use std::time::Duration;

use crate::api::error_page;
use crate::api::models::{Endpoint, LogsPayload, SyncResponse, SyncStatus, TimeRange};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::normalize::{EmptyDataPolicy, RawSample};

/// HTTP client for the dashboard backend.
pub struct DashboardClient {
    http_client: Client,
    base_url: String,
}

impl DashboardClient {
    /// Build a client from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Network` if the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> AppResult<Self> {
        Self::with_base_url(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    /// # Errors
    ///
    /// Returns `AppError::Network` if the underlying HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET an endpoint and return its JSON body.
    ///
    /// The range is sent as-is for ranged endpoints, including reversed ranges;
    /// it is ignored for [`Endpoint::Sync`].
    ///
    /// # Errors
    ///
    /// - `AppError::Network` if the request never completed.
    /// - `AppError::Server` for non-2xx responses, carrying the message scraped
    ///   from the error page.
    /// - `AppError::Parse` if the body is not JSON.
    pub async fn fetch(&self, endpoint: Endpoint, range: Option<&TimeRange>) -> AppResult<Value> {
        let url = format!("{}{}", self.base_url, endpoint.path());

        let mut request = self.http_client.get(&url);
        if let Some(range) = range.filter(|_| endpoint.is_ranged()) {
            if !range.is_ordered() {
                tracing::debug!(start = %range.start, stop = %range.stop, "Requesting reversed time range");
            }
            request = request.query(&range.query_params());
        }

        tracing::debug!(endpoint = ?endpoint, url = %url, "Fetching");

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_page::extract_message(&body)
                .unwrap_or_else(|| format!("Server responded with HTTP {status}"));
            tracing::warn!(status = status.as_u16(), message = %message, "Backend returned an error");
            return Err(AppError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("Failed to read response body: {e}")))?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            AppError::Parse(format!("Failed to parse response: {e}"))
        })
    }

    /// Timestamps of the last device sync and the newest stored sample.
    ///
    /// # Errors
    ///
    /// See [`DashboardClient::fetch`]; also `AppError::Parse` for unexpected
    /// payload shapes or out-of-range timestamps.
    pub async fn fetch_sync(&self) -> AppResult<SyncStatus> {
        let value = self.fetch(Endpoint::Sync, None).await?;
        let raw: SyncResponse = serde_json::from_value(value)
            .map_err(|e| AppError::Parse(format!("Failed to parse sync timestamps: {e}")))?;
        SyncStatus::try_from(raw)
    }

    /// Log rows between `range.start` and `range.stop`. An empty object yields
    /// an empty payload.
    ///
    /// # Errors
    ///
    /// See [`DashboardClient::fetch`]; also `AppError::Parse` for unexpected
    /// payload shapes.
    pub async fn fetch_logs(&self, range: &TimeRange) -> AppResult<LogsPayload> {
        let value = self.fetch(Endpoint::Logs, Some(range)).await?;
        if is_empty_object(&value) {
            return Ok(LogsPayload::default());
        }
        serde_json::from_value(value)
            .map_err(|e| AppError::Parse(format!("Failed to parse logs: {e}")))
    }

    /// Raw samples between `range.start` and `range.stop`.
    ///
    /// # Errors
    ///
    /// See [`DashboardClient::fetch`]; also `AppError::Parse` for malformed or
    /// misaligned channels and `AppError::EmptyResult` for an empty object
    /// under [`EmptyDataPolicy::Reject`].
    pub async fn fetch_data(
        &self,
        range: &TimeRange,
        empty_policy: EmptyDataPolicy,
    ) -> AppResult<RawSample> {
        let value = self.fetch(Endpoint::Data, Some(range)).await?;
        if is_empty_object(&value) {
            return match empty_policy {
                EmptyDataPolicy::EmptyChannels => Ok(RawSample::empty_channels()),
                EmptyDataPolicy::Reject => Err(AppError::EmptyResult(format!(
                    "no samples between {} and {}",
                    range.start, range.stop
                ))),
            };
        }
        RawSample::from_json(&value)
    }
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(serde_json::Map::is_empty)
}
