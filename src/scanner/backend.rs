//! Transport seam for the remote scoring and ledger services.
//!
//! Both services are black-box HTTP endpoints; the [`DetectionBackend`]
//! trait is the boundary the workflow controller talks through, with
//! [`HttpBackend`] as the production implementation and a scripted double
//! in `test_utils` for tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::scanner::error::ScanError;
use crate::scanner::session::{Signal, TransactionCategory};

/// HTTP request timeout for detection service calls.
///
/// The service imposes no timeout of its own; expiry here is treated as a
/// transport failure like any other.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Analyze request body.
///
/// This crate standardizes on the `{transaction_type, fraud_label,
/// num_samples}` dialect; response parsing stays tolerant of older backends
/// regardless (see [`normalize`](crate::scanner::normalize)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzeRequest {
    /// Transaction domain to score.
    pub transaction_type: TransactionCategory,
    /// Forced outcome label, "fraud" or "non-fraud".
    pub fraud_label: String,
    /// Number of synthetic samples to score.
    pub num_samples: u32,
}

impl AnalyzeRequest {
    /// Builds a request from the operator's selections.
    #[must_use]
    pub fn new(category: TransactionCategory, signal: Signal, num_samples: u32) -> Self {
        Self {
            transaction_type: category,
            fraud_label: signal.wire_label().to_string(),
            num_samples: num_samples.max(1),
        }
    }
}

/// Commit request body: the minimal identifying fields of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRequest {
    /// Proof hash (or joined record identifiers) to record.
    pub proof_hash: String,
    /// Transaction identifier, when the analyze response supplied one.
    pub transaction_id: Option<String>,
}

/// Ledger receipt returned by a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Block the proof was recorded in.
    pub block_number: u64,
    /// Ledger-assigned transaction hash.
    pub tx_hash: String,
}

/// Service banner returned by the health endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInfo {
    /// Service status string, "ok" when healthy.
    pub status: String,
    /// Service name, if reported.
    #[serde(default)]
    pub service: Option<String>,
    /// Transaction categories the service can score.
    #[serde(default)]
    pub supported_types: Vec<String>,
    /// Server-side fraud threshold, if reported.
    #[serde(default)]
    pub fraud_threshold: Option<f64>,
    /// Server clock at probe time (the service reports a naive ISO 8601
    /// timestamp).
    #[serde(default)]
    pub timestamp: Option<chrono::NaiveDateTime>,
}

/// Trait for detection service transports.
pub trait DetectionBackend: Send + Sync {
    /// Issues an analyze call and returns the raw response payload.
    fn analyze<'a>(
        &'a self,
        request: &'a AnalyzeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ScanError>> + Send + 'a>>;

    /// Submits a proof reference to the ledger service.
    fn commit<'a>(
        &'a self,
        request: &'a CommitRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommitReceipt, ScanError>> + Send + 'a>>;
}

/// Production HTTP transport (reqwest).
#[derive(Debug)]
pub struct HttpBackend {
    /// HTTP client with the configured timeout.
    client: Client,
    /// Service base URL, e.g. `http://localhost:8000/test`.
    base_url: Url,
}

impl HttpBackend {
    /// Creates a backend with the default request timeout.
    pub fn new(base_url: &str) -> Result<Self, ScanError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a backend with an explicit request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ScanError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ScanError::Validation(format!("invalid base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ScanError::Validation(format!(
                "base URL '{base_url}' cannot carry endpoint paths"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Builds the full URL for an endpoint under the base.
    fn endpoint(&self, segment: &str) -> Result<Url, ScanError> {
        let mut url = self.base_url.clone();

        // Ensure a trailing slash so joining preserves all path components
        if !url.as_str().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }

        url.join(segment)
            .map_err(|e| ScanError::Transport(format!("failed to build endpoint URL: {e}")))
    }

    /// POSTs a JSON body and returns the checked response.
    async fn post_json<T: Serialize>(
        &self,
        segment: &str,
        body: &T,
    ) -> Result<reqwest::Response, ScanError> {
        let url = self.endpoint(segment)?;
        debug!(url = %url, "Sending request to detection service");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        check_error_response(response).await
    }

    /// Probes the service's health endpoint.
    pub async fn health(&self) -> Result<ServiceInfo, ScanError> {
        let url = self.endpoint("test-connection")?;
        debug!(url = %url, "Probing detection service health");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        let response = check_error_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| ScanError::Normalization(format!("malformed health response: {e}")))
    }
}

impl DetectionBackend for HttpBackend {
    fn analyze<'a>(
        &'a self,
        request: &'a AnalyzeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ScanError>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                transaction_type = %request.transaction_type,
                fraud_label = %request.fraud_label,
                num_samples = request.num_samples,
                "Requesting fraud analysis"
            );

            let response = self.post_json("run-test", request).await?;
            response
                .json()
                .await
                .map_err(|e| ScanError::Normalization(format!("malformed response body: {e}")))
        })
    }

    fn commit<'a>(
        &'a self,
        request: &'a CommitRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommitReceipt, ScanError>> + Send + 'a>> {
        Box::pin(async move {
            info!(proof_hash = %request.proof_hash, "Committing proof to ledger");

            let response = self.post_json("commit", request).await?;
            response.json().await.map_err(|e| {
                ScanError::Normalization(format!("malformed commit receipt: {e}"))
            })
        })
    }
}

/// Checks an HTTP response for error status.
///
/// On success, returns the response unchanged for further processing. On
/// failure, mines the body for a `detail` field (the service wraps its error
/// messages that way) before falling back to the status text.
pub(crate) async fn check_error_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, ScanError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_else(|e| {
        debug!("Failed to read error response body: {e}");
        String::new()
    });

    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string));

    let message = match detail {
        Some(detail) => detail,
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };

    Err(ScanError::Transport(format!("HTTP {status}: {message}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn analyze_request_serializes_to_the_standard_dialect() {
        let request = AnalyzeRequest::new(TransactionCategory::Vehicle, Signal::Fraud, 1);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "transaction_type": "vehicle",
                "fraud_label": "fraud",
                "num_samples": 1
            })
        );
    }

    #[test]
    fn analyze_request_floors_sample_count_at_one() {
        let request = AnalyzeRequest::new(TransactionCategory::Bank, Signal::Legitimate, 0);
        assert_eq!(request.num_samples, 1);
        assert_eq!(request.fraud_label, "non-fraud");
    }

    #[test]
    fn endpoint_preserves_base_path() {
        let backend = HttpBackend::new("http://localhost:8000/test").unwrap();
        let url = backend.endpoint("run-test").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/test/run-test");
    }

    #[test]
    fn endpoint_handles_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:8000/test/").unwrap();
        let url = backend.endpoint("commit").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/test/commit");
    }

    #[test]
    fn invalid_base_url_is_a_validation_error() {
        let err = HttpBackend::new("not a url").unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
    }
}
