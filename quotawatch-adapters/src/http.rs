//! Monitoring backend speaking a small JSON-over-HTTP API.
//!
//! ## Endpoints
//!
//! - `POST {endpoint}/v1/metrics` with `{"Namespace": .., "MetricData": [..]}`
//! - `PUT {endpoint}/v1/alarms/{alarm name}` with the alarm definition
//!
//! ## Example
//!
//! ```rust,no_run
//! use quotawatch_adapters::http::HttpBackend;
//! use std::time::Duration;
//!
//! let backend = HttpBackend::builder()
//!     .endpoint("https://monitoring.internal")
//!     .api_token("s3cr3t")
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//! # Ok::<(), quotawatch_adapters::AdapterError>(())
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use tracing::debug;

use quotawatch_pipeline::{BackendError, MonitoringBackend};
use quotawatch_types::{AlarmDefinition, Metric};

use crate::AdapterError;

/// HTTP monitoring backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: Url,
    api_token: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MetricIngest<'a> {
    namespace: &'a str,
    metric_data: &'a [Metric],
}

impl HttpBackend {
    /// Create a new builder for configuring the backend.
    pub fn builder() -> HttpBackendBuilder {
        HttpBackendBuilder::default()
    }

    fn metrics_url(&self) -> Url {
        self.url_for(&["v1", "metrics"])
    }

    fn alarm_url(&self, name: &str) -> Url {
        self.url_for(&["v1", "alarms", name])
    }

    /// Append path segments to the endpoint, percent-encoding each one.
    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        // The builder only accepts endpoints that can be a base.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<(), BackendError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Auth(format!("API returned status {status}")));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected(format!(
                "API returned status {status}: {body}"
            )));
        }

        Ok(())
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl MonitoringBackend for HttpBackend {
    async fn ingest_metrics(&self, namespace: &str, batch: &[Metric]) -> Result<(), BackendError> {
        debug!(namespace, size = batch.len(), "POST metrics");
        let body = MetricIngest {
            namespace,
            metric_data: batch,
        };
        self.send(self.client.post(self.metrics_url()).json(&body))
            .await
    }

    async fn upsert_alarm(&self, alarm: &AlarmDefinition) -> Result<(), BackendError> {
        debug!(alarm = %alarm.alarm_name, "PUT alarm");
        self.send(self.client.put(self.alarm_url(&alarm.alarm_name)).json(alarm))
            .await
    }
}

/// Builder for HttpBackend.
#[derive(Debug, Default)]
pub struct HttpBackendBuilder {
    endpoint: Option<String>,
    api_token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpBackendBuilder {
    /// Set the API base URL (e.g., "http://localhost:8080").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Send a bearer token with every request.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the backend.
    pub fn build(self) -> Result<HttpBackend, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));
        let client = Client::builder().timeout(timeout).build()?;

        let raw = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        let endpoint = Url::parse(&raw)
            .map_err(|e| AdapterError::Config(format!("invalid endpoint {raw}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(AdapterError::Config(format!(
                "endpoint {raw} cannot carry a path"
            )));
        }

        Ok(HttpBackend {
            client,
            endpoint,
            api_token: self.api_token.filter(|t| !t.is_empty()),
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let backend = HttpBackend::builder().build().unwrap();
        assert_eq!(backend.endpoint.as_str(), "http://localhost:8080/");
        assert_eq!(backend.api_token, None);
        assert_eq!(backend.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder_custom() {
        let backend = HttpBackend::builder()
            .endpoint("https://monitoring.internal/")
            .api_token("s3cr3t")
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap();

        assert_eq!(backend.api_token.as_deref(), Some("s3cr3t"));
        assert_eq!(backend.timeout, Duration::from_secs(3));
        assert_eq!(
            backend.metrics_url().as_str(),
            "https://monitoring.internal/v1/metrics"
        );
    }

    #[test]
    fn test_endpoint_with_base_path() {
        let backend = HttpBackend::builder()
            .endpoint("https://monitoring.internal/api")
            .build()
            .unwrap();
        assert_eq!(
            backend.metrics_url().as_str(),
            "https://monitoring.internal/api/v1/metrics"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            HttpBackend::builder().endpoint("not a url").build(),
            Err(AdapterError::Config(_))
        ));
        assert!(matches!(
            HttpBackend::builder().endpoint("mailto:ops@example.com").build(),
            Err(AdapterError::Config(_))
        ));
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let backend = HttpBackend::builder().api_token("").build().unwrap();
        assert_eq!(backend.api_token, None);
    }

    #[test]
    fn test_alarm_url() {
        let backend = HttpBackend::builder()
            .endpoint("http://mon:9000")
            .build()
            .unwrap();
        assert_eq!(
            backend.alarm_url("EC2 EIPs warn").as_str(),
            "http://mon:9000/v1/alarms/EC2%20EIPs%20warn"
        );
        assert_eq!(
            backend.alarm_url("a/b?c#d%").as_str(),
            "http://mon:9000/v1/alarms/a%2Fb%3Fc%23d%25"
        );
        assert_eq!(
            backend.alarm_url("say \"hi\"\\\u{1}").as_str(),
            "http://mon:9000/v1/alarms/say%20%22hi%22%5C%01"
        );
    }

    #[test]
    fn test_metric_ingest_body() {
        let metrics = [Metric {
            metric_name: "VPC-VPCs".to_string(),
            dimensions: Vec::new(),
            value: 3.0,
        }];
        let body = MetricIngest {
            namespace: "ServicesLimits",
            metric_data: &metrics,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["Namespace"], "ServicesLimits");
        assert_eq!(json["MetricData"][0]["MetricName"], "VPC-VPCs");
        assert_eq!(json["MetricData"][0]["Value"], 3.0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let backend = HttpBackend::builder()
            .endpoint("http://127.0.0.1:1")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        let err = backend.ingest_metrics("ns", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Transport(_) | BackendError::Timeout(_)
        ));
    }
}
