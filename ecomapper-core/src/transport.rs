use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;

use crate::{error::PipelineError, query::WeatherQuery};

/// Moves a [`WeatherQuery`] over the wire and hands back the raw response body.
#[async_trait]
pub trait WeatherTransport: Send + Sync + Debug {
    async fn fetch(&self, query: &WeatherQuery) -> Result<Vec<u8>, PipelineError>;
}

/// reqwest-backed transport. Timeouts are whatever the client defaults to.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl WeatherTransport for HttpTransport {
    async fn fetch(&self, query: &WeatherQuery) -> Result<Vec<u8>, PipelineError> {
        tracing::debug!(url = %query.url, "requesting weather observations");

        let res = self
            .http
            .request(query.method.clone(), query.url.clone())
            .send()
            .await
            .map_err(|e| {
                PipelineError::TransportFailure(format!("failed to send request to GeoNames: {e}"))
            })?;

        let status = res.status();
        let body = res.bytes().await.map_err(|e| {
            PipelineError::TransportFailure(format!("failed to read GeoNames response body: {e}"))
        })?;

        if !status.is_success() {
            return Err(PipelineError::TransportFailure(format!(
                "GeoNames request failed with status {}: {}",
                status,
                truncate_body(&String::from_utf8_lossy(&body)),
            )));
        }

        Ok(body.to_vec())
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
