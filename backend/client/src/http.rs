use anyhow::{bail, Context, Result};
use reqwest::{Client, Response};
use tracing::debug;

use aquadash_core::InsightRequest;

/// Shown when the relay rejects the request.
pub const REQUEST_FAILED: &str = "生成结论失败";

/// HTTP side of the consumer: posts insight requests to the relay.
#[derive(Clone)]
pub struct InsightClient {
    http: Client,
    endpoint: String,
}

impl InsightClient {
    /// `endpoint` is the full relay URL, e.g. `http://localhost:5000/api/ai-insight`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the request and return the response once its status is OK.
    pub async fn open(&self, request: &InsightRequest) -> Result<Response> {
        debug!(endpoint = %self.endpoint, chart = %request.chart_type, "Requesting insight");
        let response = self
            .http
            .post(&self.endpoint)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .context("Insight request failed")?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Insight relay rejected request");
            bail!(REQUEST_FAILED);
        }
        Ok(response)
    }
}
