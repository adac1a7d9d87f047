//! HTTP webhook target for delivery tests.

use std::collections::HashMap;

use serde_json::Value;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const WEBHOOK_PATH: &str = "/webhooks";

/// A webhook request captured by the target.
#[derive(Debug, Clone)]
pub struct ReceivedWebhook {
    /// Headers with lower-cased names.
    pub headers: HashMap<String, String>,

    /// Raw request body.
    pub body: String,
}

impl ReceivedWebhook {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Body parsed as JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Merchant webhook endpoint backed by a local mock server.
pub struct WebhookTarget {
    server: MockServer,
}

impl WebhookTarget {
    /// Starts a target on a random local port.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// URL merchants should be configured with.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), WEBHOOK_PATH)
    }

    /// Answers successive POSTs with the given statuses, one per request.
    ///
    /// Requests beyond the scripted sequence fall through to any responder
    /// mounted afterwards, or to wiremock's default 404.
    pub async fn respond_with_sequence(&self, statuses: &[u16]) {
        for &status in statuses {
            Mock::given(method("POST"))
                .and(path(WEBHOOK_PATH))
                .respond_with(ResponseTemplate::new(status))
                .up_to_n_times(1)
                .mount(&self.server)
                .await;
        }
    }

    /// Answers every POST with `status`.
    pub async fn always(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(WEBHOOK_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Requests received so far, in arrival order.
    pub async fn received(&self) -> Vec<ReceivedWebhook> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|request| ReceivedWebhook {
                headers: request
                    .headers
                    .iter()
                    .filter_map(|(name, value)| {
                        value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                    })
                    .collect(),
                body: String::from_utf8_lossy(&request.body).into_owned(),
            })
            .collect()
    }

    /// Number of requests received so far.
    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.map(|requests| requests.len()).unwrap_or_default()
    }
}
