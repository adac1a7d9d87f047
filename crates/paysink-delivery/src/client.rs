//! HTTP client for webhook delivery with configurable timeouts.
//!
//! Builds the signed POST for one attempt and classifies the outcome: any 2xx
//! is a success, every other status and every transport failure is a failed
//! attempt.

use std::{sync::Arc, time::Duration};

use paysink_core::{Clock, DeliveryId, DeliveryRecord};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use crate::error::{DeliveryError, Result};

/// Header carrying the wire event type.
pub const EVENT_TYPE_HEADER: &str = "X-Event-Type";

/// Header carrying the base64 HMAC-SHA256 of the body.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Header carrying the 1-based attempt number.
pub const ATTEMPT_HEADER: &str = "X-Delivery-Attempt";

const MAX_RESPONSE_BODY: usize = 1024;

/// Configuration for the webhook delivery client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for a single HTTP request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: "Paysink-Webhooks/1.0".to_string() }
    }
}

/// One delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Record being delivered.
    pub delivery_id: DeliveryId,
    /// Destination URL.
    pub url: String,
    /// Wire event type.
    pub event_type: String,
    /// Precomputed body signature.
    pub signature: String,
    /// JSON body, sent verbatim.
    pub body: String,
    /// Attempt number, starting at 1.
    pub attempt_number: u32,
}

impl DeliveryRequest {
    /// Builds the request for the next attempt on `record`.
    pub fn for_record(record: &DeliveryRecord) -> Self {
        Self {
            delivery_id: record.id,
            url: record.target_url.clone(),
            event_type: record.event_type.clone(),
            signature: record.signature.clone(),
            body: record.payload.clone(),
            attempt_number: record.attempts.saturating_add(1),
        }
    }
}

/// Response from a webhook delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body, truncated.
    pub body: String,
    /// Total duration of the request.
    pub duration: Duration,
}

impl DeliveryResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Turns a non-2xx response into the matching error.
    ///
    /// # Errors
    ///
    /// Returns `ClientError`, `ServerError` or `UnexpectedStatus` for any
    /// status outside 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(DeliveryError::from_status(self.status_code, self.body))
        }
    }
}

/// HTTP client for signed webhook POSTs.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    config: ClientConfig,
    clock: Arc<dyn Clock>,
}

impl DeliveryClient {
    /// Creates a new delivery client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(config: ClientConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.timeout.is_zero() {
            return Err(DeliveryError::configuration("request timeout must be positive"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config, clock })
    }

    /// Client settings.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POSTs the request body to its URL.
    ///
    /// Returns the response for any HTTP status; callers decide what a
    /// non-2xx means via [`DeliveryResponse::error_for_status`].
    ///
    /// # Errors
    ///
    /// Returns `Timeout` when the request exceeds the configured timeout and
    /// `Network` for any other transport failure.
    pub async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryResponse> {
        let started = self.clock.now();

        let span = info_span!(
            "webhook_request",
            delivery_id = %request.delivery_id,
            url = %request.url,
            attempt = request.attempt_number
        );

        async move {
            tracing::debug!("sending webhook");

            let sent = self
                .client
                .post(&request.url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header(EVENT_TYPE_HEADER, &request.event_type)
                .header(SIGNATURE_HEADER, &request.signature)
                .header(ATTEMPT_HEADER, request.attempt_number.to_string())
                .body(request.body.clone())
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    let duration = self.clock.now().saturating_duration_since(started);
                    tracing::warn!(duration_ms = duration.as_millis(), "request failed: {}", e);

                    if e.is_timeout() {
                        return Err(DeliveryError::timeout(self.config.timeout.as_secs()));
                    }
                    return Err(DeliveryError::network(e.to_string()));
                },
            };

            let duration = self.clock.now().saturating_duration_since(started);
            let response = read_response(response, duration).await;

            tracing::debug!(
                status = response.status_code,
                duration_ms = duration.as_millis(),
                "received response"
            );

            Ok(response)
        }
        .instrument(span)
        .await
    }
}

async fn read_response(response: Response, duration: Duration) -> DeliveryResponse {
    let status_code = response.status().as_u16();

    let body = match response.bytes().await {
        Ok(bytes) if bytes.len() > MAX_RESPONSE_BODY => {
            format!("{}... (truncated)", String::from_utf8_lossy(&bytes[..MAX_RESPONSE_BODY]))
        },
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!("failed to read response body: {}", e);
            String::new()
        },
    };

    DeliveryResponse { status_code, body, duration }
}
