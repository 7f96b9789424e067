//! Narration Service Client using Reqwest
//!
//! Talks to the HTTP text-to-speech endpoint: posts `{text, voiceId}` as
//! JSON and receives a JSON body carrying the synthesized audio as a base64
//! `data:` URI.

use async_trait::async_trait;
use base64::Engine;
use bridge_traits::{
    error::{BridgeError, Result},
    speech::{SpeechRequest, SpeechSynthesizer, SynthesizedSpeech},
};
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for synthesis requests.
///
/// Server errors (5xx) and throttling (429) are retried with exponential
/// backoff; client errors (4xx) fail immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Response body of the synthesis endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisResponse {
    audio_data_uri: String,
}

/// Reqwest-based narration service client
///
/// Provides speech synthesis with:
/// - Connection pooling via reqwest
/// - Automatic retry with exponential backoff on 5xx/429
/// - TLS support by default
pub struct HttpSpeechSynthesizer {
    client: Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl HttpSpeechSynthesizer {
    /// Create a client for the given synthesis endpoint with default
    /// configuration.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent("picturetales-core/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a client from a pre-configured reqwest `Client`.
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn synthesize_with_retry(&self, request: &SpeechRequest) -> Result<SynthesisResponse> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.retry.max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts = self.retry.max_attempts,
                voice = %request.voice,
                "Executing synthesis request"
            );

            match self
                .client
                .post(&self.endpoint)
                .json(request)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if status >= 500 || status == 429 {
                        warn!(
                            status = status,
                            attempt = attempt + 1,
                            "synthesis request failed with retryable status"
                        );
                        last_error = Some(BridgeError::OperationFailed(format!(
                            "Synthesis service HTTP {} error",
                            status
                        )));
                    } else if !(200..300).contains(&status) {
                        return Err(BridgeError::OperationFailed(format!(
                            "Synthesis service rejected request: HTTP {}",
                            status
                        )));
                    } else {
                        return response
                            .json::<SynthesisResponse>()
                            .await
                            .map_err(|e| {
                                BridgeError::OperationFailed(format!(
                                    "Invalid synthesis response body: {}",
                                    e
                                ))
                            });
                    }
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        "synthesis request failed"
                    );

                    if e.is_timeout() {
                        last_error = Some(BridgeError::OperationFailed(
                            "Synthesis request timed out".to_string(),
                        ));
                    } else if e.is_connect() {
                        last_error = Some(BridgeError::OperationFailed(format!(
                            "Connection to synthesis service failed: {}",
                            e
                        )));
                    } else {
                        last_error = Some(BridgeError::OperationFailed(e.to_string()));
                    }
                }
            }

            attempt += 1;

            if attempt < self.retry.max_attempts {
                let delay = (self.retry.base_delay * 2u32.pow(attempt - 1)).min(self.retry.max_delay);
                debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SynthesizedSpeech> {
        let response = self.synthesize_with_retry(&request).await?;
        let speech = parse_data_uri(&response.audio_data_uri)?;
        if speech.is_empty() {
            return Err(BridgeError::OperationFailed(
                "Synthesis service returned an empty payload".to_string(),
            ));
        }
        debug!(
            bytes = speech.data.len(),
            mime = speech.mime_type.as_deref().unwrap_or("unknown"),
            "synthesis payload received"
        );
        Ok(speech)
    }
}

/// Parse a base64 `data:` URI (e.g. `data:audio/wav;base64,UklGR...`) into
/// raw payload bytes plus its MIME type.
pub fn parse_data_uri(uri: &str) -> Result<SynthesizedSpeech> {
    let rest = uri.strip_prefix("data:").ok_or_else(|| {
        BridgeError::OperationFailed("Payload is not a data URI".to_string())
    })?;

    let (metadata, encoded) = rest.split_once(',').ok_or_else(|| {
        BridgeError::OperationFailed("Malformed data URI: missing payload".to_string())
    })?;

    let mime = match metadata.strip_suffix(";base64") {
        Some(mime) => mime,
        None => {
            return Err(BridgeError::OperationFailed(
                "Data URI payload is not base64-encoded".to_string(),
            ));
        }
    };

    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| {
            BridgeError::OperationFailed(format!("Invalid base64 audio payload: {}", e))
        })?;

    let mut speech = SynthesizedSpeech::new(Bytes::from(data));
    if !mime.is_empty() {
        speech = speech.with_mime_type(mime);
    }
    Ok(speech)
}
