//! Gemini API Client
//!
//! Single-prompt text generation against the Gemini REST endpoint with a
//! bounded retry policy:
//! - HTTP 429: wait, rotate to the next API key, retry
//! - network failure: wait, retry
//! - any other non-2xx: fail immediately
//!
//! No conversation state is carried by the transport; callers embed all
//! context in the prompt.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::reply::ErrorKind;

/// Gateway errors, surfaced after the retry budget is spent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("API Error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No Gemini API key configured")]
    NotConfigured,
}

impl GatewayError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimitExceeded(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::RateLimitExceeded(_) => ErrorKind::RateLimitExceeded,
            Self::Api { .. } => ErrorKind::Api,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::NotConfigured => ErrorKind::NotConfigured,
        }
    }
}

/// Text generation seam used by the coordinator and the domain agents
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;
}

// ============ Transport ============

/// Raw HTTP reply
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Network-level failure (timeout, connection reset, DNS, ...)
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// POST-a-JSON-body transport
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport with a fixed per-call timeout
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(e.without_url().to_string()))?;

        Ok(RawResponse { status, body })
    }
}

// ============ Wire format ============

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Pull `candidates[0].content.parts[0].text` out of a success body
fn extract_text(body: &str) -> Result<String, GatewayError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            GatewayError::MalformedResponse("missing candidates[0].content.parts[0].text".to_string())
        })
}

// ============ Client ============

/// Retry policy for generation calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    /// Wait after HTTP 429
    pub rate_limit_delay: Duration,
    /// Wait after a network failure
    pub network_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_delay: Duration::from_secs(10),
            network_delay: Duration::from_secs(5),
        }
    }
}

/// Gemini API client
pub struct GeminiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    model: String,
    api_keys: Vec<String>,
    key_index: AtomicUsize,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(transport: Arc<dyn Transport>, api_keys: Vec<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_keys,
            key_index: AtomicUsize::new(0),
            retry: RetryPolicy::default(),
        }
    }

    /// Create from config
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let transport = Arc::new(HttpTransport::new(config.gemini_timeout)?);
        Ok(Self::new(transport, config.gemini_api_keys.clone())
            .with_model(&config.gemini_model)
            .with_base_url(&config.gemini_base_url))
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn current_key(&self) -> Option<&str> {
        if self.api_keys.is_empty() {
            return None;
        }
        let index = self.key_index.load(Ordering::Relaxed) % self.api_keys.len();
        Some(&self.api_keys[index])
    }

    /// Move to the next key after a quota hit
    fn rotate_key(&self) {
        if self.api_keys.len() > 1 {
            let next = (self.key_index.fetch_add(1, Ordering::Relaxed) + 1) % self.api_keys.len();
            info!("Rotating Gemini API key ({}/{})", next + 1, self.api_keys.len());
        }
    }

    fn endpoint(&self, key: &str) -> String {
        format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, key)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let body = serde_json::to_value(GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        })
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        let max_attempts = self.retry.max_attempts.max(1);
        debug!("Calling Gemini API: model={}, prompt_len={}", self.model, prompt.len());

        for attempt in 1..=max_attempts {
            let key = self.current_key().ok_or(GatewayError::NotConfigured)?;
            let has_retry = attempt < max_attempts;
            debug!("Gemini attempt {}/{}", attempt, max_attempts);

            let response = match self.transport.post_json(&self.endpoint(key), &body).await {
                Ok(response) => response,
                Err(e) => {
                    if has_retry {
                        warn!(
                            "Network error: {}. Retrying in {:?} (attempt {}/{})",
                            e, self.retry.network_delay, attempt, max_attempts
                        );
                        tokio::time::sleep(self.retry.network_delay).await;
                        continue;
                    }
                    return Err(GatewayError::Network(e.0));
                }
            };

            match response.status {
                200..=299 => {
                    let text = extract_text(&response.body)?;
                    debug!("Gemini response: {} chars", text.len());
                    return Ok(text);
                }
                429 => {
                    self.rotate_key();
                    if has_retry {
                        warn!(
                            "Rate limit hit. Retrying in {:?} (attempt {}/{})",
                            self.retry.rate_limit_delay, attempt, max_attempts
                        );
                        tokio::time::sleep(self.retry.rate_limit_delay).await;
                        continue;
                    }
                    return Err(GatewayError::RateLimitExceeded(response.body));
                }
                status => {
                    return Err(GatewayError::Api {
                        status,
                        body: response.body,
                    });
                }
            }
        }

        // Only reachable with max_attempts == 0, which is clamped above
        Err(GatewayError::Network("retry budget exhausted".to_string()))
    }
}
