use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::types::{GenerateRequest, GenerateResponse};
use crate::config::{ConfigError, GeminiSettings};

/// API surface versions, tried in order. Only a 404 advances to the
/// next version; any other failure is surfaced immediately.
const API_VERSIONS: &[&str] = &["v1beta", "v1"];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Credential as a `?key=` query parameter on every request.
    ApiKey,
    /// Credential as an `Authorization: Bearer` header.
    Bearer,
}

impl AuthMode {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "apikey" => Ok(AuthMode::ApiKey),
            "bearer" => Ok(AuthMode::Bearer),
            other => Err(ConfigError::InvalidAuthMode(other.to_string())),
        }
    }
}

/// Immutable client configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub credential: String,
    pub auth: AuthMode,
}

impl GeminiConfig {
    pub fn from_settings(settings: &GeminiSettings) -> Result<Self, ConfigError> {
        if settings.apikey.is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        Ok(Self {
            base_url: settings.baseurl.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            credential: settings.apikey.clone(),
            auth: AuthMode::parse(&settings.auth)?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Request to generative API failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Generative API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Empty response from generative API")]
    EmptyResponse,
    #[error("Unexpected response envelope: {0}")]
    BadEnvelope(String),
    #[error("All API versions failed, last: {last}")]
    AllVersionsFailed { last: String },
}

/// Seam between the orchestrator and the generative backend, so tests
/// can substitute a canned generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, version: &str) -> String {
        let mut url = format!(
            "{}/{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            version,
            self.config.model
        );
        if self.config.auth == AuthMode::ApiKey {
            url.push_str("?key=");
            url.push_str(&urlencoding::encode(&self.config.credential));
        }
        url
    }

    /// Send `prompt` and return the generated text, already unwrapped
    /// from the `candidates[0].content.parts[0].text` envelope.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, UpstreamError> {
        let body = GenerateRequest::from_prompt(prompt);
        let mut last_miss = String::new();

        for version in API_VERSIONS {
            let url = self.endpoint(version);
            debug!(version, "calling generative API");

            let mut request = self.http.post(&url).json(&body);
            if self.config.auth == AuthMode::Bearer {
                request = request.bearer_auth(&self.config.credential);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::NOT_FOUND {
                warn!(version, "API version not found, trying next");
                last_miss = format!("{} returned 404", version);
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UpstreamError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let raw = response.text().await?;
            return unwrap_envelope(&raw);
        }

        Err(UpstreamError::AllVersionsFailed { last: last_miss })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.generate_text(prompt).await
    }
}

fn unwrap_envelope(raw: &str) -> Result<String, UpstreamError> {
    if raw.trim().is_empty() {
        return Err(UpstreamError::EmptyResponse);
    }

    let envelope: GenerateResponse =
        serde_json::from_str(raw).map_err(|e| UpstreamError::BadEnvelope(e.to_string()))?;

    match envelope.first_text() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(UpstreamError::EmptyResponse),
    }
}
