//! Text-to-LaTeX providers.
//!
//! The remote provider talks to an OpenAI-compatible chat completions
//! endpoint and asks for a JSON array with one LaTeX string per
//! instruction. When no remote provider is configured the local
//! fallback converter takes its place.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ServiceError;

/// Default model when `MATHSCRIBE_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You convert plain-English math into LaTeX. \
You receive a JSON array of instructions. Reply with only a JSON array of \
strings, one LaTeX expression per instruction, in the same order. Do not wrap \
expressions in dollar signs.";

/// A batch text-to-LaTeX converter.
///
/// Implementations return LaTeX strings in request order. A reply shorter
/// than the request is allowed; the reconciler backfills missing positions.
pub trait LatexService: Send + Sync {
    fn name(&self) -> &str;

    /// Convert `instructions` (already trimmed) in one call.
    ///
    /// # Errors
    /// Returns a [`ServiceError`] when the call fails or the reply cannot be used.
    fn convert_batch(&self, instructions: &[String]) -> Result<Vec<String>, ServiceError>;
}

/// The provider selected for a session.
#[derive(Clone)]
pub enum Provider {
    Remote(Arc<dyn LatexService>),
    /// No remote service; every instruction goes through the fallback converter.
    Fallback,
}

impl Provider {
    /// Build the provider for an optional remote configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: Option<ServiceConfig>) -> Result<Self, ServiceError> {
        match config {
            Some(config) => Ok(Self::Remote(Arc::new(RemoteService::new(config)?))),
            None => Ok(Self::Fallback),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Remote(service) => service.name(),
            Self::Fallback => "fallback",
        }
    }

    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Run one batch call.
    ///
    /// The fallback provider answers with an empty list, which leaves every
    /// position to the per-instruction fallback step of the merge.
    ///
    /// # Errors
    /// Propagates the remote service failure.
    pub fn request(&self, instructions: &[String]) -> Result<Vec<String>, ServiceError> {
        match self {
            Self::Remote(service) => service.convert_batch(instructions),
            Self::Fallback => Ok(Vec::new()),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Provider").field(&self.name()).finish()
    }
}

/// Settings for the remote provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl ServiceConfig {
    /// Read settings from the process environment.
    ///
    /// Returns `None` unless both `MATHSCRIBE_API_URL` and `MATHSCRIBE_API_KEY` are set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let api_url = present("MATHSCRIBE_API_URL")?;
        let api_key = present("MATHSCRIBE_API_KEY")?;
        let model = present("MATHSCRIBE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout_secs = present("MATHSCRIBE_TIMEOUT_SECS")
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(30);
        Some(Self {
            api_url,
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
            max_attempts: 2,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Remote OpenAI-compatible provider.
pub struct RemoteService {
    client: Client,
    config: ServiceConfig,
}

impl RemoteService {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn send_once(&self, body: &ChatRequest<'_>) -> Result<Vec<String>, ServiceError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json()?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::Malformed("reply has no message content".to_string()))?;
        parse_latex_list(&content)
    }
}

impl LatexService for RemoteService {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn convert_batch(&self, instructions: &[String]) -> Result<Vec<String>, ServiceError> {
        let payload = serde_json::to_string(instructions)
            .map_err(|err| ServiceError::Malformed(err.to_string()))?;
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: payload,
                },
            ],
            temperature: 0.0,
            max_tokens: 1024,
        };

        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            debug!(attempt, count = instructions.len(), "sending conversion batch");
            match self.send_once(&body) {
                Ok(latex) => return Ok(latex),
                // Only transport-level failures are worth another try.
                Err(err @ (ServiceError::Timeout | ServiceError::Connect(_)))
                    if attempt < attempts =>
                {
                    warn!(attempt, error = %err, "conversion batch failed, retrying");
                    std::thread::sleep(Duration::from_millis(250 * u64::from(attempt)));
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Parse a reply that should be a JSON array of strings.
///
/// Code fences around the array are tolerated. A non-string element ends
/// the usable prefix; the caller backfills from there.
///
/// # Errors
/// Returns [`ServiceError::Malformed`] when the reply is not a JSON array.
pub fn parse_latex_list(content: &str) -> Result<Vec<String>, ServiceError> {
    let body = strip_code_fence(content);
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|err| ServiceError::Malformed(err.to_string()))?;
    let items = value
        .as_array()
        .ok_or_else(|| ServiceError::Malformed("reply is not a JSON array".to_string()))?;

    let mut latex = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            warn!(position = idx, "non-string element in provider reply, truncating");
            break;
        };
        latex.push(text.to_string());
    }
    Ok(latex)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an info string such as ```json
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
