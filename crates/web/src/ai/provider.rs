//! Completion providers

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AiConfig;

const MAX_TOKENS: u32 = 2048;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Shared HTTP client, built on first use
static HTTP_CLIENT: OnceCell<reqwest::Client> = OnceCell::new();

fn http_client() -> Result<&'static reqwest::Client, AiError> {
    HTTP_CLIENT.get_or_try_init(|| {
        reqwest::Client::builder()
            .user_agent(concat!("testdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AiError::Network(e.to_string()))
    })
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("missing API key for {0}")]
    MissingApiKey(ProviderKind),

    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected response shape: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Timeout
        } else {
            AiError::Network(err.to_string())
        }
    }
}

impl From<AiError> for testdeck_common::Error {
    fn from(err: AiError) -> Self {
        testdeck_common::Error::Ai(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    Claude,
    Grok,
    /// No network calls; every line goes through the heuristic
    #[default]
    RuleBased,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Claude => "claude",
            ProviderKind::Grok => "grok",
            ProviderKind::RuleBased => "rule_based",
        }
    }

    pub fn needs_api_key(&self) -> bool {
        !matches!(self, ProviderKind::RuleBased)
    }

    fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-1.5-flash",
            ProviderKind::Claude => "claude-3-5-haiku-latest",
            ProviderKind::Grok => "grok-2-latest",
            ProviderKind::RuleBased => "",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Claude => "https://api.anthropic.com/v1",
            ProviderKind::Grok => "https://api.x.ai/v1",
            ProviderKind::RuleBased => "",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "grok" | "xai" => Ok(ProviderKind::Grok),
            "rule_based" | "rule-based" | "none" => Ok(ProviderKind::RuleBased),
            other => anyhow::bail!("unknown AI provider: {}", other),
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, AiError>;
}

/// Calls one of the hosted chat APIs over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    kind: ProviderKind,
    model: String,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl HttpProvider {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            model: kind.default_model().to_string(),
            api_key: api_key.into(),
            base_url: kind.default_base_url().to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, system: &str, prompt: &str) -> Result<reqwest::RequestBuilder, AiError> {
        let client = http_client()?;
        let builder = match self.kind {
            ProviderKind::OpenAi | ProviderKind::Grok => client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "messages": [
                        {"role": "system", "content": system},
                        {"role": "user", "content": prompt},
                    ],
                    "max_tokens": MAX_TOKENS,
                    "temperature": 0.2,
                })),
            ProviderKind::Claude => client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": MAX_TOKENS,
                    "system": system,
                    "messages": [{"role": "user", "content": prompt}],
                })),
            ProviderKind::Gemini => client
                .post(format!(
                    "{}/models/{}:generateContent",
                    self.base_url, self.model
                ))
                .query(&[("key", self.api_key.as_str())])
                .json(&json!({
                    "systemInstruction": {"parts": [{"text": system}]},
                    "contents": [{"role": "user", "parts": [{"text": prompt}]}],
                    "generationConfig": {"maxOutputTokens": MAX_TOKENS},
                })),
            ProviderKind::RuleBased => return Err(AiError::MissingApiKey(self.kind)),
        };
        Ok(builder.timeout(self.timeout))
    }
}

/// Pull the generated text out of a provider response body.
fn response_text(kind: ProviderKind, body: &Value) -> Option<String> {
    let pointer = match kind {
        ProviderKind::OpenAi | ProviderKind::Grok => "/choices/0/message/content",
        ProviderKind::Claude => "/content/0/text",
        ProviderKind::Gemini => "/candidates/0/content/parts/0/text",
        ProviderKind::RuleBased => return None,
    };
    body.pointer(pointer)
        .and_then(|v| v.as_str())
        .map(String::from)
}

#[async_trait]
impl CompletionProvider for HttpProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, AiError> {
        if self.api_key.is_empty() {
            return Err(AiError::MissingApiKey(self.kind));
        }

        let response = self.request(system, prompt)?.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;
        let text = response_text(self.kind, &body)
            .ok_or_else(|| AiError::Parse("no text in response".to_string()))?;
        debug!("{} returned {} bytes", self.kind, text.len());
        Ok(text)
    }
}

/// Build the configured provider. `None` means the rule-based generator
/// handles every request.
pub fn build_provider(config: &AiConfig) -> Option<Arc<dyn CompletionProvider>> {
    if !config.provider.needs_api_key() {
        return None;
    }
    let Some(api_key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) else {
        warn!(
            "AI provider {} configured without an api_key, using rule-based generation",
            config.provider
        );
        return None;
    };

    let mut provider = HttpProvider::new(config.provider, api_key)
        .with_timeout(Duration::from_secs(config.timeout_secs));
    if let Some(model) = &config.model {
        provider = provider.with_model(model.clone());
    }
    if let Some(url) = &config.base_url {
        provider = provider.with_base_url(url.clone());
    }
    Some(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("openai", ProviderKind::OpenAi)]
    #[test_case("Anthropic", ProviderKind::Claude)]
    #[test_case("gemini", ProviderKind::Gemini)]
    #[test_case("xai", ProviderKind::Grok)]
    #[test_case("rule-based", ProviderKind::RuleBased)]
    fn test_parse_provider_kind(input: &str, expected: ProviderKind) {
        assert_eq!(input.parse::<ProviderKind>().unwrap(), expected);
    }

    #[test]
    fn test_serde_names_match_display() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Gemini,
            ProviderKind::Claude,
            ProviderKind::Grok,
            ProviderKind::RuleBased,
        ] {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, Value::String(kind.to_string()));
        }
    }

    #[test]
    fn test_response_text_per_provider() {
        let openai = json!({"choices": [{"message": {"content": "[]"}}]});
        assert_eq!(response_text(ProviderKind::OpenAi, &openai).as_deref(), Some("[]"));
        assert_eq!(response_text(ProviderKind::Grok, &openai).as_deref(), Some("[]"));

        let claude = json!({"content": [{"type": "text", "text": "ok"}]});
        assert_eq!(response_text(ProviderKind::Claude, &claude).as_deref(), Some("ok"));

        let gemini = json!({"candidates": [{"content": {"parts": [{"text": "hi"}]}}]});
        assert_eq!(response_text(ProviderKind::Gemini, &gemini).as_deref(), Some("hi"));

        assert_eq!(response_text(ProviderKind::Claude, &openai), None);
    }

    #[test]
    fn test_build_provider_requires_key() {
        let mut config = AiConfig {
            provider: ProviderKind::OpenAi,
            ..Default::default()
        };
        assert!(build_provider(&config).is_none());

        config.api_key = Some("sk-test".to_string());
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.kind(), ProviderKind::OpenAi);

        config.provider = ProviderKind::RuleBased;
        assert!(build_provider(&config).is_none());
    }

    #[tokio::test]
    async fn test_empty_key_fails_without_network() {
        let provider = HttpProvider::new(ProviderKind::Claude, "");
        let err = provider.complete_with_system("sys", "hi").await.unwrap_err();
        assert!(matches!(err, AiError::MissingApiKey(ProviderKind::Claude)));
    }
}
