//! Web server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use testdeck_runner::{Browser, PlaywrightConfig};

use crate::ai::ProviderKind;

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// HTTP listen address
    pub listen: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    pub auth: AuthConfig,

    pub runner: RunnerConfig,

    pub ai: AiConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database_path: testdeck_common::default_db_path(),
            auth: AuthConfig::default(),
            runner: RunnerConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

/// Session and account settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When false every request acts as a local admin
    pub enabled: bool,

    /// HS256 signing secret. A random one is generated at startup when unset.
    pub session_secret: Option<String>,

    pub session_ttl_secs: u64,

    /// Bootstrap admin account, created on startup when missing
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_secret: None,
            session_ttl_secs: 12 * 60 * 60,
            admin_email: None,
            admin_password: None,
        }
    }
}

/// Playwright runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Directory holding `playwright.config` and generated specs
    pub workdir: PathBuf,
    pub npx_program: String,
    pub default_browser: Browser,
    pub base_url: Option<String>,
    pub default_timeout_ms: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let defaults = PlaywrightConfig::default();
        Self {
            workdir: defaults.workdir,
            npx_program: defaults.npx_program,
            default_browser: defaults.default_browser,
            base_url: defaults.base_url,
            default_timeout_ms: defaults.default_timeout_ms,
        }
    }
}

impl RunnerConfig {
    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            workdir: self.workdir.clone(),
            npx_program: self.npx_program.clone(),
            default_browser: self.default_browser,
            base_url: self.base_url.clone(),
            default_timeout_ms: self.default_timeout_ms,
        }
    }
}

/// AI provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: ProviderKind,

    /// Model name; each provider has its own default
    pub model: Option<String>,

    pub api_key: Option<String>,

    /// Override for the provider endpoint
    pub base_url: Option<String>,

    pub timeout_secs: u64,

    /// Lines per provider call when importing steps
    pub batch_size: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::RuleBased,
            model: None,
            api_key: None,
            base_url: None,
            timeout_secs: 30,
            batch_size: 10,
        }
    }
}

impl WebConfig {
    /// Load configuration from file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `TESTDECK_*` environment overrides.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TESTDECK_LISTEN") {
            self.listen = v.parse()?;
        }
        if let Some(v) = get("TESTDECK_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = get("TESTDECK_AUTH_ENABLED") {
            self.auth.enabled = parse_bool(&v)?;
        }
        if let Some(v) = get("TESTDECK_SESSION_SECRET") {
            self.auth.session_secret = Some(v);
        }
        if let Some(v) = get("TESTDECK_ADMIN_EMAIL") {
            self.auth.admin_email = Some(v);
        }
        if let Some(v) = get("TESTDECK_ADMIN_PASSWORD") {
            self.auth.admin_password = Some(v);
        }
        if let Some(v) = get("TESTDECK_PLAYWRIGHT_WORKDIR") {
            self.runner.workdir = PathBuf::from(v);
        }
        if let Some(v) = get("TESTDECK_NPX") {
            self.runner.npx_program = v;
        }
        if let Some(v) = get("TESTDECK_BASE_URL") {
            self.runner.base_url = Some(v);
        }
        if let Some(v) = get("TESTDECK_AI_PROVIDER") {
            self.ai.provider = v.parse()?;
        }
        if let Some(v) = get("TESTDECK_AI_MODEL") {
            self.ai.model = Some(v);
        }
        if let Some(v) = get("TESTDECK_AI_API_KEY") {
            self.ai.api_key = Some(v);
        }
        if let Some(v) = get("TESTDECK_AI_BASE_URL") {
            self.ai.base_url = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ai.batch_size == 0 {
            anyhow::bail!("ai.batch_size must be at least 1");
        }
        if self.auth.session_ttl_secs == 0 {
            anyhow::bail!("auth.session_ttl_secs must be at least 1");
        }
        if self.ai.provider.needs_api_key() && self.ai.api_key.is_none() {
            tracing::warn!(
                "AI provider {} has no api_key; step import will use the rule-based generator",
                self.ai.provider
            );
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean: {}", other),
    }
}
