//! HTTP client for the Testdeck API

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// File holding the token saved by `testdeck login`
pub fn token_path() -> PathBuf {
    testdeck_common::default_store_path().join("token")
}

pub fn load_saved_token() -> Option<String> {
    std::fs::read_to_string(token_path())
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn save_token(token: &str) -> Result<PathBuf> {
    let path = token_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, token)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Client for one Testdeck server
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Option<Value>> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("cannot reach {}", self.base_url))?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            bail!("{} ({})", error_message(&body, status), status.as_u16());
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    fn decode<T: DeserializeOwned>(value: Option<Value>) -> Result<T> {
        let value = value.ok_or_else(|| anyhow!("empty response body"))?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Self::decode(self.send(self.request(Method::GET, path)).await?)
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        Self::decode(self.send(self.request(Method::POST, path).json(body)).await?)
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        Self::decode(self.send(self.request(Method::PUT, path).json(body)).await?)
    }

    /// DELETE whose response body, if any, is discarded
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    pub async fn delete_returning<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Self::decode(self.send(self.request(Method::DELETE, path)).await?)
    }

    pub async fn health(&self) -> Result<Value> {
        self.get("/api/health").await
    }
}

/// `?expectedVersion=N` suffix, or nothing
pub fn expected_version_query(expected: Option<i64>) -> String {
    expected
        .map(|v| format!("?expectedVersion={}", v))
        .unwrap_or_default()
}

fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}
