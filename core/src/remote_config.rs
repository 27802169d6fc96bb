//! Remote endpoint configuration: where the primary bootstrap request goes.
//!
//! The host and path of the gate endpoint live in a small key-value
//! document in a remote config store. One read per resolution attempt, no
//! retry; the caller decides whether an attempt is worth repeating.

use crate::error::ConfigError;
use crate::error::ConfigStoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use tracing::warn;
use url::Url;

/// Fixed logical path of the gate config document.
pub const CONFIG_PATH: &str = "config";

const HOST_KEY: &str = "stray";
const PATH_KEY: &str = "swap";

/// Read access to the remote key-value config store.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Reads the document at `path`. `Ok(None)` means the path exists but
    /// holds nothing.
    async fn read_document(&self, path: &str) -> Result<Option<Value>, ConfigStoreError>;
}

/// [`ConfigStore`] over a REST-style JSON document store
/// (`GET {base}/{path}.json`, `null` body for an empty path).
pub struct HttpConfigStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpConfigStore {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl ConfigStore for HttpConfigStore {
    async fn read_document(&self, path: &str) -> Result<Option<Value>, ConfigStoreError> {
        let url = self
            .base_url
            .join(&format!("{path}.json"))
            .map_err(|err| ConfigStoreError(err.to_string()))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ConfigStoreError(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ConfigStoreError(format!("HTTP {}", response.status())));
        }
        let value = response
            .json::<Value>()
            .await
            .map_err(|err| ConfigStoreError(err.to_string()))?;
        Ok(if value.is_null() { None } else { Some(value) })
    }
}

/// Host and path of the gate endpoint, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub host: String,
    pub path: String,
}

impl GateConfig {
    /// Base endpoint for the primary request. Hosts that already carry an
    /// `http` scheme are used as-is; everything else gets `https://`.
    pub fn base_endpoint(&self) -> String {
        if self.host.starts_with("http") {
            format!("{}{}", self.host, self.path)
        } else {
            format!("https://{}{}", self.host, self.path)
        }
    }
}

/// Single-attempt fetch of the gate config document.
pub struct RemoteConfigFetcher {
    store: Arc<dyn ConfigStore>,
}

impl RemoteConfigFetcher {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub async fn fetch_gate_config(&self) -> Result<GateConfig, ConfigError> {
        let document = self
            .store
            .read_document(CONFIG_PATH)
            .await
            .map_err(|err| {
                warn!("config store read failed: {err}");
                ConfigError::NoData
            })?;
        let Some(Value::Object(map)) = document else {
            warn!("config document missing or not an object");
            return Err(ConfigError::InvalidConfig);
        };

        let host = map
            .get(HOST_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(ConfigError::InvalidConfig)?;
        let path = map
            .get(PATH_KEY)
            .and_then(Value::as_str)
            .ok_or(ConfigError::InvalidConfig)?;
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        let config = GateConfig {
            host: host.to_string(),
            path,
        };
        debug!(endpoint = %config.base_endpoint(), "gate config fetched");
        Ok(config)
    }
}
