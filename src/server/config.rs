//! Configuration structures.

use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub buses: BusesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional directory of SPA assets served at `/` with an index.html
    /// fallback. Disabled when unset.
    #[serde(default)]
    pub static_dir: Option<String>,
}

/// Upstream store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Root of the key-addressed JSON store (e.g. a Firebase RTDB base URL).
    /// Usually supplied via the `UPSTREAM_BASE_URL` environment variable.
    #[serde(default)]
    pub base_url: String,
    /// Cache time-to-live in seconds; the refresh loops tick at this rate.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: f64,
}

/// Tracked fleet configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusesConfig {
    #[serde(default = "default_bus_ids")]
    pub ids: Vec<String>,
}

impl Default for BusesConfig {
    fn default() -> Self {
        Self {
            ids: default_bus_ids(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cache_ttl_secs() -> f64 {
    2.0
}

fn default_bus_ids() -> Vec<String> {
    (1..=5).map(|i| format!("Bus{i}")).collect()
}
