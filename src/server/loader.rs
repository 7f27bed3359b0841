//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and
//! environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let mut builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // prefix_separator("_") so BUSLIVE_SERVER__PORT works (single _
        // after the prefix, double _ between sections).
        .add_source(
            Environment::with_prefix("BUSLIVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    // Deployments following the original convention set the store root via a
    // bare variable rather than the BUSLIVE_ prefix.
    if let Ok(url) = std::env::var("UPSTREAM_BASE_URL") {
        builder = builder
            .set_override("upstream.base_url", url)
            .context("Failed to apply UPSTREAM_BASE_URL")?;
    }

    builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
