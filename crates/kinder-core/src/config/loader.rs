//! Hierarchical configuration loader with precedence
//!
//! Loads runtime configuration from multiple sources with the following
//! precedence (low to high):
//! 1. Embedded defaults (built into the crate)
//! 2. Config file (`<config-dir>/retry.yaml`, default `~/.kinder`)
//! 3. Environment variables (`KINDER_*` prefix)
//! 4. Per-call overrides (handled by the caller via `RetryPolicyOverrides`)

use crate::error::{Error, Result};
use crate::types::{RetryPoliciesConfig, RuntimeConfig};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::str::FromStr;

/// Name of the user configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "retry.yaml";

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/embedded/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Configuration hierarchy loader
pub struct ConfigLoader {
    /// Directory searched for `retry.yaml`
    config_dir: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at `~/.kinder`
    ///
    /// The directory is not created; a missing directory simply means no
    /// file layer.
    pub fn new() -> Result<Self> {
        let home = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| Error::invalid_config("Could not determine home directory"))?;

        Ok(Self {
            config_dir: Utf8PathBuf::from(home).join(".kinder"),
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = Self::load_embedded_config::<RuntimeConfig>("retry-defaults.yaml")?;

        let config_path = self.config_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let file_config = Self::load_yaml_file::<RuntimeConfig>(&config_path)?;
            config = Self::merge_runtime_config(config, file_config);
        }

        config = Self::apply_env_overrides(config)?;

        config.retry_policies.default.validate()?;
        for (name, policy) in &config.retry_policies.operations {
            policy.validate().map_err(|e| {
                Error::invalid_config(format!("retry policy '{}': {}", name, e))
            })?;
        }

        tracing::debug!(
            config_dir = %self.config_dir,
            operations = config.retry_policies.operations.len(),
            "loaded runtime config"
        );

        Ok(config)
    }

    /// Load an embedded configuration file
    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    /// Load a YAML file and parse it
    fn load_yaml_file<T: DeserializeOwned>(path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Merge two runtime configs (base is overridden by overlay)
    fn merge_runtime_config(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            network: overlay.network,
            retry_policies: Self::merge_retry_policies(base.retry_policies, overlay.retry_policies),
        }
    }

    /// Merge retry policies; overlay operations replace same-named base entries
    fn merge_retry_policies(
        mut base: RetryPoliciesConfig,
        overlay: RetryPoliciesConfig,
    ) -> RetryPoliciesConfig {
        for (key, policy) in overlay.operations {
            base.operations.insert(key, policy);
        }
        base.default = overlay.default;
        base
    }

    /// Apply environment variable overrides to runtime config
    fn apply_env_overrides(mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        if let Some(val) = parse_env::<u64>("KINDER_HTTP_TIMEOUT_MS")? {
            config.network.request_timeout_ms = val;
        }

        if let Ok(val) = env::var("KINDER_HTTP_USER_AGENT") {
            config.network.user_agent = val;
        }

        let policy = &mut config.retry_policies.default;

        if let Some(val) = parse_env::<u32>("KINDER_RETRY_MAX_ATTEMPTS")? {
            policy.max_attempts = val;
        }

        if let Some(val) = parse_env::<u64>("KINDER_RETRY_INITIAL_DELAY_MS")? {
            policy.initial_delay_ms = val;
        }

        if let Some(val) = parse_env::<u64>("KINDER_RETRY_MAX_DELAY_MS")? {
            policy.max_delay_ms = val;
        }

        if let Some(val) = parse_env::<f64>("KINDER_RETRY_BACKOFF_FACTOR")? {
            policy.backoff_factor = val;
        }

        Ok(config)
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} must be a valid number", name))),
        Err(_) => Ok(None),
    }
}
