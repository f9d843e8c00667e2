//! Configuration file loading and resolution.
//!
//! Loads configuration from:
//! - Linux: `~/.config/bimcost/config.toml`
//! - macOS: `~/Library/Application Support/com.bimcost.bimcost/config.toml`
//! - Windows: `%APPDATA%/bimcost/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags (where a flag exists)
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! The resolved [`AppConfig`] is built once at startup and handed by
//! reference to every component; nothing reads the environment afterwards.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::core::provider::{AiProvider, ProviderCredentials, ProviderTable};
use crate::core::rates::RateTable;
use crate::error::{BimcostError, Result};
use crate::forge::auth::ForgeCredentials;
use crate::forge::translation::PollPolicy;
use crate::forge::upload::UploadPolicy;

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Forge application client id.
pub const ENV_FORGE_CLIENT_ID: &str = "FORGE_CLIENT_ID";
/// Forge application client secret.
pub const ENV_FORGE_CLIENT_SECRET: &str = "FORGE_CLIENT_SECRET";
/// Forge bucket key override.
pub const ENV_FORGE_BUCKET: &str = "FORGE_BUCKET";
/// Forge API base URL override.
pub const ENV_FORGE_BASE_URL: &str = "FORGE_BASE_URL";
/// xAI API key.
pub const ENV_XAI_API_KEY: &str = "XAI_API_KEY";
/// OpenAI API key.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// xAI API base URL override.
pub const ENV_XAI_BASE_URL: &str = "XAI_BASE_URL";
/// OpenAI API base URL override.
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
/// Server bind address.
pub const ENV_BIND: &str = "BIMCOST_BIND";
/// Override config file path.
pub const ENV_CONFIG: &str = "BIMCOST_CONFIG";

/// Bytes in one MiB.
const MIB: u64 = 1024 * 1024;

/// Largest upload ceiling the validating path accepts.
pub const MAX_UPLOAD_MIB: u64 = 500;

/// Largest part size the signed-URL upload accepts.
pub const MAX_CHUNK_MIB: u64 = 100;

// =============================================================================
// Config Sources
// =============================================================================

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default (or absent).
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Tracks the source of each credential and the bind address.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub forge: ConfigSource,
    pub xai: ConfigSource,
    pub openai: ConfigSource,
    pub bind: ConfigSource,
}

// =============================================================================
// File Configuration
// =============================================================================

/// Application configuration as stored in `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Forge (translation service) settings.
    pub forge: ForgeConfig,
    /// AI provider settings.
    pub ai: AiConfig,
    /// Unit-cost rate overrides.
    pub rates: RatesConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the API server to.
    pub bind: String,
    /// Upload ceiling for the validating path, in MiB.
    pub max_upload_mib: u64,
}

/// Forge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Bucket key; derived from the client id when unset.
    pub bucket_key: Option<String>,
    /// Preferred chunk size for signed part uploads, in MiB.
    pub chunk_size_mib: u64,
    /// Fixed interval between status polls, in seconds.
    pub poll_interval_secs: u64,
    /// Poll attempts before a job is reported as timed out.
    pub max_poll_attempts: u32,
}

/// AI provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub xai_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub xai_base_url: String,
    pub openai_base_url: String,
    pub xai_text_model: String,
    pub xai_vision_model: String,
    pub openai_text_model: String,
    pub openai_vision_model: String,
    /// Upper bound for a single provider call, in seconds.
    pub timeout_secs: u64,
}

/// Rate table overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Rate applied to unrecognized categories.
    pub default_rate: Option<f64>,
    /// Category name to unit cost.
    pub categories: BTreeMap<String, f64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            max_upload_mib: 500,
        }
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            base_url: "https://developer.api.autodesk.com".to_string(),
            bucket_key: None,
            chunk_size_mib: 20,
            poll_interval_secs: 30,
            max_poll_attempts: 60,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            xai_api_key: None,
            openai_api_key: None,
            xai_base_url: AiProvider::Xai.default_base_url().to_string(),
            openai_base_url: AiProvider::OpenAi.default_base_url().to_string(),
            xai_text_model: "grok-2-1212".to_string(),
            xai_vision_model: "grok-2-vision-1212".to_string(),
            openai_text_model: "gpt-4o".to_string(),
            openai_vision_model: "gpt-4o".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().config_file())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| BimcostError::Config(format!("Invalid config file: {e}")))
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| BimcostError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, value: impl ToString, message: &str) -> BimcostError {
            BimcostError::ConfigInvalid {
                key: key.to_string(),
                value: value.to_string(),
                message: message.to_string(),
            }
        }

        if self.server.max_upload_mib == 0 || self.server.max_upload_mib > MAX_UPLOAD_MIB {
            return Err(invalid(
                "server.max_upload_mib",
                self.server.max_upload_mib,
                "must be between 1 and 500",
            ));
        }
        if self.forge.chunk_size_mib < 5 || self.forge.chunk_size_mib > MAX_CHUNK_MIB {
            return Err(invalid(
                "forge.chunk_size_mib",
                self.forge.chunk_size_mib,
                "signed part uploads need between 5 and 100 MiB per part",
            ));
        }
        if self.forge.poll_interval_secs == 0 {
            return Err(invalid(
                "forge.poll_interval_secs",
                self.forge.poll_interval_secs,
                "must be at least 1 second",
            ));
        }
        if self.forge.max_poll_attempts == 0 {
            return Err(invalid(
                "forge.max_poll_attempts",
                self.forge.max_poll_attempts,
                "must be at least 1",
            ));
        }
        if self.ai.timeout_secs == 0 || self.ai.timeout_secs > 300 {
            return Err(invalid(
                "ai.timeout_secs",
                self.ai.timeout_secs,
                "must be between 1 and 300 seconds",
            ));
        }
        if let Some(rate) = self.rates.default_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(invalid("rates.default_rate", rate, "must be a non-negative number"));
            }
        }
        for (category, rate) in &self.rates.categories {
            if !rate.is_finite() || *rate < 0.0 {
                return Err(invalid(
                    &format!("rates.categories.{category}"),
                    rate,
                    "must be a non-negative number",
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Merged settings.
    pub config: Config,
    /// Source of each credential for diagnostics.
    pub sources: ConfigSources,
}

impl AppConfig {
    /// Resolve from the process environment and the config file it points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is invalid, or any
    /// merged value fails validation.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`AppConfig::load`], with an explicit config file taking
    /// precedence over `BIMCOST_CONFIG`.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::load`].
    pub fn load_with(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path.map_or_else(
            || {
                std::env::var(ENV_CONFIG)
                    .ok()
                    .filter(|p| !p.trim().is_empty())
                    .map_or_else(|| AppPaths::new().config_file(), Into::into)
            },
            Path::to_path_buf,
        );
        let config = Config::load_from(&path)?;
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Merge environment values (through `env`) over a loaded config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged configuration is invalid.
    pub fn resolve(mut config: Config, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| {
            env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut sources = ConfigSources::default();

        let file_forge = config.forge.client_id.is_some() && config.forge.client_secret.is_some();
        if let Some(id) = lookup(ENV_FORGE_CLIENT_ID) {
            config.forge.client_id = Some(id);
        }
        if let Some(secret) = lookup(ENV_FORGE_CLIENT_SECRET) {
            config.forge.client_secret = Some(secret);
        }
        if lookup(ENV_FORGE_CLIENT_ID).is_some() || lookup(ENV_FORGE_CLIENT_SECRET).is_some() {
            sources.forge = ConfigSource::Env;
        } else if file_forge {
            sources.forge = ConfigSource::ConfigFile;
        }
        if let Some(bucket) = lookup(ENV_FORGE_BUCKET) {
            config.forge.bucket_key = Some(bucket);
        }
        if let Some(url) = lookup(ENV_FORGE_BASE_URL) {
            config.forge.base_url = url;
        }

        sources.xai = merge_secret(&mut config.ai.xai_api_key, lookup(ENV_XAI_API_KEY));
        sources.openai = merge_secret(&mut config.ai.openai_api_key, lookup(ENV_OPENAI_API_KEY));
        if let Some(url) = lookup(ENV_XAI_BASE_URL) {
            config.ai.xai_base_url = url;
        }
        if let Some(url) = lookup(ENV_OPENAI_BASE_URL) {
            config.ai.openai_base_url = url;
        }

        if let Some(bind) = lookup(ENV_BIND) {
            config.server.bind = bind;
            sources.bind = ConfigSource::Env;
        }

        config.validate()?;
        Ok(Self { config, sources })
    }

    /// Override the bind address from a CLI flag.
    pub fn set_bind(&mut self, bind: String) {
        self.config.server.bind = bind;
        self.sources.bind = ConfigSource::Cli;
    }

    /// Forge client credentials, if both halves are configured.
    #[must_use]
    pub fn forge_credentials(&self) -> Option<ForgeCredentials> {
        let id = non_empty(self.config.forge.client_id.as_deref())?;
        let secret = non_empty(self.config.forge.client_secret.as_deref())?;
        Some(ForgeCredentials::new(id, secret))
    }

    /// Bucket key: configured value, or one derived from the client id.
    #[must_use]
    pub fn bucket_key(&self) -> String {
        if let Some(key) = non_empty(self.config.forge.bucket_key.as_deref()) {
            return key.to_lowercase();
        }
        let suffix: String = self
            .config
            .forge
            .client_id
            .as_deref()
            .unwrap_or("local")
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(16)
            .collect::<String>()
            .to_lowercase();
        format!("bimcost-{suffix}")
    }

    /// Upload policy for the validating path.
    #[must_use]
    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::new(self.config.server.max_upload_mib.saturating_mul(MIB))
    }

    /// Preferred chunk size for part uploads, in bytes.
    #[must_use]
    pub const fn chunk_size(&self) -> u64 {
        self.config.forge.chunk_size_mib.saturating_mul(MIB)
    }

    /// Poll interval and attempt ceiling for the job tracker.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.config.forge.poll_interval_secs),
            self.config.forge.max_poll_attempts,
        )
    }

    /// Per-call AI provider timeout.
    #[must_use]
    pub const fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.config.ai.timeout_secs)
    }

    /// Rate table with file overrides applied.
    #[must_use]
    pub fn rate_table(&self) -> RateTable {
        RateTable::builtin().with_overrides(&self.config.rates.categories, self.config.rates.default_rate)
    }

    /// Capability table resolved from configured credentials.
    #[must_use]
    pub fn provider_table(&self) -> ProviderTable {
        let ai = &self.config.ai;
        ProviderTable::resolve(&[
            ProviderCredentials {
                provider: AiProvider::Xai,
                api_key: non_empty(ai.xai_api_key.as_deref()).map(str::to_string),
                base_url: ai.xai_base_url.clone(),
                text_model: ai.xai_text_model.clone(),
                vision_model: ai.xai_vision_model.clone(),
            },
            ProviderCredentials {
                provider: AiProvider::OpenAi,
                api_key: non_empty(ai.openai_api_key.as_deref()).map(str::to_string),
                base_url: ai.openai_base_url.clone(),
                text_model: ai.openai_text_model.clone(),
                vision_model: ai.openai_vision_model.clone(),
            },
        ])
    }
}

fn merge_secret(slot: &mut Option<String>, from_env: Option<String>) -> ConfigSource {
    if let Some(value) = from_env {
        *slot = Some(value);
        ConfigSource::Env
    } else if non_empty(slot.as_deref()).is_some() {
        ConfigSource::ConfigFile
    } else {
        ConfigSource::Default
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
