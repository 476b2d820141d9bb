//! Configuration loading and resolution
//!
//! Config file location priority:
//! 1. Command-line argument (highest priority)
//! 2. `HMZ_CONFIG` environment variable
//! 3. `<config_dir>/hmz/hmz-api.toml` if it exists
//! 4. Compiled defaults (fallback)
//!
//! Individual environment variables override values read from the file.

use crate::tier::Tier;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "HMZ_CONFIG";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub quota: QuotaConfig,
    pub billing: BillingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, `host:port`
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:5740".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path() }
    }
}

/// OpenAI-compatible chat completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub rewrite_model: String,
    pub scoring_model: String,
    /// Timeout for non-streaming calls (scoring, plain rewrite)
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            rewrite_model: "llama3-8b-8192".to_string(),
            scoring_model: "llama3-8b-8192".to_string(),
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// API key, if one is configured and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| is_valid_key(k))
    }
}

/// What admission does when the monthly usage query fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UsageLookupFailure {
    /// Refuse the request with 503
    #[default]
    Reject,
    /// Treat usage as zero and admit
    AssumeZero,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub usage_lookup_failure: UsageLookupFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Shared secret for payment webhook signatures; unset disables checking
    pub webhook_secret: Option<String>,
    /// Customer portal URL
    pub portal_url: Option<String>,
    /// Checkout URL per plan name
    pub checkout_urls: BTreeMap<String, String>,
    /// Payment plan identifier to tier
    pub plan_tiers: BTreeMap<String, Tier>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        let plan_tiers = [
            ("polar_basic", Tier::Basic),
            ("polar_pro", Tier::Pro),
            ("polar_premium", Tier::Premium),
        ]
        .into_iter()
        .map(|(plan, tier)| (plan.to_string(), tier))
        .collect();

        Self {
            webhook_secret: None,
            portal_url: None,
            checkout_urls: BTreeMap::new(),
            plan_tiers,
        }
    }
}

impl BillingConfig {
    /// Tier granted by a payment plan; unknown plans grant `Free`
    pub fn tier_for_plan(&self, plan_id: &str) -> Tier {
        self.plan_tiers.get(plan_id).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl ServiceConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load from the resolved path, falling back to defaults
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(path)
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply `HMZ_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        let api_key = std::env::var("HMZ_LLM_API_KEY")
            .ok()
            .filter(|k| is_valid_key(k))
            .or_else(|| std::env::var("GROQ_API_KEY").ok().filter(|k| is_valid_key(k)));
        if let Some(key) = api_key {
            if self.llm.api_key().is_some() {
                warn!("LLM API key set in both config file and environment, using environment");
            }
            self.llm.api_key = Some(key);
        }

        if let Ok(path) = std::env::var("HMZ_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Ok(bind) = std::env::var("HMZ_BIND") {
            self.server.bind = bind;
        }
    }
}

/// Resolve which config file to read
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Per-user config file, only if present
    default_config_path().filter(|p| p.exists())
}

/// `<config_dir>/hmz/hmz-api.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hmz").join("hmz-api.toml"))
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("hmz"))
        .unwrap_or_else(|| PathBuf::from("./hmz_data"))
        .join("hmz.db")
}

/// Validate an API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
