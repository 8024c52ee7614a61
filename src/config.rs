//! Configuration management for the address analyzer.
//!
//! Supports loading from environment variables, a TOML config file, and CLI
//! overrides. Environment variables always win over file settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Blockchain.info API code (optional; requests work unauthenticated at
    /// a lower rate limit)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL for the ledger-query API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Rate limiting and retry configuration
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Fetch bounds
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Output paths
    #[serde(default)]
    pub paths: PathConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum delay between requests to the API (ms)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Delay between finishing one address and starting the next (ms)
    #[serde(default = "default_inter_address_delay_ms")]
    pub inter_address_delay_ms: u64,

    /// Maximum retry attempts per request on transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ceiling for the exponential backoff delay (seconds)
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            inter_address_delay_ms: default_inter_address_delay_ms(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn inter_address_delay(&self) -> Duration {
        Duration::from_millis(self.inter_address_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum transactions to retrieve per address
    #[serde(default = "default_max_transactions")]
    pub max_transactions: usize,

    /// Transactions requested per page (the API caps `limit` at 100)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_transactions: default_max_transactions(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Directory for result files and run metadata
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://blockchain.info".to_string()
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_inter_address_delay_ms() -> u64 {
    3000
}

fn default_max_retries() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_max_transactions() -> usize {
    1000
}

fn default_page_size() -> usize {
    100
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            rate_limits: RateLimitConfig::default(),
            fetch: FetchConfig::default(),
            paths: PathConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from the environment.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML config file with environment overrides.
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("BLOCKCHAIN_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("BLOCKCHAIN_BASE_URL") {
            self.base_url = url;
        }
    }

    /// Validate configuration bounds.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("base_url must not be empty");
        }
        if self.rate_limits.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be > 0");
        }
        if self.fetch.max_transactions == 0 {
            anyhow::bail!("max_transactions must be > 0");
        }
        if self.fetch.page_size == 0 || self.fetch.page_size > 100 {
            anyhow::bail!("page_size must be between 1 and 100");
        }
        if self.rate_limits.max_backoff() < self.rate_limits.base_delay() {
            anyhow::bail!("max_backoff_secs must be at least base_delay_ms");
        }
        Ok(())
    }

    /// Ensure the output directory exists.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.paths.output_dir)?;
        Ok(())
    }
}
