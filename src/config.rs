use config::{Config as ConfigLoader, Environment, File};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::fee::FeeRule;
use crate::logging::LoggingConfig;
use crate::money::{self, Amount, Currency};

/// Prefix for environment overrides, e.g. `ALASKAPAY_BACKEND__BASE_URL`
pub const ENV_PREFIX: &str = "ALASKAPAY";

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL of the backend, e.g. `https://project.example.co`
    pub base_url: String,
    /// Public (anon) API key sent with every request
    pub api_key: String,
    /// Upper bound for a single remote call
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:54321".to_string(),
            api_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Fee rules per transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub bill_payment: FeeRule,
    pub withdrawal: FeeRule,
    pub wallet_transfer: FeeRule,
    pub bank_transfer: FeeRule,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            bill_payment: FeeRule::default(),
            withdrawal: FeeRule::flat(Amount::from_major(50)),
            wallet_transfer: FeeRule::default(),
            bank_transfer: FeeRule::flat(Amount::from_major(10)),
        }
    }
}

/// Transaction flow settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub currency: Currency,
    /// Totals strictly above this need step-up confirmation
    #[serde(with = "money::major_units")]
    pub step_up_threshold: Amount,
    pub fees: FeeSchedule,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            currency: Currency::Ngn,
            step_up_threshold: Amount::from_major(500),
            fees: FeeSchedule::default(),
        }
    }
}

/// Bank transfer confirmation polling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Wait before the first verification
    pub initial_delay_ms: u64,
    /// Cap on the wait between verifications
    pub max_delay_ms: u64,
    /// Growth factor applied to the wait after each pending result
    pub multiplier: u32,
    /// Verification calls before giving up
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            max_delay_ms: 16_000,
            multiplier: 2,
            max_attempts: 5,
        }
    }
}

impl PollingConfig {
    /// Wait before each verification attempt, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let max = self.max_delay_ms.max(self.initial_delay_ms);
        let multiplier = u64::from(self.multiplier.max(1));
        let mut next = self.initial_delay_ms;
        (0..self.max_attempts).map(move |_| {
            let current = next;
            next = next.saturating_mul(multiplier).min(max);
            Duration::from_millis(current)
        })
    }

    /// Worst-case time spent waiting before giving up
    pub fn total_wait(&self) -> Duration {
        self.delays().sum()
    }
}

/// Complete SDK configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SdkConfig {
    pub backend: BackendConfig,
    pub flow: FlowConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

impl SdkConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        let config: SdkConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Create directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Layer defaults, an optional file, and `ALASKAPAY_*` environment variables
    pub fn from_sources(path: Option<&Path>) -> Result<Self, Error> {
        let defaults = ConfigLoader::try_from(&SdkConfig::default())
            .map_err(|e| Error::Config(format!("Failed to build defaults: {}", e)))?;

        let mut builder = ConfigLoader::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: SdkConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(format!("Failed to load config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("alaskapay");
        path.push("config.toml");
        path
    }

    /// Reject settings no flow can run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.backend.base_url.trim().is_empty() {
            return Err(Error::Config("backend.base_url must be set".to_string()));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(Error::Config(
                "backend.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.polling.max_attempts == 0 {
            return Err(Error::Config(
                "polling.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.flow.step_up_threshold.is_negative() {
            return Err(Error::Config(
                "flow.step_up_threshold must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
