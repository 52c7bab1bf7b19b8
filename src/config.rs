use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::assembler::{BatchConfig, TolerancePolicy};
use crate::coinbase::rest::{COINBASE_REST_URL, COINBASE_SANDBOX_REST_URL};
use crate::error::AppError;
use crate::rate_limit::{EndpointClass, RateLimit, RateLimiter};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const REST_URL_ENV: &str = "CANDLE_BATCH_REST_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub coinbase: CoinbaseConfig,
    pub batch: BatchSettings,
    pub rate_limits: RateLimitsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoinbaseConfig {
    /// Overrides the live/sandbox URL when set.
    pub rest_base_url: Option<String>,
    pub sandbox: bool,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub max_samples_per_request: u32,
    pub failure_tolerance: u32,
    pub tolerance_policy: TolerancePolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitsConfig {
    pub public: RateLimitConfig,
    pub private: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub pause_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for CoinbaseConfig {
    fn default() -> Self {
        Self {
            rest_base_url: None,
            sandbox: false,
            timeout_ms: 10_000,
        }
    }
}

impl CoinbaseConfig {
    pub fn rest_base_url(&self) -> &str {
        match &self.rest_base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.sandbox => COINBASE_SANDBOX_REST_URL,
            None => COINBASE_REST_URL,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        let defaults = BatchConfig::default();
        Self {
            max_samples_per_request: defaults.max_samples_per_request,
            failure_tolerance: defaults.failure_tolerance,
            tolerance_policy: defaults.tolerance_policy,
        }
    }
}

impl BatchSettings {
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_samples_per_request: self.max_samples_per_request,
            failure_tolerance: self.failure_tolerance,
            tolerance_policy: self.tolerance_policy,
        }
    }
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            public: RateLimitConfig {
                limit: 3,
                pause_ms: 500,
            },
            private: RateLimitConfig {
                limit: 5,
                pause_ms: 500,
            },
        }
    }
}

impl RateLimitsConfig {
    pub fn limiter(&self) -> RateLimiter {
        RateLimiter::new([
            (EndpointClass::Public, self.public.rate_limit()),
            (EndpointClass::Private, self.private.rate_limit()),
        ])
    }
}

impl RateLimitConfig {
    pub fn rate_limit(&self) -> RateLimit {
        RateLimit::new(self.limit, Duration::from_millis(self.pause_ms))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load `config/default.toml` when present, defaults otherwise.
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            return Self::load_from(path);
        }
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env();
        config.validate().context("default config is invalid")?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        config.apply_env();
        config
            .validate()
            .with_context(|| format!("invalid settings in {}", path.display()))?;

        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(REST_URL_ENV) {
            if !url.trim().is_empty() {
                self.coinbase.rest_base_url = Some(url.trim().to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        url::Url::parse(self.coinbase.rest_base_url())
            .map_err(|e| AppError::Config(format!("coinbase.rest_base_url: {}", e)))?;
        if self.batch.max_samples_per_request == 0 {
            return Err(AppError::Config(
                "batch.max_samples_per_request must be > 0".to_string(),
            ));
        }
        for (class, limit) in [
            (EndpointClass::Public, self.rate_limits.public),
            (EndpointClass::Private, self.rate_limits.private),
        ] {
            if limit.limit == 0 {
                return Err(AppError::Config(format!(
                    "rate_limits.{}.limit must be > 0",
                    class
                )));
            }
        }
        Ok(())
    }
}
