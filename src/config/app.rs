//! Main application configuration
//!
//! This module defines the primary configuration structures for the matchday
//! service, including environment variable and TOML file loading and validation.

use crate::config::{BalanceConfig, RatingConfig, SuggestionSettings};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub balance: BalanceConfig,
    pub rating: RatingConfig,
    pub suggestion: SuggestionSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "matchday".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Parse an optional environment variable, naming it in the error
fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still override it
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(port) = env_parse("HEALTH_PORT")? {
            self.service.health_port = port;
        }
        if let Some(timeout) = env_parse("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // Balance settings
        if let Some(iterations) = env_parse("BALANCE_MAX_SWAP_ITERATIONS")? {
            self.balance.max_swap_iterations = iterations;
        }
        if let Some(min) = env_parse("BALANCE_MIN_THRESHOLD")? {
            self.balance.min_threshold = min;
        }
        if let Some(ratio) = env_parse("BALANCE_THRESHOLD_RATIO")? {
            self.balance.threshold_ratio = ratio;
        }
        if let Some(shuffle) = env_parse("BALANCE_SHUFFLE")? {
            self.balance.shuffle_before_partition = shuffle;
        }

        // Rating settings
        if let Some(default_rating) = env_parse("RATING_DEFAULT")? {
            self.rating.default_rating = default_rating;
        }
        if let Some(floor) = env_parse("RATING_FLOOR")? {
            self.rating.rating_floor = floor;
        }
        if let Some(max_delta) = env_parse("RATING_MAX_DELTA")? {
            self.rating.max_delta = max_delta;
        }

        // Suggestion settings
        if let Some(enabled) = env_parse("SUGGESTION_ENABLED")? {
            self.suggestion.enabled = enabled;
        }
        if let Ok(endpoint) = env::var("SUGGESTION_ENDPOINT") {
            self.suggestion.endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
        }
        if let Ok(api_key) = env::var("SUGGESTION_API_KEY") {
            self.suggestion.api_key = Some(api_key).filter(|k| !k.trim().is_empty());
        }
        if let Some(timeout) = env_parse("SUGGESTION_TIMEOUT_MS")? {
            self.suggestion.timeout_ms = timeout;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get suggestion call timeout as Duration
    pub fn suggestion_timeout(&self) -> Duration {
        self.suggestion.timeout()
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Balance settings
    if config.balance.min_threshold < 0.0 {
        return Err(anyhow!("Balance minimum threshold cannot be negative"));
    }
    if !(0.0..=1.0).contains(&config.balance.threshold_ratio) {
        return Err(anyhow!("Balance threshold ratio must be within [0, 1]"));
    }

    // Rating settings
    let rating = &config.rating;
    if rating.rating_floor > rating.default_rating {
        return Err(anyhow!(
            "Rating floor ({}) cannot exceed the default rating ({})",
            rating.rating_floor,
            rating.default_rating
        ));
    }
    if rating.low_tier_multiplier <= 0.0 || rating.high_tier_multiplier <= 0.0 {
        return Err(anyhow!("Tier multipliers must be positive"));
    }
    if rating.low_tier_below > rating.high_tier_above {
        return Err(anyhow!("Low tier bound cannot exceed the high tier bound"));
    }
    if rating.feedback_cap < 0 || rating.max_delta < 0 || rating.vote_weight < 0 {
        return Err(anyhow!("Rating caps and vote weight cannot be negative"));
    }

    // Suggestion settings
    if config.suggestion.enabled && config.suggestion.endpoint.is_none() {
        return Err(anyhow!("Suggestion provider enabled without an endpoint"));
    }
    if config.suggestion.timeout_ms == 0 {
        return Err(anyhow!("Suggestion timeout must be greater than 0"));
    }

    Ok(())
}
