//! Configuration system for Focal.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Main configuration struct for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tracking and diagnostics settings
    pub tracking: TrackingConfig,
    /// Pending-operations barrier settings
    pub barrier: BarrierConfig,
    /// Token estimation settings
    pub tokens: TokenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            barrier: BarrierConfig::default(),
            tokens: TokenConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Maximum persistence failures kept in the diagnostics buffer
    pub max_recorded_errors: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_recorded_errors: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierConfig {
    /// Upper bound on waiting for in-flight persistence, in milliseconds.
    /// On timeout the caller proceeds with a warning; tracking correctness
    /// does not depend on persistence succeeding.
    pub timeout_ms: u64,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Bounded token-count cache capacity
    pub cache_capacity: usize,
    /// Bytes-per-token ratio for code resources
    pub code_bytes_per_token: f64,
    /// Bytes-per-token ratio for documentation resources
    pub documentation_bytes_per_token: f64,
    /// Bytes-per-token ratio for data resources
    pub data_bytes_per_token: f64,
    /// Bytes-per-token ratio for everything else
    pub default_bytes_per_token: f64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            code_bytes_per_token: 3.5,
            documentation_bytes_per_token: 4.0,
            data_bytes_per_token: 5.0,
            default_bytes_per_token: 4.0,
        }
    }
}

/// Validation result with multiple issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty validation result.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error)
    }

    /// Get only error-level issues.
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .collect()
    }

    /// Get only warning-level issues.
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .collect()
    }

    /// Add an error.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue
    pub severity: IssueSeverity,
    /// Field path (e.g., "tokens.cache_capacity")
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        let config_dir = Self::config_dir();

        Figment::new()
            // Default values
            .merge(figment::providers::Serialized::defaults(Config::default()))
            // User config
            .merge(Toml::file(config_dir.join("config.toml")))
            // Project config
            .merge(Toml::file("focal.toml"))
            // Environment variables (FOCAL_TOKENS__CACHE_CAPACITY etc.)
            .merge(Env::prefixed("FOCAL_").split("__"))
            .extract()
    }

    /// Load and validate configuration.
    pub fn load_validated() -> Result<Self, Error> {
        let config = Self::load().map_err(|e| Error::Config(e.to_string()))?;
        let result = config.validate();

        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(Error::Config(format!(
                "configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("config warning - {}: {}", warning.field, warning.message);
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.tokens.cache_capacity == 0 {
            result.add_error("tokens.cache_capacity", "cache_capacity must be greater than 0");
        }

        for (field, ratio) in [
            ("tokens.code_bytes_per_token", self.tokens.code_bytes_per_token),
            (
                "tokens.documentation_bytes_per_token",
                self.tokens.documentation_bytes_per_token,
            ),
            ("tokens.data_bytes_per_token", self.tokens.data_bytes_per_token),
            (
                "tokens.default_bytes_per_token",
                self.tokens.default_bytes_per_token,
            ),
        ] {
            if ratio <= 0.0 {
                result.add_error(field, "bytes-per-token ratio must be positive");
            }
        }

        if self.barrier.timeout_ms == 0 {
            result.add_error("barrier.timeout_ms", "timeout_ms must be greater than 0");
        }

        if self.barrier.timeout_ms > 120_000 {
            result.add_warning(
                "barrier.timeout_ms",
                "timeout above two minutes can stall prioritization under storage outages",
            );
        }

        if self.tracking.max_recorded_errors == 0 {
            result.add_warning(
                "tracking.max_recorded_errors",
                "a zero-size diagnostics buffer discards all persistence failures",
            );
        }

        result
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("focal"))
            .unwrap_or_else(|| PathBuf::from("~/.config/focal"))
    }

    /// Get the data directory (for the resource database).
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|p| p.join("focal"))
            .unwrap_or_else(|| PathBuf::from("~/.local/share/focal"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_ok(), "default config should be valid: {:?}", result.issues);
    }

    #[test]
    fn test_zero_cache_capacity_is_error() {
        let mut config = Config::default();
        config.tokens.cache_capacity = 0;
        let result = config.validate();
        assert!(!result.is_ok());
        assert!(result.errors().iter().any(|e| e.field == "tokens.cache_capacity"));
    }

    #[test]
    fn test_negative_ratio_is_error() {
        let mut config = Config::default();
        config.tokens.data_bytes_per_token = -1.0;
        let result = config.validate();
        assert!(!result.is_ok());
        assert!(result
            .errors()
            .iter()
            .any(|e| e.field == "tokens.data_bytes_per_token"));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.barrier.timeout_ms = 0;
        let result = config.validate();
        assert!(!result.is_ok());
    }

    #[test]
    fn test_long_timeout_is_warning() {
        let mut config = Config::default();
        config.barrier.timeout_ms = 300_000;
        let result = config.validate();
        assert!(result.is_ok()); // Warnings don't fail validation
        assert!(result.warnings().iter().any(|e| e.field == "barrier.timeout_ms"));
    }
}
