use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Analyzer thresholds.
    pub analysis: AnalysisConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub path: PathBuf,
    /// Pool size.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Thresholds used by the analyzers.
///
/// The KCC mapping and substitution rules are data tables in storage; only the
/// scalar thresholds live here.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Smallest absolute leader/employee gap rated `moderate`.
    pub moderate_gap: f64,
    /// Smallest absolute leader/employee gap rated `critical`.
    pub critical_gap: f64,
    /// Leader self scores below this (direction-adjusted) are blockers.
    pub blocker_threshold: f64,
    /// Memoize gated field scores per assessment response count.
    pub cache_enabled: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            moderate_gap: 0.5,
            critical_gap: 1.0,
            blocker_threshold: 2.5,
            cache_enabled: true,
        }
    }
}

impl AnalysisConfig {
    /// Check threshold consistency.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.moderate_gap.is_finite() || self.moderate_gap < 0.0 {
            return Err(AppError::Config {
                message: format!(
                    "ANALYSIS_MODERATE_GAP must be a non-negative number, got {}",
                    self.moderate_gap
                ),
            });
        }
        if !self.critical_gap.is_finite() || self.critical_gap < self.moderate_gap {
            return Err(AppError::Config {
                message: format!(
                    "ANALYSIS_CRITICAL_GAP ({}) must be >= ANALYSIS_MODERATE_GAP ({})",
                    self.critical_gap, self.moderate_gap
                ),
            });
        }
        if !(1.0..=5.0).contains(&self.blocker_threshold) {
            return Err(AppError::Config {
                message: format!(
                    "ANALYSIS_BLOCKER_THRESHOLD must be within 1..=5, got {}",
                    self.blocker_threshold
                ),
            });
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/friction.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = AnalysisConfig::default();
        let analysis = AnalysisConfig {
            moderate_gap: parse_f64("ANALYSIS_MODERATE_GAP")?.unwrap_or(defaults.moderate_gap),
            critical_gap: parse_f64("ANALYSIS_CRITICAL_GAP")?.unwrap_or(defaults.critical_gap),
            blocker_threshold: parse_f64("ANALYSIS_BLOCKER_THRESHOLD")?
                .unwrap_or(defaults.blocker_threshold),
            cache_enabled: env::var("ANALYSIS_CACHE_ENABLED")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(defaults.cache_enabled),
        };
        analysis.validate()?;

        Ok(Config {
            database,
            logging,
            analysis,
        })
    }
}

/// Unset keys yield `None`; unparsable values are errors.
fn parse_f64(key: &str) -> Result<Option<f64>, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::Config {
                message: format!("{} must be a number, got '{}'", key, raw),
            }),
        Err(_) => Ok(None),
    }
}
