use crate::service::Settings;
use chrono::FixedOffset;
use scanface_core::civil::{fixed_offset, DEFAULT_UTC_OFFSET_HOURS};
use scanface_core::DEFAULT_TOLERANCE;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("SCANFACE_UTC_OFFSET_HOURS={0} is outside -23..=23")]
    InvalidOffset(i32),
    #[error("SCANFACE_TOLERANCE={0} must be a finite, non-negative distance")]
    InvalidTolerance(f32),
}

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Maximum Euclidean distance for a positive match.
    pub tolerance: f32,
    /// Civil offset used for day boundaries and recorded timestamps.
    pub utc_offset: FixedOffset,
    /// Dimensionality of encodings produced by the face encoder.
    pub encoding_dim: usize,
    /// Class name used when a scan does not name one.
    pub default_class: String,
    /// Webhook receiving attendance notifications. Unset disables delivery.
    pub webhook_url: Option<String>,
    /// Request timeout for webhook delivery.
    pub webhook_timeout: Duration,
}

impl Config {
    /// Load configuration from `SCANFACE_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("scanface");

        let db_path = lookup("SCANFACE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("attendance.db"));

        let offset_hours = parse_or(&lookup, "SCANFACE_UTC_OFFSET_HOURS", DEFAULT_UTC_OFFSET_HOURS);
        let utc_offset = fixed_offset(offset_hours).ok_or(ConfigError::InvalidOffset(offset_hours))?;

        let tolerance = parse_or(&lookup, "SCANFACE_TOLERANCE", DEFAULT_TOLERANCE);
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(tolerance));
        }

        Ok(Self {
            db_path,
            tolerance,
            utc_offset,
            encoding_dim: parse_or(&lookup, "SCANFACE_ENCODING_DIM", 128),
            default_class: lookup("SCANFACE_DEFAULT_CLASS")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "General".to_string()),
            webhook_url: lookup("SCANFACE_WEBHOOK_URL").filter(|v| !v.trim().is_empty()),
            webhook_timeout: Duration::from_secs(parse_or(
                &lookup,
                "SCANFACE_WEBHOOK_TIMEOUT_SECS",
                5,
            )),
        })
    }

    /// Matching and calendar settings for the service.
    pub fn settings(&self) -> Settings {
        Settings {
            tolerance: self.tolerance,
            utc_offset: self.utc_offset,
            encoding_dim: self.encoding_dim,
            default_class: self.default_class.clone(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
