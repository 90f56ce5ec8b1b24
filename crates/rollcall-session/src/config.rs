use rollcall_core::{LabelDistance, DEFAULT_DISTANCE_THRESHOLD};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Session configuration.
///
/// Base values come from the TOML file named by `ROLLCALL_CONFIG` (if any);
/// `ROLLCALL_*` environment variables override individual fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite key-value database.
    pub db_path: PathBuf,
    /// Maximum Euclidean distance for two descriptors to be the same person.
    pub distance_threshold: f32,
    /// How a label with several references is scored.
    pub label_distance: LabelDistance,
    /// Milliseconds between scan ticks.
    pub scan_interval_ms: u64,
    /// Rebuild the scanner's matcher when a student is added or removed
    /// mid-session. Off keeps the snapshot taken when the scanner was armed.
    pub refresh_on_change: bool,
    /// Frames to discard when the frame source opens.
    pub warmup_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        Self {
            db_path: data_dir.join("rollcall.db"),
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            label_distance: LabelDistance::Nearest,
            scan_interval_ms: 1000,
            refresh_on_change: false,
            warmup_frames: 0,
        }
    }
}

/// Matcher parameters shared by registration and scanning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSettings {
    pub threshold: f32,
    pub policy: LabelDistance,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DISTANCE_THRESHOLD,
            policy: LabelDistance::Nearest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScannerSettings {
    pub matching: MatchSettings,
    pub interval: Duration,
    pub refresh_on_change: bool,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            matching: MatchSettings::default(),
            interval: Duration::from_secs(1),
            refresh_on_change: false,
        }
    }
}

impl Config {
    /// Load the optional config file, then apply `ROLLCALL_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var("ROLLCALL_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        let config = base.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Values that fail to parse are ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup("ROLLCALL_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        override_parsed(&lookup, "ROLLCALL_DISTANCE_THRESHOLD", &mut self.distance_threshold);
        override_parsed(&lookup, "ROLLCALL_LABEL_DISTANCE", &mut self.label_distance);
        override_parsed(&lookup, "ROLLCALL_SCAN_INTERVAL_MS", &mut self.scan_interval_ms);
        override_parsed(&lookup, "ROLLCALL_WARMUP_FRAMES", &mut self.warmup_frames);
        if let Some(v) = lookup("ROLLCALL_REFRESH_ON_CHANGE") {
            self.refresh_on_change = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "distance_threshold must be a non-negative number, got {}",
                self.distance_threshold
            )));
        }
        if self.scan_interval_ms == 0 {
            return Err(ConfigError::Invalid("scan_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            threshold: self.distance_threshold,
            policy: self.label_distance,
        }
    }

    pub fn scanner_settings(&self) -> ScannerSettings {
        ScannerSettings {
            matching: self.match_settings(),
            interval: Duration::from_millis(self.scan_interval_ms),
            refresh_on_change: self.refresh_on_change,
        }
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable override"),
        }
    }
}
