// Configuration loading and parsing (config/settings.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::metrics::metric::Metric;
use crate::metrics::season::Scale;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire settings.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    data: DataConfig,
    cache: CacheConfig,
    leaderboard: LeaderboardConfig,
    rolling: RollingConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data: DataConfig,
    pub cache: CacheConfig,
    pub leaderboard: LeaderboardConfig,
    pub rolling: RollingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Base URL of the dataset host; season files live directly beneath it.
    pub base_url: String,
    /// Season year to load at startup.
    pub season: u16,
    /// Month partitions to fetch (the season runs March through October).
    #[serde(default = "default_months")]
    pub months: Vec<u8>,
    #[serde(default = "default_run_constants_file")]
    pub run_constants_file: String,
    #[serde(default = "default_date_map_file")]
    pub date_map_file: String,
}

fn default_months() -> Vec<u8> {
    (3..=10).collect()
}

fn default_run_constants_file() -> String {
    "plv_seasonal_constants.csv".to_string()
}

fn default_date_map_file() -> String {
    "date_pitch_map.csv".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long a loaded season stays fresh before the next request
    /// re-fetches it.
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardConfig {
    /// Minimum pitches faced for a batter to appear in the season table.
    pub min_pitches: usize,
    pub scale: Scale,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollingConfig {
    /// Batter whose rolling series the binary reports.
    pub player: String,
    pub metric: Metric,
    /// Rolling window in the metric's denomination units.
    pub window: usize,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Smallest accepted rolling window.
pub const MIN_WINDOW: usize = 25;
/// Accepted bounds for the leaderboard pitch threshold.
pub const MIN_PITCH_THRESHOLD: usize = 100;
pub const MAX_PITCH_THRESHOLD: usize = 2000;

/// Load and validate configuration from `config/settings.toml` relative to
/// the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy
/// defaults. Prefer `load_config()` which handles default initialization.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let settings_path = base_dir.join("config").join("settings.toml");
    let settings_text = read_file(&settings_path)?;
    let settings: SettingsFile =
        toml::from_str(&settings_text).map_err(|e| ConfigError::ParseError {
            path: settings_path.clone(),
            source: e,
        })?;

    let config = Config {
        data: settings.data,
        cache: settings.cache,
        leaderboard: settings.leaderboard,
        rolling: settings.rolling,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure `config/settings.toml` exists by copying it from `defaults/` when
/// missing. Returns whether a copy was made.
pub fn ensure_config_files(base_dir: &Path) -> Result<bool, ConfigError> {
    let config_path = base_dir.join("config").join("settings.toml");
    if config_path.exists() {
        return Ok(false);
    }

    let defaults_path = base_dir.join("defaults").join("settings.toml");
    if !defaults_path.exists() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!("defaults file missing: {}", defaults_path.display()),
        });
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {}", parent.display(), e),
        })?;
    }
    std::fs::copy(&defaults_path, &config_path).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!(
            "failed to copy {} to {}: {}",
            defaults_path.display(),
            config_path.display(),
            e
        ),
    })?;
    Ok(true)
}

/// Load configuration from the current working directory, initializing
/// `config/` from `defaults/` on first run.
pub fn load_config() -> Result<Config, ConfigError> {
    let base_dir = std::env::current_dir().map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("cannot determine working directory: {}", e),
    })?;
    ensure_config_files(&base_dir)?;
    load_config_from(&base_dir)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.data.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data.base_url".into(),
            message: "must not be empty".into(),
        });
    }
    if config.data.months.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data.months".into(),
            message: "at least one month partition is required".into(),
        });
    }
    if let Some(bad) = config.data.months.iter().find(|m| !(3..=10).contains(*m)) {
        return Err(ConfigError::ValidationError {
            field: "data.months".into(),
            message: format!("month {} outside the March-October season", bad),
        });
    }
    if config.cache.ttl_seconds == 0 {
        return Err(ConfigError::ValidationError {
            field: "cache.ttl_seconds".into(),
            message: "must be positive".into(),
        });
    }
    if !(MIN_PITCH_THRESHOLD..=MAX_PITCH_THRESHOLD).contains(&config.leaderboard.min_pitches) {
        return Err(ConfigError::ValidationError {
            field: "leaderboard.min_pitches".into(),
            message: format!(
                "must be between {} and {}",
                MIN_PITCH_THRESHOLD, MAX_PITCH_THRESHOLD
            ),
        });
    }
    if config.rolling.window < MIN_WINDOW {
        return Err(ConfigError::ValidationError {
            field: "rolling.window".into(),
            message: format!("must be at least {}", MIN_WINDOW),
        });
    }
    if config.rolling.player.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "rolling.player".into(),
            message: "must not be empty".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_toml() -> &'static str {
        r#"
[data]
base_url = "https://example.com/plv-data"
season = 2023

[cache]
ttl_seconds = 7200

[leaderboard]
min_pitches = 500
scale = "plus"

[rolling]
player = "Juan Soto"
metric = "decision-value"
window = 400
"#
    }

    fn parse(text: &str) -> Result<Config, ConfigError> {
        let settings: SettingsFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("settings.toml"),
            source: e,
        })?;
        let config = Config {
            data: settings.data,
            cache: settings.cache,
            leaderboard: settings.leaderboard,
            rolling: settings.rolling,
        };
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn valid_settings_parse() {
        let config = parse(valid_toml()).unwrap();
        assert_eq!(config.data.season, 2023);
        assert_eq!(config.data.months, (3..=10).collect::<Vec<u8>>());
        assert_eq!(config.cache.ttl_seconds, 7200);
        assert_eq!(config.leaderboard.scale, Scale::Plus);
        assert_eq!(config.rolling.metric, Metric::DecisionValue);
        assert_eq!(config.data.run_constants_file, "plv_seasonal_constants.csv");
    }

    #[test]
    fn twenty_eighty_scale_parses() {
        let text = valid_toml().replace("\"plus\"", "\"20-80\"");
        let config = parse(&text).unwrap();
        assert_eq!(config.leaderboard.scale, Scale::TwentyEighty);
    }

    #[test]
    fn explicit_months_override_default() {
        let text = valid_toml().replace("season = 2023", "season = 2023\nmonths = [4, 5, 6]");
        let config = parse(&text).unwrap();
        assert_eq!(config.data.months, vec![4, 5, 6]);
    }

    #[test]
    fn out_of_season_month_rejected() {
        let text = valid_toml().replace("season = 2023", "season = 2023\nmonths = [2, 4]");
        let err = parse(&text).unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { field, .. } if field == "data.months")
        );
    }

    #[test]
    fn threshold_bounds_enforced() {
        let too_low = valid_toml().replace("min_pitches = 500", "min_pitches = 50");
        assert!(parse(&too_low).is_err());

        let too_high = valid_toml().replace("min_pitches = 500", "min_pitches = 5000");
        assert!(parse(&too_high).is_err());
    }

    #[test]
    fn small_window_rejected() {
        let text = valid_toml().replace("window = 400", "window = 10");
        let err = parse(&text).unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { field, .. } if field == "rolling.window")
        );
    }

    #[test]
    fn unknown_metric_rejected() {
        let text = valid_toml().replace("decision-value", "launch-angle");
        assert!(parse(&text).is_err());
    }

    #[test]
    fn zero_ttl_rejected() {
        let text = valid_toml().replace("ttl_seconds = 7200", "ttl_seconds = 0");
        assert!(parse(&text).is_err());
    }
}
