//! TOML-based configuration for mergepane.
//!
//! Every section is optional; a missing file yields the defaults through
//! [`AppConfig::load_or_default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// Shortest conflict marker git accepts.
pub const MIN_MARKER_SIZE: usize = 7;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Merge session behaviour.
    #[serde(default)]
    pub session: SessionConfig,

    /// Pane labels for the two diverging versions.
    #[serde(default)]
    pub labels: LabelConfig,

    /// Inline conflict marker settings.
    #[serde(default)]
    pub markers: MarkerConfig,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level or an `EnvFilter` directive string.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Merge session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Extra attempts after a failed stage read (default 1).
    #[serde(default = "default_stage_read_retries")]
    pub stage_read_retries: u32,

    /// Open the Base pane in resolve mode instead of read-only.
    #[serde(default)]
    pub start_in_resolve_mode: bool,
}

fn default_stage_read_retries() -> u32 {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stage_read_retries: default_stage_read_retries(),
            start_in_resolve_mode: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Display labels for the Ours and Theirs panes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_ours_label")]
    pub ours: String,

    #[serde(default = "default_theirs_label")]
    pub theirs: String,

    #[serde(default = "default_base_label")]
    pub base: String,
}

fn default_ours_label() -> String {
    "HEAD".into()
}
fn default_theirs_label() -> String {
    "MERGE_HEAD".into()
}
fn default_base_label() -> String {
    "base".into()
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            ours: default_ours_label(),
            theirs: default_theirs_label(),
            base: default_base_label(),
        }
    }
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// Inline conflict marker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Number of marker characters (git's `conflict-marker-size`).
    #[serde(default = "default_marker_size")]
    pub marker_size: usize,
}

fn default_marker_size() -> usize {
    MIN_MARKER_SIZE
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            marker_size: default_marker_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Default location: `<config dir>/mergepane/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mergepane").join("config.toml"))
    }

    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load_from_file(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::FileNotFound(path)) => {
                debug!(path = %path, "no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Validate that all fields are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.markers.marker_size < MIN_MARKER_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "markers.marker_size".into(),
                detail: format!("must be at least {}", MIN_MARKER_SIZE),
            });
        }
        if self.labels.ours.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "labels.ours".into(),
                detail: "label must not be empty".into(),
            });
        }
        if self.labels.theirs.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "labels.theirs".into(),
                detail: "label must not be empty".into(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: "log level must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_or_default(path)?;
        config.validate()?;
        Ok(config)
    }

    /// A commented template with every option at its default.
    pub fn default_template() -> &'static str {
        r#"# mergepane configuration

[logging]
# trace, debug, info, warn, error, or an EnvFilter directive
level = "warn"

[session]
# extra attempts after a failed stage read
stage_read_retries = 1
start_in_resolve_mode = false

[labels]
ours = "HEAD"
theirs = "MERGE_HEAD"
base = "base"

[markers]
marker_size = 7
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[logging]
level = "debug"

[session]
stage_read_retries = 3
start_in_resolve_mode = true

[labels]
ours = "main"
theirs = "feature/login"

[markers]
marker_size = 9
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.session.stage_read_retries, 3);
        assert!(config.session.start_in_resolve_mode);
        assert_eq!(config.labels.ours, "main");
        assert_eq!(config.labels.theirs, "feature/login");
        assert_eq!(config.labels.base, "base");
        assert_eq!(config.markers.marker_size, 9);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AppConfig::load_or_default("/nonexistent/config.toml").unwrap();
        assert_eq!(config.session.stage_read_retries, 1);
        assert_eq!(config.labels.ours, "HEAD");
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[markers\nmarker_size = ").unwrap();
        let result = AppConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_small_marker() {
        let mut config = AppConfig::default();
        config.markers.marker_size = 3;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "markers.marker_size"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_label() {
        let mut config = AppConfig::default();
        config.labels.theirs = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_round_trips() {
        let config: AppConfig = toml::from_str(AppConfig::default_template()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.markers.marker_size, MIN_MARKER_SIZE);
        assert_eq!(config.logging.level, "warn");
    }
}
