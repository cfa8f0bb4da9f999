//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::query::{ContextOptions, DEFAULT_SUMMARY_QUERY_LIMIT};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults for the context options of every load call
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Client timezone offset in minutes (`UTC - local`)
    #[serde(default)]
    pub timezone_offset: i32,

    #[serde(default = "default_summary_query_limit")]
    pub summary_query_limit: usize,

    #[serde(default = "default_true")]
    pub case_insensitive_regex: bool,

    #[serde(default = "default_true")]
    pub replace_ids: bool,
}

fn default_summary_query_limit() -> usize {
    DEFAULT_SUMMARY_QUERY_LIMIT
}

fn default_true() -> bool {
    true
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timezone_offset: 0,
            summary_query_limit: default_summary_query_limit(),
            case_insensitive_regex: true,
            replace_ids: true,
        }
    }
}

impl QueryConfig {
    /// Context options carrying these defaults
    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            replace_ids: self.replace_ids,
            summary_query_limit: self.summary_query_limit,
            timezone_offset: self.timezone_offset,
            case_insensitive_regex: self.case_insensitive_regex,
            pre_processing_pipeline: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("gridquery").join("config.toml")),
            Some(PathBuf::from("/etc/gridquery/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup; unparseable values are ignored
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "Ignoring unparseable override");
                    None
                }
            }
        }

        const TZ: &str = "GRIDQUERY_TIMEZONE_OFFSET";
        const LIMIT: &str = "GRIDQUERY_SUMMARY_QUERY_LIMIT";
        const CI: &str = "GRIDQUERY_CASE_INSENSITIVE_REGEX";
        const IDS: &str = "GRIDQUERY_REPLACE_IDS";

        if let Some(offset) = parsed(TZ, lookup(TZ)) {
            self.query.timezone_offset = offset;
        }
        if let Some(limit) = parsed(LIMIT, lookup(LIMIT)) {
            self.query.summary_query_limit = limit;
        }
        if let Some(flag) = parsed(CI, lookup(CI)) {
            self.query.case_insensitive_regex = flag;
        }
        if let Some(flag) = parsed(IDS, lookup(IDS)) {
            self.query.replace_ids = flag;
        }

        // Logging overrides
        if let Some(level) = lookup("GRIDQUERY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("GRIDQUERY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# gridquery Configuration
#
# Environment variables override these settings:
# - GRIDQUERY_TIMEZONE_OFFSET
# - GRIDQUERY_SUMMARY_QUERY_LIMIT
# - GRIDQUERY_CASE_INSENSITIVE_REGEX
# - GRIDQUERY_REPLACE_IDS
# - GRIDQUERY_LOG_LEVEL
# - GRIDQUERY_LOG_FORMAT

[query]
# Client timezone offset in minutes (UTC - local), applied to date parts
timezone_offset = 0

# Maximum number of summary queries per load call
summary_query_limit = 100

# Match startswith/endswith/contains/notcontains case-insensitively
case_insensitive_regex = true

# Return object ids as hex strings
replace_ids = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_round_trips() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(generate_default_config().as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.query.summary_query_limit, 100);
        assert!(config.query.replace_ids);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[query]\ntimezone_offset = -120").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.query.timezone_offset, -120);
        assert!(config.query.case_insensitive_regex);
        assert_eq!(config.logging.level, "info");

        let options = config.query.context_options();
        assert_eq!(options.timezone_offset, -120);
        assert_eq!(options.summary_query_limit, 100);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/gridquery.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[query\nbroken").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GRIDQUERY_TIMEZONE_OFFSET", "60"),
            ("GRIDQUERY_SUMMARY_QUERY_LIMIT", "not a number"),
            ("GRIDQUERY_REPLACE_IDS", "false"),
            ("GRIDQUERY_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.query.timezone_offset, 60);
        assert_eq!(config.query.summary_query_limit, 100);
        assert!(!config.query.replace_ids);
        assert!(config.query.case_insensitive_regex);
        assert_eq!(config.logging.format, "json");
    }
}
