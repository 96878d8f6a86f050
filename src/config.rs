//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$INBOXKIT_CONFIG` (environment variable)
//! 2. `~/.config/inboxkit/config.toml` (Linux/macOS)
//!    `%APPDATA%\inboxkit\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InboxError, Result};
use crate::normalize::context::ContextInput;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Who counts as an agent when classifying authorship.
    pub classification: ContextInput,
    /// JSON output settings.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// JSON output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from an explicit path, failing on any problem.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| InboxError::io(path, e))?;
    toml::from_str::<Config>(&contents).map_err(|e| InboxError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("INBOXKIT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("inboxkit").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inboxkit")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("inboxkit.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::context::OneOrMany;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.output.pretty);
        assert!(cfg.classification.agent_emails.is_empty());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.classification.agent_emails = vec!["agent@co.com".into()];
        cfg.classification.org_domains = OneOrMany::Many(vec!["co.com".into()]);
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[classification]
agent_emails = ["support@co.com"]
org_domain = "co.com"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.classification.agent_emails, vec!["support@co.com"]);
        assert_eq!(
            cfg.classification.org_domains,
            OneOrMany::One("co.com".into())
        );
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.output.pretty);
    }

    #[test]
    fn test_load_config_from_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[general\nlog_level = 3").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(InboxError::Config { .. })
        ));
        assert!(matches!(
            load_config_from(&dir.path().join("missing.toml")),
            Err(InboxError::FileNotFound(_))
        ));
    }
}
