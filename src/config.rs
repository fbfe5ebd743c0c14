//! Service configuration loaded from YAML.
//!
//! ```yaml
//! addr: 0.0.0.0:8080
//! shutdown_timeout_secs: 30
//! static_dir: ./public
//! log:
//!   level: info
//!   format: json
//! ```
//!
//! Every field is optional. Log settings from the file can still be
//! overridden with `JSONROUTE_LOG_*` environment variables.

use crate::logging::LogConfig;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Listen address
    pub addr: String,
    /// How long pending requests may run after a shutdown signal
    pub shutdown_timeout_secs: u64,
    /// Serve files from here when no route matches
    pub static_dir: Option<PathBuf>,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            shutdown_timeout_secs: 30,
            static_dir: None,
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML or unknown fields.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Invalid configuration")
    }

    /// Load a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_yaml(&contents).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Load `path` if given, defaults otherwise.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_yaml() {
        let config = AppConfig::from_yaml(
            "addr: 127.0.0.1:9000\nstatic_dir: ./public\nlog:\n  format: pretty\n",
        )
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.static_dir, Some(PathBuf::from("./public")));
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.shutdown_timeout_secs, 30);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(AppConfig::from_yaml("adress: 1.2.3.4:80\n").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "shutdown_timeout_secs: 5").unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));

        let missing = AppConfig::load(Path::new("/definitely/not/here.yaml"));
        assert!(missing.is_err());
        assert_eq!(AppConfig::load_or_default(None).unwrap(), AppConfig::default());
    }
}
