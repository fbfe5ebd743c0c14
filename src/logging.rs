//! Structured logging setup.
//!
//! Everything in this crate logs through `tracing` with structured fields
//! (`request_id`, `endpoint`, `status`, ...). [`init_logging`] installs a
//! `tracing-subscriber` registry with an [`EnvFilter`] and either a JSON
//! (production) or pretty (development) formatter.
//!
//! ## Environment Variables
//!
//! - `JSONROUTE_LOG_LEVEL`: trace/debug/info/warn/error (default `info`)
//! - `JSONROUTE_LOG_FORMAT`: `json` or `pretty` (default `json`)
//! - `JSONROUTE_LOG_ASYNC`: buffer output on a background thread (default `true`)
//! - `JSONROUTE_LOG_TARGET_FILTER`: extra comma-separated filter directives
//! - `RUST_LOG`: when set, replaces the level entirely

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub level: String,
    pub format: LogFormat,
    /// Write through `tracing_appender::non_blocking`
    pub async_logging: bool,
    /// Additional filter directives, comma separated
    pub target_filter: Option<String>,
    /// Include file:line in each event
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            async_logging: true,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `JSONROUTE_LOG_*` variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Verbose, synchronous, human-readable output for local work and tests.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    /// Override fields from `JSONROUTE_LOG_*` variables that are set.
    pub fn apply_env(&mut self) {
        if let Ok(level) = env::var("JSONROUTE_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("JSONROUTE_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        if let Some(async_logging) = env::var("JSONROUTE_LOG_ASYNC")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.async_logging = async_logging;
        }
        if let Ok(filter) = env::var("JSONROUTE_LOG_TARGET_FILTER") {
            self.target_filter = Some(filter);
        }
    }

    /// Filter for this configuration. `RUST_LOG` wins over `level`.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(normalize_level(&self.level)));

        // Client disconnects are logged by the HTTP server; keep warn and up.
        if let Ok(directive) = "may_minihttp::http_server=warn".parse() {
            filter = filter.add_directive(directive);
        }

        for directive in self
            .target_filter
            .iter()
            .flat_map(|f| f.split(','))
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(_) => eprintln!("Warning: invalid log filter directive: {directive}"),
            }
        }
        filter
    }
}

fn normalize_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
///
/// ```no_run
/// use jsonroute::logging::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::from_env()).expect("Failed to initialize logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        registry
            .with(fmt_layer(config, writer))
            .try_init()
            .context("Failed to initialize async logging")?;
        // Flushes on drop; keep it for the life of the process.
        std::mem::forget(guard);
    } else {
        registry
            .with(fmt_layer(config, std::io::stdout))
            .try_init()
            .context("Failed to initialize sync logging")?;
    }
    Ok(())
}

fn fmt_layer<S, W>(config: &LogConfig, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
    }

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.async_logging);

        let dev = LogConfig::development();
        assert_eq!(dev.format, LogFormat::Pretty);
        assert!(!dev.async_logging);
    }

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("WARNING"), "warn");
        assert_eq!(normalize_level("bogus"), "info");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LogConfig = serde_yaml::from_str("level: debug\nformat: pretty\n").unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.async_logging);
    }

    #[test]
    fn test_env_filter_accepts_extra_directives() {
        let config = LogConfig {
            target_filter: Some("jsonroute=trace, ,not a directive!!".to_string()),
            ..LogConfig::default()
        };
        // Invalid directives are skipped, not fatal.
        let filter = config.env_filter().to_string();
        assert!(filter.contains("jsonroute=trace"));
    }
}
