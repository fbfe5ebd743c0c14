//! # Runtime Configuration
//!
//! Environment-driven settings for the coroutine runtime.
//!
//! ## `JSONROUTE_STACK_SIZE`
//!
//! Stack size of each endpoint coroutine, decimal (`65536`) or hex
//! (`0x10000`). Defaults to `0x10000` (64 KB). Unparseable values fall back to
//! the default.
//!
//! ```rust
//! use jsonroute::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.stack_size > 0);
//! ```

use std::env;

/// Environment variable read by [`RuntimeConfig::from_env`].
pub const STACK_SIZE_ENV: &str = "JSONROUTE_STACK_SIZE";

/// Default coroutine stack size in bytes.
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for endpoint coroutines in bytes.
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var(STACK_SIZE_ENV)
            .ok()
            .and_then(|val| parse_size(&val))
            .unwrap_or(DEFAULT_STACK_SIZE);
        RuntimeConfig { stack_size }
    }
}

/// Parse a byte count given in decimal or `0x` hex.
#[must_use]
pub fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
    .filter(|size| *size > 0)
}
