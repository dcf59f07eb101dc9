//! Backend configuration
//!
//! Defaults can be overridden through environment variables, read once
//! when the process-wide backend is created.

use std::time::Duration;
use tracing::warn;

pub const ENV_CONTROL_TIMEOUT: &str = "HIDLINK_CONTROL_TIMEOUT_MS";
pub const ENV_WRITE_TIMEOUT: &str = "HIDLINK_WRITE_TIMEOUT_MS";

// Default timeout for USB transfers
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsbConfig {
    /// Feature reports, string descriptors and control-pipe output reports.
    pub control_timeout: Duration,
    /// Interrupt OUT transfers.
    pub write_timeout: Duration,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            control_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl UsbConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            control_timeout: millis(ENV_CONTROL_TIMEOUT, lookup(ENV_CONTROL_TIMEOUT))
                .unwrap_or(defaults.control_timeout),
            write_timeout: millis(ENV_WRITE_TIMEOUT, lookup(ENV_WRITE_TIMEOUT))
                .unwrap_or(defaults.write_timeout),
        }
    }
}

fn millis(key: &str, value: Option<String>) -> Option<Duration> {
    let value = value?;
    match value.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            warn!("ignoring {}={:?}: {}", key, value, err);
            None
        }
    }
}
