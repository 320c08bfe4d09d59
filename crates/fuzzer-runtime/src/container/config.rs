//! # Fuzzer Configuration
//!
//! Unified configuration for the transport, the session loop and header
//! mutation.
//!
//! ## Precedence
//!
//! 1. Built-in defaults ([`FuzzerConfig::default`])
//! 2. `FUZZ_*` environment variables ([`FuzzerConfig::from_env`])
//! 3. Command-line flags, applied by the binary last

use std::time::Duration;

use ipc_transport::TransportConfig;
use thiserror::Error;
use tracing::warn;

/// Volume sent on even iterations.
pub const VOLUME_LOW: u32 = 0;

/// Volume sent on odd iterations.
pub const VOLUME_HIGH: u32 = 1 << 16;

/// Complete fuzzer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuzzerConfig {
    /// Reply timeout and quiescence delay.
    pub transport: TransportConfig,
    /// Send loop parameters.
    pub session: SessionConfig,
    /// Header mutation.
    pub mutation: MutationConfig,
}

/// Send loop parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Volume commands issued after topology load.
    pub iterations: u32,
    /// How long init waits for FW_READY.
    pub boot_timeout: Duration,
    /// Target component of the volume command.
    pub comp_id: u32,
    /// Channels set by each volume command.
    pub channels: u32,
    /// Even-iteration volume.
    pub low_volume: u32,
    /// Odd-iteration volume.
    pub high_volume: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            boot_timeout: Duration::from_secs(2),
            comp_id: 2,
            channels: 2,
            low_volume: VOLUME_LOW,
            high_volume: VOLUME_HIGH,
        }
    }
}

impl SessionConfig {
    /// Volume for iteration `i`.
    #[must_use]
    pub fn volume_for(&self, i: u32) -> u32 {
        if i % 2 == 0 {
            self.low_volume
        } else {
            self.high_volume
        }
    }
}

/// Header mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationConfig {
    pub enabled: bool,
    /// Fixed seed for a reproducible run; entropy when `None`.
    pub seed: Option<u64>,
}

impl FuzzerConfig {
    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `FUZZ_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = parse_var::<u64, _>(&lookup, "FUZZ_REPLY_TIMEOUT_MS") {
            self.transport.reply_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "FUZZ_QUIESCE_MS") {
            self.transport.quiescence = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "FUZZ_BOOT_TIMEOUT_MS") {
            self.session.boot_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, "FUZZ_ITERATIONS") {
            self.session.iterations = n;
        }
        if let Some(seed) = parse_var(&lookup, "FUZZ_SEED") {
            self.mutation.seed = Some(seed);
        }
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.reply_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout { field: "reply_timeout" });
        }
        if self.session.boot_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout { field: "boot_timeout" });
        }
        if self.session.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.session.channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("iterations must be greater than zero")]
    ZeroIterations,

    #[error("volume command needs at least one channel")]
    NoChannels,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FuzzerConfig::default();
        assert_eq!(config.transport.reply_timeout, Duration::from_millis(300));
        assert_eq!(config.transport.quiescence, Duration::from_millis(50));
        assert_eq!(config.session.iterations, 10_000);
        assert_eq!(config.session.comp_id, 2);
        assert_eq!(config.mutation.seed, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = FuzzerConfig::default();
        config.apply_env(env(&[
            ("FUZZ_REPLY_TIMEOUT_MS", "150"),
            ("FUZZ_QUIESCE_MS", "0"),
            ("FUZZ_ITERATIONS", "12"),
            ("FUZZ_SEED", "42"),
        ]));
        assert_eq!(config.transport.reply_timeout, Duration::from_millis(150));
        assert!(config.transport.quiescence.is_zero());
        assert_eq!(config.session.iterations, 12);
        assert_eq!(config.mutation.seed, Some(42));
    }

    #[test]
    fn test_bad_override_ignored() {
        let mut config = FuzzerConfig::default();
        config.apply_env(env(&[("FUZZ_ITERATIONS", "lots")]));
        assert_eq!(config.session.iterations, 10_000);
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let mut config = FuzzerConfig::default();
        config.session.iterations = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroIterations));

        let mut config = FuzzerConfig::default();
        config.transport.reply_timeout = Duration::ZERO;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroTimeout { field: "reply_timeout" })
        );
    }

    #[test]
    fn test_volume_alternates() {
        let session = SessionConfig::default();
        assert_eq!(session.volume_for(0), 0);
        assert_eq!(session.volume_for(1), 65536);
        assert_eq!(session.volume_for(9_998), 0);
        assert_eq!(session.volume_for(9_999), 65536);
    }
}
