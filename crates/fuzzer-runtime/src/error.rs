//! Session errors and their process exit codes

use ipc_transport::{PlatformError, RegionError, TopologyError, TransportError};
use thiserror::Error;

use crate::container::ConfigError;

/// Exit code for every failure without a dedicated code.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code when a reply does not arrive in time.
pub const EXIT_TIMEOUT: u8 = 2;

/// Exit code when the firmware crashes.
pub const EXIT_CRASH: u8 = 3;

/// Errors ending a fuzzing session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no target platform specified")]
    NoPlatform,

    #[error("unknown platform {name} (supported: {supported})")]
    UnknownPlatform { name: String, supported: String },

    #[error("session not initialised")]
    NotInitialised,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("platform failure: {0}")]
    Platform(#[from] PlatformError),

    #[error("region failure: {0}")]
    Region(#[from] RegionError),

    #[error("topology failure: {0}")]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// The transport failure behind this error, if any.
    #[must_use]
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            SessionError::Transport(e) | SessionError::Topology(TopologyError::Transport(e)) => {
                Some(e)
            }
            _ => None,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self.transport() {
            Some(TransportError::Timeout { .. }) => EXIT_TIMEOUT,
            Some(TransportError::FirmwareCrashed { .. }) => EXIT_CRASH,
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> TransportError {
        TransportError::Timeout {
            header: 0x5001_0000,
            size: 48,
            reply_size: 16,
            waited_ms: 300,
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SessionError::from(timeout()).exit_code(), EXIT_TIMEOUT);
        assert_eq!(
            SessionError::from(TransportError::FirmwareCrashed { offset: 0 }).exit_code(),
            EXIT_CRASH
        );
        assert_eq!(SessionError::NoPlatform.exit_code(), EXIT_FAILURE);
        assert_eq!(
            SessionError::from(PlatformError::BootTimeout { waited_ms: 2000 }).exit_code(),
            EXIT_FAILURE
        );
    }

    #[test]
    fn test_topology_timeout_keeps_timeout_code() {
        let err = SessionError::from(TopologyError::from(timeout()));
        assert_eq!(err.exit_code(), EXIT_TIMEOUT);
    }
}
