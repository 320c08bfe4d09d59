//! Error types for the IPC transport and its collaborators

use ipc_types::HeaderError;
use thiserror::Error;

/// Errors reported by a platform binding.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform {platform} failed to initialise: {reason}")]
    InitFailed { platform: String, reason: String },

    #[error("Firmware did not report ready within {waited_ms}ms")]
    BootTimeout { waited_ms: u64 },

    #[error("Platform not initialised")]
    NotInitialized,

    #[error("Message rejected by platform: status {status}")]
    SendRejected { status: i32 },

    #[error("Mailbox access out of bounds: offset {offset} len {len} > {size}")]
    MailboxOutOfBounds { offset: usize, len: usize, size: usize },

    #[error("No reply available")]
    NoReply,

    #[error("Region error: {0}")]
    Region(#[from] RegionError),

    #[error("Malformed message: {0}")]
    Header(#[from] HeaderError),
}

/// Errors from the shared region allocator and broker.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("Can't allocate {name}:{id} ({size} bytes): {reason}")]
    AllocationFailed {
        name: String,
        id: u32,
        size: usize,
        reason: String,
    },

    #[error("Region id {id} already allocated")]
    DuplicateId { id: u32 },

    #[error("Region id {id} not allocated")]
    UnknownId { id: u32 },

    #[error("Region {name} access out of bounds: offset {offset} len {len} > {size}")]
    OutOfBounds {
        name: String,
        offset: usize,
        len: usize,
        size: usize,
    },
}

/// Errors loading a topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Can't read topology {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid topology at byte {offset}: {reason}")]
    Invalid { offset: usize, reason: String },

    #[error("Topology message failed: {0}")]
    Transport(#[from] TransportError),
}

/// Errors terminating a send.
///
/// `Timeout` and `FirmwareCrashed` are fatal for the run; the caller decides
/// how to exit.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IPC timeout: header {header:#x} size {size} reply {reply_size} after {waited_ms}ms")]
    Timeout {
        header: u32,
        size: usize,
        reply_size: usize,
        waited_ms: u64,
    },

    #[error("DSP has crashed (offset {offset:#x})")]
    FirmwareCrashed { offset: u32 },

    #[error("A send is already in flight")]
    AlreadyInFlight,

    #[error("Malformed message: {0}")]
    Header(#[from] HeaderError),
}

impl TransportError {
    /// Whether the run must stop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. } | TransportError::FirmwareCrashed { .. }
        )
    }
}
