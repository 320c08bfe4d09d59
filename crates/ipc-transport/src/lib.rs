//! # IPC Transport
//!
//! Host side of the DSP IPC fuzzer: builds, optionally corrupts, transmits
//! and awaits replies to mailbox messages, and classifies what the firmware
//! sends back.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `Mutator`: Random opcode/size replacement driven by the command catalog
//!   - `MutationPolicy`: Fuzzing on/off switch owned by the transport
//!   - `TransportState`: Send/await state machine
//!
//! - **Ports Layer** (`ports/`): Collaborator traits
//!   - `PlatformBinding`: One implementation per target platform
//!   - `DspMailbox`: Notification-side mailbox access
//!   - `IpcHandler`: Notification entry points (implemented by `RxClassifier`)
//!   - `RegionAllocator`, `TopologyLoader`, `CommandSink`
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `Transport`: Synchronous send with a hard reply deadline
//!   - `ReplySlot`: Timed-wait primitive shared with the notification path
//!   - `RxClassifier`: Interprets notifications, completes the reply slot
//!   - `RegionBroker`: Region naming and teardown ordering
//!
//! ## Message Flow
//!
//! ```text
//! Session ──send()──→ Transport ──mutate──→ PlatformBinding::send_msg
//!                         │                          │
//!                  wait_until(deadline)        notification
//!                         │                          ↓
//!                     ReplySlot ←──complete()── RxClassifier
//! ```
//!
//! ## Invariants
//!
//! - **Single flight**: at most one send waits on the reply slot.
//! - **Bit-exact passthrough**: with fuzzing disabled headers are untouched.
//! - **Bounded mutation**: mutated sizes lie in `[1, MAX_MSG_SIZE]` and
//!   replaced opcodes belong to the catalog table of their class.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use domain::{MutationPolicy, MutationRecord, Mutator, TransportState};
pub use error::{PlatformError, RegionError, TopologyError, TransportError};
pub use ports::{
    CommandSink, DspMailbox, IpcHandler, PlatformBinding, PlatformDescriptor, RegionAllocator,
    RegionDescriptor, RegionKind, SharedRegion, TopologyLoader,
};
pub use service::{
    BootSignal, BootState, ClassifierStats, RegionBroker, ReplySlot, RxClassifier, SendReport,
    Teardown, Transport, TransportConfig, WaitOutcome,
};

/// Deadline for a reply to arrive after a send.
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 300;

/// Pause after each reply before the next send may start.
pub const DEFAULT_QUIESCENCE_MS: u64 = 50;
