//! # Fuzzer Runtime Library
//!
//! Everything behind the `dsp-fuzzer` binary, exposed for integration tests.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Session                          │
//! │  ┌────────────┐   ┌─────────────┐   ┌────────────────┐   │
//! │  │ Transport  │   │ RegionBroker│   │ PlatformBinding│   │
//! │  │ (ReplySlot)│   │             │   │  (registry)    │   │
//! │  └─────▲──────┘   └──────▲──────┘   └───────┬────────┘   │
//! │        │                 │                  │ notify     │
//! │        │          HeapRegionAllocator       ▼            │
//! │        └──────────────────────────────  RxClassifier     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`container`]: configuration with defaults and `FUZZ_*` overrides
//! - [`platforms`]: the static platform registry and the emulated DSP
//! - [`adapters`]: region allocator and topology loader
//! - [`session`]: init, topology, volume loop, teardown

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod adapters;
pub mod container;
pub mod error;
pub mod platforms;
pub mod session;

pub use adapters::{FileTopologyLoader, HeapRegionAllocator};
pub use container::{ConfigError, FuzzerConfig, MutationConfig, SessionConfig};
pub use error::{SessionError, EXIT_CRASH, EXIT_FAILURE, EXIT_TIMEOUT};
pub use platforms::{EmulatedPlatform, FirmwareBehaviour, FirmwareMode};
pub use session::{RunSummary, Session};
