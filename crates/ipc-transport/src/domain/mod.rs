//! Domain Layer
//!
//! Pure logic of the fuzzer: header mutation and the transport state machine.
//! No I/O, no locking.

pub mod mutator;
pub mod state;

pub use mutator::{MutationPolicy, MutationRecord, Mutator, GLOBAL_SELECTOR_MAX};
pub use state::TransportState;
