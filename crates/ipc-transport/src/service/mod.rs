//! Service Layer
//!
//! Orchestration on top of the domain and ports: the synchronous transport,
//! its reply slot, the notification classifier and the region broker.

pub mod classifier;
pub mod region_broker;
pub mod reply_slot;
pub mod transport;

pub use classifier::{BootSignal, BootState, ClassifierStats, RxClassifier};
pub use region_broker::{RegionBroker, Teardown};
pub use reply_slot::{ReplySlot, WaitOutcome};
pub use transport::{SendReport, Transport, TransportConfig};
