//! Ports Layer
//!
//! Defines the interfaces (traits) for the collaborators the transport
//! depends on but does not implement: the target platform, its mailbox,
//! shared region backing and topology loading.

pub mod inbound;
pub mod outbound;

pub use inbound::{CommandSink, IpcHandler};
pub use outbound::{
    DspMailbox, PlatformBinding, PlatformDescriptor, RegionAllocator, RegionDescriptor, RegionKind,
    SharedRegion, TopologyLoader,
};
