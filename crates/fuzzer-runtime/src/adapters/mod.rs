//! # Adapters
//!
//! Concrete implementations of the transport's outbound ports.

pub mod heap_allocator;
pub mod topology_file;

pub use heap_allocator::HeapRegionAllocator;
pub use topology_file::FileTopologyLoader;
