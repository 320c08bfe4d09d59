//! # Region Broker
//!
//! Names and tracks the shared regions a platform asks for, and releases
//! them in a fixed order:
//!
//! 1. every I/O region
//! 2. every memory region
//! 3. the allocator context
//!
//! The broker never owns backing memory; the allocator does.

use tracing::{debug, error, warn};

use crate::error::RegionError;
use crate::ports::{RegionAllocator, RegionDescriptor, RegionKind, SharedRegion};

#[derive(Debug)]
struct Held {
    id: u32,
    name: String,
}

/// Result of a teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Teardown {
    pub io_released: usize,
    pub mem_released: usize,
}

/// Lifecycle wrapper over a [`RegionAllocator`].
pub struct RegionBroker {
    allocator: Box<dyn RegionAllocator>,
    io: Vec<Held>,
    mem: Vec<Held>,
    context_released: bool,
}

impl RegionBroker {
    #[must_use]
    pub fn new(allocator: Box<dyn RegionAllocator>) -> Self {
        Self {
            allocator,
            io: Vec::new(),
            mem: Vec::new(),
            context_released: false,
        }
    }

    /// Back `desc` under `id`, named after its kind.
    pub fn allocate(&mut self, id: u32, desc: &RegionDescriptor) -> Result<SharedRegion, RegionError> {
        if self.holds(id) {
            return Err(RegionError::DuplicateId { id });
        }

        let name = desc.region_name();
        let region = self
            .allocator
            .register_shared_region(&name, id, desc.size)
            .inspect_err(|e| {
                error!(region = %name, id, error = %e, "error: can't allocate region");
            })?;

        debug!(region = %name, id, size = desc.size, "region allocated");
        let held = Held { id, name };
        match desc.kind {
            RegionKind::Io => self.io.push(held),
            RegionKind::Mem => self.mem.push(held),
        }
        self.context_released = false;
        Ok(region)
    }

    /// Back a register region. `desc` must describe an I/O region.
    pub fn create_io_region(
        &mut self,
        id: u32,
        desc: &RegionDescriptor,
    ) -> Result<SharedRegion, RegionError> {
        debug_assert_eq!(desc.kind, RegionKind::Io);
        self.allocate(id, desc)
    }

    /// Back a memory region. `desc` must describe a memory region.
    pub fn create_memory_region(
        &mut self,
        id: u32,
        desc: &RegionDescriptor,
    ) -> Result<SharedRegion, RegionError> {
        debug_assert_eq!(desc.kind, RegionKind::Mem);
        self.allocate(id, desc)
    }

    fn holds(&self, id: u32) -> bool {
        self.io.iter().chain(self.mem.iter()).any(|held| held.id == id)
    }

    #[must_use]
    pub fn io_regions(&self) -> usize {
        self.io.len()
    }

    #[must_use]
    pub fn mem_regions(&self) -> usize {
        self.mem.len()
    }

    /// Release everything: I/O regions, then memory regions, then the
    /// allocator context. Each region is released exactly once; calling
    /// this again is a no-op.
    pub fn free_all(&mut self) -> Teardown {
        let mut teardown = Teardown::default();

        for held in self.io.drain(..) {
            Self::release(self.allocator.as_mut(), &held);
            teardown.io_released += 1;
        }
        for held in self.mem.drain(..) {
            Self::release(self.allocator.as_mut(), &held);
            teardown.mem_released += 1;
        }
        if !self.context_released {
            self.allocator.release_all();
            self.context_released = true;
        }

        debug!(
            io = teardown.io_released,
            mem = teardown.mem_released,
            "regions released"
        );
        teardown
    }

    fn release(allocator: &mut dyn RegionAllocator, held: &Held) {
        if let Err(e) = allocator.release_region(held.id) {
            warn!(region = %held.name, id = held.id, error = %e, "region release failed");
        }
    }
}

impl Drop for RegionBroker {
    fn drop(&mut self) {
        if !self.io.is_empty() || !self.mem.is_empty() || !self.context_released {
            self.free_all();
        }
    }
}
