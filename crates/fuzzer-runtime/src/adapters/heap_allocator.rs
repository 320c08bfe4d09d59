//! # Heap Region Allocator
//!
//! Backs shared regions with zeroed heap buffers. Registering an id that is
//! already backed under the same name attaches to the existing bytes, the
//! way a named shared-memory object would.

use std::collections::HashMap;

use ipc_transport::{RegionAllocator, RegionError, SharedRegion};
use tracing::{debug, trace};

/// In-process [`RegionAllocator`].
#[derive(Debug, Default)]
pub struct HeapRegionAllocator {
    regions: HashMap<u32, SharedRegion>,
    /// Upper bound on total backed bytes, if any.
    limit: Option<usize>,
    allocated: usize,
}

impl HeapRegionAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse allocations once `limit` bytes are backed.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Bytes currently backed.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

impl RegionAllocator for HeapRegionAllocator {
    fn register_shared_region(
        &mut self,
        name: &str,
        id: u32,
        size: usize,
    ) -> Result<SharedRegion, RegionError> {
        if let Some(existing) = self.regions.get(&id) {
            if existing.name() == name && existing.size() == size {
                trace!(region = name, id, "attaching to existing region");
                return Ok(existing.clone());
            }
            return Err(RegionError::AllocationFailed {
                name: name.to_string(),
                id,
                size,
                reason: format!("id backs {} already", existing.name()),
            });
        }

        if let Some(limit) = self.limit {
            if self.allocated.saturating_add(size) > limit {
                return Err(RegionError::AllocationFailed {
                    name: name.to_string(),
                    id,
                    size,
                    reason: format!("{} of {limit} bytes in use", self.allocated),
                });
            }
        }

        let region = SharedRegion::zeroed(name, id, size);
        self.allocated += size;
        self.regions.insert(id, region.clone());
        debug!(region = name, id, size, "heap region backed");
        Ok(region)
    }

    fn release_region(&mut self, id: u32) -> Result<(), RegionError> {
        let region = self
            .regions
            .remove(&id)
            .ok_or(RegionError::UnknownId { id })?;
        self.allocated -= region.size();
        Ok(())
    }

    fn release_all(&mut self) {
        self.regions.clear();
        self.allocated = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_release() {
        let mut alloc = HeapRegionAllocator::new();
        let region = alloc.register_shared_region("dram-mem", 4, 0x100).unwrap();
        assert_eq!(region.size(), 0x100);
        assert_eq!(alloc.allocated(), 0x100);

        alloc.release_region(4).unwrap();
        assert_eq!(alloc.allocated(), 0);
        assert!(matches!(
            alloc.release_region(4),
            Err(RegionError::UnknownId { id: 4 })
        ));
    }

    #[test]
    fn test_same_name_attaches() {
        let mut alloc = HeapRegionAllocator::new();
        let a = alloc.register_shared_region("shim-io", 0, 16).unwrap();
        let b = alloc.register_shared_region("shim-io", 0, 16).unwrap();
        a.write(0, &[7]).unwrap();

        let mut out = [0u8; 1];
        b.read(0, &mut out).unwrap();
        assert_eq!(out, [7]);
        assert_eq!(alloc.region_count(), 1);
    }

    #[test]
    fn test_conflicting_id_fails() {
        let mut alloc = HeapRegionAllocator::new();
        alloc.register_shared_region("shim-io", 0, 16).unwrap();
        assert!(alloc.register_shared_region("iram-mem", 0, 16).is_err());
    }

    #[test]
    fn test_limit_enforced() {
        let mut alloc = HeapRegionAllocator::with_limit(32);
        alloc.register_shared_region("a-mem", 0, 24).unwrap();
        let err = alloc.register_shared_region("b-mem", 1, 16).unwrap_err();
        assert!(matches!(err, RegionError::AllocationFailed { id: 1, .. }));

        alloc.release_all();
        assert_eq!(alloc.allocated(), 0);
        assert!(alloc.register_shared_region("b-mem", 1, 16).is_ok());
    }
}
