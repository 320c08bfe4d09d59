//! Outbound Ports (Driven Ports)
//!
//! Everything the fuzzer needs from the outside world: a platform binding
//! per target, mailbox access for the notification path, an allocator that
//! backs shared regions and a topology loader.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ipc_types::Message;
use parking_lot::RwLock;

use crate::error::{PlatformError, RegionError, TopologyError};
use crate::ports::inbound::{CommandSink, IpcHandler};
use crate::service::RegionBroker;

// =============================================================================
// REGIONS
// =============================================================================

/// Whether a region emulates device registers or plain memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Io,
    Mem,
}

impl RegionKind {
    /// Suffix appended to the descriptor name to form the region name.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            RegionKind::Io => "io",
            RegionKind::Mem => "mem",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// A region a platform needs backed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDescriptor {
    pub name: String,
    pub size: usize,
    pub kind: RegionKind,
}

impl RegionDescriptor {
    pub fn io(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            kind: RegionKind::Io,
        }
    }

    pub fn mem(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            kind: RegionKind::Mem,
        }
    }

    /// Backing name, `"<name>-io"` or `"<name>-mem"`.
    #[must_use]
    pub fn region_name(&self) -> String {
        format!("{}-{}", self.name, self.kind.suffix())
    }
}

/// Handle to a block of shared backing memory.
///
/// Clones share the same bytes.
#[derive(Debug, Clone)]
pub struct SharedRegion {
    name: String,
    id: u32,
    memory: Arc<RwLock<Vec<u8>>>,
}

impl SharedRegion {
    /// Wrap zeroed backing of `size` bytes.
    pub fn zeroed(name: impl Into<String>, id: u32, size: usize) -> Self {
        Self {
            name: name.into(),
            id,
            memory: Arc::new(RwLock::new(vec![0u8; size])),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.memory.read().len()
    }

    /// Copy `buf.len()` bytes starting at `offset` out of the region.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), RegionError> {
        let memory = self.memory.read();
        let range = self.range(offset, buf.len(), memory.len())?;
        buf.copy_from_slice(&memory[range]);
        Ok(())
    }

    /// Copy `bytes` into the region at `offset`.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<(), RegionError> {
        let mut memory = self.memory.write();
        let range = self.range(offset, bytes.len(), memory.len())?;
        memory[range].copy_from_slice(bytes);
        Ok(())
    }

    fn range(
        &self,
        offset: usize,
        len: usize,
        size: usize,
    ) -> Result<std::ops::Range<usize>, RegionError> {
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(offset..end),
            _ => Err(RegionError::OutOfBounds {
                name: self.name.clone(),
                offset,
                len,
                size,
            }),
        }
    }
}

/// Backing allocator for shared regions.
pub trait RegionAllocator: Send {
    /// Create (or attach to) the region `name` under `id`.
    fn register_shared_region(
        &mut self,
        name: &str,
        id: u32,
        size: usize,
    ) -> Result<SharedRegion, RegionError>;

    /// Release one region.
    fn release_region(&mut self, id: u32) -> Result<(), RegionError>;

    /// Tear down the allocator context itself.
    fn release_all(&mut self);
}

// =============================================================================
// PLATFORM
// =============================================================================

/// Static description of a target platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    /// Registry name, as given on the command line.
    pub name: &'static str,
    pub description: &'static str,
    /// Register (I/O) regions, in allocation order.
    pub reg_regions: Vec<RegionDescriptor>,
    /// Memory regions, in allocation order.
    pub mem_regions: Vec<RegionDescriptor>,
}

impl PlatformDescriptor {
    #[must_use]
    pub fn num_reg_regions(&self) -> usize {
        self.reg_regions.len()
    }

    #[must_use]
    pub fn num_mem_regions(&self) -> usize {
        self.mem_regions.len()
    }
}

/// Mailbox access offered to the notification path.
pub trait DspMailbox: Send + Sync {
    /// Copy `buf.len()` bytes from the DSP-to-host mailbox at `offset`.
    fn mailbox_read(&self, offset: usize, buf: &mut [u8]) -> Result<(), PlatformError>;

    /// Copy the reply to the host's last message into `reply`, returning
    /// its length.
    fn get_reply(&self, reply: &mut [u8]) -> Result<usize, PlatformError>;

    /// Acknowledge the firmware's ready message.
    fn fw_ready(&self) -> Result<(), PlatformError>;
}

/// One supported target platform.
///
/// A session owns its binding exclusively; nothing else sends through it.
pub trait PlatformBinding: Send {
    /// Registry name.
    fn name(&self) -> &'static str;

    fn descriptor(&self) -> &PlatformDescriptor;

    /// Bring the platform up, backing its regions through `regions` and
    /// routing notifications to `handler`.
    fn init(
        &mut self,
        regions: &mut RegionBroker,
        handler: Arc<dyn IpcHandler>,
    ) -> Result<(), PlatformError>;

    /// Stop delivering notifications and drop platform state.
    fn free(&mut self);

    /// Transmit `msg.payload()` to the firmware.
    fn send_msg(&mut self, msg: &Message) -> Result<(), PlatformError>;
}

// =============================================================================
// TOPOLOGY
// =============================================================================

/// Loads a topology file into the firmware.
pub trait TopologyLoader {
    /// Parse `path` and send the resulting commands through `sink`.
    ///
    /// Returns the number of commands sent.
    fn parse(&mut self, path: &Path, sink: &mut dyn CommandSink) -> Result<usize, TopologyError>;
}
