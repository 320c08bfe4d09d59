//! # Platform Descriptors
//!
//! Region tables for the Intel Baytrail and Cherrytrail audio DSPs. The
//! mailbox occupies the top of DRAM on both:
//!
//! ```text
//!   DRAM
//! ┌──────────────────────────────┐ 0x00000
//! │            heap              │
//! ├──────────────────────────────┤ 0x27000
//! │ DSP → host box  (0x400)      │
//! ├──────────────────────────────┤ 0x27400
//! │ host → DSP box  (0x400)      │
//! ├──────────────────────────────┤ 0x27800
//! │ exception / panic (0x800)    │
//! └──────────────────────────────┘ 0x28000
//! ```

use ipc_transport::{PlatformDescriptor, RegionDescriptor};

pub const IRAM_SIZE: usize = 0x14000;
pub const DRAM_SIZE: usize = 0x28000;
pub const SHIM_SIZE: usize = 0x4000;
pub const SSP_SIZE: usize = 0x1000;

/// Where the mailbox boxes live inside a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxLayout {
    /// Name of the memory region descriptor holding the mailbox.
    pub region: &'static str,
    /// Offset of the box the firmware writes.
    pub dsp_box: usize,
    /// Offset of the box the host writes.
    pub host_box: usize,
    /// Size of each box.
    pub box_size: usize,
    /// Offset of the panic area reported on a crash.
    pub exception: usize,
}

pub const DRAM_MAILBOX: MailboxLayout = MailboxLayout {
    region: "dram",
    dsp_box: 0x27000,
    host_box: 0x27400,
    box_size: 0x400,
    exception: 0x27800,
};

/// Baytrail: one SHIM and three SSP ports.
#[must_use]
pub fn byt() -> PlatformDescriptor {
    PlatformDescriptor {
        name: "byt",
        description: "Intel Baytrail audio DSP",
        reg_regions: vec![
            RegionDescriptor::io("shim", SHIM_SIZE),
            RegionDescriptor::io("ssp0", SSP_SIZE),
            RegionDescriptor::io("ssp1", SSP_SIZE),
            RegionDescriptor::io("ssp2", SSP_SIZE),
        ],
        mem_regions: vec![
            RegionDescriptor::mem("iram", IRAM_SIZE),
            RegionDescriptor::mem("dram", DRAM_SIZE),
        ],
    }
}

/// Cherrytrail: Baytrail plus three more SSP ports.
#[must_use]
pub fn cht() -> PlatformDescriptor {
    let mut desc = byt();
    desc.name = "cht";
    desc.description = "Intel Cherrytrail audio DSP";
    desc.reg_regions
        .extend((3..6).map(|n| RegionDescriptor::io(format!("ssp{n}"), SSP_SIZE)));
    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_counts() {
        assert_eq!(byt().num_reg_regions(), 4);
        assert_eq!(byt().num_mem_regions(), 2);
        assert_eq!(cht().num_reg_regions(), 7);
        assert_eq!(cht().reg_regions[6].region_name(), "ssp5-io");
    }

    #[test]
    fn test_mailbox_fits_region() {
        let dram = byt()
            .mem_regions
            .into_iter()
            .find(|r| r.name == DRAM_MAILBOX.region)
            .unwrap();
        assert!(DRAM_MAILBOX.exception < dram.size);
        assert!(DRAM_MAILBOX.host_box + DRAM_MAILBOX.box_size <= dram.size);
    }
}
