//! # Emulated Mailbox
//!
//! Host and firmware views of the two mailbox boxes inside a shared memory
//! region. The firmware writes the DSP box and reads the host box; the host
//! does the opposite through [`DspMailbox`].

use std::sync::atomic::{AtomicBool, Ordering};

use ipc_transport::{DspMailbox, PlatformError, SharedRegion};
use ipc_types::{CmdHeader, CMD_HDR_SIZE};
use tracing::debug;

use super::descriptors::MailboxLayout;

/// Mailbox backed by a [`SharedRegion`].
#[derive(Debug)]
pub struct EmulatedMailbox {
    region: SharedRegion,
    layout: MailboxLayout,
    booted: AtomicBool,
}

impl EmulatedMailbox {
    /// Place `layout` over `region`.
    pub fn new(region: SharedRegion, layout: MailboxLayout) -> Result<Self, PlatformError> {
        let end = layout.dsp_box.max(layout.host_box) + layout.box_size;
        if end > region.size() || layout.box_size < CMD_HDR_SIZE {
            return Err(PlatformError::InitFailed {
                platform: region.name().to_string(),
                reason: format!("mailbox ends at {end:#x}, region is {:#x}", region.size()),
            });
        }
        Ok(Self {
            region,
            layout,
            booted: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn layout(&self) -> &MailboxLayout {
        &self.layout
    }

    /// Whether the host acknowledged FW_READY.
    #[must_use]
    pub fn is_booted(&self) -> bool {
        self.booted.load(Ordering::Acquire)
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), PlatformError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.layout.box_size => Ok(()),
            _ => Err(PlatformError::MailboxOutOfBounds {
                offset,
                len,
                size: self.layout.box_size,
            }),
        }
    }

    /// Host side: place an outgoing message in the host box.
    pub fn host_write(&self, bytes: &[u8]) -> Result<(), PlatformError> {
        self.check(0, bytes.len())?;
        self.region.write(self.layout.host_box, bytes)?;
        Ok(())
    }

    /// Firmware side: read the message in the host box, sized by its header.
    pub fn host_read(&self) -> Result<Vec<u8>, PlatformError> {
        let mut raw = [0u8; CMD_HDR_SIZE];
        self.region.read(self.layout.host_box, &mut raw)?;
        let hdr = CmdHeader::from_bytes(&raw)?;

        let len = (hdr.size as usize).clamp(CMD_HDR_SIZE, self.layout.box_size);
        let mut message = vec![0u8; len];
        self.region.read(self.layout.host_box, &mut message)?;
        Ok(message)
    }

    /// Firmware side: place a message or reply in the DSP box.
    pub fn dsp_write(&self, bytes: &[u8]) -> Result<(), PlatformError> {
        self.check(0, bytes.len())?;
        self.region.write(self.layout.dsp_box, bytes)?;
        Ok(())
    }

    /// Firmware side: write into the exception area.
    pub fn exception_write(&self, bytes: &[u8]) -> Result<(), PlatformError> {
        self.region.write(self.layout.exception, bytes)?;
        Ok(())
    }
}

impl DspMailbox for EmulatedMailbox {
    fn mailbox_read(&self, offset: usize, buf: &mut [u8]) -> Result<(), PlatformError> {
        self.check(offset, buf.len())?;
        self.region.read(self.layout.dsp_box + offset, buf)?;
        Ok(())
    }

    fn get_reply(&self, reply: &mut [u8]) -> Result<usize, PlatformError> {
        let mut raw = [0u8; CMD_HDR_SIZE];
        self.mailbox_read(0, &mut raw)?;
        let hdr = CmdHeader::from_bytes(&raw)?;

        let size = hdr.size as usize;
        if size < CMD_HDR_SIZE {
            return Err(PlatformError::NoReply);
        }
        let len = size.min(reply.len()).min(self.layout.box_size);
        self.mailbox_read(0, &mut reply[..len])?;
        Ok(len)
    }

    fn fw_ready(&self) -> Result<(), PlatformError> {
        if !self.booted.swap(true, Ordering::AcqRel) {
            debug!(region = self.region.name(), "mailbox ready");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::descriptors::DRAM_MAILBOX;

    fn mailbox() -> EmulatedMailbox {
        let region = SharedRegion::zeroed("dram-mem", 5, 0x28000);
        EmulatedMailbox::new(region, DRAM_MAILBOX).unwrap()
    }

    #[test]
    fn test_host_message_round_trip() {
        let mbox = mailbox();
        let mut msg = CmdHeader::new(0x3001_0000, 12).to_bytes().to_vec();
        msg.extend_from_slice(&[0xaa; 4]);
        mbox.host_write(&msg).unwrap();
        assert_eq!(mbox.host_read().unwrap(), msg);
    }

    #[test]
    fn test_get_reply_sized_by_header() {
        let mbox = mailbox();
        let mut reply = CmdHeader::new(0x1000_0000, 16).to_bytes().to_vec();
        reply.extend_from_slice(&[1; 8]);
        reply.extend_from_slice(&[0xff; 8]);
        mbox.dsp_write(&reply).unwrap();

        let mut buf = [0u8; 384];
        assert_eq!(mbox.get_reply(&mut buf).unwrap(), 16);
        assert_eq!(buf[8..16], [1; 8]);
    }

    #[test]
    fn test_empty_reply_is_no_reply() {
        let mbox = mailbox();
        let mut buf = [0u8; 384];
        assert!(matches!(mbox.get_reply(&mut buf), Err(PlatformError::NoReply)));
    }

    #[test]
    fn test_reads_bounded_by_box() {
        let mbox = mailbox();
        let mut buf = [0u8; 16];
        assert!(matches!(
            mbox.mailbox_read(0x3f8, &mut buf),
            Err(PlatformError::MailboxOutOfBounds { offset: 0x3f8, len: 16, .. })
        ));
    }

    #[test]
    fn test_layout_must_fit() {
        let region = SharedRegion::zeroed("iram-mem", 4, 0x1000);
        assert!(EmulatedMailbox::new(region, DRAM_MAILBOX).is_err());
    }

    #[test]
    fn test_fw_ready_latches() {
        let mbox = mailbox();
        assert!(!mbox.is_booted());
        mbox.fw_ready().unwrap();
        mbox.fw_ready().unwrap();
        assert!(mbox.is_booted());
    }
}
