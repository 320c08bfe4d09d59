//! # Message Buffers
//!
//! The single outgoing/incoming buffer pair a session reuses for every send.

use crate::errors::HeaderError;
use crate::header::{read_u32, CmdHeader};
use crate::{CMD_HDR_SIZE, MAX_MSG_SIZE};

/// Outgoing message plus the buffer its reply lands in.
///
/// Both buffers are allocated once at [`MAX_MSG_SIZE`] and never grow. The
/// outgoing bytes start with a [`CmdHeader`]; `header` mirrors its `cmd`.
#[derive(Debug, Clone)]
pub struct Message {
    /// Copy of the header `cmd` for logging and dispatch.
    pub header: u32,
    data: Vec<u8>,
    msg_size: usize,
    reply: Vec<u8>,
    reply_size: usize,
}

impl Message {
    /// Allocate a zeroed buffer pair at full protocol capacity.
    #[must_use]
    pub fn with_max_capacity() -> Self {
        Self {
            header: 0,
            data: vec![0u8; MAX_MSG_SIZE],
            msg_size: 0,
            reply: vec![0u8; MAX_MSG_SIZE],
            reply_size: 0,
        }
    }

    /// Load a complete encoded message (header included) for sending.
    ///
    /// `reply_size` is the number of reply bytes the caller expects back.
    pub fn load(&mut self, bytes: &[u8], reply_size: usize) -> Result<(), HeaderError> {
        if bytes.len() > MAX_MSG_SIZE {
            return Err(HeaderError::TooLarge {
                size: bytes.len(),
                max: MAX_MSG_SIZE,
            });
        }
        if reply_size > MAX_MSG_SIZE {
            return Err(HeaderError::TooLarge {
                size: reply_size,
                max: MAX_MSG_SIZE,
            });
        }
        let hdr = CmdHeader::from_bytes(bytes)?;
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.header = hdr.cmd;
        self.msg_size = bytes.len();
        self.reply_size = reply_size;
        Ok(())
    }

    /// Header currently at the front of the outgoing buffer.
    #[must_use]
    pub fn cmd_header(&self) -> CmdHeader {
        CmdHeader {
            size: read_u32(&self.data, 0),
            cmd: read_u32(&self.data, 4),
        }
    }

    /// Rewrite the outgoing header, keeping `header` and the send size in step.
    ///
    /// The send size is clamped to the buffer; bytes past the last `load`
    /// go out as whatever the buffer held.
    pub fn apply_header(&mut self, hdr: CmdHeader) {
        self.data[..CMD_HDR_SIZE].copy_from_slice(&hdr.to_bytes());
        self.header = hdr.cmd;
        self.msg_size = (hdr.size as usize).clamp(CMD_HDR_SIZE, MAX_MSG_SIZE);
    }

    /// Bytes handed to the platform on send.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.msg_size]
    }

    /// Number of bytes that will be sent.
    #[must_use]
    pub fn msg_size(&self) -> usize {
        self.msg_size
    }

    /// Reply size the sender expects.
    #[must_use]
    pub fn reply_size(&self) -> usize {
        self.reply_size
    }

    /// Whole reply buffer, for collaborators that fill it directly.
    pub fn reply_buf_mut(&mut self) -> &mut [u8] {
        &mut self.reply
    }

    /// Store a received reply, truncating at capacity.
    pub fn set_reply(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(MAX_MSG_SIZE);
        self.reply[..len].copy_from_slice(&bytes[..len]);
        self.reply_size = len;
    }

    /// Mark how many bytes of the reply buffer are valid.
    pub fn set_reply_size(&mut self, len: usize) {
        self.reply_size = len.min(MAX_MSG_SIZE);
    }

    /// The valid part of the reply buffer.
    #[must_use]
    pub fn reply(&self) -> &[u8] {
        &self.reply[..self.reply_size]
    }

    /// Header at the front of the reply, if one fits.
    pub fn reply_header(&self) -> Result<CmdHeader, HeaderError> {
        CmdHeader::from_bytes(self.reply())
    }
}

/// The `sof_ipc_comp_reply` structure read back from the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompReply {
    pub hdr: CmdHeader,
    /// Firmware status, negative on error.
    pub error: i32,
    pub comp_id: u32,
}

impl CompReply {
    /// Encoded size on the wire.
    pub const SIZE: usize = CMD_HDR_SIZE + 8;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..CMD_HDR_SIZE].copy_from_slice(&self.hdr.to_bytes());
        out[8..12].copy_from_slice(&self.error.to_le_bytes());
        out[12..16].copy_from_slice(&self.comp_id.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < Self::SIZE {
            return Err(HeaderError::Truncated {
                needed: Self::SIZE,
                got: bytes.len(),
            });
        }
        Ok(Self {
            hdr: CmdHeader::from_bytes(bytes)?,
            error: read_u32(bytes, 8) as i32,
            comp_id: read_u32(bytes, 12),
        })
    }
}
