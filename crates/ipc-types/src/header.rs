//! # Command Header
//!
//! Global class encoding and the 8-byte `{size, cmd}` header that prefixes
//! every message exchanged through the mailbox.

use std::fmt;

use crate::errors::HeaderError;
use crate::CMD_HDR_SIZE;

/// Bit position of the global class within `cmd`.
pub const GLB_TYPE_SHIFT: u32 = 28;

/// Mask selecting the global class bits of `cmd`.
pub const GLB_TYPE_MASK: u32 = 0xf << GLB_TYPE_SHIFT;

/// Bit position of the class opcode within `cmd`.
pub const CMD_TYPE_SHIFT: u32 = 16;

/// Mask selecting the class opcode bits of `cmd`.
pub const CMD_TYPE_MASK: u32 = 0xfff << CMD_TYPE_SHIFT;

/// Encode a raw global selector into its `cmd` bit position.
#[must_use]
pub const fn glb_type(selector: u32) -> u32 {
    selector << GLB_TYPE_SHIFT
}

/// Encode a raw class opcode into its `cmd` bit position.
#[must_use]
pub const fn cmd_type(opcode: u32) -> u32 {
    opcode << CMD_TYPE_SHIFT
}

/// Global message class carried in the high nibble of `cmd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GlobalClass {
    /// Reply to a host-initiated message.
    Reply = glb_type(0x1),
    /// Several messages packed together.
    Compound = glb_type(0x2),
    /// Topology (pipeline graph) construction.
    Topology = glb_type(0x3),
    /// Power management.
    PowerManagement = glb_type(0x4),
    /// Component control.
    Component = glb_type(0x5),
    /// PCM stream control.
    Stream = glb_type(0x6),
    /// One-time boot notification from the firmware.
    FwReady = glb_type(0x7),
    /// Digital audio interface configuration.
    Dai = glb_type(0x8),
    /// Firmware trace control.
    Trace = glb_type(0x9),
}

impl GlobalClass {
    /// Every defined class, in selector order.
    pub const ALL: [GlobalClass; 9] = [
        GlobalClass::Reply,
        GlobalClass::Compound,
        GlobalClass::Topology,
        GlobalClass::PowerManagement,
        GlobalClass::Component,
        GlobalClass::Stream,
        GlobalClass::FwReady,
        GlobalClass::Dai,
        GlobalClass::Trace,
    ];

    /// The class bits as they appear in `cmd`.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Decode the class from the masked high bits of `cmd`.
    ///
    /// Returns `None` for class values the protocol does not define.
    #[must_use]
    pub fn from_cmd(cmd: u32) -> Option<Self> {
        let bits = cmd & GLB_TYPE_MASK;
        Self::ALL.into_iter().find(|class| class.bits() == bits)
    }

    /// Decode the class a raw selector (as drawn by the mutator) maps to.
    #[must_use]
    pub fn from_selector(selector: u32) -> Option<Self> {
        Self::from_cmd(glb_type(selector))
    }

    /// Short protocol name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            GlobalClass::Reply => "reply",
            GlobalClass::Compound => "compound",
            GlobalClass::Topology => "tplg",
            GlobalClass::PowerManagement => "pm",
            GlobalClass::Component => "comp",
            GlobalClass::Stream => "stream",
            GlobalClass::FwReady => "fw-ready",
            GlobalClass::Dai => "dai",
            GlobalClass::Trace => "trace",
        }
    }
}

impl fmt::Display for GlobalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The `sof_ipc_cmd_hdr` wire header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CmdHeader {
    /// Total message size in bytes, header included.
    pub size: u32,
    /// Global class and class opcode.
    pub cmd: u32,
}

impl CmdHeader {
    /// Build a header for `class | opcode` with the given size.
    #[must_use]
    pub const fn new(cmd: u32, size: u32) -> Self {
        Self { size, cmd }
    }

    /// Global class bits of `cmd`.
    #[must_use]
    pub const fn class_bits(&self) -> u32 {
        self.cmd & GLB_TYPE_MASK
    }

    /// Opcode bits of `cmd`.
    #[must_use]
    pub const fn opcode_bits(&self) -> u32 {
        self.cmd & CMD_TYPE_MASK
    }

    /// Decoded global class, if defined.
    #[must_use]
    pub fn class(&self) -> Option<GlobalClass> {
        GlobalClass::from_cmd(self.cmd)
    }

    /// Encode into the little-endian wire layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CMD_HDR_SIZE] {
        let mut out = [0u8; CMD_HDR_SIZE];
        out[..4].copy_from_slice(&self.size.to_le_bytes());
        out[4..].copy_from_slice(&self.cmd.to_le_bytes());
        out
    }

    /// Decode from the first [`CMD_HDR_SIZE`] bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < CMD_HDR_SIZE {
            return Err(HeaderError::Truncated {
                needed: CMD_HDR_SIZE,
                got: bytes.len(),
            });
        }
        Ok(Self {
            size: read_u32(bytes, 0),
            cmd: read_u32(bytes, 4),
        })
    }

    /// Overwrite the header at the front of `buf` in place.
    pub fn write_into(&self, buf: &mut [u8]) -> Result<(), HeaderError> {
        if buf.len() < CMD_HDR_SIZE {
            return Err(HeaderError::Truncated {
                needed: CMD_HDR_SIZE,
                got: buf.len(),
            });
        }
        buf[..CMD_HDR_SIZE].copy_from_slice(&self.to_bytes());
        Ok(())
    }
}

impl fmt::Display for CmdHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd {:#x} size {}", self.cmd, self.size)
    }
}

/// Read a little-endian `u32` at `offset`. Caller checks bounds.
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}
