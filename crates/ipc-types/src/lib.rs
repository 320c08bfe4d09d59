//! # IPC Types
//!
//! Single source of truth for the DSP IPC mailbox protocol as seen from the
//! host side.
//!
//! ## Header Layout
//!
//! ```text
//!  offset 0          offset 4
//! ┌─────────────────┬─────────────────────────────────────────────┐
//! │ size: u32 (LE)  │ cmd: u32 (LE)                               │
//! │                 │ 31..28 global class │ 27..16 class opcode   │
//! └─────────────────┴─────────────────────────────────────────────┘
//! ```
//!
//! The payload that follows the header is opaque to this crate except for
//! the component control message used by the session driver.

pub mod catalog;
pub mod control;
pub mod errors;
pub mod header;
pub mod message;

pub use catalog::{CommandCatalog, ComponentCmd, DaiCmd, PmCmd, StreamCmd, TopologyCmd, TraceCmd};
pub use control::{CtrlCmd, CtrlType, VolumeCommand};
pub use errors::HeaderError;
pub use header::{cmd_type, glb_type, CmdHeader, GlobalClass, CMD_TYPE_MASK, GLB_TYPE_MASK};
pub use message::{CompReply, Message};

/// Largest message (header plus payload) the firmware accepts.
pub const MAX_MSG_SIZE: usize = 384;

/// Size of the command header on the wire.
pub const CMD_HDR_SIZE: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_msg_size_holds_header() {
        assert!(MAX_MSG_SIZE > CMD_HDR_SIZE);
    }
}
