//! # Component Control Messages
//!
//! Encoder for the `sof_ipc_ctrl_data` message the session driver sends:
//! a per-channel value update addressed to one component.
//!
//! ```text
//! ┌──────────┬────────┬─────────┬──────┬─────┬───────┬───────────┬──────────────────┐
//! │ hdr (8)  │ err(4) │ comp(4) │ type │ cmd │ index │ num_elems │ chanv[n] (8 each)│
//! └──────────┴────────┴─────────┴──────┴─────┴───────┴───────────┴──────────────────┘
//! ```

use crate::catalog::ComponentCmd;
use crate::errors::HeaderError;
use crate::header::{read_u32, CmdHeader, GlobalClass};
use crate::{CMD_HDR_SIZE, MAX_MSG_SIZE};

/// Control access and data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CtrlType {
    ValueChanGet = 0,
    ValueChanSet = 1,
    ValueCompGet = 2,
    ValueCompSet = 3,
    DataGet = 4,
    DataSet = 5,
}

/// Control command semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CtrlCmd {
    Volume = 0,
    Switch = 1,
    Enum = 2,
    Binary = 3,
}

/// Fixed part of `sof_ipc_ctrl_data` before the channel values.
const CTRL_FIXED_SIZE: usize = CMD_HDR_SIZE + 4 * 6;

/// Size of one `{channel, value}` entry.
const CHAN_VALUE_SIZE: usize = 8;

/// A `COMP_SET_VALUE` volume update for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeCommand {
    pub comp_id: u32,
    /// `(channel, value)` pairs in wire order.
    pub channels: Vec<(u32, u32)>,
}

impl VolumeCommand {
    /// Same `value` on channels `0..num_channels`.
    #[must_use]
    pub fn uniform(comp_id: u32, num_channels: u32, value: u32) -> Self {
        Self {
            comp_id,
            channels: (0..num_channels).map(|channel| (channel, value)).collect(),
        }
    }

    /// Header `cmd` for this message.
    #[must_use]
    pub const fn cmd() -> u32 {
        GlobalClass::Component.bits() | ComponentCmd::SetValue.opcode()
    }

    /// Encoded size, header included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        CTRL_FIXED_SIZE + self.channels.len() * CHAN_VALUE_SIZE
    }

    /// Encode into wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, HeaderError> {
        let len = self.encoded_len();
        if len > MAX_MSG_SIZE {
            return Err(HeaderError::TooLarge {
                size: len,
                max: MAX_MSG_SIZE,
            });
        }

        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&CmdHeader::new(Self::cmd(), len as u32).to_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&self.comp_id.to_le_bytes());
        out.extend_from_slice(&(CtrlType::ValueChanSet as u32).to_le_bytes());
        out.extend_from_slice(&(CtrlCmd::Volume as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(self.channels.len() as u32).to_le_bytes());
        for (channel, value) in &self.channels {
            out.extend_from_slice(&channel.to_le_bytes());
            out.extend_from_slice(&value.to_le_bytes());
        }
        Ok(out)
    }

    /// Decode the component id and channel values from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < CTRL_FIXED_SIZE {
            return Err(HeaderError::Truncated {
                needed: CTRL_FIXED_SIZE,
                got: bytes.len(),
            });
        }
        let comp_id = read_u32(bytes, 12);
        let num_elems = read_u32(bytes, 28) as usize;
        let needed = CTRL_FIXED_SIZE + num_elems * CHAN_VALUE_SIZE;
        if bytes.len() < needed {
            return Err(HeaderError::Truncated {
                needed,
                got: bytes.len(),
            });
        }
        let channels = (0..num_elems)
            .map(|i| {
                let at = CTRL_FIXED_SIZE + i * CHAN_VALUE_SIZE;
                (read_u32(bytes, at), read_u32(bytes, at + 4))
            })
            .collect();
        Ok(Self { comp_id, channels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_channel_volume_layout() {
        let cmd = VolumeCommand::uniform(2, 2, 0x1_0000);
        let bytes = cmd.encode().unwrap();
        assert_eq!(bytes.len(), 48);

        let hdr = CmdHeader::from_bytes(&bytes).unwrap();
        assert_eq!(hdr.cmd, 0x5001_0000);
        assert_eq!(hdr.size, 48);
        assert_eq!(read_u32(&bytes, 16), CtrlType::ValueChanSet as u32);
        assert_eq!(read_u32(&bytes, 20), CtrlCmd::Volume as u32);

        let decoded = VolumeCommand::decode(&bytes).unwrap();
        assert_eq!(decoded.comp_id, 2);
        assert_eq!(decoded.channels, vec![(0, 0x1_0000), (1, 0x1_0000)]);
    }

    #[test]
    fn test_too_many_channels_rejected() {
        let cmd = VolumeCommand::uniform(2, 64, 0);
        assert!(matches!(cmd.encode(), Err(HeaderError::TooLarge { .. })));
    }

    #[test]
    fn test_decode_truncated_channels() {
        let mut bytes = VolumeCommand::uniform(2, 2, 0).encode().unwrap();
        bytes.truncate(40);
        assert!(matches!(
            VolumeCommand::decode(&bytes),
            Err(HeaderError::Truncated { needed: 48, got: 40 })
        ));
    }
}
