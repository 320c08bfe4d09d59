//! # File Topology Loader
//!
//! Reads a pre-encoded topology: a flat stream of IPC messages, each one a
//! [`CmdHeader`] followed by `size - 8` payload bytes.
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┬─────┐
//! │ size│cmd │ payload  │ size│cmd │ payload  │ ... │
//! └──────────┴──────────┴──────────┴──────────┴─────┘
//! ```
//!
//! Every message must carry an opcode defined for its class; the file is
//! validated in full before the first message is sent.

use std::fs;
use std::path::Path;

use ipc_types::{CmdHeader, CommandCatalog, CompReply, CMD_HDR_SIZE, MAX_MSG_SIZE};
use ipc_transport::{CommandSink, TopologyError, TopologyLoader};
use tracing::{debug, info, warn};

/// [`TopologyLoader`] over a binary message stream on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTopologyLoader;

impl FileTopologyLoader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Split `bytes` into message slices.
    pub fn split(bytes: &[u8]) -> Result<Vec<&[u8]>, TopologyError> {
        let mut messages = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let hdr = CmdHeader::from_bytes(&bytes[offset..]).map_err(|e| {
                TopologyError::Invalid {
                    offset,
                    reason: e.to_string(),
                }
            })?;
            let size = hdr.size as usize;
            if !(CMD_HDR_SIZE..=MAX_MSG_SIZE).contains(&size) {
                return Err(TopologyError::Invalid {
                    offset,
                    reason: format!("message size {size} outside {CMD_HDR_SIZE}..={MAX_MSG_SIZE}"),
                });
            }
            if !CommandCatalog::is_known(hdr.cmd) {
                return Err(TopologyError::Invalid {
                    offset,
                    reason: format!("unknown command {:#x}", hdr.cmd),
                });
            }
            let end = offset + size;
            if end > bytes.len() {
                return Err(TopologyError::Invalid {
                    offset,
                    reason: format!("message needs {size} bytes, {} left", bytes.len() - offset),
                });
            }
            messages.push(&bytes[offset..end]);
            offset = end;
        }

        Ok(messages)
    }
}

impl TopologyLoader for FileTopologyLoader {
    fn parse(&mut self, path: &Path, sink: &mut dyn CommandSink) -> Result<usize, TopologyError> {
        let bytes = fs::read(path).map_err(|source| TopologyError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let messages = Self::split(&bytes)?;
        if messages.is_empty() {
            warn!(path = %path.display(), "topology file is empty");
        }

        for (i, message) in messages.iter().enumerate() {
            debug!(index = i, size = message.len(), "tplg: sending");
            sink.send_command(message, CompReply::SIZE)?;
        }

        info!(path = %path.display(), messages = messages.len(), "topology loaded");
        Ok(messages.len())
    }
}
