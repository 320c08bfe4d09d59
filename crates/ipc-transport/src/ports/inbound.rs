//! Inbound Ports (Driving Ports)
//!
//! Entry points other components call into: the platform's notification
//! path drives an [`IpcHandler`], a topology loader drives a [`CommandSink`].

use crate::error::TransportError;
use crate::ports::outbound::DspMailbox;

/// Notification entry points invoked by a platform binding.
///
/// May be called from the platform's own thread or synchronously from inside
/// [`PlatformBinding::send_msg`](crate::ports::PlatformBinding::send_msg);
/// implementations must work under both.
pub trait IpcHandler: Send + Sync {
    /// The firmware posted a message in the mailbox.
    fn ipc_msg_rx(&self, mailbox: &dyn DspMailbox);

    /// The firmware answered the host's last message.
    fn ipc_msg_reply(&self, mailbox: &dyn DspMailbox);

    /// The firmware crashed. `offset` locates whatever panic data it left.
    fn ipc_crash(&self, offset: u32);
}

/// Something that sends fully encoded commands and waits for their replies.
pub trait CommandSink {
    /// Send `bytes` (header included) and block until the reply arrives.
    fn send_command(&mut self, bytes: &[u8], reply_size: usize) -> Result<(), TransportError>;
}
