//! Transport state machine.
//!
//! ```text
//!  Idle ──arm──→ Sending ──wait──→ AwaitingReply ──┬──→ Replied ──┐
//!   ↑                                              └──→ TimedOut ─┤
//!   └─────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

/// Phase of the single in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No request outstanding.
    #[default]
    Idle,
    /// Slot armed, message being handed to the platform.
    Sending,
    /// Sender blocked on the reply deadline.
    AwaitingReply,
    /// Reply stored, not yet collected by the sender.
    Replied,
    /// Deadline passed without a reply.
    TimedOut,
}

impl TransportState {
    /// Whether a reply would be accepted now.
    #[must_use]
    pub fn accepts_reply(self) -> bool {
        matches!(self, TransportState::Sending | TransportState::AwaitingReply)
    }

    /// Whether a new send may arm the slot.
    #[must_use]
    pub fn can_arm(self) -> bool {
        matches!(
            self,
            TransportState::Idle | TransportState::Replied | TransportState::TimedOut
        )
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Idle => write!(f, "idle"),
            TransportState::Sending => write!(f, "sending"),
            TransportState::AwaitingReply => write!(f, "awaiting-reply"),
            TransportState::Replied => write!(f, "replied"),
            TransportState::TimedOut => write!(f, "timed-out"),
        }
    }
}
