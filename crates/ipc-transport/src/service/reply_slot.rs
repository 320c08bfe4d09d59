//! # Reply Slot
//!
//! Timed-wait primitive shared by the sender and the notification path.
//!
//! ## Wake Ordering
//!
//! The sender arms the slot *before* handing the message to the platform and
//! only then blocks. A reply that arrives early, even synchronously from
//! inside `send_msg`, is stored in the slot and found by the predicate check
//! on entry to [`ReplySlot::wait_until`]; the condition variable is never
//! relied on to remember a signal. Every wakeup re-checks the predicate, so
//! spurious wakeups cannot end a wait without a reply. Replies arriving while
//! the slot is not armed are refused, so a late answer to a timed-out send
//! cannot complete the next one.

use std::time::Instant;

use ipc_types::{Message, MAX_MSG_SIZE};
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::domain::TransportState;
use crate::error::TransportError;

/// How a wait on the slot ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A reply of `len` bytes was copied into the message.
    Replied { len: usize },
    /// The deadline passed first.
    TimedOut,
    /// The firmware crashed while (or before) waiting.
    Crashed { offset: u32 },
}

#[derive(Debug)]
struct SlotState {
    phase: TransportState,
    reply: Vec<u8>,
    reply_len: usize,
    crash: Option<u32>,
    completions: u64,
}

/// The single "reply ready" condition of a session.
#[derive(Debug)]
pub struct ReplySlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl ReplySlot {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                phase: TransportState::Idle,
                reply: vec![0u8; MAX_MSG_SIZE],
                reply_len: 0,
                crash: None,
                completions: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Claim the slot for a new send.
    pub fn arm(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(offset) = state.crash {
            return Err(TransportError::FirmwareCrashed { offset });
        }
        if !state.phase.can_arm() {
            return Err(TransportError::AlreadyInFlight);
        }
        state.phase = TransportState::Sending;
        state.reply_len = 0;
        Ok(())
    }

    /// Store `reply` for the armed send and wake the sender.
    ///
    /// Returns `false`, leaving the slot untouched, when nothing is pending.
    pub fn complete(&self, reply: &[u8]) -> bool {
        let mut state = self.state.lock();
        if !state.phase.accepts_reply() {
            return false;
        }
        let len = reply.len().min(MAX_MSG_SIZE);
        state.reply[..len].copy_from_slice(&reply[..len]);
        state.reply_len = len;
        state.phase = TransportState::Replied;
        state.completions += 1;
        self.ready.notify_one();
        true
    }

    /// Latch a firmware crash and wake any waiter.
    pub fn crash(&self, offset: u32) {
        let mut state = self.state.lock();
        state.crash.get_or_insert(offset);
        self.ready.notify_all();
    }

    /// Block until a reply, a crash, or `deadline`.
    ///
    /// On a reply the bytes are copied into `message`'s reply buffer.
    pub fn wait_until(&self, deadline: Instant, message: &mut Message) -> WaitOutcome {
        let mut state = self.state.lock();
        if state.phase == TransportState::Sending {
            state.phase = TransportState::AwaitingReply;
        }

        loop {
            if let Some(offset) = state.crash {
                state.phase = TransportState::Idle;
                return WaitOutcome::Crashed { offset };
            }
            if state.phase == TransportState::Replied {
                let len = state.reply_len;
                message.set_reply(&state.reply[..len]);
                state.phase = TransportState::Idle;
                return WaitOutcome::Replied { len };
            }
            if Instant::now() >= deadline {
                state.phase = TransportState::TimedOut;
                return WaitOutcome::TimedOut;
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                trace!("reply slot deadline reached");
            }
        }
    }

    /// Whether a reply would be accepted now.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.lock().phase.accepts_reply()
    }

    #[must_use]
    pub fn phase(&self) -> TransportState {
        self.state.lock().phase
    }

    /// Crash offset, once one has been reported.
    #[must_use]
    pub fn crashed(&self) -> Option<u32> {
        self.state.lock().crash
    }

    /// Replies accepted since creation.
    #[must_use]
    pub fn completions(&self) -> u64 {
        self.state.lock().completions
    }
}

impl Default for ReplySlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_reply_before_wait_is_not_lost() {
        let slot = ReplySlot::new();
        let mut msg = Message::with_max_capacity();
        slot.arm().unwrap();
        assert!(slot.complete(&[1, 2, 3, 4]));

        let outcome = slot.wait_until(Instant::now() + Duration::from_millis(50), &mut msg);
        assert_eq!(outcome, WaitOutcome::Replied { len: 4 });
        assert_eq!(msg.reply(), &[1, 2, 3, 4]);
        assert_eq!(slot.phase(), TransportState::Idle);
    }

    #[test]
    fn test_reply_from_other_thread() {
        let slot = Arc::new(ReplySlot::new());
        let mut msg = Message::with_max_capacity();
        slot.arm().unwrap();

        let notifier = Arc::clone(&slot);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            notifier.complete(&[9; 16])
        });

        let outcome = slot.wait_until(Instant::now() + Duration::from_millis(500), &mut msg);
        assert!(handle.join().unwrap());
        assert_eq!(outcome, WaitOutcome::Replied { len: 16 });
    }

    #[test]
    fn test_deadline_expires() {
        let slot = ReplySlot::new();
        let mut msg = Message::with_max_capacity();
        slot.arm().unwrap();

        let started = Instant::now();
        let outcome = slot.wait_until(started + Duration::from_millis(20), &mut msg);
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(slot.phase(), TransportState::TimedOut);
    }

    #[test]
    fn test_unarmed_slot_refuses_reply() {
        let slot = ReplySlot::new();
        assert!(!slot.complete(&[0; 8]));
        assert_eq!(slot.completions(), 0);
        assert_eq!(slot.phase(), TransportState::Idle);
    }

    #[test]
    fn test_late_reply_after_timeout_refused() {
        let slot = ReplySlot::new();
        let mut msg = Message::with_max_capacity();
        slot.arm().unwrap();
        slot.wait_until(Instant::now(), &mut msg);
        assert!(!slot.complete(&[0; 8]));
    }

    #[test]
    fn test_double_arm_rejected() {
        let slot = ReplySlot::new();
        slot.arm().unwrap();
        assert!(matches!(slot.arm(), Err(TransportError::AlreadyInFlight)));
    }

    #[test]
    fn test_crash_wakes_waiter_and_blocks_rearm() {
        let slot = Arc::new(ReplySlot::new());
        let mut msg = Message::with_max_capacity();
        slot.arm().unwrap();

        let notifier = Arc::clone(&slot);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            notifier.crash(0x40);
        });

        let outcome = slot.wait_until(Instant::now() + Duration::from_secs(5), &mut msg);
        assert_eq!(outcome, WaitOutcome::Crashed { offset: 0x40 });
        assert!(matches!(
            slot.arm(),
            Err(TransportError::FirmwareCrashed { offset: 0x40 })
        ));
    }
}
