//! # RX Classifier
//!
//! Interprets notifications delivered by the platform and feeds replies back
//! into the transport's [`ReplySlot`].
//!
//! ## Dispatch (incoming mailbox message)
//!
//! | Class                                   | Action                               |
//! |-----------------------------------------|--------------------------------------|
//! | `REPLY`                                 | Complete pending send, else error    |
//! | `FW_READY`                              | Ack firmware, mark boot complete     |
//! | `COMPOUND` `TPLG` `PM` `COMP` `STREAM` `TRACE` | Read reply, complete pending send |
//! | anything else (including `DAI`)         | Log and drop                         |
//!
//! Nothing here terminates the process. A crash notification is latched in
//! the slot and the boot signal; the sender turns it into an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ipc_types::{CmdHeader, CompReply, GlobalClass, CMD_HDR_SIZE, MAX_MSG_SIZE};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::ports::{DspMailbox, IpcHandler};
use crate::service::reply_slot::ReplySlot;

// =============================================================================
// BOOT SIGNAL
// =============================================================================

/// Firmware boot progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Booting,
    Ready,
    Crashed { offset: u32 },
}

/// The session's boot-complete flag, waitable from the session thread.
#[derive(Debug)]
pub struct BootSignal {
    state: Mutex<BootState>,
    changed: Condvar,
}

impl BootSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BootState::Booting),
            changed: Condvar::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> BootState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() == BootState::Ready
    }

    fn set(&self, next: BootState) {
        let mut state = self.state.lock();
        // A crash is final.
        if !matches!(*state, BootState::Crashed { .. }) {
            *state = next;
        }
        self.changed.notify_all();
    }

    /// Block until the firmware is ready, crashed, or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> BootState {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state == BootState::Booting {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state
    }
}

impl Default for BootSignal {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Counters for every notification outcome.
#[derive(Debug, Default)]
pub struct ClassifierStats {
    pub replies: AtomicU64,
    pub unexpected_replies: AtomicU64,
    pub fw_ready: AtomicU64,
    pub unknown: AtomicU64,
    pub read_errors: AtomicU64,
    pub crashes: AtomicU64,
}

impl ClassifierStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Notification handler for one session.
pub struct RxClassifier {
    slot: Arc<ReplySlot>,
    boot: Arc<BootSignal>,
    stats: ClassifierStats,
}

impl RxClassifier {
    /// Classifier completing `slot`, with a fresh boot signal.
    #[must_use]
    pub fn new(slot: Arc<ReplySlot>) -> Self {
        Self::with_boot_signal(slot, Arc::new(BootSignal::new()))
    }

    #[must_use]
    pub fn with_boot_signal(slot: Arc<ReplySlot>, boot: Arc<BootSignal>) -> Self {
        Self {
            slot,
            boot,
            stats: ClassifierStats::default(),
        }
    }

    #[must_use]
    pub fn boot_signal(&self) -> Arc<BootSignal> {
        Arc::clone(&self.boot)
    }

    #[must_use]
    pub fn stats(&self) -> &ClassifierStats {
        &self.stats
    }

    /// Hand `reply` to the pending send, or log it as unexpected.
    fn deliver(&self, hdr: CmdHeader, reply: &[u8]) {
        if self.slot.complete(reply) {
            ClassifierStats::bump(&self.stats.replies);
            debug!(
                header = format_args!("{:#x}", hdr.cmd),
                size = hdr.size,
                reply = reply.len(),
                "ipc: reply delivered"
            );
        } else {
            ClassifierStats::bump(&self.stats.unexpected_replies);
            error!(
                header = format_args!("{:#x}", hdr.cmd),
                "error: ipc reply with no pending send"
            );
        }
    }

    fn read_comp_reply(&self, mailbox: &dyn DspMailbox, hdr: CmdHeader) {
        let mut raw = [0u8; CompReply::SIZE];
        if let Err(e) = mailbox.mailbox_read(0, &mut raw) {
            ClassifierStats::bump(&self.stats.read_errors);
            error!(error = %e, header = format_args!("{:#x}", hdr.cmd), "mailbox read failed");
            return;
        }
        self.deliver(hdr, &raw);
    }
}

impl IpcHandler for RxClassifier {
    fn ipc_msg_rx(&self, mailbox: &dyn DspMailbox) {
        let mut raw = [0u8; CMD_HDR_SIZE];
        if let Err(e) = mailbox.mailbox_read(0, &mut raw) {
            ClassifierStats::bump(&self.stats.read_errors);
            error!(error = %e, "mailbox header read failed");
            return;
        }
        let hdr = match CmdHeader::from_bytes(&raw) {
            Ok(hdr) => hdr,
            Err(e) => {
                ClassifierStats::bump(&self.stats.read_errors);
                error!(error = %e, "mailbox header malformed");
                return;
            }
        };
        debug!(cmd = format_args!("{:#x}", hdr.class_bits()), "ipc: rx");

        match GlobalClass::from_cmd(hdr.cmd) {
            Some(GlobalClass::Reply) => {
                if self.slot.is_pending() {
                    self.read_comp_reply(mailbox, hdr);
                } else {
                    ClassifierStats::bump(&self.stats.unexpected_replies);
                    error!(
                        header = format_args!("{:#x}", hdr.cmd),
                        "error: ipc reply unknown"
                    );
                }
            }
            Some(GlobalClass::FwReady) => {
                if let Err(e) = mailbox.fw_ready() {
                    warn!(error = %e, "firmware ready acknowledgement failed");
                }
                ClassifierStats::bump(&self.stats.fw_ready);
                self.boot.set(BootState::Ready);
                info!("FW boot complete");
            }
            Some(
                GlobalClass::Compound
                | GlobalClass::Topology
                | GlobalClass::PowerManagement
                | GlobalClass::Component
                | GlobalClass::Stream
                | GlobalClass::Trace,
            ) => self.read_comp_reply(mailbox, hdr),
            Some(GlobalClass::Dai) | None => {
                ClassifierStats::bump(&self.stats.unknown);
                error!(
                    cmd = format_args!("{:#x}", hdr.class_bits()),
                    "error: unknown DSP message"
                );
            }
        }
    }

    fn ipc_msg_reply(&self, mailbox: &dyn DspMailbox) {
        let mut buf = [0u8; MAX_MSG_SIZE];
        let len = match mailbox.get_reply(&mut buf) {
            Ok(len) => len.min(MAX_MSG_SIZE),
            Err(e) => {
                // The sender is still woken; it finds an empty reply.
                ClassifierStats::bump(&self.stats.read_errors);
                error!(error = %e, "error: incorrect DSP reply");
                0
            }
        };
        let hdr = CmdHeader::from_bytes(&buf[..len]).unwrap_or_default();
        self.deliver(hdr, &buf[..len]);
    }

    fn ipc_crash(&self, offset: u32) {
        ClassifierStats::bump(&self.stats.crashes);
        error!(offset = format_args!("{offset:#x}"), "DSP has crashed");
        self.slot.crash(offset);
        self.boot.set(BootState::Crashed { offset });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportState;
    use crate::error::PlatformError;
    use ipc_types::{cmd_type, Message};
    use std::thread;

    /// Mailbox holding fixed bytes.
    struct FixedMailbox {
        bytes: Vec<u8>,
        acked: AtomicU64,
    }

    impl FixedMailbox {
        fn with_header(cmd: u32) -> Self {
            let reply = CompReply {
                hdr: CmdHeader::new(cmd, CompReply::SIZE as u32),
                error: 0,
                comp_id: 7,
            };
            Self {
                bytes: reply.to_bytes().to_vec(),
                acked: AtomicU64::new(0),
            }
        }
    }

    impl DspMailbox for FixedMailbox {
        fn mailbox_read(&self, offset: usize, buf: &mut [u8]) -> Result<(), PlatformError> {
            let end = offset + buf.len();
            if end > self.bytes.len() {
                return Err(PlatformError::MailboxOutOfBounds {
                    offset,
                    len: buf.len(),
                    size: self.bytes.len(),
                });
            }
            buf.copy_from_slice(&self.bytes[offset..end]);
            Ok(())
        }

        fn get_reply(&self, reply: &mut [u8]) -> Result<usize, PlatformError> {
            reply[..self.bytes.len()].copy_from_slice(&self.bytes);
            Ok(self.bytes.len())
        }

        fn fw_ready(&self) -> Result<(), PlatformError> {
            self.acked.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn classifier() -> (Arc<ReplySlot>, RxClassifier) {
        let slot = Arc::new(ReplySlot::new());
        let classifier = RxClassifier::new(Arc::clone(&slot));
        (slot, classifier)
    }

    #[test]
    fn test_component_reply_completes_pending_send() {
        let (slot, classifier) = classifier();
        slot.arm().unwrap();

        let cmd = GlobalClass::Component.bits() | cmd_type(0x001);
        classifier.ipc_msg_rx(&FixedMailbox::with_header(cmd));

        assert_eq!(slot.phase(), TransportState::Replied);
        assert_eq!(ClassifierStats::get(&classifier.stats().replies), 1);

        let mut msg = Message::with_max_capacity();
        slot.wait_until(Instant::now(), &mut msg);
        assert_eq!(CompReply::from_bytes(msg.reply()).unwrap().comp_id, 7);
    }

    #[test]
    fn test_every_reply_class_completes() {
        for class in [
            GlobalClass::Compound,
            GlobalClass::Topology,
            GlobalClass::PowerManagement,
            GlobalClass::Component,
            GlobalClass::Stream,
            GlobalClass::Trace,
        ] {
            let (slot, classifier) = classifier();
            slot.arm().unwrap();
            classifier.ipc_msg_rx(&FixedMailbox::with_header(class.bits()));
            assert_eq!(slot.phase(), TransportState::Replied, "class {class}");
        }
    }

    #[test]
    fn test_unknown_class_does_not_signal() {
        let (slot, classifier) = classifier();
        slot.arm().unwrap();

        for cmd in [0x0000_0000, 0xa000_0000, 0xf001_0000, GlobalClass::Dai.bits()] {
            classifier.ipc_msg_rx(&FixedMailbox::with_header(cmd));
        }

        assert_eq!(slot.phase(), TransportState::Sending);
        assert_eq!(slot.completions(), 0);
        assert_eq!(ClassifierStats::get(&classifier.stats().unknown), 4);

        let mut msg = Message::with_max_capacity();
        let outcome = slot.wait_until(Instant::now() + Duration::from_millis(10), &mut msg);
        assert_eq!(outcome, crate::service::WaitOutcome::TimedOut);
    }

    #[test]
    fn test_reply_without_pending_send_is_logged_only() {
        let (slot, classifier) = classifier();
        classifier.ipc_msg_rx(&FixedMailbox::with_header(GlobalClass::Reply.bits()));

        assert_eq!(slot.phase(), TransportState::Idle);
        assert_eq!(slot.completions(), 0);
        assert_eq!(ClassifierStats::get(&classifier.stats().unexpected_replies), 1);
    }

    #[test]
    fn test_reply_class_with_pending_send_completes() {
        let (slot, classifier) = classifier();
        slot.arm().unwrap();
        classifier.ipc_msg_rx(&FixedMailbox::with_header(GlobalClass::Reply.bits()));
        assert_eq!(slot.completions(), 1);
    }

    #[test]
    fn test_fw_ready_marks_boot_without_completing() {
        let (slot, classifier) = classifier();
        slot.arm().unwrap();
        let mailbox = FixedMailbox::with_header(GlobalClass::FwReady.bits());

        classifier.ipc_msg_rx(&mailbox);

        assert!(classifier.boot_signal().is_complete());
        assert_eq!(mailbox.acked.load(Ordering::Relaxed), 1);
        assert_eq!(slot.completions(), 0);
        assert_eq!(slot.phase(), TransportState::Sending);
    }

    #[test]
    fn test_boot_wait_sees_ready_from_other_thread() {
        let (_slot, classifier) = classifier();
        let classifier = Arc::new(classifier);
        let boot = classifier.boot_signal();

        let notifier = Arc::clone(&classifier);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            notifier.ipc_msg_rx(&FixedMailbox::with_header(GlobalClass::FwReady.bits()));
        });

        assert_eq!(boot.wait(Duration::from_secs(2)), BootState::Ready);
    }

    #[test]
    fn test_boot_wait_times_out() {
        let boot = BootSignal::new();
        assert_eq!(boot.wait(Duration::from_millis(10)), BootState::Booting);
    }

    #[test]
    fn test_crash_latches_everywhere() {
        let (slot, classifier) = classifier();
        classifier.ipc_crash(0x2000);

        assert_eq!(slot.crashed(), Some(0x2000));
        assert_eq!(
            classifier.boot_signal().state(),
            BootState::Crashed { offset: 0x2000 }
        );
        // Ready after a crash does not resurrect the session.
        classifier.ipc_msg_rx(&FixedMailbox::with_header(GlobalClass::FwReady.bits()));
        assert_eq!(
            classifier.boot_signal().state(),
            BootState::Crashed { offset: 0x2000 }
        );
    }

    #[test]
    fn test_reply_doorbell_delivers_get_reply() {
        let (slot, classifier) = classifier();
        slot.arm().unwrap();
        classifier.ipc_msg_reply(&FixedMailbox::with_header(GlobalClass::Stream.bits()));
        assert_eq!(slot.completions(), 1);
    }

    #[test]
    fn test_truncated_mailbox_is_read_error() {
        let (slot, classifier) = classifier();
        slot.arm().unwrap();
        let mailbox = FixedMailbox {
            bytes: CmdHeader::new(GlobalClass::Component.bits(), 8).to_bytes().to_vec(),
            acked: AtomicU64::new(0),
        };
        classifier.ipc_msg_rx(&mailbox);
        assert_eq!(slot.completions(), 0);
        assert_eq!(ClassifierStats::get(&classifier.stats().read_errors), 1);
    }
}
