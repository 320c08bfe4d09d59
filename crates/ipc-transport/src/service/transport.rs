//! # Synchronous Transport
//!
//! Sends one message at a time and blocks until its reply arrives or the
//! reply deadline passes. There are no retries: a timeout ends the run.
//!
//! ## Send Sequence
//!
//! 1. Mutate the header in place if fuzzing is enabled
//! 2. Dump the outgoing message
//! 3. Hand it to the platform (a rejected send is logged, then waited on
//!    like any other)
//! 4. Wait on the [`ReplySlot`] until `now + reply_timeout`
//! 5. On reply, dump it and hold off for the quiescence delay

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ipc_types::{CmdHeader, Message};
use tracing::{debug, error};

use crate::domain::{MutationPolicy, MutationRecord, TransportState};
use crate::error::TransportError;
use crate::ports::PlatformBinding;
use crate::service::reply_slot::{ReplySlot, WaitOutcome};
use crate::{DEFAULT_QUIESCENCE_MS, DEFAULT_REPLY_TIMEOUT_MS};

/// Transport timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// How long a send waits for its reply.
    pub reply_timeout: Duration,
    /// Pause after a reply before `send` returns.
    pub quiescence: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_millis(DEFAULT_REPLY_TIMEOUT_MS),
            quiescence: Duration::from_millis(DEFAULT_QUIESCENCE_MS),
        }
    }
}

/// What happened to one successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Header as transmitted (after mutation).
    pub sent: CmdHeader,
    pub mutation: Option<MutationRecord>,
    /// The platform rejected the message but a reply arrived anyway.
    pub send_failed: bool,
    /// Header of the reply, when it carried one.
    pub reply_header: Option<CmdHeader>,
    pub reply_len: usize,
    /// Time from handing the message to the platform until the reply.
    pub latency: Duration,
}

/// Synchronous request/reply transport owning the session's message pair.
pub struct Transport {
    message: Message,
    policy: MutationPolicy,
    slot: Arc<ReplySlot>,
    config: TransportConfig,
    sends: u64,
}

impl Transport {
    /// Create a transport with a freshly allocated message pair.
    #[must_use]
    pub fn new(config: TransportConfig, policy: MutationPolicy) -> Self {
        Self {
            message: Message::with_max_capacity(),
            policy,
            slot: Arc::new(ReplySlot::new()),
            config,
            sends: 0,
        }
    }

    /// The slot the notification path completes.
    #[must_use]
    pub fn slot(&self) -> Arc<ReplySlot> {
        Arc::clone(&self.slot)
    }

    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    #[must_use]
    pub fn fuzzing_enabled(&self) -> bool {
        self.policy.is_enabled()
    }

    #[must_use]
    pub fn state(&self) -> TransportState {
        self.slot.phase()
    }

    /// Sends attempted so far.
    #[must_use]
    pub fn sends(&self) -> u64 {
        self.sends
    }

    /// Load `bytes` into the outgoing buffer and send it.
    pub fn send_bytes(
        &mut self,
        platform: &mut dyn PlatformBinding,
        bytes: &[u8],
        reply_size: usize,
    ) -> Result<SendReport, TransportError> {
        self.message.load(bytes, reply_size)?;
        self.send(platform)
    }

    /// Send the loaded message and wait for its reply.
    pub fn send(&mut self, platform: &mut dyn PlatformBinding) -> Result<SendReport, TransportError> {
        let mutation = self.policy.apply(self.message.cmd_header());
        if let Some(record) = &mutation {
            self.message.apply_header(record.mutated);
        }
        let sent = self.message.cmd_header();

        debug!(
            header = format_args!("{:#x}", self.message.header),
            size = self.message.msg_size(),
            reply = self.message.reply_size(),
            "ipc: tx"
        );

        self.slot.arm()?;
        self.sends += 1;

        let send_failed = match platform.send_msg(&self.message) {
            Ok(()) => false,
            Err(e) => {
                error!(error = %e, "message tx failed");
                true
            }
        };

        let started = Instant::now();
        let deadline = started + self.config.reply_timeout;

        match self.slot.wait_until(deadline, &mut self.message) {
            WaitOutcome::Replied { len } => {
                let latency = started.elapsed();
                let reply_header = self.message.reply_header().ok();
                debug!(
                    header = format_args!("{:#x}", reply_header.map_or(0, |h| h.cmd)),
                    size = reply_header.map_or(0, |h| h.size),
                    reply = len,
                    latency_us = latency.as_micros() as u64,
                    "ipc: rx reply"
                );

                if !self.config.quiescence.is_zero() {
                    thread::sleep(self.config.quiescence);
                }

                Ok(SendReport {
                    sent,
                    mutation,
                    send_failed,
                    reply_header,
                    reply_len: len,
                    latency,
                })
            }
            WaitOutcome::TimedOut => {
                let waited_ms = started.elapsed().as_millis() as u64;
                error!(
                    header = format_args!("{:#x}", self.message.header),
                    size = self.message.msg_size(),
                    reply = self.message.reply_size(),
                    waited_ms,
                    "IPC timeout"
                );
                Err(TransportError::Timeout {
                    header: self.message.header,
                    size: self.message.msg_size(),
                    reply_size: self.message.reply_size(),
                    waited_ms,
                })
            }
            WaitOutcome::Crashed { offset } => {
                error!(
                    header = format_args!("{:#x}", self.message.header),
                    offset = format_args!("{offset:#x}"),
                    "DSP crashed while awaiting reply"
                );
                Err(TransportError::FirmwareCrashed { offset })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::ports::{DspMailbox, IpcHandler, PlatformDescriptor};
    use crate::service::{RegionBroker, RxClassifier};
    use ipc_types::{CompReply, VolumeCommand, MAX_MSG_SIZE};
    use parking_lot::Mutex;

    /// Mailbox that answers with a component reply echoing the last command.
    struct EchoMailbox {
        last: Mutex<CmdHeader>,
    }

    impl DspMailbox for EchoMailbox {
        fn mailbox_read(&self, offset: usize, buf: &mut [u8]) -> Result<(), PlatformError> {
            let bytes = self.reply_bytes();
            buf.copy_from_slice(&bytes[offset..offset + buf.len()]);
            Ok(())
        }

        fn get_reply(&self, reply: &mut [u8]) -> Result<usize, PlatformError> {
            let bytes = self.reply_bytes();
            reply[..bytes.len()].copy_from_slice(&bytes);
            Ok(bytes.len())
        }

        fn fw_ready(&self) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    impl EchoMailbox {
        fn reply_bytes(&self) -> [u8; CompReply::SIZE] {
            CompReply {
                hdr: CmdHeader::new(self.last.lock().cmd, CompReply::SIZE as u32),
                error: 0,
                comp_id: 2,
            }
            .to_bytes()
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Behaviour {
        /// Reply synchronously from inside `send_msg`.
        Inline,
        /// Reply from another thread after a short delay.
        Threaded,
        /// Never reply.
        Silent,
        /// Reject the send but still reply.
        RejectThenReply,
        /// Report a crash instead of replying.
        Crash,
    }

    struct MockPlatform {
        descriptor: PlatformDescriptor,
        behaviour: Behaviour,
        handler: Arc<RxClassifier>,
        mailbox: Arc<EchoMailbox>,
        sent: Vec<Vec<u8>>,
    }

    impl MockPlatform {
        fn new(behaviour: Behaviour, handler: Arc<RxClassifier>) -> Self {
            Self {
                descriptor: PlatformDescriptor {
                    name: "mock",
                    description: "transport test double",
                    reg_regions: vec![],
                    mem_regions: vec![],
                },
                behaviour,
                handler,
                mailbox: Arc::new(EchoMailbox {
                    last: Mutex::new(CmdHeader::default()),
                }),
                sent: Vec::new(),
            }
        }
    }

    impl PlatformBinding for MockPlatform {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn descriptor(&self) -> &PlatformDescriptor {
            &self.descriptor
        }

        fn init(
            &mut self,
            _regions: &mut RegionBroker,
            _handler: Arc<dyn IpcHandler>,
        ) -> Result<(), PlatformError> {
            Ok(())
        }

        fn free(&mut self) {}

        fn send_msg(&mut self, msg: &Message) -> Result<(), PlatformError> {
            self.sent.push(msg.payload().to_vec());
            *self.mailbox.last.lock() = msg.cmd_header();
            match self.behaviour {
                Behaviour::Inline => self.handler.ipc_msg_reply(self.mailbox.as_ref()),
                Behaviour::Threaded | Behaviour::RejectThenReply => {
                    let handler = Arc::clone(&self.handler);
                    let mailbox = Arc::clone(&self.mailbox);
                    thread::spawn(move || {
                        thread::sleep(Duration::from_millis(5));
                        handler.ipc_msg_reply(mailbox.as_ref());
                    });
                }
                Behaviour::Silent => {}
                Behaviour::Crash => self.handler.ipc_crash(0x100),
            }
            if self.behaviour == Behaviour::RejectThenReply {
                return Err(PlatformError::SendRejected { status: -5 });
            }
            Ok(())
        }
    }

    fn fast_config() -> TransportConfig {
        TransportConfig {
            reply_timeout: Duration::from_millis(300),
            quiescence: Duration::ZERO,
        }
    }

    fn setup(behaviour: Behaviour, policy: MutationPolicy) -> (Transport, MockPlatform) {
        let transport = Transport::new(fast_config(), policy);
        let classifier = Arc::new(RxClassifier::new(transport.slot()));
        (transport, MockPlatform::new(behaviour, classifier))
    }

    fn volume_bytes(value: u32) -> Vec<u8> {
        VolumeCommand::uniform(2, 2, value).encode().unwrap()
    }

    #[test]
    fn test_inline_reply_completes() {
        let (mut transport, mut platform) = setup(Behaviour::Inline, MutationPolicy::Disabled);
        let bytes = volume_bytes(0);

        let report = transport.send_bytes(&mut platform, &bytes, bytes.len()).unwrap();
        assert_eq!(report.reply_len, CompReply::SIZE);
        assert_eq!(report.reply_header.unwrap().cmd, VolumeCommand::cmd());
        assert!(report.latency < Duration::from_millis(300));
        assert_eq!(transport.state(), TransportState::Idle);
    }

    #[test]
    fn test_threaded_reply_completes() {
        let (mut transport, mut platform) = setup(Behaviour::Threaded, MutationPolicy::Disabled);
        let bytes = volume_bytes(0x1_0000);

        let report = transport.send_bytes(&mut platform, &bytes, bytes.len()).unwrap();
        assert!(!report.send_failed);
        assert_eq!(transport.sends(), 1);
    }

    #[test]
    fn test_disabled_fuzzing_sends_exact_bytes() {
        let (mut transport, mut platform) = setup(Behaviour::Inline, MutationPolicy::Disabled);
        let bytes = volume_bytes(0x1_0000);

        let report = transport.send_bytes(&mut platform, &bytes, bytes.len()).unwrap();
        assert!(report.mutation.is_none());
        assert_eq!(platform.sent, vec![bytes]);
    }

    #[test]
    fn test_enabled_fuzzing_rewrites_header() {
        let (mut transport, mut platform) =
            setup(Behaviour::Inline, MutationPolicy::enabled(Some(11)));
        let bytes = volume_bytes(0);

        for _ in 0..50 {
            let report = transport.send_bytes(&mut platform, &bytes, bytes.len()).unwrap();
            let record = report.mutation.unwrap();
            assert_eq!(report.sent, record.mutated);
            assert!(record.mutated.size >= 1 && record.mutated.size as usize <= MAX_MSG_SIZE);
        }
        let last = platform.sent.last().unwrap();
        assert_eq!(CmdHeader::from_bytes(last).unwrap(), transport.message().cmd_header());
    }

    #[test]
    fn test_silent_platform_times_out() {
        let (mut transport, mut platform) = setup(Behaviour::Silent, MutationPolicy::Disabled);
        let bytes = volume_bytes(0);

        let started = Instant::now();
        let err = transport.send_bytes(&mut platform, &bytes, bytes.len()).unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(err.is_fatal());
        match err {
            TransportError::Timeout { header, size, .. } => {
                assert_eq!(header, VolumeCommand::cmd());
                assert_eq!(size, bytes.len());
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(transport.state(), TransportState::TimedOut);
    }

    #[test]
    fn test_rejected_send_still_waits() {
        let (mut transport, mut platform) =
            setup(Behaviour::RejectThenReply, MutationPolicy::Disabled);
        let bytes = volume_bytes(0);

        let report = transport.send_bytes(&mut platform, &bytes, bytes.len()).unwrap();
        assert!(report.send_failed);
        assert_eq!(report.reply_len, CompReply::SIZE);
    }

    #[test]
    fn test_crash_is_fatal() {
        let (mut transport, mut platform) = setup(Behaviour::Crash, MutationPolicy::Disabled);
        let bytes = volume_bytes(0);

        let err = transport.send_bytes(&mut platform, &bytes, bytes.len()).unwrap_err();
        assert!(matches!(err, TransportError::FirmwareCrashed { offset: 0x100 }));
        assert!(err.is_fatal());

        let err = transport.send_bytes(&mut platform, &bytes, bytes.len()).unwrap_err();
        assert!(matches!(err, TransportError::FirmwareCrashed { .. }));
    }

    #[test]
    fn test_quiescence_delay_applied() {
        let mut transport = Transport::new(
            TransportConfig {
                reply_timeout: Duration::from_millis(300),
                quiescence: Duration::from_millis(50),
            },
            MutationPolicy::Disabled,
        );
        let classifier = Arc::new(RxClassifier::new(transport.slot()));
        let mut platform = MockPlatform::new(Behaviour::Inline, classifier);
        let bytes = volume_bytes(0);

        let started = Instant::now();
        transport.send_bytes(&mut platform, &bytes, bytes.len()).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
