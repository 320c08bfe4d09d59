//! # Session Driver
//!
//! Runs one fuzzing session against one platform:
//!
//! ```text
//! init ──► boot wait ──► topology ──► volume loop ──► shutdown
//!   │          │            │              │              │
//!   │     FW_READY      CommandSink    0 / 65536      platform.free
//!   │                                                 broker.free_all
//!   └─ platform.init(broker, classifier)
//! ```
//!
//! The session owns the platform binding, the region broker and the
//! transport. The classifier is shared with the platform's notification
//! path and reaches the transport only through the reply slot.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ipc_transport::{
    BootState, ClassifierStats, CommandSink, IpcHandler, MutationPolicy, PlatformBinding,
    PlatformError, RegionAllocator, RegionBroker, RxClassifier, SendReport, Teardown,
    TopologyLoader, Transport, TransportError,
};
use ipc_types::{CompReply, VolumeCommand};
use tracing::{debug, error, info, warn};

use crate::container::{FuzzerConfig, SessionConfig};
use crate::error::SessionError;

/// Iterations between progress lines.
const PROGRESS_EVERY: u32 = 1_000;

/// Outcome of [`Session::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Volume commands sent.
    pub sent: u32,
    /// Sends the platform rejected but that were still answered.
    pub rejected: u32,
    /// Replies carrying a non-zero firmware error.
    pub firmware_errors: u32,
    pub elapsed: Duration,
}

/// One platform, one transport, one run.
pub struct Session {
    platform: Box<dyn PlatformBinding>,
    broker: RegionBroker,
    transport: Transport,
    classifier: Arc<RxClassifier>,
    config: SessionConfig,
    initialised: bool,
    teardown: Option<Teardown>,
}

impl Session {
    /// Wire a session; nothing touches the platform until [`Session::init`].
    #[must_use]
    pub fn new(
        platform: Box<dyn PlatformBinding>,
        allocator: Box<dyn RegionAllocator>,
        config: &FuzzerConfig,
    ) -> Self {
        let policy = if config.mutation.enabled {
            MutationPolicy::enabled(config.mutation.seed)
        } else {
            MutationPolicy::Disabled
        };
        let transport = Transport::new(config.transport.clone(), policy);
        let classifier = Arc::new(RxClassifier::new(transport.slot()));

        Self {
            platform,
            broker: RegionBroker::new(allocator),
            transport,
            classifier,
            config: config.session.clone(),
            initialised: false,
            teardown: None,
        }
    }

    #[must_use]
    pub fn platform_name(&self) -> &'static str {
        self.platform.name()
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    #[must_use]
    pub fn stats(&self) -> &ClassifierStats {
        self.classifier.stats()
    }

    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Bring the platform up and wait for the firmware to boot.
    pub fn init(&mut self) -> Result<(), SessionError> {
        let handler: Arc<dyn IpcHandler> = self.classifier.clone();
        let platform = self.platform.name();

        self.platform
            .init(&mut self.broker, handler)
            .inspect_err(|e| error!(platform, error = %e, "platform init failed"))?;

        let timeout = self.config.boot_timeout;
        match self.classifier.boot_signal().wait(timeout) {
            BootState::Ready => {
                self.initialised = true;
                info!(
                    platform,
                    io = self.broker.io_regions(),
                    mem = self.broker.mem_regions(),
                    fuzzing = self.transport.fuzzing_enabled(),
                    "session ready"
                );
                Ok(())
            }
            BootState::Booting => Err(PlatformError::BootTimeout {
                waited_ms: timeout.as_millis() as u64,
            }
            .into()),
            BootState::Crashed { offset } => Err(TransportError::FirmwareCrashed { offset }.into()),
        }
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.initialised && self.teardown.is_none() {
            Ok(())
        } else {
            Err(SessionError::NotInitialised)
        }
    }

    /// Load a topology through `loader`, returning the messages sent.
    pub fn load_topology(
        &mut self,
        loader: &mut dyn TopologyLoader,
        path: &Path,
    ) -> Result<usize, SessionError> {
        self.ensure_ready()?;
        Ok(loader.parse(path, self)?)
    }

    /// Send one volume command setting every channel to `value`.
    pub fn send_volume(&mut self, value: u32) -> Result<SendReport, SessionError> {
        self.ensure_ready()?;
        let command = VolumeCommand::uniform(self.config.comp_id, self.config.channels, value);
        let bytes = command.encode().map_err(TransportError::from)?;
        Ok(self
            .transport
            .send_bytes(self.platform.as_mut(), &bytes, CompReply::SIZE)?)
    }

    /// Firmware status of the last reply, when it was a full component reply.
    #[must_use]
    pub fn last_reply(&self) -> Option<CompReply> {
        CompReply::from_bytes(self.transport.message().reply()).ok()
    }

    /// Issue the configured number of volume commands, alternating the low
    /// volume on even iterations and the high volume on odd ones.
    pub fn run(&mut self) -> Result<RunSummary, SessionError> {
        self.ensure_ready()?;
        let started = Instant::now();
        let mut summary = RunSummary::default();

        for i in 0..self.config.iterations {
            let report = self.send_volume(self.config.volume_for(i))?;
            summary.sent += 1;
            if report.send_failed {
                summary.rejected += 1;
            }
            if let Some(reply) = self.last_reply().filter(|reply| reply.error != 0) {
                summary.firmware_errors += 1;
                debug!(
                    iteration = i,
                    error = reply.error,
                    header = format_args!("{:#x}", report.sent.cmd),
                    "firmware rejected command"
                );
            }
            if (i + 1) % PROGRESS_EVERY == 0 {
                info!(sent = i + 1, total = self.config.iterations, "fuzzing progress");
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            sent = summary.sent,
            rejected = summary.rejected,
            firmware_errors = summary.firmware_errors,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "run complete"
        );
        Ok(summary)
    }

    /// Free the platform, then every region. Idempotent.
    pub fn shutdown(&mut self) -> Teardown {
        if let Some(teardown) = self.teardown {
            return teardown;
        }
        self.platform.free();
        let teardown = self.broker.free_all();
        self.teardown = Some(teardown);

        let stats = self.classifier.stats();
        let unknown = ClassifierStats::get(&stats.unknown);
        if unknown > 0 {
            warn!(unknown, "unclassified DSP messages were dropped");
        }
        info!(
            platform = self.platform.name(),
            io = teardown.io_released,
            mem = teardown.mem_released,
            replies = ClassifierStats::get(&stats.replies),
            "session closed"
        );
        teardown
    }
}

impl CommandSink for Session {
    fn send_command(&mut self, bytes: &[u8], reply_size: usize) -> Result<(), TransportError> {
        self.transport
            .send_bytes(self.platform.as_mut(), bytes, reply_size)
            .map(|_| ())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
