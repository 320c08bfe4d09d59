//! # Emulated DSP Platform
//!
//! A [`PlatformBinding`] whose firmware is a thread in this process. It backs
//! every region of its descriptor through the broker, puts the mailbox in the
//! memory region named by its [`MailboxLayout`], and answers each message
//! the way the real firmware's IPC layer does.
//!
//! ```text
//!   session thread                         firmware thread
//!   ──────────────                         ───────────────
//!   send_msg ─► host box, IPCX busy ──► doorbell
//!                                          read host box
//!                                          execute, write DSP box
//!                                          IPCX done
//!   ReplySlot ◄───────────────────────── ipc_msg_reply
//! ```
//!
//! At start-up the firmware posts FW_READY through `ipc_msg_rx`. Fault modes
//! ([`FirmwareMode`]) make it go silent, crash or post garbage so the
//! harness's failure paths can be driven without hardware.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ipc_transport::{
    IpcHandler, PlatformBinding, PlatformDescriptor, PlatformError, RegionBroker, RegionError,
    SharedRegion,
};
use ipc_types::{
    CmdHeader, CommandCatalog, CompReply, GlobalClass, Message, VolumeCommand, CMD_HDR_SIZE,
    MAX_MSG_SIZE,
};
use tracing::{debug, error, info, trace, warn};

use super::descriptors::{self, MailboxLayout, DRAM_MAILBOX};
use super::mailbox::EmulatedMailbox;

const EINVAL: i32 = 22;
const EPIPE: i32 = 32;

/// Written to the exception area before a crash is reported.
pub const PANIC_MAGIC: u32 = 0x0dea_d000;

/// Host → DSP doorbell register in the SHIM.
pub const SHIM_IPCX: usize = 0x38;
pub const IPCX_BUSY: u64 = 1 << 63;
pub const IPCX_DONE: u64 = 1 << 62;

// =============================================================================
// BEHAVIOUR
// =============================================================================

/// How the emulated firmware reacts to host messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirmwareMode {
    /// Answer every message.
    #[default]
    Healthy,
    /// Boot, then never answer.
    Silent,
    /// Crash on the n-th message (1-based).
    CrashAfter(u64),
    /// Answer each message with an unsolicited notification of no known
    /// class instead of a reply.
    Unclassifiable,
    /// Never post FW_READY.
    NeverBoots,
}

/// Emulated firmware timing and fault mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareBehaviour {
    pub mode: FirmwareMode,
    /// Delay before FW_READY.
    pub boot_delay: Duration,
    /// Delay before each reply.
    pub reply_delay: Duration,
}

impl FirmwareBehaviour {
    #[must_use]
    pub fn with_mode(mode: FirmwareMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

// =============================================================================
// SHIM
// =============================================================================

/// The SHIM register block.
#[derive(Debug, Clone)]
pub struct Shim {
    region: SharedRegion,
}

impl Shim {
    fn read64(&self, offset: usize) -> Result<u64, RegionError> {
        let mut raw = [0u8; 8];
        self.region.read(offset, &mut raw)?;
        Ok(u64::from_le_bytes(raw))
    }

    fn write64(&self, offset: usize, value: u64) -> Result<(), RegionError> {
        self.region.write(offset, &value.to_le_bytes())
    }

    /// Current IPCX value.
    pub fn ipcx(&self) -> Result<u64, RegionError> {
        self.read64(SHIM_IPCX)
    }

    fn ring(&self, cmd: u32) -> Result<(), RegionError> {
        self.write64(SHIM_IPCX, IPCX_BUSY | u64::from(cmd))
    }

    fn done(&self) -> Result<(), RegionError> {
        let ipcx = self.ipcx()?;
        self.write64(SHIM_IPCX, (ipcx & !IPCX_BUSY) | IPCX_DONE)
    }
}

// =============================================================================
// FIRMWARE
// =============================================================================

enum Doorbell {
    HostMessage,
    Shutdown,
}

struct Firmware {
    platform: &'static str,
    mailbox: Arc<EmulatedMailbox>,
    shim: Shim,
    handler: Arc<dyn IpcHandler>,
    behaviour: FirmwareBehaviour,
    handled: Arc<AtomicU64>,
}

impl Firmware {
    fn run(self, doorbell: Receiver<Doorbell>) {
        if self.behaviour.mode != FirmwareMode::NeverBoots {
            thread::sleep(self.behaviour.boot_delay);
            self.post(CmdHeader::new(GlobalClass::FwReady.bits(), CMD_HDR_SIZE as u32));
        }

        while let Ok(Doorbell::HostMessage) = doorbell.recv() {
            self.host_message();
        }
        debug!(platform = self.platform, "firmware stopped");
    }

    /// Post a firmware-initiated message.
    fn post(&self, hdr: CmdHeader) {
        if let Err(e) = self.mailbox.dsp_write(&hdr.to_bytes()) {
            error!(platform = self.platform, error = %e, "firmware mailbox write failed");
            return;
        }
        self.handler.ipc_msg_rx(self.mailbox.as_ref());
    }

    fn host_message(&self) {
        let n = self.handled.fetch_add(1, Ordering::AcqRel) + 1;
        let request = match self.mailbox.host_read() {
            Ok(request) => request,
            Err(e) => {
                warn!(platform = self.platform, error = %e, "firmware can't read host box");
                return;
            }
        };
        trace!(platform = self.platform, n, request = %hex::encode(&request), "firmware rx");

        match self.behaviour.mode {
            FirmwareMode::Silent | FirmwareMode::NeverBoots => return,
            FirmwareMode::CrashAfter(at) if n >= at => {
                self.crash();
                return;
            }
            FirmwareMode::Unclassifiable => {
                self.post(CmdHeader::new(0xf << 28, CMD_HDR_SIZE as u32));
                return;
            }
            FirmwareMode::Healthy | FirmwareMode::CrashAfter(_) => {}
        }

        if !self.behaviour.reply_delay.is_zero() {
            thread::sleep(self.behaviour.reply_delay);
        }

        let reply = execute(&request);
        if reply.error != 0 {
            debug!(platform = self.platform, error = reply.error, "firmware rejected message");
        }
        if let Err(e) = self.mailbox.dsp_write(&reply.to_bytes()) {
            error!(platform = self.platform, error = %e, "firmware reply write failed");
            return;
        }
        if let Err(e) = self.shim.done() {
            warn!(platform = self.platform, error = %e, "IPCX update failed");
        }
        self.handler.ipc_msg_reply(self.mailbox.as_ref());
    }

    fn crash(&self) {
        let offset = self.mailbox.layout().exception;
        if let Err(e) = self.mailbox.exception_write(&PANIC_MAGIC.to_le_bytes()) {
            warn!(platform = self.platform, error = %e, "panic dump write failed");
        }
        self.handler.ipc_crash(offset as u32);
    }
}

/// Validate `request` and build the reply the firmware would send.
fn execute(request: &[u8]) -> CompReply {
    let hdr = CmdHeader::from_bytes(request).unwrap_or_default();
    let comp_id = request
        .get(12..16)
        .and_then(|raw| raw.try_into().ok())
        .map_or(0, u32::from_le_bytes);

    let size = hdr.size as usize;
    let valid = (CMD_HDR_SIZE..=MAX_MSG_SIZE).contains(&size)
        && CommandCatalog::is_known(hdr.cmd)
        && (hdr.cmd != VolumeCommand::cmd()
            || VolumeCommand::decode(&request[..size.min(request.len())]).is_ok());

    CompReply {
        hdr: CmdHeader::new(
            GlobalClass::Reply.bits() | hdr.opcode_bits(),
            CompReply::SIZE as u32,
        ),
        error: if valid { 0 } else { -EINVAL },
        comp_id,
    }
}

// =============================================================================
// PLATFORM
// =============================================================================

struct Running {
    mailbox: Arc<EmulatedMailbox>,
    shim: Shim,
    doorbell: Sender<Doorbell>,
    firmware: Option<JoinHandle<()>>,
}

/// In-process emulation of a DSP platform.
pub struct EmulatedPlatform {
    descriptor: PlatformDescriptor,
    layout: MailboxLayout,
    behaviour: FirmwareBehaviour,
    handled: Arc<AtomicU64>,
    running: Option<Running>,
}

impl EmulatedPlatform {
    #[must_use]
    pub fn new(descriptor: PlatformDescriptor, layout: MailboxLayout) -> Self {
        Self {
            descriptor,
            layout,
            behaviour: FirmwareBehaviour::default(),
            handled: Arc::new(AtomicU64::new(0)),
            running: None,
        }
    }

    #[must_use]
    pub fn byt() -> Self {
        Self::new(descriptors::byt(), DRAM_MAILBOX)
    }

    #[must_use]
    pub fn cht() -> Self {
        Self::new(descriptors::cht(), DRAM_MAILBOX)
    }

    #[must_use]
    pub fn with_behaviour(mut self, behaviour: FirmwareBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Host messages the firmware has picked up.
    #[must_use]
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn shim(&self) -> Option<&Shim> {
        self.running.as_ref().map(|running| &running.shim)
    }

    fn init_failed(&self, reason: impl Into<String>) -> PlatformError {
        PlatformError::InitFailed {
            platform: self.descriptor.name.to_string(),
            reason: reason.into(),
        }
    }
}

impl PlatformBinding for EmulatedPlatform {
    fn name(&self) -> &'static str {
        self.descriptor.name
    }

    fn descriptor(&self) -> &PlatformDescriptor {
        &self.descriptor
    }

    fn init(
        &mut self,
        regions: &mut RegionBroker,
        handler: Arc<dyn IpcHandler>,
    ) -> Result<(), PlatformError> {
        if self.running.is_some() {
            return Err(self.init_failed("already initialised"));
        }

        let mut shim = None;
        for (id, desc) in self.descriptor.reg_regions.iter().enumerate() {
            let region = regions.create_io_region(id as u32, desc)?;
            if desc.name == "shim" {
                shim = Some(Shim { region });
            }
        }

        let base = self.descriptor.num_reg_regions();
        let mut mailbox_region = None;
        for (i, desc) in self.descriptor.mem_regions.iter().enumerate() {
            let region = regions.create_memory_region((base + i) as u32, desc)?;
            if desc.name == self.layout.region {
                mailbox_region = Some(region);
            }
        }

        let shim = shim.ok_or_else(|| self.init_failed("no shim region"))?;
        let region = mailbox_region
            .ok_or_else(|| self.init_failed(format!("no {} region", self.layout.region)))?;
        let mailbox = Arc::new(EmulatedMailbox::new(region, self.layout)?);

        let (doorbell, rx) = mpsc::channel();
        let firmware = Firmware {
            platform: self.descriptor.name,
            mailbox: Arc::clone(&mailbox),
            shim: shim.clone(),
            handler,
            behaviour: self.behaviour,
            handled: Arc::clone(&self.handled),
        };
        let handle = thread::Builder::new()
            .name(format!("{}-dsp", self.descriptor.name))
            .spawn(move || firmware.run(rx))
            .map_err(|e| self.init_failed(e.to_string()))?;

        info!(
            platform = self.descriptor.name,
            description = self.descriptor.description,
            io = self.descriptor.num_reg_regions(),
            mem = self.descriptor.num_mem_regions(),
            "platform initialised"
        );
        self.running = Some(Running {
            mailbox,
            shim,
            doorbell,
            firmware: Some(handle),
        });
        Ok(())
    }

    fn free(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        // The firmware may already be gone after a crash; a closed channel is fine.
        let _ = running.doorbell.send(Doorbell::Shutdown);
        if let Some(handle) = running.firmware.take() {
            if handle.join().is_err() {
                error!(platform = self.descriptor.name, "firmware thread panicked");
            }
        }
        debug!(
            platform = self.descriptor.name,
            booted = running.mailbox.is_booted(),
            "platform freed"
        );
    }

    fn send_msg(&mut self, msg: &Message) -> Result<(), PlatformError> {
        let running = self.running.as_ref().ok_or(PlatformError::NotInitialized)?;
        running.mailbox.host_write(msg.payload())?;
        running.shim.ring(msg.header)?;
        running
            .doorbell
            .send(Doorbell::HostMessage)
            .map_err(|_| PlatformError::SendRejected { status: -EPIPE })
    }
}

impl Drop for EmulatedPlatform {
    fn drop(&mut self) {
        self.free();
    }
}
