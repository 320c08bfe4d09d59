//! # DSP IPC Fuzzer
//!
//! Boots an emulated audio DSP, optionally loads a topology, then hammers
//! the firmware with volume commands, mutating their headers when `-f` is
//! given.
//!
//! ## Usage
//!
//! ```bash
//! # Plain run against Baytrail
//! dsp-fuzzer -p byt
//!
//! # Fuzzed, reproducible run with a topology
//! RUST_LOG=debug dsp-fuzzer -p cht -t sof-cht.tplg -f -s 1234
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning                                     |
//! |------|---------------------------------------------|
//! | 0    | Run completed, or help printed              |
//! | 1    | Bad arguments, platform, region or topology |
//! | 2    | Reply timeout                               |
//! | 3    | Firmware crash                              |

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use fuzzer_runtime::platforms;
use fuzzer_runtime::{
    FileTopologyLoader, FirmwareBehaviour, FirmwareMode, FuzzerConfig, HeapRegionAllocator,
    Session, SessionError, EXIT_FAILURE,
};

fn supported_platforms() -> String {
    format!("Supported platforms: {}", platforms::names().collect::<Vec<_>>().join(", "))
}

/// Emulated firmware personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Firmware {
    Healthy,
    Silent,
    Crash,
}

impl From<Firmware> for FirmwareBehaviour {
    fn from(firmware: Firmware) -> Self {
        FirmwareBehaviour::with_mode(match firmware {
            Firmware::Healthy => FirmwareMode::Healthy,
            Firmware::Silent => FirmwareMode::Silent,
            Firmware::Crash => FirmwareMode::CrashAfter(1),
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "dsp-fuzzer", version)]
#[command(about = "IPC fuzzer for emulated audio DSP firmware")]
#[command(after_help = supported_platforms())]
struct Args {
    /// Target platform
    #[arg(short, long)]
    platform: Option<String>,

    /// Topology file to load before fuzzing
    #[arg(short, long)]
    topology: Option<PathBuf>,

    /// Mutate outgoing message headers
    #[arg(short, long)]
    fuzz: bool,

    /// Volume commands to send (default 10000)
    #[arg(short = 'n', long)]
    iterations: Option<u32>,

    /// Seed for a reproducible fuzzing run
    #[arg(short, long)]
    seed: Option<u64>,

    /// Emulated firmware behaviour
    #[arg(long, value_enum, default_value = "healthy", hide = true)]
    firmware: Firmware,
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Defaults, then `FUZZ_*` environment, then flags.
fn load_config(args: &Args) -> Result<FuzzerConfig, SessionError> {
    let mut config = FuzzerConfig::from_env();
    if let Some(iterations) = args.iterations {
        config.session.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        config.mutation.seed = Some(seed);
    }
    config.mutation.enabled = args.fuzz;
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;

    let name = args.platform.as_deref().ok_or(SessionError::NoPlatform)?;
    let platform = platforms::lookup(name, args.firmware.into()).ok_or_else(|| {
        SessionError::UnknownPlatform {
            name: name.to_string(),
            supported: platforms::names().collect::<Vec<_>>().join(", "),
        }
    })?;

    let mut session = Session::new(platform, Box::new(HeapRegionAllocator::new()), &config);
    session
        .init()
        .with_context(|| format!("can't initialise platform {name}"))?;

    match &args.topology {
        Some(path) => {
            let sent = session
                .load_topology(&mut FileTopologyLoader::new(), path)
                .with_context(|| format!("can't load topology {}", path.display()))?;
            info!(messages = sent, "topology ready");
        }
        None => info!("no topology given, skipping load"),
    }

    session.run().context("fuzzing run failed")?;
    session.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_FAILURE),
            };
        }
    };

    if let Err(e) = init_logging() {
        eprintln!("error: can't install logger: {e}");
        return ExitCode::from(EXIT_FAILURE);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("error: {e:#}");
            let session_error = e.downcast_ref::<SessionError>();
            if matches!(
                session_error,
                Some(SessionError::NoPlatform | SessionError::UnknownPlatform { .. })
            ) {
                eprintln!("{}", Args::command().render_help());
            }
            ExitCode::from(session_error.map_or(EXIT_FAILURE, SessionError::exit_code))
        }
    }
}
