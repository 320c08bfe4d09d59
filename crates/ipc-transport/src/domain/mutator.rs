//! # Command Mutator
//!
//! Replaces the opcode and size fields of an outgoing header with random
//! values. There is no feedback loop: every mutation is an independent draw.
//!
//! ## Algorithm
//!
//! 1. Draw a global selector uniformly from `[1, GLOBAL_SELECTOR_MAX]` and
//!    shift it into the class bits.
//! 2. If the class has a catalog table, draw an opcode from it and set
//!    `cmd = class | opcode`. Otherwise `cmd` is left as it was.
//! 3. Independently draw `size` uniformly from `[1, MAX_MSG_SIZE]`.

use ipc_types::{glb_type, CmdHeader, CommandCatalog, GlobalClass, MAX_MSG_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Highest global selector the mutator draws.
pub const GLOBAL_SELECTOR_MAX: u32 = 9;

/// Original and mutated header of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub original: CmdHeader,
    pub mutated: CmdHeader,
    /// Raw selector drawn for the class.
    pub selector: u32,
    /// Whether the opcode was replaced (false on a catalog miss).
    pub opcode_replaced: bool,
}

/// Random header mutator.
#[derive(Debug)]
pub struct Mutator {
    rng: StdRng,
    mutations: u64,
}

impl Mutator {
    /// Mutator seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            mutations: 0,
        }
    }

    /// Deterministic mutator for reproducible runs.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            mutations: 0,
        }
    }

    /// Mutate one header.
    pub fn mutate(&mut self, original: CmdHeader) -> MutationRecord {
        let selector = self.rng.gen_range(1..=GLOBAL_SELECTOR_MAX);
        let class_bits = glb_type(selector);

        let table = GlobalClass::from_cmd(class_bits).and_then(CommandCatalog::opcodes);
        let (cmd, opcode_replaced) = match table {
            Some(table) => {
                let opcode = table[self.rng.gen_range(0..table.len())];
                (class_bits | opcode, true)
            }
            None => (original.cmd, false),
        };

        let size = self.rng.gen_range(1..=MAX_MSG_SIZE as u32);
        self.mutations += 1;

        let mutated = CmdHeader { size, cmd };
        debug!(
            glb = format_args!("{class_bits:#x}"),
            original_cmd = format_args!("{:#x}", original.cmd),
            original_size = original.size,
            cmd = format_args!("{:#x}", mutated.cmd),
            size = mutated.size,
            opcode_replaced,
            "fuzzed ipc header"
        );

        MutationRecord {
            original,
            mutated,
            selector,
            opcode_replaced,
        }
    }

    /// Number of headers mutated so far.
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.mutations
    }
}

/// Fuzzing switch owned by the transport.
#[derive(Debug, Default)]
pub enum MutationPolicy {
    /// Headers pass through bit-exact.
    #[default]
    Disabled,
    /// Every header is mutated before sending.
    Enabled(Mutator),
}

impl MutationPolicy {
    /// Enabled policy, seeded when `seed` is given.
    #[must_use]
    pub fn enabled(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => MutationPolicy::Enabled(Mutator::seeded(seed)),
            None => MutationPolicy::Enabled(Mutator::from_entropy()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, MutationPolicy::Enabled(_))
    }

    /// Mutate `header` if enabled. `None` means it must go out unchanged.
    pub fn apply(&mut self, header: CmdHeader) -> Option<MutationRecord> {
        match self {
            MutationPolicy::Disabled => None,
            MutationPolicy::Enabled(mutator) => Some(mutator.mutate(header)),
        }
    }

    /// Header that will actually be sent for `header`.
    pub fn resolve(&mut self, header: CmdHeader) -> CmdHeader {
        self.apply(header).map_or(header, |record| record.mutated)
    }
}
