//! # Platform Registry
//!
//! Static table of the platforms the fuzzer can drive, selected by name on
//! the command line.
//!
//! | Name  | Platform                     |
//! |-------|------------------------------|
//! | `byt` | Intel Baytrail audio DSP     |
//! | `cht` | Intel Cherrytrail audio DSP  |

pub mod descriptors;
pub mod emulator;
pub mod mailbox;

pub use descriptors::{MailboxLayout, DRAM_MAILBOX};
pub use emulator::{EmulatedPlatform, FirmwareBehaviour, FirmwareMode, Shim};
pub use mailbox::EmulatedMailbox;

use ipc_transport::{PlatformBinding, PlatformDescriptor};

/// One registry entry.
#[derive(Debug, Clone, Copy)]
pub struct PlatformEntry {
    pub name: &'static str,
    pub descriptor: fn() -> PlatformDescriptor,
}

/// Every supported platform, in usage order.
pub const PLATFORMS: [PlatformEntry; 2] = [
    PlatformEntry {
        name: "byt",
        descriptor: descriptors::byt,
    },
    PlatformEntry {
        name: "cht",
        descriptor: descriptors::cht,
    },
];

/// Names of every supported platform.
pub fn names() -> impl Iterator<Item = &'static str> {
    PLATFORMS.iter().map(|entry| entry.name)
}

/// Bind `name` with the given firmware behaviour.
#[must_use]
pub fn lookup(name: &str, behaviour: FirmwareBehaviour) -> Option<Box<dyn PlatformBinding>> {
    PLATFORMS
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| {
            let platform = EmulatedPlatform::new((entry.descriptor)(), DRAM_MAILBOX)
                .with_behaviour(behaviour);
            Box::new(platform) as Box<dyn PlatformBinding>
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known() {
        let platform = lookup("cht", FirmwareBehaviour::default()).unwrap();
        assert_eq!(platform.name(), "cht");
        assert_eq!(platform.descriptor().name, "cht");
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("apl", FirmwareBehaviour::default()).is_none());
        assert!(lookup("", FirmwareBehaviour::default()).is_none());
    }

    #[test]
    fn test_names_match_descriptors() {
        for entry in PLATFORMS {
            assert_eq!((entry.descriptor)().name, entry.name);
        }
        assert_eq!(names().collect::<Vec<_>>(), ["byt", "cht"]);
    }
}
