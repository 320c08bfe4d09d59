//! # Command Catalog
//!
//! Valid opcodes for each global class. Every table is an exhaustive enum so
//! a new opcode forces an update of `ALL` and of every `match` over it.
//!
//! Only topology, power-management, component and stream are offered to the
//! mutator through [`CommandCatalog::opcodes`]. Trace and DAI tables are
//! defined but deliberately not wired in.

use crate::header::{cmd_type, GlobalClass};

// =============================================================================
// TOPOLOGY
// =============================================================================

/// Topology (pipeline graph) opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TopologyCmd {
    CompNew = cmd_type(0x001),
    CompFree = cmd_type(0x002),
    CompConnect = cmd_type(0x003),
    PipeNew = cmd_type(0x010),
    PipeFree = cmd_type(0x011),
    PipeConnect = cmd_type(0x012),
    PipeComplete = cmd_type(0x013),
    BufferNew = cmd_type(0x020),
    BufferFree = cmd_type(0x021),
}

impl TopologyCmd {
    pub const ALL: [TopologyCmd; 9] = [
        TopologyCmd::CompNew,
        TopologyCmd::CompFree,
        TopologyCmd::CompConnect,
        TopologyCmd::PipeNew,
        TopologyCmd::PipeFree,
        TopologyCmd::PipeConnect,
        TopologyCmd::PipeComplete,
        TopologyCmd::BufferNew,
        TopologyCmd::BufferFree,
    ];

    #[must_use]
    pub const fn opcode(self) -> u32 {
        self as u32
    }
}

// =============================================================================
// POWER MANAGEMENT
// =============================================================================

/// Power-management opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PmCmd {
    CtxSave = cmd_type(0x1),
    CtxRestore = cmd_type(0x2),
    CtxSize = cmd_type(0x3),
    ClkSet = cmd_type(0x4),
    ClkGet = cmd_type(0x5),
    ClkReq = cmd_type(0x6),
    CoreEnable = cmd_type(0x7),
}

impl PmCmd {
    pub const ALL: [PmCmd; 7] = [
        PmCmd::CtxSave,
        PmCmd::CtxRestore,
        PmCmd::CtxSize,
        PmCmd::ClkSet,
        PmCmd::ClkGet,
        PmCmd::ClkReq,
        PmCmd::CoreEnable,
    ];

    #[must_use]
    pub const fn opcode(self) -> u32 {
        self as u32
    }
}

// =============================================================================
// COMPONENT
// =============================================================================

/// Component control opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ComponentCmd {
    SetValue = cmd_type(0x001),
    GetValue = cmd_type(0x002),
    SetData = cmd_type(0x003),
    GetData = cmd_type(0x004),
}

impl ComponentCmd {
    pub const ALL: [ComponentCmd; 4] = [
        ComponentCmd::SetValue,
        ComponentCmd::GetValue,
        ComponentCmd::SetData,
        ComponentCmd::GetData,
    ];

    #[must_use]
    pub const fn opcode(self) -> u32 {
        self as u32
    }
}

// =============================================================================
// DAI
// =============================================================================

/// DAI configuration opcodes. Not offered to the mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DaiCmd {
    Config = cmd_type(0x001),
    Loopback = cmd_type(0x002),
}

impl DaiCmd {
    pub const ALL: [DaiCmd; 2] = [DaiCmd::Config, DaiCmd::Loopback];

    #[must_use]
    pub const fn opcode(self) -> u32 {
        self as u32
    }
}

// =============================================================================
// STREAM
// =============================================================================

/// PCM stream opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StreamCmd {
    PcmParams = cmd_type(0x001),
    PcmParamsReply = cmd_type(0x002),
    PcmFree = cmd_type(0x003),
    TrigStart = cmd_type(0x010),
    TrigStop = cmd_type(0x011),
    TrigPause = cmd_type(0x012),
    TrigRelease = cmd_type(0x013),
    TrigDrain = cmd_type(0x014),
    TrigXrun = cmd_type(0x015),
    Position = cmd_type(0x030),
    VorbisParams = cmd_type(0x100),
    VorbisFree = cmd_type(0x101),
}

impl StreamCmd {
    pub const ALL: [StreamCmd; 12] = [
        StreamCmd::PcmParams,
        StreamCmd::PcmParamsReply,
        StreamCmd::PcmFree,
        StreamCmd::TrigStart,
        StreamCmd::TrigStop,
        StreamCmd::TrigPause,
        StreamCmd::TrigRelease,
        StreamCmd::TrigDrain,
        StreamCmd::TrigXrun,
        StreamCmd::Position,
        StreamCmd::VorbisParams,
        StreamCmd::VorbisFree,
    ];

    #[must_use]
    pub const fn opcode(self) -> u32 {
        self as u32
    }
}

// =============================================================================
// TRACE
// =============================================================================

/// Trace DMA opcodes. Not offered to the mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TraceCmd {
    DmaParams = cmd_type(0x001),
    DmaPosition = cmd_type(0x002),
}

impl TraceCmd {
    pub const ALL: [TraceCmd; 2] = [TraceCmd::DmaParams, TraceCmd::DmaPosition];

    #[must_use]
    pub const fn opcode(self) -> u32 {
        self as u32
    }
}

// =============================================================================
// CATALOG
// =============================================================================

const TOPOLOGY_OPCODES: [u32; TopologyCmd::ALL.len()] = {
    let mut out = [0u32; TopologyCmd::ALL.len()];
    let mut i = 0;
    while i < out.len() {
        out[i] = TopologyCmd::ALL[i].opcode();
        i += 1;
    }
    out
};

const PM_OPCODES: [u32; PmCmd::ALL.len()] = {
    let mut out = [0u32; PmCmd::ALL.len()];
    let mut i = 0;
    while i < out.len() {
        out[i] = PmCmd::ALL[i].opcode();
        i += 1;
    }
    out
};

const COMPONENT_OPCODES: [u32; ComponentCmd::ALL.len()] = {
    let mut out = [0u32; ComponentCmd::ALL.len()];
    let mut i = 0;
    while i < out.len() {
        out[i] = ComponentCmd::ALL[i].opcode();
        i += 1;
    }
    out
};

const STREAM_OPCODES: [u32; StreamCmd::ALL.len()] = {
    let mut out = [0u32; StreamCmd::ALL.len()];
    let mut i = 0;
    while i < out.len() {
        out[i] = StreamCmd::ALL[i].opcode();
        i += 1;
    }
    out
};

const DAI_OPCODES: [u32; DaiCmd::ALL.len()] = [DaiCmd::Config.opcode(), DaiCmd::Loopback.opcode()];

const TRACE_OPCODES: [u32; TraceCmd::ALL.len()] =
    [TraceCmd::DmaParams.opcode(), TraceCmd::DmaPosition.opcode()];

/// Immutable class → opcode table lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCatalog;

impl CommandCatalog {
    /// Opcode table the mutator may draw from for `class`.
    ///
    /// `None` for every class outside topology, PM, component and stream,
    /// including trace and DAI.
    #[must_use]
    pub fn opcodes(class: GlobalClass) -> Option<&'static [u32]> {
        match class {
            GlobalClass::Topology => Some(&TOPOLOGY_OPCODES),
            GlobalClass::PowerManagement => Some(&PM_OPCODES),
            GlobalClass::Component => Some(&COMPONENT_OPCODES),
            GlobalClass::Stream => Some(&STREAM_OPCODES),
            GlobalClass::Reply
            | GlobalClass::Compound
            | GlobalClass::FwReady
            | GlobalClass::Dai
            | GlobalClass::Trace => None,
        }
    }

    /// Full opcode table defined for `class`, wired into the mutator or not.
    #[must_use]
    pub fn defined_opcodes(class: GlobalClass) -> Option<&'static [u32]> {
        match class {
            GlobalClass::Dai => Some(&DAI_OPCODES),
            GlobalClass::Trace => Some(&TRACE_OPCODES),
            other => Self::opcodes(other),
        }
    }

    /// Whether `cmd` names an opcode defined for its class.
    #[must_use]
    pub fn is_known(cmd: u32) -> bool {
        let Some(class) = GlobalClass::from_cmd(cmd) else {
            return false;
        };
        let opcode = cmd & crate::header::CMD_TYPE_MASK;
        Self::defined_opcodes(class).is_some_and(|table| table.contains(&opcode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wired_classes() {
        assert_eq!(CommandCatalog::opcodes(GlobalClass::Topology).unwrap().len(), 9);
        assert_eq!(CommandCatalog::opcodes(GlobalClass::PowerManagement).unwrap().len(), 7);
        assert_eq!(CommandCatalog::opcodes(GlobalClass::Component).unwrap().len(), 4);
        assert_eq!(CommandCatalog::opcodes(GlobalClass::Stream).unwrap().len(), 12);
    }

    #[test]
    fn test_trace_and_dai_not_wired() {
        assert!(CommandCatalog::opcodes(GlobalClass::Trace).is_none());
        assert!(CommandCatalog::opcodes(GlobalClass::Dai).is_none());
        assert_eq!(CommandCatalog::defined_opcodes(GlobalClass::Trace).unwrap().len(), 2);
        assert_eq!(CommandCatalog::defined_opcodes(GlobalClass::Dai).unwrap().len(), 2);
    }

    #[test]
    fn test_opcodes_stay_inside_opcode_field() {
        for class in GlobalClass::ALL {
            if let Some(table) = CommandCatalog::defined_opcodes(class) {
                for opcode in table {
                    assert_eq!(opcode & !crate::header::CMD_TYPE_MASK, 0);
                }
            }
        }
    }

    #[test]
    fn test_is_known() {
        let set_value = GlobalClass::Component.bits() | ComponentCmd::SetValue.opcode();
        assert!(CommandCatalog::is_known(set_value));
        assert!(!CommandCatalog::is_known(GlobalClass::Component.bits() | cmd_type(0x7ff)));
        assert!(!CommandCatalog::is_known(0xf000_0000));
    }

    #[test]
    fn test_stream_table_order() {
        let table = CommandCatalog::opcodes(GlobalClass::Stream).unwrap();
        assert_eq!(table[0], cmd_type(0x001));
        assert_eq!(table[11], cmd_type(0x101));
    }
}
