use std::fmt;

use serde::Serialize;

use crate::scan_type::ScanType;

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    PortFanOut,
    ServiceFanOut,
    OsFanOut,
    DynamicDispatch,
    Done,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::Discovery => Phase::PortFanOut,
            Phase::PortFanOut => Phase::ServiceFanOut,
            Phase::ServiceFanOut => Phase::OsFanOut,
            Phase::OsFanOut => Phase::DynamicDispatch,
            Phase::DynamicDispatch | Phase::Done => Phase::Done,
        }
    }

    /// Scan type submitted once per target by this phase. Dynamic dispatch
    /// picks its scan types per action.
    pub fn scan_type(self) -> Option<&'static str> {
        match self {
            Phase::Discovery => Some(ScanType::DISCOVERY),
            Phase::PortFanOut => Some(ScanType::PORT_SCAN),
            Phase::ServiceFanOut => Some(ScanType::SERVICE_SCAN),
            Phase::OsFanOut => Some(ScanType::OS_DETECTION),
            Phase::DynamicDispatch | Phase::Done => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::PortFanOut => "port_fan_out",
            Phase::ServiceFanOut => "service_fan_out",
            Phase::OsFanOut => "os_fan_out",
            Phase::DynamicDispatch => "dynamic_dispatch",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
