use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a kind of probe, as named in the rule document
/// (`discovery`, `port_scan`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanType(String);

impl ScanType {
    pub const DISCOVERY: &'static str = "discovery";
    pub const PORT_SCAN: &'static str = "port_scan";
    pub const SERVICE_SCAN: &'static str = "service_scan";
    pub const OS_DETECTION: &'static str = "os_detection";
    pub const SCRIPT_SCAN: &'static str = "script_scan";
    /// Ledger entries for external tool invocations. Never configured in the
    /// rule document.
    pub const EXTERNAL_TOOL: &'static str = "external_tool";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn discovery() -> Self {
        Self::new(Self::DISCOVERY)
    }

    pub fn port_scan() -> Self {
        Self::new(Self::PORT_SCAN)
    }

    pub fn service_scan() -> Self {
        Self::new(Self::SERVICE_SCAN)
    }

    pub fn os_detection() -> Self {
        Self::new(Self::OS_DETECTION)
    }

    pub fn script_scan() -> Self {
        Self::new(Self::SCRIPT_SCAN)
    }

    pub fn external_tool() -> Self {
        Self::new(Self::EXTERNAL_TOOL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScanType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl AsRef<str> for ScanType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ScanType {
    fn borrow(&self) -> &str {
        &self.0
    }
}
