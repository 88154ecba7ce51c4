//! # Probe boundary
//!
//! The core never talks to the network itself. Every probe goes through a
//! [`ProbeRunner`], every external tool through a [`ToolRunner`]. The
//! production adapters live in the submodules:
//!
//! * [`nmap`]: runs the engine as a subprocess and parses its XML report.
//! * [`tool`]: runs an external tool command line without a shell.
//! * [`retry`]: explicit, bounded retry of timed out probes.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reconr_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scan_type::ScanType;

pub mod nmap;
mod process;
pub mod retry;
pub mod tool;
mod xml;

pub use nmap::NmapRunner;
pub use retry::Retrying;
pub use tool::ProcessToolRunner;
pub use xml::parse_report;

/// One invocation of the probing engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    /// Address, `address:port` or a whitespace separated target list.
    pub target: String,
    pub scan_type: ScanType,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    /// Where to keep the raw engine output. Advisory.
    pub artifact: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Up,
    Down,
    #[default]
    Unknown,
}

impl From<&str> for HostStatus {
    fn from(state: &str) -> Self {
        match state {
            "up" => HostStatus::Up,
            "down" => HostStatus::Down,
            _ => HostStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub id: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsMatch {
    pub name: String,
    pub accuracy: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortReport {
    pub port: u16,
    pub protocol: String,
    pub state: Option<String>,
    pub service: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<ScriptOutput>,
}

impl PortReport {
    /// An open TCP port, optionally with the identified service.
    pub fn open(port: u16, service: Option<&str>) -> Self {
        Self {
            port,
            protocol: "tcp".into(),
            state: Some("open".into()),
            service: service.map(str::to_string),
            product: None,
            version: None,
            scripts: Vec::new(),
        }
    }
}

/// Everything the engine reported about one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostReport {
    pub address: IpAddr,
    pub status: HostStatus,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub ports: Vec<PortReport>,
    pub os_matches: Vec<OsMatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<ScriptOutput>,
}

impl HostReport {
    pub fn new(address: IpAddr, status: HostStatus) -> Self {
        Self {
            address,
            status,
            hostname: None,
            mac: None,
            vendor: None,
            ports: Vec::new(),
            os_matches: Vec::new(),
            scripts: Vec::new(),
        }
    }

    pub fn up(address: IpAddr) -> Self {
        Self::new(address, HostStatus::Up)
    }

    pub fn with_port(mut self, port: PortReport) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_os(mut self, name: &str, accuracy: u8) -> Self {
        self.os_matches.push(OsMatch {
            name: name.into(),
            accuracy: Some(accuracy),
        });
        self
    }

    pub fn is_up(&self) -> bool {
        self.status == HostStatus::Up
    }

    /// Payload stored in the host registry for this report.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Structured result of one probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutput {
    pub hosts: Vec<HostReport>,
}

impl ProbeOutput {
    pub fn new(hosts: Vec<HostReport>) -> Self {
        Self { hosts }
    }

    pub fn host(&self, address: IpAddr) -> Option<&HostReport> {
        self.hosts.iter().find(|h| h.address == address)
    }

    pub fn up_hosts(&self) -> impl Iterator<Item = &HostReport> {
        self.hosts.iter().filter(|h| h.is_up())
    }
}

#[async_trait]
pub trait ProbeRunner: Send + Sync {
    /// Runs the engine for `request` and returns its parsed report.
    ///
    /// Fails with `ProbeExecution` on a non-zero exit or unparseable output and
    /// with `ProbeTimeout` when `request.timeout` elapses.
    async fn run(&self, request: &ProbeRequest) -> Result<ProbeOutput>;
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs a fully rendered command line and returns its stdout.
    async fn execute(&self, command: &str, timeout: Option<Duration>) -> Result<String>;
}
