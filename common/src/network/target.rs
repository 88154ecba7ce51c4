//! # Scan Target Model
//!
//! Defines the possible inputs for a reconnaissance run.
//!
//! This module handles parsing and representing targets, which can be:
//! * A single IP address (host).
//! * An IPv4 Range (e.g., `192.168.1.1-100`).
//! * A CIDR block (e.g., `192.168.1.0/24`).
//! * The local LAN (resolved from the best local interface).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::{ReconError, Result};
use crate::network::interface;
use crate::network::range::Ipv4Range;

/// Represents a distinct target to be scanned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// The primary local network, resolved on demand.
    Lan,
    /// A single specific host.
    Host { target_addr: IpAddr },
    /// An inclusive range of IPv4 addresses.
    Range { ipv4_range: Ipv4Range },
    /// A network block, normalised to its network address.
    Cidr { network: Ipv4Network },
    /// Holds a list of different targets
    Multi { targets: Vec<Target> },
}

impl FromStr for Target {
    type Err = String;

    /// Parses a string into a `Target`.
    ///
    /// Supported formats:
    /// * **Keywords**: "lan" (case-insensitive).
    /// * **Host**: Single IPv4/IPv6 address (e.g., "192.168.1.5").
    /// * **Range**: "Start-End" (e.g., "192.168.1.1-50", "192.168.1.1-192.168.1.50").
    /// * **CIDR**: "Network/Prefix" (e.g., "192.168.1.0/24"), host bits are ignored.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();

        if lower == "lan" {
            return Ok(Target::Lan);
        }

        if s.contains(',') {
            return parse_commas(s);
        }

        if let Some(target) = parse_host(s) {
            return Ok(target);
        }

        if let Some(target) = parse_ip_range(s)? {
            return Ok(target);
        }

        if let Some(target) = parse_cidr(s)? {
            return Ok(target);
        }

        Err(format!("invalid target: {s}"))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Lan => write!(f, "lan"),
            Target::Host { target_addr } => write!(f, "{target_addr}"),
            Target::Range { ipv4_range } => {
                write!(f, "{}-{}", ipv4_range.start_addr, ipv4_range.end_addr)
            }
            Target::Cidr { network } => write!(f, "{}/{}", network.network(), network.prefix()),
            Target::Multi { targets } => {
                let parts: Vec<String> = targets.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl Target {
    /// Splits comma lists into their individual targets.
    pub fn flatten(self) -> Vec<Target> {
        match self {
            Target::Multi { targets } => targets.into_iter().flat_map(Target::flatten).collect(),
            single => vec![single],
        }
    }

    /// Replaces every `lan` keyword with the network of the best local interface.
    pub fn resolve_lan(self) -> Result<Target> {
        match self {
            Target::Lan => {
                let network = interface::get_lan_network()
                    .ok_or_else(|| ReconError::config("no interface available for LAN discovery"))?;
                tracing::info!("resolved lan to {}/{}", network.network(), network.prefix());
                Ok(Target::Cidr { network })
            }
            Target::Multi { targets } => {
                let targets = targets
                    .into_iter()
                    .map(Target::resolve_lan)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Target::Multi { targets })
            }
            other => Ok(other),
        }
    }

    /// The whitespace separated target list handed to the probing engine.
    ///
    /// Ranges are expressed as the CIDR blocks covering them so the engine
    /// never has to understand the dash syntax.
    pub fn engine_spec(&self) -> Result<String> {
        match self {
            Target::Lan => Err(ReconError::config("lan target must be resolved before scanning")),
            Target::Host { target_addr } => Ok(target_addr.to_string()),
            Target::Cidr { network } => Ok(format!("{}/{}", network.network(), network.prefix())),
            Target::Range { ipv4_range } => {
                let blocks: Vec<String> = ipv4_range
                    .to_cidr_blocks()
                    .into_iter()
                    .map(|block| match block.prefix() {
                        32 => block.network().to_string(),
                        prefix => format!("{}/{}", block.network(), prefix),
                    })
                    .collect();
                if blocks.is_empty() {
                    return Err(ReconError::config(format!("empty range: {self}")));
                }
                Ok(blocks.join(" "))
            }
            Target::Multi { targets } => {
                let specs = targets
                    .iter()
                    .map(Target::engine_spec)
                    .collect::<Result<Vec<_>>>()?;
                Ok(specs.join(" "))
            }
        }
    }
}

/// Parses a comma-separated list of targets (e.g., "192.168.1.5, 10.0.0.1-50, lan").
pub fn parse_commas(s: &str) -> std::result::Result<Target, String> {
    let mut targets = Vec::new();

    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let target = Target::from_str(part)
            .map_err(|e| format!("failed to parse target '{part}': {e}"))?;

        targets.push(target);
    }

    if targets.is_empty() {
        return Err(format!("no targets in '{s}'"));
    }

    Ok(Target::Multi { targets })
}

/// Parses a single IP address.
fn parse_host(s: &str) -> Option<Target> {
    s.parse::<IpAddr>()
        .ok()
        .map(|target_addr| Target::Host { target_addr })
}

/// Parses a range string like "1.1.1.1-2.2.2.2" or "1.1.1.1-50".
fn parse_ip_range(s: &str) -> std::result::Result<Option<Target>, String> {
    let Some((start_str, end_str)) = s.split_once('-') else {
        return Ok(None);
    };

    let start_addr = start_str
        .parse::<Ipv4Addr>()
        .map_err(|e| format!("invalid start IP in range '{start_str}': {e}"))?;

    let end_addr = parse_range_end_addr(end_str, &start_addr, s)?;

    if u32::from(end_addr) < u32::from(start_addr) {
        return Err(format!("range end is before range start: {s}"));
    }

    let ipv4_range = Ipv4Range::new(start_addr, end_addr);
    Ok(Some(Target::Range { ipv4_range }))
}

/// Helper to parse the end address of a range.
///
/// Handles abbreviated forms like "192.168.1.1-50" (implies 192.168.1.50)
/// and full forms like "192.168.1.1-192.168.1.255".
fn parse_range_end_addr(
    end_str: &str,
    start_addr: &Ipv4Addr,
    original_s: &str,
) -> std::result::Result<Ipv4Addr, String> {
    if let Ok(full_addr) = end_str.parse::<Ipv4Addr>() {
        return Ok(full_addr);
    }

    let mut end_octets = start_addr.octets();
    let partial_octets: Vec<u8> = end_str
        .split('.')
        .map(|octet_str| octet_str.parse::<u8>())
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|e| format!("invalid end range '{end_str}' in '{original_s}': {e}"))?;

    if partial_octets.is_empty() {
        return Err(format!("end range cannot be empty: {original_s}"));
    }
    if partial_octets.len() > 4 {
        return Err(format!("end range has too many octets: {end_str}"));
    }

    let start_index = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

/// Parses CIDR notation like "192.168.1.0/24".
fn parse_cidr(s: &str) -> std::result::Result<Option<Target>, String> {
    let Some((ip_str, prefix_str)) = s.split_once('/') else {
        return Ok(None);
    };

    let ipv4_addr = ip_str
        .parse::<Ipv4Addr>()
        .map_err(|e| format!("invalid IP in CIDR '{ip_str}': {e}"))?;

    let prefix = prefix_str
        .parse::<u8>()
        .map_err(|e| format!("invalid prefix in CIDR '{prefix_str}': {e}"))?;

    let network = Ipv4Network::new(ipv4_addr, prefix)
        .and_then(|net| Ipv4Network::new(net.network(), prefix))
        .map_err(|e| format!("invalid CIDR '{s}': {e}"))?;

    Ok(Some(Target::Cidr { network }))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
