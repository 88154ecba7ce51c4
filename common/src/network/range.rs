//! # IPv4 Range Model
//!
//! Continuous, inclusive ranges of IPv4 addresses such as `192.168.1.1-100`,
//! and their decomposition into the CIDR blocks handed to the probing engine.

use std::net::{IpAddr, Ipv4Addr};

use pnet::ipnetwork::Ipv4Network;

use crate::error::{ReconError, Result};

/// Represents a continuous range of IPv4 addresses, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Ipv4Addr> + Clone {
        let start: u32 = u32::from(self.start_addr);
        let end: u32 = u32::from(self.end_addr);
        (start..=end).map(Ipv4Addr::from)
    }

    pub fn to_iter(&self) -> impl Iterator<Item = IpAddr> {
        self.iter().map(IpAddr::V4)
    }

    pub fn len(&self) -> u64 {
        let start = u64::from(u32::from(self.start_addr));
        let end = u64::from(u32::from(self.end_addr));
        if start > end { 0 } else { end - start + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let addr = u32::from(addr);
        u32::from(self.start_addr) <= addr && addr <= u32::from(self.end_addr)
    }

    /// Smallest set of aligned CIDR blocks that exactly covers the range.
    pub fn to_cidr_blocks(&self) -> Vec<Ipv4Network> {
        let mut blocks = Vec::new();
        let mut start = u64::from(u32::from(self.start_addr));
        let end = u64::from(u32::from(self.end_addr));

        while start <= end {
            let mut bits: u32 = start.trailing_zeros().min(32);
            while bits > 0 && start + (1u64 << bits) - 1 > end {
                bits -= 1;
            }

            let prefix = (32 - bits) as u8;
            if let Ok(block) = Ipv4Network::new(Ipv4Addr::from(start as u32), prefix) {
                blocks.push(block);
            }
            start += 1u64 << bits;
        }

        blocks
    }
}

/// Creates the range covering the network block of `ip/prefix`.
pub fn cidr_range(ip: Ipv4Addr, prefix: u8) -> Result<Ipv4Range> {
    let network = Ipv4Network::new(ip, prefix)
        .map_err(|e| ReconError::config(format!("invalid CIDR {ip}/{prefix}: {e}")))?;
    Ok(Ipv4Range::new(network.network(), network.broadcast()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
