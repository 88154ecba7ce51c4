use std::net::{IpAddr, Ipv6Addr};

use colored::*;
use reconr_common::network::interface::Subnet;
use reconr_core::{Host, HostState, ScanStatus};

use crate::terminal::colors;

pub fn ipv6_to_type_str(ipv6_addr: &Ipv6Addr) -> &'static str {
    if is_global_unicast(ipv6_addr) {
        return "GUA";
    }
    if ipv6_addr.is_unique_local() {
        return "ULA";
    }
    if ipv6_addr.is_unicast_link_local() {
        return "LLA";
    }
    "IPv6"
}

/// 2000::/3
fn is_global_unicast(ipv6_addr: &Ipv6Addr) -> bool {
    let first_byte = ipv6_addr.octets()[0];
    (0x20..=0x3F).contains(&first_byte)
}

pub fn ip_to_key_value_pair(ip: &IpAddr) -> (String, ColoredString) {
    match ip {
        IpAddr::V4(ipv4_addr) => (
            String::from("IPv4"),
            ipv4_addr.to_string().color(colors::IPV4_ADDR),
        ),
        IpAddr::V6(ipv6_addr) => (
            String::from(ipv6_to_type_str(ipv6_addr)),
            ipv6_addr.to_string().color(colors::IPV6_ADDR),
        ),
    }
}

pub fn host_state(state: HostState) -> ColoredString {
    match state {
        HostState::Unknown => "unknown".color(colors::SEPARATOR),
        HostState::Discovered => "discovered".color(colors::PENDING),
        HostState::Profiled => "profiled".color(colors::SECONDARY),
        HostState::Done => "done".color(colors::SUCCESS),
    }
}

/// A count of scans, colored by the status they are in.
pub fn status_count(status: ScanStatus, count: usize) -> ColoredString {
    let text = count.to_string();
    match status {
        ScanStatus::Pending | ScanStatus::InProgress => text.color(colors::PENDING),
        ScanStatus::Succeeded => text.color(colors::SUCCESS),
        ScanStatus::Failed if count > 0 => text.color(colors::FAILURE).bold(),
        ScanStatus::Failed => text.color(colors::TEXT_DEFAULT),
    }
}

/// `22/ssh, 80/http`
pub fn services(host: &Host) -> ColoredString {
    if host.services().is_empty() {
        return "none".color(colors::SEPARATOR);
    }
    let joined = host
        .services()
        .iter()
        .map(|(port, service)| format!("{port}/{service}"))
        .collect::<Vec<_>>()
        .join(", ");
    joined.color(colors::PORT)
}

/// Branches printed under a host's tree head.
pub fn host_to_key_value_pair(host: &Host) -> Vec<(String, ColoredString)> {
    let mut pairs = vec![ip_to_key_value_pair(&host.address())];

    if let Some(hostname) = host.hostname() {
        pairs.push(("Name".into(), hostname.color(colors::PRIMARY)));
    }
    if let Some(mac) = host.metadata().get("mac") {
        pairs.push(("MAC".into(), mac.color(colors::MAC_ADDR)));
    }
    if let Some(vendor) = host.metadata().get("vendor") {
        pairs.push(("Vendor".into(), vendor.color(colors::TEXT_DEFAULT)));
    }
    if let Some(os) = host.os() {
        pairs.push(("OS".into(), os.color(colors::TEXT_DEFAULT)));
    }
    pairs.push(("Ports".into(), services(host)));
    pairs.push((
        "Results".into(),
        host.results().len().to_string().color(colors::ACCENT),
    ));
    pairs.push(("State".into(), host_state(host.state())));
    pairs
}

pub fn subnet_to_key_value_pair(subnet: &Subnet) -> Vec<(String, ColoredString)> {
    vec![
        (
            "Network".into(),
            format!("{}/{}", subnet.network.network(), subnet.network.prefix())
                .color(colors::IPV4_PREFIX),
        ),
        (
            "Hosts".into(),
            subnet.network.size().to_string().color(colors::ACCENT),
        ),
    ]
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
