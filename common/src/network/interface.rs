use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network};

#[cfg(target_os = "linux")]
use linux_impl::{is_physical, is_wireless};
#[cfg(target_os = "macos")]
use macos_impl::{is_physical, is_wireless};

/// An IPv4 network reachable through a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub interface: String,
    pub network: Ipv4Network,
}

impl std::fmt::Display for Subnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}/{}",
            self.interface,
            self.network.network(),
            self.network.prefix()
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ViabilityError {
    /// The interface is operationally down.
    IsDown,
    /// The interface was filtered out as "not physical" by the provided logic.
    NotPhysical,
    /// The interface does not support broadcast.
    NotBroadcast,
    /// The interface is a point-to-point link (e.g., a VPN).
    IsPointToPoint,
    /// The interface has no private IPv4 address.
    NoValidLanIp,
}

/// Lists every IPv4 subnet of the interfaces that are up, loopback excluded.
pub fn list_subnets() -> Vec<Subnet> {
    subnets_of(&datalink::interfaces())
}

pub fn subnets_of(interfaces: &[NetworkInterface]) -> Vec<Subnet> {
    interfaces
        .iter()
        .filter(|intf| intf.is_up() && !intf.is_loopback())
        .flat_map(|intf| {
            intf.ips.iter().filter_map(move |net| match net {
                IpNetwork::V4(v4) => Ipv4Network::new(v4.network(), v4.prefix())
                    .ok()
                    .map(|network| Subnet {
                        interface: intf.name.clone(),
                        network,
                    }),
                IpNetwork::V6(_) => None,
            })
        })
        .collect()
}

/// Finds the primary LAN network of this machine.
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub fn get_lan_network() -> Option<Ipv4Network> {
    let interfaces: Vec<NetworkInterface> = datalink::interfaces();
    select_lan_network(&interfaces, is_physical, |intf| {
        is_physical(intf) && !is_wireless(intf)
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn get_lan_network() -> Option<Ipv4Network> {
    let interfaces: Vec<NetworkInterface> = datalink::interfaces();
    select_lan_network(&interfaces, |_| true, |_| false)
}

/// Picks the private IPv4 network of the best viable interface, preferring
/// wired links when more than one candidate is left.
pub fn select_lan_network(
    interfaces: &[NetworkInterface],
    is_physical: impl Fn(&NetworkInterface) -> bool,
    is_wired: impl Fn(&NetworkInterface) -> bool,
) -> Option<Ipv4Network> {
    let candidates: Vec<&NetworkInterface> = interfaces
        .iter()
        .filter(|intf| is_viable_lan_interface(intf, &is_physical).is_ok())
        .collect();

    let chosen = candidates
        .iter()
        .find(|intf| is_wired(intf))
        .or_else(|| candidates.first())?;

    chosen.ips.iter().find_map(|net| match net {
        IpNetwork::V4(v4) if v4.ip().is_private() => Ipv4Network::new(v4.network(), v4.prefix()).ok(),
        _ => None,
    })
}

pub fn is_viable_lan_interface(
    interface: &NetworkInterface,
    is_physical: impl Fn(&NetworkInterface) -> bool,
) -> Result<(), ViabilityError> {
    if !interface.is_up() {
        return Err(ViabilityError::IsDown);
    }
    if interface.is_loopback() || !is_physical(interface) {
        return Err(ViabilityError::NotPhysical);
    }
    if !interface.is_broadcast() {
        return Err(ViabilityError::NotBroadcast);
    }
    if interface.is_point_to_point() {
        return Err(ViabilityError::IsPointToPoint);
    }
    let has_private_v4 = interface.ips.iter().any(|net| match net {
        IpNetwork::V4(ipv4) => ipv4.ip().is_private(),
        IpNetwork::V6(_) => false,
    });
    if !has_private_v4 {
        return Err(ViabilityError::NoValidLanIp);
    }

    Ok(())
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::path::Path;

    pub fn is_physical(interface: &NetworkInterface) -> bool {
        Path::new(&format!("/sys/class/net/{}/device", interface.name)).exists()
    }

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        Path::new(&format!("/sys/class/net/{}/wireless", interface.name)).exists()
    }
}

#[cfg(target_os = "macos")]
mod macos_impl {
    use super::*;
    use std::collections::HashSet;
    use std::process::Command;
    use std::sync::OnceLock;

    struct HardwareInfo {
        physical_devices: HashSet<String>,
        wireless_devices: HashSet<String>,
    }

    /// Runs `networksetup` only once, on first access.
    fn get_hardware_info() -> &'static HardwareInfo {
        static HARDWARE_INFO: OnceLock<HardwareInfo> = OnceLock::new();

        HARDWARE_INFO.get_or_init(|| {
            let mut physical = HashSet::new();
            let mut wireless = HashSet::new();

            if let Ok(output) = Command::new("networksetup").arg("-listallhardwareports").output() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                for line in stdout.lines() {
                    if let Some(device) = line.strip_prefix("Device: ") {
                        physical.insert(device.trim().to_string());
                    }
                }
            }

            for device in &physical {
                let is_wifi = Command::new("networksetup")
                    .arg("-getairportnetwork")
                    .arg(device)
                    .output()
                    .map(|out| out.status.success())
                    .unwrap_or(false);

                if is_wifi {
                    wireless.insert(device.clone());
                }
            }

            HardwareInfo {
                physical_devices: physical,
                wireless_devices: wireless,
            }
        })
    }

    pub fn is_physical(interface: &NetworkInterface) -> bool {
        get_hardware_info().physical_devices.contains(&interface.name)
    }

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        get_hardware_info().wireless_devices.contains(&interface.name)
    }
}
