//! Dynamic dispatch planning: which follow-up actions a host snapshot calls for.

use std::net::IpAddr;

use crate::host::Host;
use crate::rules::{Action, RuleTable};

/// One resolved action for a host/port/service triple.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DispatchItem {
    pub address: IpAddr,
    pub port: u16,
    pub service: String,
    /// Position of the action in the service's rule list.
    pub index: usize,
    pub action: Action,
}

impl DispatchItem {
    /// Ledger target of the item.
    pub fn endpoint(&self) -> String {
        endpoint(self.address, self.port)
    }

    /// Action label qualified by its rule position, distinct for every
    /// action of a service even when two of them run the same program.
    pub fn tag(&self) -> String {
        format!("{}#{}", self.action.label(), self.index)
    }

    /// Result key under which the host registry stores the outcome.
    pub fn result_key(&self, scan_type: &str) -> String {
        format!("{scan_type}:{}:{}", self.tag(), self.port)
    }
}

pub(crate) fn endpoint(address: IpAddr, port: u16) -> String {
    match address {
        IpAddr::V4(v4) => format!("{v4}:{port}"),
        IpAddr::V6(v6) => format!("[{v6}]:{port}"),
    }
}

/// Resolves every service of every host against the rule table, in address,
/// port and rule order.
pub(crate) fn plan(hosts: &[Host], rules: &RuleTable) -> Vec<DispatchItem> {
    hosts
        .iter()
        .flat_map(move |host| {
            host.services().iter().flat_map(move |(port, service)| {
                rules
                    .resolve(service)
                    .iter()
                    .enumerate()
                    .map(move |(index, action)| DispatchItem {
                        address: host.address(),
                        port: *port,
                        service: service.clone(),
                        index,
                        action: action.clone(),
                    })
            })
        })
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
