//! # Host Registry
//!
//! In-memory store of every host found during a run. Hosts are created by
//! [`HostRegistry::upsert`] and afterwards only change through a merge, which
//! applies one scan result and its derived fields under a single lock.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use reconr_common::{ReconError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Span, debug};

use crate::context::RunContext;
use crate::scan_type::ScanType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    Unknown,
    Discovered,
    Profiled,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Host {
    address: IpAddr,
    state: HostState,
    hostname: Option<String>,
    os: Option<String>,
    /// Open TCP port to lower-cased service identifier.
    services: BTreeMap<u16, String>,
    scans_applied: BTreeSet<ScanType>,
    results: BTreeMap<String, Value>,
    metadata: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl Host {
    fn new(address: IpAddr) -> Self {
        let now = Utc::now();
        Self {
            address,
            state: HostState::Unknown,
            hostname: None,
            os: None,
            services: BTreeMap::new(),
            scans_applied: BTreeSet::new(),
            results: BTreeMap::new(),
            metadata: BTreeMap::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Best operating system match reported so far.
    pub fn os(&self) -> Option<&str> {
        self.os.as_deref()
    }

    pub fn services(&self) -> &BTreeMap<u16, String> {
        &self.services
    }

    pub fn open_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.services.keys().copied()
    }

    pub fn scans_applied(&self) -> &BTreeSet<ScanType> {
        &self.scans_applied
    }

    pub fn has_scan(&self, scan_type: &str) -> bool {
        self.scans_applied.contains(scan_type)
    }

    /// Stored payload for a result key. Phase scans are keyed by their scan type,
    /// dynamic scans by `<scan type>:<label>:<port>`.
    pub fn result(&self, key: &str) -> Option<&Value> {
        self.results.get(key)
    }

    pub fn results(&self) -> &BTreeMap<String, Value> {
        &self.results
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    fn advance(&mut self, state: HostState) {
        if state > self.state {
            self.state = state;
        }
    }

    fn apply(&mut self, scan_type: &ScanType, key: String, result: Value) {
        if let Ok(derived) = serde_json::from_value::<Derived>(result.clone()) {
            self.absorb(derived);
        }

        match scan_type.as_str() {
            ScanType::DISCOVERY => self.advance(HostState::Discovered),
            ScanType::PORT_SCAN | ScanType::SERVICE_SCAN | ScanType::OS_DETECTION => {
                self.advance(HostState::Profiled)
            }
            _ => {}
        }

        self.scans_applied.insert(scan_type.clone());
        self.results.insert(key, result);
        self.last_updated = Utc::now();
    }

    fn absorb(&mut self, derived: Derived) {
        if let Some(name) = derived.hostname.filter(|n| !n.is_empty()) {
            self.hostname = Some(name);
        }

        for port in derived.ports {
            if port.state.as_deref().is_some_and(|s| s != "open") {
                continue;
            }
            // Follow-up probes address TCP ports only.
            if port.protocol.as_deref().is_some_and(|p| p != "tcp") {
                debug!(port = port.port, protocol = ?port.protocol, "skipping non-tcp port");
                continue;
            }
            let service = port
                .service
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty() && s != "unknown");
            match service {
                Some(name) => {
                    self.services.insert(port.port, name);
                }
                None => {
                    self.services
                        .entry(port.port)
                        .or_insert_with(|| "unknown".to_string());
                }
            }
        }

        let best = derived
            .os_matches
            .into_iter()
            .max_by_key(|m| m.accuracy.unwrap_or(0));
        if let Some(best) = best {
            self.os = Some(best.name);
        }

        if let Some(mac) = derived.mac {
            self.metadata.insert("mac".into(), mac);
        }
        if let Some(vendor) = derived.vendor.filter(|v| !v.is_empty()) {
            self.metadata.insert("vendor".into(), vendor);
        }
    }
}

/// The subset of a probe payload that feeds the derived host fields.
#[derive(Deserialize, Default)]
#[serde(default)]
struct Derived {
    hostname: Option<String>,
    ports: Vec<DerivedPort>,
    os_matches: Vec<DerivedOs>,
    mac: Option<String>,
    vendor: Option<String>,
}

#[derive(Deserialize)]
struct DerivedPort {
    port: u16,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    service: Option<String>,
}

#[derive(Deserialize)]
struct DerivedOs {
    name: String,
    #[serde(default)]
    accuracy: Option<u8>,
}

#[derive(Debug)]
pub struct HostRegistry {
    hosts: Mutex<BTreeMap<IpAddr, Host>>,
    span: Span,
}

impl HostRegistry {
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            hosts: Mutex::new(BTreeMap::new()),
            span: ctx.span().clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<IpAddr, Host>> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the host for `address`, creating it on first sight.
    pub fn upsert(&self, address: IpAddr) -> Host {
        let mut hosts = self.lock();
        hosts
            .entry(address)
            .or_insert_with(|| {
                self.span.in_scope(|| debug!(%address, "host registered"));
                Host::new(address)
            })
            .clone()
    }

    pub fn get(&self, address: IpAddr) -> Option<Host> {
        self.lock().get(&address).cloned()
    }

    pub fn contains(&self, address: IpAddr) -> bool {
        self.lock().contains_key(&address)
    }

    /// Stores `result` under its scan type, replacing an earlier result of the
    /// same type.
    pub fn merge(&self, address: IpAddr, scan_type: &ScanType, result: Value) -> Result<Host> {
        self.merge_keyed(address, scan_type, scan_type.to_string(), result)
    }

    /// Same as [`merge`](Self::merge) with an explicit result key, for scan
    /// types that run more than once per host.
    pub fn merge_keyed(
        &self,
        address: IpAddr,
        scan_type: &ScanType,
        key: impl Into<String>,
        result: Value,
    ) -> Result<Host> {
        let key = key.into();
        let mut hosts = self.lock();
        let host = hosts
            .get_mut(&address)
            .ok_or_else(|| ReconError::not_found("host", address.to_string()))?;

        host.apply(scan_type, key.clone(), result);
        self.span.in_scope(|| {
            debug!(%address, %scan_type, key = %key, state = ?host.state, "result merged")
        });
        Ok(host.clone())
    }

    /// Moves every host to [`HostState::Done`].
    pub fn complete_all(&self) {
        let mut hosts = self.lock();
        for host in hosts.values_mut() {
            host.advance(HostState::Done);
        }
    }

    /// Point-in-time copy of all hosts, ordered by address.
    pub fn snapshot(&self) -> Vec<Host> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
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
