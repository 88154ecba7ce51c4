//! Stand-ins for the probing engine and external tools.
//!
//! Both record every call and answer from a script keyed by target and scan
//! type. Anything not scripted succeeds with an empty report.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reconr_common::{ReconError, Result};
use reconr_core::probe::HostReport;
use reconr_core::{ProbeOutput, ProbeRequest, ProbeRunner, ScanType, ToolRunner};

#[derive(Debug, Clone)]
pub enum Outcome {
    Report(HostReport),
    Fail(String),
    Timeout,
}

#[derive(Default)]
pub struct FakeEngine {
    discovery: HashMap<String, Vec<HostReport>>,
    outcomes: HashMap<(String, String), Outcome>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<ProbeRequest>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hosts reported by the discovery of `target` (its engine spec).
    pub fn discover(mut self, target: &str, hosts: Vec<HostReport>) -> Self {
        self.discovery.insert(target.to_string(), hosts);
        self
    }

    pub fn on(mut self, target: &str, scan_type: &str, outcome: Outcome) -> Self {
        self.outcomes
            .insert((target.to_string(), scan_type.to_string()), outcome);
        self
    }

    /// Every probe of `scan_type` sleeps this long before answering.
    pub fn delay(mut self, scan_type: &str, delay: Duration) -> Self {
        self.delays.insert(scan_type.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<ProbeRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, scan_type: &str) -> Vec<ProbeRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.scan_type.as_str() == scan_type)
            .collect()
    }

    /// Highest number of probes that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight gauge, also when the probe future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProbeRunner for FakeEngine {
    async fn run(&self, request: &ProbeRequest) -> Result<ProbeOutput> {
        self.calls.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delays.get(request.scan_type.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        if request.scan_type.as_str() == ScanType::DISCOVERY {
            let hosts = self
                .discovery
                .get(&request.target)
                .cloned()
                .unwrap_or_default();
            return Ok(ProbeOutput::new(hosts));
        }

        let key = (request.target.clone(), request.scan_type.to_string());
        match self.outcomes.get(&key).cloned() {
            Some(Outcome::Report(report)) => Ok(ProbeOutput::new(vec![report])),
            Some(Outcome::Fail(message)) => Err(ReconError::probe(&request.target, message)),
            Some(Outcome::Timeout) => Err(ReconError::timeout(
                &request.target,
                request.timeout.unwrap_or(Duration::from_secs(1)),
            )),
            None => Ok(ProbeOutput::new(vec![HostReport::up(address_of(
                &request.target,
            )?)])),
        }
    }
}

/// Lends a shared engine to wrappers that take their runner by value.
pub struct Shared(pub Arc<FakeEngine>);

#[async_trait]
impl ProbeRunner for Shared {
    async fn run(&self, request: &ProbeRequest) -> Result<ProbeOutput> {
        self.0.run(request).await
    }
}

fn address_of(target: &str) -> Result<IpAddr> {
    target
        .parse::<IpAddr>()
        .or_else(|_| target.parse::<SocketAddr>().map(|s| s.ip()))
        .map_err(|_| ReconError::probe(target, "not a single address"))
}

#[derive(Default)]
pub struct FakeTools {
    failures: HashMap<String, String>,
    calls: Mutex<Vec<(String, Option<Duration>)>>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every command starting with `program`.
    pub fn fail(mut self, program: &str, message: &str) -> Self {
        self.failures.insert(program.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, Option<Duration>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for FakeTools {
    async fn execute(&self, command: &str, timeout: Option<Duration>) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), timeout));

        let program = command.split_whitespace().next().unwrap_or_default();
        match self.failures.get(program) {
            Some(message) => Err(ReconError::probe(command, message.clone())),
            None => Ok(format!("ran {command}\n")),
        }
    }
}
