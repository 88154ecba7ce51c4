use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::phase::Phase;
use crate::host::Host;
use crate::ledger::{ScanErrorEntry, ScanRecord, ScanStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PhaseSummary {
    pub(crate) fn new(phase: Phase, submitted: usize) -> Self {
        Self {
            phase,
            submitted,
            succeeded: 0,
            failed: 0,
        }
    }
}

/// Final state of a run: the host snapshot, the full scan ledger and what
/// each phase did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub hosts: Vec<Host>,
    pub records: Vec<ScanRecord>,
    pub phases: Vec<PhaseSummary>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn host(&self, address: IpAddr) -> Option<&Host> {
        self.hosts.iter().find(|h| h.address() == address)
    }

    /// Every ledger error with the record it belongs to.
    pub fn errors(&self) -> impl Iterator<Item = (&ScanRecord, &ScanErrorEntry)> {
        self.records
            .iter()
            .flat_map(|r| r.errors.iter().map(move |e| (r, e)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScanRecord> {
        self.records.iter().filter(|r| r.status == ScanStatus::Failed)
    }

    pub fn records_of<'a>(&'a self, scan_type: &'a str) -> impl Iterator<Item = &'a ScanRecord> {
        self.records
            .iter()
            .filter(move |r| r.scan_type.as_str() == scan_type)
    }

    pub fn count_by_status(&self) -> BTreeMap<ScanStatus, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseSummary> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}
