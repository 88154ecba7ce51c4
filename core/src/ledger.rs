//! # Scan Ledger
//!
//! Authoritative record of every scan submitted during a run: identity,
//! status, last progress payload and error history. The ledger knows nothing
//! about what a scan means, it only enforces that status moves forward.
//!
//! Progress notifications fan out to registered [`ProgressListener`]s. They run
//! synchronously, outside the ledger lock, in registration order. A listener
//! that fails or panics is logged and skipped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use reconr_common::{ReconError, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{Span, debug, info, warn};
use uuid::Uuid;

use crate::context::RunContext;
use crate::scan_type::ScanType;

/// Opaque scan identifier, unique for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ScanId(String);

impl ScanId {
    fn generate() -> Self {
        Self(format!("scan_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScanId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Succeeded | Self::Failed => 2,
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanErrorEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub id: ScanId,
    /// Address, `address:port` or an engine target spec.
    pub target: String,
    pub scan_type: ScanType,
    pub status: ScanStatus,
    pub progress: Option<Value>,
    pub errors: Vec<ScanErrorEntry>,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Subscriber for advisory progress payloads.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, scan_id: &ScanId, payload: &Value) -> std::result::Result<(), ListenerError>;
}

impl<F> ProgressListener for F
where
    F: Fn(&ScanId, &Value) -> std::result::Result<(), ListenerError> + Send + Sync,
{
    fn on_progress(&self, scan_id: &ScanId, payload: &Value) -> std::result::Result<(), ListenerError> {
        self(scan_id, payload)
    }
}

#[derive(Default)]
struct Records {
    by_id: HashMap<ScanId, ScanRecord>,
    order: Vec<ScanId>,
}

pub struct ScanLedger {
    recognized: BTreeSet<ScanType>,
    records: Mutex<Records>,
    listeners: RwLock<Vec<Arc<dyn ProgressListener>>>,
    span: Span,
}

impl fmt::Debug for ScanLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanLedger")
            .field("recognized", &self.recognized)
            .field("records", &self.len())
            .finish()
    }
}

impl ScanLedger {
    /// Creates a ledger accepting the given scan types. `external_tool` is
    /// always accepted.
    pub fn new(recognized: impl IntoIterator<Item = ScanType>, ctx: &RunContext) -> Self {
        let mut recognized: BTreeSet<ScanType> = recognized.into_iter().collect();
        recognized.insert(ScanType::external_tool());
        Self {
            recognized,
            records: Mutex::new(Records::default()),
            listeners: RwLock::new(Vec::new()),
            span: ctx.span().clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn recognizes(&self, scan_type: &str) -> bool {
        self.recognized.contains(scan_type)
    }

    pub fn subscribe(&self, listener: Arc<dyn ProgressListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn submit(&self, target: impl Into<String>, scan_type: &ScanType) -> Result<ScanId> {
        let target = target.into();
        if !self.recognizes(scan_type.as_str()) {
            return Err(ReconError::config(format!(
                "unrecognized scan type '{scan_type}' for {target}"
            )));
        }

        let id = ScanId::generate();
        let now = Utc::now();
        let record = ScanRecord {
            id: id.clone(),
            target,
            scan_type: scan_type.clone(),
            status: ScanStatus::Pending,
            progress: None,
            errors: Vec::new(),
            result: None,
            created_at: now,
            updated_at: now,
        };

        self.span.in_scope(|| {
            debug!(
                scan_id = %id,
                target = %record.target,
                scan_type = %scan_type,
                status = %ScanStatus::Pending,
                "scan submitted"
            )
        });

        let mut records = self.lock();
        records.order.push(id.clone());
        records.by_id.insert(id.clone(), record);
        Ok(id)
    }

    pub fn mark_in_progress(&self, id: &ScanId) -> Result<()> {
        self.transition(id, ScanStatus::InProgress, |_| {})
    }

    pub fn mark_result(&self, id: &ScanId, payload: Value) -> Result<()> {
        self.transition(id, ScanStatus::Succeeded, |record| {
            record.result = Some(payload);
        })
    }

    pub fn mark_error(&self, id: &ScanId, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.transition(id, ScanStatus::Failed, |record| {
            record.errors.push(ScanErrorEntry {
                message,
                timestamp: Utc::now(),
            });
        })
    }

    /// Applies `next` only if it moves the record strictly forward. Anything
    /// else is a late duplicate and is logged and dropped.
    fn transition(&self, id: &ScanId, next: ScanStatus, apply: impl FnOnce(&mut ScanRecord)) -> Result<()> {
        let mut records = self.lock();
        let record = records
            .by_id
            .get_mut(id)
            .ok_or_else(|| ReconError::not_found("scan", id.as_str()))?;

        let _enter = self.span.enter();
        if next.rank() <= record.status.rank() {
            warn!(
                scan_id = %id,
                status = %record.status,
                requested = %next,
                "ignored late status transition"
            );
            return Ok(());
        }

        record.status = next;
        record.updated_at = Utc::now();
        apply(record);

        match next {
            ScanStatus::Failed => warn!(
                scan_id = %id,
                target = %record.target,
                scan_type = %record.scan_type,
                status = %next,
                error = record.errors.last().map(|e| e.message.as_str()).unwrap_or_default(),
                "scan failed"
            ),
            ScanStatus::Succeeded => info!(
                scan_id = %id,
                target = %record.target,
                scan_type = %record.scan_type,
                status = %next,
                "scan succeeded"
            ),
            _ => debug!(
                scan_id = %id,
                target = %record.target,
                scan_type = %record.scan_type,
                status = %next,
                "scan started"
            ),
        }
        Ok(())
    }

    /// Stores the latest progress payload and notifies listeners. Unknown ids
    /// are not stored but still reach the listeners.
    pub fn record_progress(&self, id: &ScanId, payload: Value) {
        {
            let mut records = self.lock();
            if let Some(record) = records.by_id.get_mut(id) {
                record.progress = Some(payload.clone());
                record.updated_at = Utc::now();
            }
        }

        let listeners: Vec<Arc<dyn ProgressListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, listener) in listeners.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener.on_progress(id, &payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self
                    .span
                    .in_scope(|| warn!(scan_id = %id, listener = index, "progress listener failed: {e}")),
                Err(_) => self
                    .span
                    .in_scope(|| warn!(scan_id = %id, listener = index, "progress listener panicked")),
            }
        }
    }

    /// Result payload of a succeeded scan.
    pub fn get_result(&self, id: &ScanId) -> Result<Value> {
        let records = self.lock();
        records
            .by_id
            .get(id)
            .filter(|r| r.status == ScanStatus::Succeeded)
            .and_then(|r| r.result.clone())
            .ok_or_else(|| ReconError::not_found("scan result", id.as_str()))
    }

    pub fn record(&self, id: &ScanId) -> Option<ScanRecord> {
        self.lock().by_id.get(id).cloned()
    }

    /// All records in submission order.
    pub fn records(&self) -> Vec<ScanRecord> {
        let records = self.lock();
        records
            .order
            .iter()
            .filter_map(|id| records.by_id.get(id).cloned())
            .collect()
    }

    /// Every error entry paired with the scan it belongs to.
    pub fn errors(&self) -> Vec<(ScanId, ScanErrorEntry)> {
        self.records()
            .into_iter()
            .flat_map(|r| {
                let id = r.id;
                r.errors.into_iter().map(move |e| (id.clone(), e))
            })
            .collect()
    }

    pub fn count_by_status(&self) -> BTreeMap<ScanStatus, usize> {
        let records = self.lock();
        let mut counts = BTreeMap::new();
        for record in records.by_id.values() {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
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
