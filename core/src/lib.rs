//! # reconr core
//!
//! The orchestration engine of a multi-phase reconnaissance run:
//!
//! * [`host`]: the host registry, the only owner of per-host state.
//! * [`ledger`]: the scan ledger, the authoritative record of every submitted scan.
//! * [`rules`]: the declarative rule table mapping services to follow-up actions.
//! * [`probe`]: the boundary to the external probing engine and external tools.
//! * [`scheduler`]: the phase scheduler driving discovery, per-host fan-out and
//!   dynamic dispatch.
//!
//! The scheduler holds the registry and ledger for the lifetime of one run and is
//! the only component that writes to both.

pub mod context;
pub mod host;
pub mod ledger;
pub mod probe;
pub mod rules;
pub mod scan_type;
pub mod scheduler;

pub use context::RunContext;
pub use host::{Host, HostRegistry, HostState};
pub use ledger::{ProgressListener, ScanId, ScanLedger, ScanRecord, ScanStatus};
pub use probe::{ProbeOutput, ProbeRequest, ProbeRunner, ToolRunner};
pub use rules::{Action, RuleTable};
pub use scan_type::ScanType;
pub use scheduler::{Phase, PhaseSummary, RunReport, Scheduler};
