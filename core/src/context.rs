//! Run-scoped observability context.
//!
//! One [`RunContext`] is created when a scheduler run starts. The ledger and the
//! host registry receive it at construction and emit every log line inside its
//! span, so all events of one run share the same `run_id`.

use chrono::{DateTime, Utc};
use tracing::{Span, info, info_span};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    span: Span,
    started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new() -> Self {
        let run_id = format!("run_{}", &Uuid::new_v4().simple().to_string()[..8]);
        let span = info_span!("run", run_id = %run_id);
        Self {
            run_id,
            span,
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Emits the closing summary of the run.
    pub fn finish(&self, hosts: usize, scans: usize, failures: usize, cancelled: bool) {
        let elapsed = Utc::now() - self.started_at;
        self.span.in_scope(|| {
            info!(
                hosts,
                scans,
                failures,
                cancelled,
                elapsed_ms = elapsed.num_milliseconds(),
                "run finished"
            );
        });
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
