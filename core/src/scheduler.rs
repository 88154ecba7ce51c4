//! # Phase Scheduler
//!
//! Drives one run through its phases:
//!
//! ```text
//! Discovery -> PortFanOut -> ServiceFanOut -> OsFanOut -> DynamicDispatch -> Done
//! ```
//!
//! Each phase submits all of its scans to the ledger up front, then runs them
//! concurrently (bounded by `max_concurrent_scans` when set) and only returns
//! once every one of them is terminal. A failed task is recorded on its scan
//! and the phase carries on with the others. Phases never overlap.
//!
//! Results are merged into the host registry right after the probe returns,
//! with no suspension point between the merge and the ledger update. A
//! cancelled task therefore either merged completely or not at all.

use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use reconr_common::config::Config;
use reconr_common::network::target::Target;
use reconr_common::{ReconError, Result};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::context::RunContext;
use crate::host::HostRegistry;
use crate::ledger::{ProgressListener, ScanId, ScanLedger};
use crate::probe::{HostReport, ProbeOutput, ProbeRequest, ProbeRunner, ToolRunner};
use crate::rules::{
    Action, RuleTable, TemplateVars, render_template, selects_ports, split_args,
    without_port_selection,
};
use crate::scan_type::ScanType;

mod dispatch;
pub mod phase;
mod report;

pub use phase::Phase;
pub use report::{PhaseSummary, RunReport};

enum Work {
    Discovery {
        request: ProbeRequest,
    },
    Host {
        address: IpAddr,
        request: ProbeRequest,
    },
    Script {
        address: IpAddr,
        key: String,
        request: ProbeRequest,
    },
    Tool {
        address: IpAddr,
        key: String,
        command: String,
        timeout: Option<Duration>,
    },
}

struct Job {
    id: ScanId,
    work: Work,
}

/// State of one run, lent to every phase for the duration of a call.
struct Run<'a> {
    ledger: &'a ScanLedger,
    registry: &'a HostRegistry,
    cancel: &'a CancellationToken,
}

pub struct Scheduler {
    rules: RuleTable,
    probe: Arc<dyn ProbeRunner>,
    tools: Arc<dyn ToolRunner>,
    config: Config,
    listeners: Vec<Arc<dyn ProgressListener>>,
}

impl Scheduler {
    /// Fails with a configuration error unless the rule table defines every
    /// scan type the phases need.
    pub fn new(
        rules: RuleTable,
        probe: Arc<dyn ProbeRunner>,
        tools: Arc<dyn ToolRunner>,
        config: Config,
    ) -> Result<Self> {
        rules.require(&[
            ScanType::PORT_SCAN,
            ScanType::SERVICE_SCAN,
            ScanType::OS_DETECTION,
        ])?;
        if rules.has_scripted_probes() {
            rules.require(&[ScanType::SCRIPT_SCAN])?;
        }

        Ok(Self {
            rules,
            probe,
            tools,
            config,
            listeners: Vec::new(),
        })
    }

    /// Registers a progress listener for every subsequent run.
    pub fn subscribe(&mut self, listener: Arc<dyn ProgressListener>) {
        self.listeners.push(listener);
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs every phase against `targets`.
    ///
    /// Only configuration problems (no targets, an unresolved `lan`) fail the
    /// run, and they do so before any scan is submitted. Cancelling `cancel`
    /// fails the tasks still in flight, skips the remaining phases and
    /// returns the partial report.
    pub async fn run(&self, targets: Vec<Target>, cancel: CancellationToken) -> Result<RunReport> {
        let targets = discovery_targets(targets)?;
        let ctx = RunContext::new();
        let span = ctx.span().clone();
        self.drive(&ctx, targets, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        ctx: &RunContext,
        targets: Vec<(String, String)>,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let ledger = ScanLedger::new(self.rules.scan_types().map(|(id, _)| id.clone()), ctx);
        for listener in &self.listeners {
            ledger.subscribe(Arc::clone(listener));
        }
        let registry = HostRegistry::new(ctx);
        let run = Run {
            ledger: &ledger,
            registry: &registry,
            cancel: &cancel,
        };

        info!(targets = targets.len(), "run started");
        let mut phases = Vec::new();
        let mut phase = Phase::Discovery;
        while phase != Phase::Done {
            if cancel.is_cancelled() {
                warn!(phase = %phase, "run cancelled, skipping remaining phases");
                break;
            }
            let jobs = match phase {
                Phase::Discovery => self.discovery_jobs(&run, &targets)?,
                Phase::PortFanOut | Phase::ServiceFanOut | Phase::OsFanOut => {
                    self.host_jobs(&run, phase)?
                }
                Phase::DynamicDispatch => self.dispatch_jobs(&run)?,
                Phase::Done => Vec::new(),
            };
            phases.push(self.fan_out(&run, phase, jobs).await);
            phase = phase.next();
        }

        let cancelled = cancel.is_cancelled();
        if !cancelled {
            registry.complete_all();
        }

        let report = RunReport {
            run_id: ctx.run_id().to_string(),
            hosts: registry.snapshot(),
            records: ledger.records(),
            phases,
            cancelled,
            started_at: ctx.started_at(),
            finished_at: Utc::now(),
        };
        ctx.finish(
            report.hosts.len(),
            report.records.len(),
            report.failed().count(),
            cancelled,
        );
        Ok(report)
    }

    fn request(
        &self,
        target: String,
        scan_type: &ScanType,
        args: Vec<String>,
        label: Option<&str>,
    ) -> ProbeRequest {
        let artifact = self
            .config
            .artifact_path(&target, scan_type.as_str(), label);
        ProbeRequest {
            target,
            scan_type: scan_type.clone(),
            args,
            timeout: self.config.probe_timeout,
            artifact,
        }
    }

    fn discovery_jobs(&self, run: &Run<'_>, targets: &[(String, String)]) -> Result<Vec<Job>> {
        let scan_type = ScanType::discovery();
        targets
            .iter()
            .map(|(label, spec)| {
                let id = run.ledger.submit(label.clone(), &scan_type)?;
                let mut request = self.request(
                    spec.clone(),
                    &scan_type,
                    self.rules.arg_list(ScanType::DISCOVERY),
                    None,
                );
                request.artifact = self
                    .config
                    .artifact_path(label, ScanType::DISCOVERY, None);
                Ok(Job {
                    id,
                    work: Work::Discovery { request },
                })
            })
            .collect()
    }

    /// One job per known host for a fan-out phase.
    fn host_jobs(&self, run: &Run<'_>, phase: Phase) -> Result<Vec<Job>> {
        let Some(name) = phase.scan_type() else {
            return Ok(Vec::new());
        };
        let scan_type = ScanType::new(name);

        run.registry
            .snapshot()
            .into_iter()
            .map(|host| {
                let target = host.address().to_string();
                let mut args = self.rules.arg_list(name);
                if phase == Phase::ServiceFanOut && !selects_ports(&args) {
                    let ports: Vec<String> = host.open_ports().map(|p| p.to_string()).collect();
                    if !ports.is_empty() {
                        args.push("-p".into());
                        args.push(ports.join(","));
                    }
                }

                let id = run.ledger.submit(target.clone(), &scan_type)?;
                Ok(Job {
                    id,
                    work: Work::Host {
                        address: host.address(),
                        request: self.request(target, &scan_type, args, None),
                    },
                })
            })
            .collect()
    }

    fn dispatch_jobs(&self, run: &Run<'_>) -> Result<Vec<Job>> {
        let snapshot = run.registry.snapshot();
        let script_scan = ScanType::script_scan();
        let external_tool = ScanType::external_tool();

        dispatch::plan(&snapshot, &self.rules)
            .into_iter()
            .map(|item| {
                let target = item.endpoint();
                match &item.action {
                    Action::ScriptedProbe { script, args } => {
                        let mut argv =
                            without_port_selection(self.rules.arg_list(ScanType::SCRIPT_SCAN));
                        argv.extend([
                            "-p".to_string(),
                            item.port.to_string(),
                            "--script".to_string(),
                            script.clone(),
                        ]);
                        if let Some(extra) = args.as_deref().and_then(split_args) {
                            argv.extend(extra);
                        }

                        let id = run.ledger.submit(target.clone(), &script_scan)?;
                        Ok(Job {
                            id,
                            work: Work::Script {
                                address: item.address,
                                key: item.result_key(ScanType::SCRIPT_SCAN),
                                request: self.request(
                                    target,
                                    &script_scan,
                                    argv,
                                    Some(item.tag().as_str()),
                                ),
                            },
                        })
                    }
                    Action::ExternalTool {
                        command,
                        timeout_secs,
                    } => {
                        let address = item.address.to_string();
                        let command = render_template(
                            command,
                            &TemplateVars {
                                address: &address,
                                port: item.port,
                                service: &item.service,
                            },
                        );

                        let id = run.ledger.submit(target, &external_tool)?;
                        Ok(Job {
                            id,
                            work: Work::Tool {
                                address: item.address,
                                key: item.result_key(ScanType::EXTERNAL_TOOL),
                                command,
                                timeout: timeout_secs
                                    .map(Duration::from_secs)
                                    .or(self.config.tool_timeout),
                            },
                        })
                    }
                }
            })
            .collect()
    }

    /// Runs a phase's batch and waits for every task to become terminal.
    async fn fan_out(&self, run: &Run<'_>, phase: Phase, jobs: Vec<Job>) -> PhaseSummary {
        let total = jobs.len();
        let mut summary = PhaseSummary::new(phase, total);
        let limit = self
            .config
            .max_concurrent_scans
            .map_or(total.max(1), NonZeroUsize::get);
        info!(phase = %phase, total, limit, "phase started");

        let mut outcomes = stream::iter(jobs)
            .map(|job| self.execute(run, phase, job))
            .buffer_unordered(limit);

        while let Some((id, succeeded)) = outcomes.next().await {
            if succeeded {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            let completed = summary.succeeded + summary.failed;
            run.ledger.record_progress(
                &id,
                json!({ "phase": phase.name(), "completed": completed, "total": total }),
            );
        }

        info!(
            phase = %phase,
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "phase finished"
        );
        summary
    }

    async fn execute(&self, run: &Run<'_>, phase: Phase, job: Job) -> (ScanId, bool) {
        let Job { id, work } = job;
        if run.cancel.is_cancelled() {
            let cancelled = ReconError::Cancelled(format!("{phase} cancelled before start"));
            return (id.clone(), settle(run, &id, Err(cancelled)));
        }
        if let Err(e) = run.ledger.mark_in_progress(&id) {
            warn!(scan_id = %id, "cannot start scan: {e}");
        }

        let outcome = tokio::select! {
            biased;
            _ = run.cancel.cancelled() => {
                Err(ReconError::Cancelled(format!("{phase} cancelled while running")))
            }
            outcome = self.perform(run, work) => outcome,
        };
        let succeeded = settle(run, &id, outcome);
        (id, succeeded)
    }

    /// Runs the probe or tool behind `work` and merges what it found.
    async fn perform(&self, run: &Run<'_>, work: Work) -> Result<Value> {
        match work {
            Work::Discovery { request } => {
                let output = self.probe.run(&request).await?;
                let discovery = ScanType::discovery();
                for report in output.up_hosts() {
                    run.registry.upsert(report.address);
                    run.registry
                        .merge(report.address, &discovery, report.to_value())?;
                }
                debug!(
                    target = %request.target,
                    reported = output.hosts.len(),
                    up = output.up_hosts().count(),
                    "discovery merged"
                );
                Ok(serde_json::to_value(&output).unwrap_or_default())
            }
            Work::Host { address, request } => {
                let output = self.probe.run(&request).await?;
                let report = host_report(&output, address, &request.target)?;
                run.registry
                    .merge(address, &request.scan_type, report.clone())?;
                Ok(report)
            }
            Work::Script {
                address,
                key,
                request,
            } => {
                let output = self.probe.run(&request).await?;
                let report = host_report(&output, address, &request.target)?;
                run.registry
                    .merge_keyed(address, &request.scan_type, key, report.clone())?;
                Ok(report)
            }
            Work::Tool {
                address,
                key,
                command,
                timeout,
            } => {
                let stdout = self.tools.execute(&command, timeout).await?;
                let payload = Value::String(stdout);
                run.registry
                    .merge_keyed(address, &ScanType::external_tool(), key, payload.clone())?;
                Ok(payload)
            }
        }
    }
}

/// Flattens the targets into `(label, engine spec)` pairs, one discovery
/// scan each.
fn discovery_targets(targets: Vec<Target>) -> Result<Vec<(String, String)>> {
    let flat: Vec<Target> = targets.into_iter().flat_map(Target::flatten).collect();
    if flat.is_empty() {
        return Err(ReconError::config("no targets to scan"));
    }
    flat.iter()
        .map(|target| Ok((target.to_string(), target.engine_spec()?)))
        .collect()
}

fn host_report(output: &ProbeOutput, address: IpAddr, target: &str) -> Result<Value> {
    output
        .host(address)
        .map(HostReport::to_value)
        .ok_or_else(|| ReconError::probe(target, "engine reported nothing for this host"))
}

/// Writes a task outcome to the ledger. Returns whether the task succeeded.
fn settle(run: &Run<'_>, id: &ScanId, outcome: Result<Value>) -> bool {
    let (succeeded, written) = match outcome {
        Ok(payload) => (true, run.ledger.mark_result(id, payload)),
        Err(e) => {
            debug!(scan_id = %id, code = e.code(), "task failed");
            (false, run.ledger.mark_error(id, e.to_string()))
        }
    };
    if let Err(e) = written {
        warn!(scan_id = %id, "ledger rejected outcome: {e}");
    }
    succeeded
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
