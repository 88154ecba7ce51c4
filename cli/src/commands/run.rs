use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use colored::*;
use console::Term;
use reconr_common::config::{Config, DEFAULT_ENGINE};
use reconr_common::network::interface::{self, Subnet};
use reconr_common::network::target::Target;
use reconr_core::probe::{NmapRunner, ProcessToolRunner, Retrying};
use reconr_core::{ProbeRunner, RuleTable, RunReport, ScanStatus, Scheduler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::RunArgs;
use crate::terminal::input::InputHandle;
use crate::terminal::spinner::SpinnerHandle;
use crate::terminal::{colors, format, print};

pub async fn run(args: RunArgs, q_level: u8, no_banner: bool) -> anyhow::Result<()> {
    let config = build_config(&args, q_level, no_banner);
    let rules = RuleTable::from_path(&args.rules)
        .with_context(|| format!("invalid rule document {}", args.rules.display()))?;

    let targets = select_targets(args.targets, &config)?
        .into_iter()
        .map(Target::resolve_lan)
        .collect::<Result<Vec<_>, _>>()?;

    if !is_root::is_root() {
        warn!("not running as root, the engine may fall back to slower scan techniques");
    }
    if config.write_artifacts {
        std::fs::create_dir_all(&config.results_dir).with_context(|| {
            format!("cannot create results directory {}", config.results_dir.display())
        })?;
    }

    let engine = NmapRunner::from_config(&config);
    let probe: Arc<dyn ProbeRunner> = if config.probe_retries > 0 {
        Arc::new(Retrying::new(engine, config.probe_retries))
    } else {
        Arc::new(engine)
    };
    let mut scheduler = Scheduler::new(
        rules,
        probe,
        Arc::new(ProcessToolRunner::new()),
        config.clone(),
    )?;

    let interactive = !config.disable_input && std::io::stdin().is_terminal();
    let cancel = CancellationToken::new();
    let spinner = Arc::new(SpinnerHandle::start(q_level > 1 || args.json));
    scheduler.subscribe(spinner.clone());

    print::header("running", q_level);
    let signal = tokio::spawn(watch_ctrl_c(cancel.clone()));
    let mut input = interactive.then(|| InputHandle::start(cancel.clone()));

    let report = scheduler.run(targets, cancel).await;

    signal.abort();
    if let Some(input) = input.as_mut() {
        input.stop();
    }
    spinner.finish();
    drop(scheduler);

    let report = report?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_report(&report, q_level);
    Ok(())
}

fn build_config(args: &RunArgs, q_level: u8, no_banner: bool) -> Config {
    let defaults = Config::default();
    Config {
        engine_path: args
            .engine
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE)),
        results_dir: args.results.clone(),
        write_artifacts: !args.no_artifacts,
        max_concurrent_scans: args.max_concurrent,
        probe_timeout: args.timeout.map(Duration::from_secs).or(defaults.probe_timeout),
        tool_timeout: args
            .tool_timeout
            .map(Duration::from_secs)
            .or(defaults.tool_timeout),
        probe_retries: args.retries,
        quiet: q_level,
        no_banner,
        disable_input: args.no_input,
    }
}

async fn watch_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, finishing early");
        cancel.cancel();
    }
}

/// Explicit targets win. Without any, the user picks one of the local subnets.
fn select_targets(targets: Vec<Target>, config: &Config) -> anyhow::Result<Vec<Target>> {
    if !targets.is_empty() {
        return Ok(targets);
    }
    if config.disable_input {
        bail!("no target given and input is disabled, pass one with -t");
    }

    let subnets = interface::list_subnets();
    if subnets.is_empty() {
        bail!("no target given and no usable interface found");
    }

    print::header("select a network", config.quiet);
    for (idx, subnet) in subnets.iter().enumerate() {
        print::tree_head(idx, &subnet.interface);
        print::as_tree_one_level(&format::subnet_to_key_value_pair(subnet));
    }

    let term = Term::stderr();
    term.write_str(&format!("{} ", "network [0]>".color(colors::PRIMARY)))?;
    let line = term.read_line().context("cannot read network selection")?;
    let subnet = pick(&subnets, &line)?;
    info!("scanning {subnet}");

    let target = format!("{}/{}", subnet.network.network(), subnet.network.prefix())
        .parse::<Target>()
        .map_err(anyhow::Error::msg)?;
    Ok(vec![target])
}

/// Empty input picks the first entry.
fn pick<'a>(subnets: &'a [Subnet], input: &str) -> anyhow::Result<&'a Subnet> {
    let input = input.trim();
    let idx = if input.is_empty() {
        0
    } else {
        input
            .parse::<usize>()
            .with_context(|| format!("'{input}' is not a network number"))?
    };
    subnets
        .get(idx)
        .with_context(|| format!("there is no network number {idx}"))
}

fn print_report(report: &RunReport, q_level: u8) {
    print::header("hosts", q_level);
    if report.hosts.is_empty() {
        if report.cancelled {
            print::no_results(&["the run was cancelled before discovery finished"]);
        } else {
            print::no_results(&[
                "check the target ranges",
                "raw discovery needs root",
                "firewalls may drop pings, try '-Pn' in discovery args",
            ]);
        }
    }
    for (idx, host) in report.hosts.iter().enumerate() {
        let address = host.address().to_string();
        print::tree_head(idx, host.hostname().unwrap_or(&address));
        print::as_tree_one_level(&format::host_to_key_value_pair(host));
    }

    if report.errors().next().is_some() {
        print::header("scan errors", q_level);
        for (record, entry) in report.errors() {
            print::print_status(format!(
                "{} {} {} {}",
                record.scan_type.as_str().color(colors::PRIMARY),
                record.target.color(colors::IPV4_ADDR),
                "→".color(colors::SEPARATOR),
                entry.message.color(colors::FAILURE)
            ));
        }
    }

    print::header("summary", q_level);
    let phase_names: Vec<&str> = report.phases.iter().map(|p| p.phase.name()).collect();
    print::set_key_width(phase_names.iter().copied().chain(["succeeded", "cancelled"]));

    print::aligned_line("run", report.run_id.clone());
    print::aligned_line("hosts", report.hosts.len().to_string().color(colors::ACCENT));
    let counts = report.count_by_status();
    for status in [ScanStatus::Succeeded, ScanStatus::Failed] {
        let count = counts.get(&status).copied().unwrap_or(0);
        print::aligned_line(&status.to_string(), format::status_count(status, count));
    }
    for phase in &report.phases {
        print::aligned_line(
            phase.phase.name(),
            format!(
                "{} submitted, {} ok, {} failed",
                phase.submitted, phase.succeeded, phase.failed
            ),
        );
    }
    let elapsed = report.finished_at - report.started_at;
    print::aligned_line(
        "duration",
        format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0),
    );
    if report.cancelled {
        print::aligned_line("cancelled", "yes, the report is partial".color(colors::PENDING));
    }
    print::end_of_program();
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandLine, Commands};
    use clap::Parser;

    fn subnets() -> Vec<Subnet> {
        ["eth0", "wlan0"]
            .iter()
            .zip(["192.168.1.10/24", "10.0.0.5/16"])
            .map(|(name, net)| Subnet {
                interface: name.to_string(),
                network: net.parse().unwrap(),
            })
            .collect()
    }

    fn run_args(argv: &[&str]) -> RunArgs {
        let argv = ["reconr", "run"].iter().chain(argv).copied();
        match CommandLine::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn empty_selection_picks_the_first_network() {
        let subnets = subnets();
        assert_eq!(pick(&subnets, "\n").unwrap().interface, "eth0");
        assert_eq!(pick(&subnets, " 1 ").unwrap().interface, "wlan0");
    }

    #[test]
    fn bad_selections_are_errors() {
        let subnets = subnets();
        assert!(pick(&subnets, "2").is_err());
        assert!(pick(&subnets, "eth0").is_err());
    }

    #[test]
    fn explicit_targets_skip_the_prompt() {
        let config = Config {
            disable_input: true,
            ..Config::default()
        };
        let targets = vec!["10.0.0.1".parse::<Target>().unwrap()];
        assert_eq!(select_targets(targets.clone(), &config).unwrap(), targets);
    }

    #[test]
    fn no_target_without_input_is_an_error() {
        let config = Config {
            disable_input: true,
            ..Config::default()
        };
        assert!(select_targets(vec![], &config).is_err());
    }

    #[test]
    fn flags_end_up_in_the_config() {
        let args = run_args(&[
            "--timeout",
            "30",
            "--retries",
            "2",
            "--no-artifacts",
            "--no-input",
            "--engine",
            "/opt/nmap/bin/nmap",
        ]);
        let config = build_config(&args, 1, true);

        assert_eq!(config.probe_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.tool_timeout, Config::default().tool_timeout);
        assert_eq!(config.probe_retries, 2);
        assert!(!config.write_artifacts);
        assert!(config.disable_input);
        assert_eq!(config.engine_path, PathBuf::from("/opt/nmap/bin/nmap"));
        assert_eq!(config.quiet, 1);
        assert!(config.no_banner);
    }
}
