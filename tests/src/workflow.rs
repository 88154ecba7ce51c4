use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reconr_common::config::Config;
use reconr_common::network::target::Target;
use reconr_core::ledger::ListenerError;
use reconr_core::probe::{HostReport, HostStatus, PortReport, Retrying};
use reconr_core::{HostState, Phase, RuleTable, RunReport, ScanId, ScanStatus, ScanType, Scheduler};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::fakes::{FakeEngine, FakeTools, Outcome, Shared};

const RULES: &str = r#"
scan_types:
  discovery: { args: "-sn" }
  port_scan: { args: "-sS --top-ports 100" }
  service_scan: { args: "-sV" }
  os_detection: { args: "-O" }
  script_scan: { args: "-sV -T4" }
services:
  http:
    - { type: scripted-probe, script: http-title }
"#;

const RULES_WITH_TOOL: &str = r#"
scan_types:
  discovery: { args: "-sn" }
  port_scan: { args: "-sS" }
  service_scan: { args: "-sV" }
  os_detection: { args: "-O" }
services:
  HTTP:
    - { type: external-tool, command: "whatweb {address}:{port}", timeout_secs: 30 }
  ssh:
    - { type: external-tool, command: "ssh-audit {ip} -p {port}" }
"#;

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn target(s: &str) -> Vec<Target> {
    vec![Target::from_str(s).unwrap()]
}

fn config() -> Config {
    Config {
        write_artifacts: false,
        ..Config::default()
    }
}

fn scheduler(rules: &str, engine: &Arc<FakeEngine>, tools: &Arc<FakeTools>, config: Config) -> Scheduler {
    Scheduler::new(
        RuleTable::load(rules).unwrap(),
        engine.clone(),
        tools.clone(),
        config,
    )
    .unwrap()
}

async fn run(scheduler: &Scheduler, targets: Vec<Target>) -> RunReport {
    scheduler
        .run(targets, CancellationToken::new())
        .await
        .unwrap()
}

fn web_server(address: &str) -> HostReport {
    HostReport::up(addr(address)).with_port(PortReport::open(80, Some("http")))
}

#[tokio::test]
async fn only_hosts_reported_up_enter_the_registry() {
    let engine = Arc::new(FakeEngine::new().discover(
        "10.0.0.0/24",
        vec![
            HostReport::up(addr("10.0.0.2")),
            HostReport::new(addr("10.0.0.3"), HostStatus::Down),
        ],
    ));
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(RULES, &engine, &tools, config());

    let report = run(&scheduler, target("10.0.0.0/24")).await;

    let hosts: Vec<IpAddr> = report.hosts.iter().map(|h| h.address()).collect();
    assert_eq!(hosts, vec![addr("10.0.0.2")]);
    assert!(engine.calls_of(ScanType::PORT_SCAN).iter().all(|c| c.target == "10.0.0.2"));
    assert_eq!(report.records_of(ScanType::PORT_SCAN).count(), 1);
}

#[tokio::test]
async fn open_http_port_dispatches_one_scripted_probe() {
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on("10.0.0.2", ScanType::PORT_SCAN, Outcome::Report(web_server("10.0.0.2"))),
    );
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(RULES, &engine, &tools, config());

    let report = run(&scheduler, target("10.0.0.2")).await;

    let scripted: Vec<_> = report.records_of(ScanType::SCRIPT_SCAN).collect();
    assert_eq!(scripted.len(), 1);
    assert_eq!(scripted[0].target, "10.0.0.2:80");
    assert_eq!(scripted[0].status, ScanStatus::Succeeded);

    let calls = engine.calls_of(ScanType::SCRIPT_SCAN);
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].args,
        vec!["-sV", "-T4", "-p", "80", "--script", "http-title"]
    );

    let host = report.host(addr("10.0.0.2")).unwrap();
    assert!(host.result("script_scan:http-title#0:80").is_some());
    assert_eq!(host.services().get(&80).map(String::as_str), Some("http"));
    assert!(tools.calls().is_empty());
}

#[tokio::test]
async fn service_scan_timeout_is_isolated_to_its_record() {
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on("10.0.0.2", ScanType::SERVICE_SCAN, Outcome::Timeout),
    );
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(RULES, &engine, &tools, config());

    let report = run(&scheduler, target("10.0.0.2")).await;

    let service: Vec<_> = report.records_of(ScanType::SERVICE_SCAN).collect();
    assert_eq!(service.len(), 1);
    assert_eq!(service[0].status, ScanStatus::Failed);
    assert_eq!(service[0].errors.len(), 1);

    let os: Vec<_> = report.records_of(ScanType::OS_DETECTION).collect();
    assert_eq!(os.len(), 1);
    assert_eq!(os[0].status, ScanStatus::Succeeded);

    let host = report.host(addr("10.0.0.2")).unwrap();
    assert!(!host.has_scan(ScanType::SERVICE_SCAN));
    assert!(host.result(ScanType::SERVICE_SCAN).is_none());
    assert!(host.has_scan(ScanType::OS_DETECTION));
    assert_eq!(report.errors().count(), 1);
}

#[tokio::test]
async fn fifty_hosts_end_port_fan_out_with_fifty_terminal_records() {
    let hosts: Vec<HostReport> = (1..=50)
        .map(|i| HostReport::up(addr(&format!("10.0.0.{i}"))))
        .collect();
    let mut engine = FakeEngine::new()
        .discover("10.0.0.0/24", hosts)
        .delay(ScanType::PORT_SCAN, Duration::from_millis(20));
    for i in (7..=50).step_by(7) {
        engine = engine.on(
            &format!("10.0.0.{i}"),
            ScanType::PORT_SCAN,
            Outcome::Fail("exit status 1".into()),
        );
    }
    for i in (11..=50).step_by(11) {
        engine = engine.on(&format!("10.0.0.{i}"), ScanType::PORT_SCAN, Outcome::Timeout);
    }
    let engine = Arc::new(engine);
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(RULES, &engine, &tools, config());

    let report = run(&scheduler, target("10.0.0.0/24")).await;

    let port: Vec<_> = report.records_of(ScanType::PORT_SCAN).collect();
    assert_eq!(port.len(), 50);
    assert!(port.iter().all(|r| r.status.is_terminal()));
    let failed = port.iter().filter(|r| r.status == ScanStatus::Failed).count();
    assert_eq!(failed, 7 + 4);

    let summary = report.phase(Phase::PortFanOut).unwrap();
    assert_eq!((summary.submitted, summary.failed), (50, 11));
    // Without a ceiling the whole phase is in flight at once.
    assert_eq!(engine.peak_in_flight(), 50);
    // Failed hosts still take part in the later phases.
    assert_eq!(report.records_of(ScanType::OS_DETECTION).count(), 50);
}

#[tokio::test]
async fn concurrency_ceiling_bounds_probes_in_flight() {
    let hosts: Vec<HostReport> = (1..=20)
        .map(|i| HostReport::up(addr(&format!("10.0.0.{i}"))))
        .collect();
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.0/24", hosts)
            .delay(ScanType::PORT_SCAN, Duration::from_millis(10))
            .delay(ScanType::SERVICE_SCAN, Duration::from_millis(10)),
    );
    let tools = Arc::new(FakeTools::new());
    let config = Config {
        max_concurrent_scans: NonZeroUsize::new(4),
        ..config()
    };
    let scheduler = scheduler(RULES, &engine, &tools, config);

    let report = run(&scheduler, target("10.0.0.0/24")).await;

    assert_eq!(engine.peak_in_flight(), 4);
    assert_eq!(report.records_of(ScanType::PORT_SCAN).count(), 20);
    assert_eq!(report.failed().count(), 0);
}

#[tokio::test]
async fn phases_never_overlap() {
    let hosts: Vec<HostReport> = (1..=5)
        .map(|i| web_server(&format!("10.0.0.{i}")))
        .collect();
    let mut engine = FakeEngine::new()
        .discover("10.0.0.0/29", hosts)
        .delay(ScanType::PORT_SCAN, Duration::from_millis(5));
    for i in 1..=5 {
        let address = format!("10.0.0.{i}");
        engine = engine.on(
            &address,
            ScanType::PORT_SCAN,
            Outcome::Report(web_server(&address)),
        );
    }
    let engine = Arc::new(engine);
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(RULES, &engine, &tools, config());

    run(&scheduler, target("10.0.0.0/29")).await;

    let order = [
        ScanType::DISCOVERY,
        ScanType::PORT_SCAN,
        ScanType::SERVICE_SCAN,
        ScanType::OS_DETECTION,
        ScanType::SCRIPT_SCAN,
    ];
    let ranks: Vec<usize> = engine
        .calls()
        .iter()
        .map(|c| order.iter().position(|t| *t == c.scan_type.as_str()).unwrap())
        .collect();
    assert_eq!(ranks.len(), 1 + 5 * 4);
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn service_scan_is_narrowed_to_open_ports() {
    let report = HostReport::up(addr("10.0.0.2"))
        .with_port(PortReport::open(22, Some("ssh")))
        .with_port(PortReport::open(80, Some("http")));
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on("10.0.0.2", ScanType::PORT_SCAN, Outcome::Report(report)),
    );
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(RULES, &engine, &tools, config());

    run(&scheduler, target("10.0.0.2")).await;

    let calls = engine.calls_of(ScanType::SERVICE_SCAN);
    assert_eq!(calls[0].args, vec!["-sV", "-p", "22,80"]);
}

#[tokio::test]
async fn existing_port_selection_is_left_alone() {
    let rules = r#"
scan_types:
  discovery: { args: "-sn" }
  port_scan: { args: "-sS" }
  service_scan: { args: "-p- -sV" }
  os_detection: { args: "-O" }
  script_scan: { args: "-sV --top-ports 100" }
services:
  http:
    - { type: scripted-probe, script: http-title }
"#;
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on("10.0.0.2", ScanType::PORT_SCAN, Outcome::Report(web_server("10.0.0.2"))),
    );
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(rules, &engine, &tools, config());

    let report = run(&scheduler, target("10.0.0.2")).await;

    let service = engine.calls_of(ScanType::SERVICE_SCAN);
    assert_eq!(service[0].args, vec!["-p-", "-sV"]);

    let scripted = engine.calls_of(ScanType::SCRIPT_SCAN);
    assert_eq!(scripted[0].args, vec!["-sV", "-p", "80", "--script", "http-title"]);
    assert_eq!(report.failed().count(), 0);
}

#[tokio::test]
async fn actions_running_the_same_tool_keep_separate_results() {
    let rules = r#"
scan_types:
  discovery: { args: "-sn" }
  port_scan: { args: "-sS" }
  service_scan: { args: "-sV" }
  os_detection: { args: "-O" }
services:
  http:
    - { type: external-tool, command: "curl -s http://{address}:{port}/robots.txt" }
    - { type: external-tool, command: "curl -s http://{address}:{port}/sitemap.xml" }
"#;
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on("10.0.0.2", ScanType::SERVICE_SCAN, Outcome::Report(web_server("10.0.0.2"))),
    );
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(rules, &engine, &tools, config());

    let report = run(&scheduler, target("10.0.0.2")).await;

    let succeeded = report
        .records_of(ScanType::EXTERNAL_TOOL)
        .filter(|r| r.status == ScanStatus::Succeeded)
        .count();
    assert_eq!(succeeded, 2);

    let host = report.host(addr("10.0.0.2")).unwrap();
    let tool_results: Vec<_> = host
        .results()
        .keys()
        .filter(|k| k.starts_with(ScanType::EXTERNAL_TOOL))
        .cloned()
        .collect();
    assert_eq!(
        tool_results,
        vec!["external_tool:curl#0:80", "external_tool:curl#1:80"]
    );
    assert_eq!(
        host.result("external_tool:curl#1:80"),
        Some(&Value::String(
            "ran curl -s http://10.0.0.2:80/sitemap.xml\n".into()
        ))
    );
}

#[tokio::test]
async fn repeated_scripts_write_separate_artifacts() {
    let rules = r#"
scan_types:
  discovery: { args: "-sn" }
  port_scan: { args: "-sS" }
  service_scan: { args: "-sV" }
  os_detection: { args: "-O" }
  script_scan: { args: "-sV" }
services:
  http:
    - { type: scripted-probe, script: http-enum }
    - { type: scripted-probe, script: http-enum, args: "--script-args 'http-enum.basepath=/app/'" }
"#;
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on("10.0.0.2", ScanType::PORT_SCAN, Outcome::Report(web_server("10.0.0.2"))),
    );
    let tools = Arc::new(FakeTools::new());
    let config = Config {
        write_artifacts: true,
        ..Config::default()
    };
    let scheduler = scheduler(rules, &engine, &tools, config);

    let report = run(&scheduler, target("10.0.0.2")).await;

    let calls = engine.calls_of(ScanType::SCRIPT_SCAN);
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].artifact, calls[1].artifact);
    assert!(calls.iter().all(|c| c.artifact.is_some()));
    assert!(
        calls
            .iter()
            .any(|c| c.args.ends_with(&["--script-args".to_string(), "http-enum.basepath=/app/".to_string()]))
    );

    let host = report.host(addr("10.0.0.2")).unwrap();
    assert!(host.result("script_scan:http-enum#0:80").is_some());
    assert!(host.result("script_scan:http-enum#1:80").is_some());
}

#[tokio::test]
async fn external_tools_run_with_rendered_commands() {
    let report = HostReport::up(addr("10.0.0.2"))
        .with_port(PortReport::open(22, Some("ssh")))
        .with_port(PortReport::open(8080, Some("HTTP")));
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on("10.0.0.2", ScanType::SERVICE_SCAN, Outcome::Report(report)),
    );
    let tools = Arc::new(FakeTools::new().fail("ssh-audit", "exit status 2"));
    let scheduler = scheduler(RULES_WITH_TOOL, &engine, &tools, config());

    let report = run(&scheduler, target("10.0.0.2")).await;

    let mut calls = tools.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            ("ssh-audit 10.0.0.2 -p 22".to_string(), config().tool_timeout),
            ("whatweb 10.0.0.2:8080".to_string(), Some(Duration::from_secs(30))),
        ]
    );

    let host = report.host(addr("10.0.0.2")).unwrap();
    assert_eq!(
        host.result("external_tool:whatweb#0:8080"),
        Some(&Value::String("ran whatweb 10.0.0.2:8080\n".into()))
    );
    assert!(host.result("external_tool:ssh-audit#0:22").is_none());

    let tool_records: Vec<_> = report.records_of(ScanType::EXTERNAL_TOOL).collect();
    assert_eq!(tool_records.len(), 2);
    assert_eq!(report.failed().count(), 1);
    assert_eq!(report.failed().next().unwrap().target, "10.0.0.2:22");
}

#[tokio::test]
async fn reports_for_other_addresses_are_ignored() {
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on(
                "10.0.0.2",
                ScanType::PORT_SCAN,
                Outcome::Report(web_server("10.0.0.9")),
            ),
    );
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(RULES, &engine, &tools, config());

    let report = run(&scheduler, target("10.0.0.2")).await;

    assert!(report.host(addr("10.0.0.9")).is_none());
    let port: Vec<_> = report.records_of(ScanType::PORT_SCAN).collect();
    assert_eq!(port[0].status, ScanStatus::Failed);
    assert!(report.records_of(ScanType::SCRIPT_SCAN).next().is_none());
}

#[tokio::test]
async fn configuration_errors_stop_the_run_before_any_probe() {
    let engine = Arc::new(FakeEngine::new());
    let tools = Arc::new(FakeTools::new());

    let rules = RuleTable::load("scan_types: { discovery: { args: '-sn' }, port_scan: { args: '' } }").unwrap();
    let err = Scheduler::new(rules, engine.clone(), tools.clone(), config()).err().unwrap();
    assert!(err.is_fatal());

    let scheduler = scheduler(RULES, &engine, &tools, config());
    let err = scheduler
        .run(vec![Target::Lan], CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn cancellation_fails_in_flight_scans_and_skips_later_phases() {
    let engine = Arc::new(
        FakeEngine::new()
            .discover(
                "10.0.0.0/30",
                vec![HostReport::up(addr("10.0.0.1")), HostReport::up(addr("10.0.0.2"))],
            )
            .delay(ScanType::PORT_SCAN, Duration::from_secs(30)),
    );
    let tools = Arc::new(FakeTools::new());
    let scheduler = scheduler(RULES, &engine, &tools, config());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = scheduler.run(target("10.0.0.0/30"), cancel).await.unwrap();

    assert!(report.cancelled);
    let port: Vec<_> = report.records_of(ScanType::PORT_SCAN).collect();
    assert_eq!(port.len(), 2);
    for record in &port {
        assert_eq!(record.status, ScanStatus::Failed);
        assert!(record.errors[0].message.contains("cancelled"));
    }
    assert!(report.records_of(ScanType::SERVICE_SCAN).next().is_none());
    assert_eq!(engine.in_flight(), 0);

    for host in &report.hosts {
        assert_eq!(host.state(), HostState::Discovered);
        assert!(!host.has_scan(ScanType::PORT_SCAN));
    }
}

#[tokio::test]
async fn failing_listeners_do_not_disturb_the_run() {
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on("10.0.0.2", ScanType::PORT_SCAN, Outcome::Report(web_server("10.0.0.2"))),
    );
    let tools = Arc::new(FakeTools::new());
    let mut scheduler = scheduler(RULES, &engine, &tools, config());

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    scheduler.subscribe(Arc::new(|_: &ScanId, _: &Value| -> Result<(), ListenerError> {
        Err("listener is broken".into())
    }));
    scheduler.subscribe(Arc::new(|_: &ScanId, _: &Value| -> Result<(), ListenerError> {
        panic!("listener panicked")
    }));
    scheduler.subscribe(Arc::new(
        move |_: &ScanId, payload: &Value| -> Result<(), ListenerError> {
            assert!(payload.get("phase").is_some());
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    ));

    let report = run(&scheduler, target("10.0.0.2")).await;

    assert_eq!(report.failed().count(), 0);
    assert_eq!(seen.load(Ordering::SeqCst), report.records.len());
    assert!(
        report
            .records
            .iter()
            .all(|r| r.progress.as_ref().is_some_and(|p| p["total"] != json!(0)))
    );
}

#[tokio::test]
async fn timed_out_probes_are_retried_when_asked() {
    let engine = Arc::new(
        FakeEngine::new()
            .discover("10.0.0.2", vec![HostReport::up(addr("10.0.0.2"))])
            .on("10.0.0.2", ScanType::OS_DETECTION, Outcome::Timeout),
    );
    let scheduler = Scheduler::new(
        RuleTable::load(RULES).unwrap(),
        Arc::new(Retrying::new(Shared(engine.clone()), 2)),
        Arc::new(FakeTools::new()),
        config(),
    )
    .unwrap();

    let report = run(&scheduler, target("10.0.0.2")).await;

    assert_eq!(engine.calls_of(ScanType::OS_DETECTION).len(), 3);
    assert_eq!(engine.calls_of(ScanType::PORT_SCAN).len(), 1);
    let os: Vec<_> = report.records_of(ScanType::OS_DETECTION).collect();
    assert_eq!(os[0].status, ScanStatus::Failed);
    assert_eq!(os[0].errors.len(), 1);
}
