use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENGINE: &str = "nmap";
pub const DEFAULT_RESULTS_DIR: &str = "results";
pub const DEFAULT_RULES_FILE: &str = "config/scan_rules.yaml";

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct Config {
    /// Path or name of the probing engine binary.
    pub engine_path: PathBuf,
    /// Root directory for per-probe result artifacts.
    pub results_dir: PathBuf,
    /// Write raw engine output next to the in-memory results.
    ///
    /// Artifacts are advisory, a failed write never fails the probe.
    pub write_artifacts: bool,
    /// Upper bound of probes in flight within one phase. `None` launches the
    /// whole phase at once.
    pub max_concurrent_scans: Option<NonZeroUsize>,
    pub probe_timeout: Option<Duration>,
    pub tool_timeout: Option<Duration>,
    /// Extra attempts after a probe timed out. Zero disables retrying.
    pub probe_retries: u32,
    pub quiet: u8,
    pub no_banner: bool,
    /// Never prompt, fail instead when no target was given.
    pub disable_input: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_path: PathBuf::from(DEFAULT_ENGINE),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            write_artifacts: true,
            max_concurrent_scans: None,
            probe_timeout: Some(DEFAULT_PROBE_TIMEOUT),
            tool_timeout: Some(DEFAULT_TOOL_TIMEOUT),
            probe_retries: 0,
            quiet: 0,
            no_banner: false,
            disable_input: false,
        }
    }
}

impl Config {
    /// Deterministic artifact location for one probe, or `None` when
    /// artifacts are disabled.
    ///
    /// `10.0.0.2` + `service_scan` becomes `<results>/10_0_0_2_service_scan.xml`.
    pub fn artifact_path(&self, target: &str, scan_type: &str, label: Option<&str>) -> Option<PathBuf> {
        if !self.write_artifacts {
            return None;
        }
        Some(artifact_path(&self.results_dir, target, scan_type, label))
    }
}

pub fn artifact_path(root: &Path, target: &str, scan_type: &str, label: Option<&str>) -> PathBuf {
    let mut name = format!("{}_{}", sanitize(target), sanitize(scan_type));
    if let Some(label) = label {
        name.push('_');
        name.push_str(&sanitize(label));
    }
    name.push_str(".xml");
    root.join(name)
}

fn sanitize(part: &str) -> String {
    part.trim()
        .chars()
        .map(|c| match c {
            '.' | ':' | '/' | '\\' | ' ' => '_',
            c => c,
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
