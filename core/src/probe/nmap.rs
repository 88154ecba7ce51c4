use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reconr_common::config::Config;
use reconr_common::{ReconError, Result};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ProbeOutput, ProbeRequest, ProbeRunner, parse_report, process};

/// Runs the probing engine as `<engine> <args...> -oX - <targets...>`.
#[derive(Debug, Clone)]
pub struct NmapRunner {
    engine: PathBuf,
}

impl NmapRunner {
    pub fn new(engine: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.engine_path)
    }

    pub fn command_line(&self, request: &ProbeRequest) -> Vec<String> {
        let mut argv = request.args.clone();
        argv.push("-oX".into());
        argv.push("-".into());
        argv.extend(target_arguments(&request.target));
        argv
    }
}

/// `address:port` targets carry the port in the arguments, the engine only
/// gets the address.
fn target_arguments(target: &str) -> Vec<String> {
    if let Some(rest) = target.strip_prefix('[') {
        if let Some((addr, _)) = rest.split_once(']') {
            return vec![addr.to_string()];
        }
    }
    if let Some((addr, port)) = target.rsplit_once(':') {
        if !addr.contains(':') && port.parse::<u16>().is_ok() {
            return vec![addr.to_string()];
        }
    }
    target.split_whitespace().map(str::to_string).collect()
}

async fn write_artifact(path: &Path, raw: &[u8]) {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %path.display(), "cannot create artifact directory: {e}");
            return;
        }
    }
    match tokio::fs::write(path, raw).await {
        Ok(()) => debug!(path = %path.display(), "artifact written"),
        Err(e) => warn!(path = %path.display(), "cannot write artifact: {e}"),
    }
}

#[async_trait]
impl ProbeRunner for NmapRunner {
    async fn run(&self, request: &ProbeRequest) -> Result<ProbeOutput> {
        let argv = self.command_line(request);
        debug!(
            target = %request.target,
            scan_type = %request.scan_type,
            "{} {}",
            self.engine.display(),
            argv.join(" ")
        );

        let mut cmd = Command::new(&self.engine);
        cmd.args(&argv);
        let output = process::run(cmd, &request.target, request.timeout).await?;

        if let Some(path) = &request.artifact {
            write_artifact(path, &output.stdout).await;
        }

        parse_report(&output.stdout).map_err(|e| ReconError::probe(&request.target, e))
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
