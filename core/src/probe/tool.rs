use std::time::Duration;

use async_trait::async_trait;
use reconr_common::{ReconError, Result};
use tokio::process::Command;
use tracing::debug;

use super::{ToolRunner, process};
use crate::rules::split_args;

/// Runs external tools as plain processes. The command line is split with
/// shell quoting rules, but no shell is involved: nothing is expanded.
#[derive(Debug, Clone, Default)]
pub struct ProcessToolRunner;

impl ProcessToolRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn execute(&self, command: &str, timeout: Option<Duration>) -> Result<String> {
        let Some(argv) = split_args(command) else {
            return Err(ReconError::probe(command, "unbalanced quotes in command line"));
        };
        let mut argv = argv.into_iter();
        let Some(program) = argv.next() else {
            return Err(ReconError::probe(command, "empty command line"));
        };
        debug!(command, "running external tool");

        let mut cmd = Command::new(program);
        cmd.args(argv);
        let output = process::run(cmd, command, timeout).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
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
