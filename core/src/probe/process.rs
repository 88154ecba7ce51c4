use std::process::{Output, Stdio};
use std::time::Duration;

use reconr_common::{ReconError, Result};
use tokio::process::Command;

const STDERR_EXCERPT: usize = 240;

/// Spawns `cmd`, waits for it within `timeout` and fails on a non-zero exit.
/// The child is killed when the deadline drops the wait.
pub(crate) async fn run(mut cmd: Command, target: &str, timeout: Option<Duration>) -> Result<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let child = cmd
        .spawn()
        .map_err(|e| ReconError::probe(target, format!("cannot start {program}: {e}")))?;

    let waited = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| ReconError::timeout(target, limit))?,
        None => child.wait_with_output().await,
    };
    let output = waited.map_err(|e| ReconError::probe(target, format!("{program}: {e}")))?;

    if !output.status.success() {
        return Err(ReconError::probe(
            target,
            format!("{program} exited with {}: {}", output.status, excerpt(&output.stderr)),
        ));
    }
    Ok(output)
}

fn excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return "no error output".into();
    }
    match text.char_indices().nth(STDERR_EXCERPT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
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
