use async_trait::async_trait;
use reconr_common::{ReconError, Result};
use tracing::warn;

use super::{ProbeOutput, ProbeRequest, ProbeRunner};

/// Retries probes that timed out, at most `retries` extra times. Every other
/// failure is returned as is.
#[derive(Debug, Clone)]
pub struct Retrying<R> {
    inner: R,
    retries: u32,
}

impl<R> Retrying<R> {
    pub fn new(inner: R, retries: u32) -> Self {
        Self { inner, retries }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

#[async_trait]
impl<R: ProbeRunner> ProbeRunner for Retrying<R> {
    async fn run(&self, request: &ProbeRequest) -> Result<ProbeOutput> {
        let mut attempt = 0;
        loop {
            match self.inner.run(request).await {
                Err(ReconError::ProbeTimeout { .. }) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        target = %request.target,
                        scan_type = %request.scan_type,
                        attempt,
                        retries = self.retries,
                        "probe timed out, retrying"
                    );
                }
                outcome => return outcome,
            }
        }
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
