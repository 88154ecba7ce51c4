//! Error types for reconr

use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`ReconError`]
pub type Result<T> = std::result::Result<T, ReconError>;

#[derive(Error, Debug)]
pub enum ReconError {
    /// Malformed or missing rule/scan-type configuration. Aborts the run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unknown scan or host identifier.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The probing engine or an external tool reported failure.
    #[error("probe failed for {target}: {message}")]
    ProbeExecution { target: String, message: String },

    #[error("probe for {target} timed out after {:.1}s", .timeout.as_secs_f64())]
    ProbeTimeout { target: String, timeout: Duration },

    /// The run was cancelled before the task could finish.
    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn probe(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProbeExecution {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn timeout(target: impl Into<String>, timeout: Duration) -> Self {
        Self::ProbeTimeout {
            target: target.into(),
            timeout,
        }
    }

    /// Only configuration problems may abort a whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Stable code used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIG_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ProbeExecution { .. } => "PROBE_FAILED",
            Self::ProbeTimeout { .. } => "PROBE_TIMEOUT",
            Self::Cancelled(_) => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
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
