pub mod rules;
pub mod run;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use reconr_common::config::{DEFAULT_RESULTS_DIR, DEFAULT_RULES_FILE};
use reconr_common::network::target::Target;

#[derive(Parser)]
#[command(name = "reconr")]
#[command(about = "Multi-phase network reconnaissance driven by a rule table.")]
#[command(version)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Reduce output (-q hides banner and headers, -qq hides the spinner too)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Print debug logs
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Do not print the banner
    #[arg(long, global = true)]
    pub no_banner: bool,

    /// Also write plain-text logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run discovery, per-host scans and rule-driven follow-ups
    #[command(alias = "r")]
    Run(RunArgs),
    /// Validate a rule document and print it back
    #[command(alias = "ru")]
    Rules {
        /// Rule document to check
        #[arg(long, value_name = "FILE", default_value = DEFAULT_RULES_FILE)]
        rules: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Targets: IP, a.b.c.d-e range, CIDR, comma lists or `lan`
    #[arg(short, long = "target", value_name = "TARGET", num_args = 1..)]
    pub targets: Vec<Target>,

    /// Rule document
    #[arg(long, value_name = "FILE", default_value = DEFAULT_RULES_FILE)]
    pub rules: PathBuf,

    /// Directory for raw engine output
    #[arg(long, value_name = "DIR", default_value = DEFAULT_RESULTS_DIR)]
    pub results: PathBuf,

    /// Path or name of the probing engine
    #[arg(long, value_name = "PATH")]
    pub engine: Option<PathBuf>,

    /// Upper bound of probes in flight per phase
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<std::num::NonZeroUsize>,

    /// Deadline of a single probe, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Default deadline of an external tool, in seconds
    #[arg(long, value_name = "SECS")]
    pub tool_timeout: Option<u64>,

    /// Extra attempts for probes that timed out
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub retries: u32,

    /// Keep results in memory only
    #[arg(long)]
    pub no_artifacts: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Never prompt for a target, and do not listen for 'q'
    #[arg(long)]
    pub no_input: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
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
