//! # Rule Resolver
//!
//! The declarative rule document drives the whole run: `scan_types` maps each
//! scan-type id to the engine arguments it runs with, `services` maps a
//! service identifier to the ordered follow-up actions for every port that
//! exposes it.
//!
//! ```yaml
//! scan_types:
//!   discovery: { args: "-sn" }
//!   port_scan: { args: "-sS --top-ports 1000" }
//! services:
//!   http:
//!     - type: scripted-probe
//!       script: http-title
//!     - type: external-tool
//!       command: "nikto -h {address} -p {port}"
//! ```
//!
//! Argument strings and command templates are split like a POSIX shell
//! would split them, so `"--script-args 'user=a b'"` keeps the quoted value
//! as one argument. Nothing is expanded and no shell is run.
//!
//! Everything is validated when the document is loaded, a table that loads
//! never fails later during dispatch.

use std::collections::BTreeMap;
use std::path::Path;

use reconr_common::{ReconError, Result};
use serde::{Deserialize, Serialize};

use crate::scan_type::ScanType;

const PLACEHOLDERS: [&str; 4] = ["ip", "address", "port", "service"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanTypeConfig {
    /// Engine arguments, split with shell quoting rules.
    pub args: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One follow-up step for a discovered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    /// Engine script run against the port, on top of the `script_scan` arguments.
    ScriptedProbe {
        script: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<String>,
    },
    /// Independent process built from a command template.
    ExternalTool {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
}

impl Action {
    /// Short name used in result keys and artifact names.
    pub fn label(&self) -> &str {
        match self {
            Action::ScriptedProbe { script, .. } => script.as_str(),
            Action::ExternalTool { command, .. } => {
                command.split_whitespace().next().unwrap_or(command.as_str())
            }
        }
    }

    fn validate(&self, service: &str) -> Result<()> {
        match self {
            Action::ScriptedProbe { script, args } => {
                if script.trim().is_empty() {
                    return Err(ReconError::config(format!(
                        "service '{service}': scripted-probe needs a script name"
                    )));
                }
                if let Some(args) = args {
                    let argv = split_args(args).ok_or_else(|| {
                        ReconError::config(format!(
                            "service '{service}': unbalanced quotes in '{args}'"
                        ))
                    })?;
                    if selects_ports(&argv) {
                        return Err(ReconError::config(format!(
                            "service '{service}': scripted-probe args must not select ports"
                        )));
                    }
                }
            }
            Action::ExternalTool { command, timeout_secs } => {
                if command.trim().is_empty() {
                    return Err(ReconError::config(format!(
                        "service '{service}': external-tool needs a command"
                    )));
                }
                if split_args(command).is_none() {
                    return Err(ReconError::config(format!(
                        "service '{service}': unbalanced quotes in '{command}'"
                    )));
                }
                if *timeout_secs == Some(0) {
                    return Err(ReconError::config(format!(
                        "service '{service}': timeout_secs must be positive"
                    )));
                }
                check_placeholders(command)
                    .map_err(|e| ReconError::config(format!("service '{service}': {e}")))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDocument {
    scan_types: BTreeMap<String, ScanTypeConfig>,
    #[serde(default)]
    services: BTreeMap<String, Vec<Action>>,
}

/// Loaded, validated rule set. Read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    scan_types: BTreeMap<ScanType, ScanTypeConfig>,
    services: BTreeMap<String, Vec<Action>>,
}

impl RuleTable {
    /// Parses and validates a YAML (or JSON) rule document.
    pub fn load(source: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(source)
            .map_err(|e| ReconError::config(format!("rule document is not valid YAML: {e}")))?;

        let Some(root) = value.as_mapping() else {
            return Err(ReconError::config("rule document must be a mapping"));
        };
        match root.get("scan_types") {
            Some(serde_yaml::Value::Mapping(_)) => {}
            Some(_) => return Err(ReconError::config("'scan_types' must be a mapping")),
            None => return Err(ReconError::config("missing required key 'scan_types'")),
        }

        let doc: RuleDocument = serde_yaml::from_value(value)
            .map_err(|e| ReconError::config(format!("invalid rule document: {e}")))?;

        Self::from_document(doc)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            ReconError::config(format!("cannot read rule document {}: {e}", path.display()))
        })?;
        Self::load(&source)
    }

    fn from_document(doc: RuleDocument) -> Result<Self> {
        let mut scan_types = BTreeMap::new();
        for (id, cfg) in doc.scan_types {
            let id = id.trim();
            if id.is_empty() {
                return Err(ReconError::config("scan type ids must not be empty"));
            }
            if id == ScanType::EXTERNAL_TOOL {
                return Err(ReconError::config("'external_tool' is reserved"));
            }
            if split_args(&cfg.args).is_none() {
                return Err(ReconError::config(format!(
                    "scan type '{id}': unbalanced quotes in '{}'",
                    cfg.args
                )));
            }
            scan_types.insert(ScanType::new(id), cfg);
        }
        if !scan_types.contains_key(ScanType::DISCOVERY) {
            return Err(ReconError::config("missing required scan type 'discovery'"));
        }

        let mut services = BTreeMap::new();
        for (name, actions) in doc.services {
            let key = name.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(ReconError::config("service identifiers must not be empty"));
            }
            for action in &actions {
                action.validate(&key)?;
            }
            if services.insert(key.clone(), actions).is_some() {
                return Err(ReconError::config(format!(
                    "service '{key}' is defined more than once"
                )));
            }
        }

        Ok(Self {
            scan_types,
            services,
        })
    }

    /// Ordered actions for a service identifier, matched case-insensitively.
    /// An unmatched service yields an empty list.
    pub fn resolve(&self, service: &str) -> &[Action] {
        self.services
            .get(service.trim().to_ascii_lowercase().as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, scan_type: &str) -> bool {
        self.scan_types.contains_key(scan_type)
    }

    pub fn args(&self, scan_type: &str) -> Option<&str> {
        self.scan_types.get(scan_type).map(|cfg| cfg.args.as_str())
    }

    /// Engine arguments of a scan type as separate arguments.
    pub fn arg_list(&self, scan_type: &str) -> Vec<String> {
        self.args(scan_type)
            .and_then(split_args)
            .unwrap_or_default()
    }

    pub fn scan_types(&self) -> impl Iterator<Item = (&ScanType, &ScanTypeConfig)> {
        self.scan_types.iter()
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, &[Action])> {
        self.services.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn has_scripted_probes(&self) -> bool {
        self.services
            .values()
            .flatten()
            .any(|a| matches!(a, Action::ScriptedProbe { .. }))
    }

    /// Fails on the first scan type in `required` the table does not define.
    pub fn require(&self, required: &[&str]) -> Result<()> {
        match required.iter().find(|id| !self.contains(id)) {
            Some(missing) => Err(ReconError::config(format!(
                "missing required scan type '{missing}'"
            ))),
            None => Ok(()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        let doc = RuleDocument {
            scan_types: self
                .scan_types
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            services: self.services.clone(),
        };
        serde_yaml::to_string(&doc)
            .map_err(|e| ReconError::config(format!("cannot serialize rule table: {e}")))
    }
}

/// Values substituted into an external tool command template.
#[derive(Debug, Clone)]
pub struct TemplateVars<'a> {
    pub address: &'a str,
    pub port: u16,
    pub service: &'a str,
}

/// Replaces `{ip}`, `{address}`, `{port}` and `{service}` in `template`.
pub fn render_template(template: &str, vars: &TemplateVars<'_>) -> String {
    template
        .replace("{ip}", vars.address)
        .replace("{address}", vars.address)
        .replace("{port}", &vars.port.to_string())
        .replace("{service}", vars.service)
}

/// Splits an argument string with shell quoting rules. `None` on unbalanced
/// quotes or a trailing escape.
pub fn split_args(args: &str) -> Option<Vec<String>> {
    shlex::split(args)
}

/// Whether `args` already pick the ports to scan: any `-p` form (`-p 22`,
/// `-p-`, `-p22,80`), `--top-ports` or `--port-ratio`.
pub fn selects_ports(args: &[String]) -> bool {
    args.iter().any(|a| is_port_selection(a))
}

/// Drops every port selection from `args`, together with the value of the
/// forms that take a separate one.
pub fn without_port_selection(args: Vec<String>) -> Vec<String> {
    let mut kept = Vec::with_capacity(args.len());
    let mut skip_value = false;
    for arg in args {
        if skip_value {
            skip_value = false;
            continue;
        }
        if is_port_selection(&arg) {
            skip_value = matches!(arg.as_str(), "-p" | "--top-ports" | "--port-ratio");
            continue;
        }
        kept.push(arg);
    }
    kept
}

fn is_port_selection(arg: &str) -> bool {
    (arg.starts_with("-p") && !arg.starts_with("--"))
        || arg == "--top-ports"
        || arg.starts_with("--top-ports=")
        || arg == "--port-ratio"
        || arg.starts_with("--port-ratio=")
}

fn check_placeholders(template: &str) -> std::result::Result<(), String> {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return Err(format!("unterminated placeholder in '{template}'"));
        };
        let name = &after[..close];
        if !PLACEHOLDERS.contains(&name) {
            return Err(format!("unknown placeholder '{{{name}}}' in '{template}'"));
        }
        rest = &after[close + 1..];
    }
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
