use std::path::Path;

use anyhow::Context;
use colored::*;
use reconr_core::{Action, RuleTable};

use crate::terminal::{colors, print};

pub fn rules(path: &Path, q_level: u8) -> anyhow::Result<()> {
    let table = RuleTable::from_path(path)
        .with_context(|| format!("invalid rule document {}", path.display()))?;
    tracing::info!("{} is valid", path.display());

    if q_level > 0 {
        print::print(&table.to_yaml()?);
        return Ok(());
    }

    print::header("scan types", q_level);
    print::set_key_width(table.scan_types().map(|(id, _)| id.as_str()));
    for (id, config) in table.scan_types() {
        let mut value = config.args.clone();
        if let Some(description) = &config.description {
            value.push_str(&format!("  ({description})"));
        }
        print::aligned_line(id.as_str(), value);
    }

    print::header("services", q_level);
    for (idx, (service, actions)) in table.services().enumerate() {
        print::tree_head(idx, service);
        let pairs: Vec<_> = actions.iter().map(action_to_key_value_pair).collect();
        print::as_tree_one_level(&pairs);
    }

    print::header("document", q_level);
    print::print(&table.to_yaml()?);
    print::end_of_program();
    Ok(())
}

fn action_to_key_value_pair(action: &Action) -> (String, ColoredString) {
    match action {
        Action::ScriptedProbe { script, args } => {
            let value = match args {
                Some(args) => format!("{script} {args}"),
                None => script.clone(),
            };
            ("script".into(), value.color(colors::PRIMARY))
        }
        Action::ExternalTool {
            command,
            timeout_secs,
        } => {
            let value = match timeout_secs {
                Some(secs) => format!("{command} ({secs}s)"),
                None => command.clone(),
            };
            ("tool".into(), value.color(colors::ACCENT))
        }
    }
}
