//! Rules command
//!
//! Usage: typecfg rules <MODULE_ID> --rules <PATH>... [--matching [--user <U>] ...]

use clap::Args;
use std::sync::Arc;
use typecfg_core::config::{Criterion, StoredRule};

use super::{build_service, EnvArgs, SourceArgs};

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Module id whose rules to list
    pub module_id: String,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub env: EnvArgs,

    /// Only list rules that pass the environment filter
    #[arg(long)]
    pub matching: bool,
}

/// Execute rules command
pub fn execute(args: RulesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(&args.sources, args.env.environment())?;

    let rules: Vec<Arc<StoredRule>> = if args.matching {
        service.select_rules(&args.module_id)
    } else {
        service.rules_for(&args.module_id).to_vec()
    };

    if rules.is_empty() {
        println!("No rules for {}", args.module_id);
        return Ok(());
    }

    for rule in &rules {
        println!("{}", describe(rule));
    }

    Ok(())
}

/// One line per rule: ordinal, priority, criteria, apply kind
fn describe(rule: &StoredRule) -> String {
    let criteria: Vec<String> = Criterion::SPECIFICITY_ORDER
        .iter()
        .filter_map(|c| {
            rule.criterion(*c)
                .map(|values| format!("{}={}", c.name(), values.values().join(",")))
        })
        .collect();

    let apply = if rule.spec.apply.is_factory() {
        format!("factory({})", rule.deps.join(","))
    } else {
        "value".to_string()
    };

    format!(
        "#{}\tpriority={}\t{}\t{}",
        rule.ordinal,
        rule.priority(),
        if criteria.is_empty() {
            "-".to_string()
        } else {
            criteria.join(" ")
        },
        apply
    )
}
