//! Rule-set document parser with validation
//!
//! Documents are YAML or JSON (by file extension; YAML when unknown) and
//! deserialize into `RuleSet`. Validation rejects rules with no selected
//! module and empty module or dependency ids.
//!
//! A rule with `deps` is a template: its `apply` value must reference the
//! dependencies through `{"$dep": <id or position>}` objects, each replaced
//! by the loaded value at selection time.

use crate::errors::{io_error, rule_set_invalid, Result};
use std::fs;
use std::path::Path;
use typecfg_core::config::{Apply, RuleSet, RuleSpec};

/// Document syntax of a rule-set file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Parse a rule-set file from a path
pub fn parse_rule_set_file(path: &Path) -> Result<RuleSet> {
    let content = fs::read_to_string(path).map_err(|e| io_error("read_rule_set", e))?;

    parse_rule_set_str(&content, DocumentFormat::from_path(path)).map_err(|e| {
        let message = format!("{}: {}", path.display(), e.message());
        rule_set_invalid(&message)
    })
}

/// Parse every file, in order
pub fn load_rule_sets<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<RuleSet>> {
    let rule_sets = paths
        .iter()
        .map(|p| parse_rule_set_file(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        file_count = paths.len(),
        rule_count = rule_sets.iter().map(|s| s.rules.len()).sum::<usize>(),
        "rule sets loaded"
    );
    Ok(rule_sets)
}

/// Parse a rule set from a string
pub fn parse_rule_set_str(content: &str, format: DocumentFormat) -> Result<RuleSet> {
    let mut rule_set: RuleSet = match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| rule_set_invalid(&format!("YAML parse error: {}", e)))?,
        DocumentFormat::Json => serde_json::from_str(content)
            .map_err(|e| rule_set_invalid(&format!("JSON parse error: {}", e)))?,
    };

    validate_rule_set(&mut rule_set)?;

    Ok(rule_set)
}

fn validate_rule_set(rule_set: &mut RuleSet) -> Result<()> {
    if let Some(context_id) = &rule_set.context_id {
        if context_id.trim().is_empty() {
            return Err(rule_set_invalid("contextId must not be empty"));
        }
    }

    for (index, rule) in rule_set.rules.iter_mut().enumerate() {
        validate_rule(index, rule)?;
    }

    Ok(())
}

fn validate_rule(index: usize, rule: &mut RuleSpec) -> Result<()> {
    let Some(target) = rule.select.target() else {
        return Err(rule_set_invalid(&format!(
            "rules[{}]: select must name a module",
            index
        )));
    };

    let ids = target.values();
    if ids.is_empty() || ids.iter().any(|id| id.trim().is_empty()) {
        return Err(rule_set_invalid(&format!(
            "rules[{}]: selected module ids must not be empty",
            index
        )));
    }

    if let Some(pos) = rule.deps.iter().position(|d| d.trim().is_empty()) {
        return Err(rule_set_invalid(&format!(
            "rules[{}]: deps[{}] must not be empty",
            index, pos
        )));
    }

    if !rule.deps.is_empty() {
        if let Apply::Value(template) = &rule.apply {
            rule.apply = Apply::from_template(template.clone(), &rule.deps)
                .map_err(|e| rule_set_invalid(&format!("rules[{}]: {}", index, e)))?;
        }
    }

    Ok(())
}
