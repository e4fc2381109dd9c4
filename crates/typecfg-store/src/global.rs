//! Global configuration table
//!
//! A document mapping module ids to configuration objects, consulted by
//! selection before any rule applies.

use crate::errors::{global_config_invalid, io_error, Result};
use crate::rule_set::DocumentFormat;
use std::fs;
use std::path::Path;
use typecfg_core::config::GlobalConfig;

/// Load the global configuration from a YAML or JSON file
pub fn load_global_config(path: &Path) -> Result<GlobalConfig> {
    let content = fs::read_to_string(path).map_err(|e| io_error("read_global_config", e))?;

    let global = parse_global_config_str(&content, DocumentFormat::from_path(path))?;
    tracing::debug!(entry_count = global.len(), "global configuration loaded");
    Ok(global)
}

/// Parse a global configuration document
///
/// Every entry must be a JSON object; an empty document is an empty table.
pub fn parse_global_config_str(content: &str, format: DocumentFormat) -> Result<GlobalConfig> {
    if content.trim().is_empty() {
        return Ok(GlobalConfig::new());
    }

    let table: serde_json::Map<String, serde_json::Value> = match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| global_config_invalid(&format!("YAML parse error: {}", e)))?,
        DocumentFormat::Json => serde_json::from_str(content)
            .map_err(|e| global_config_invalid(&format!("JSON parse error: {}", e)))?,
    };

    let mut global = GlobalConfig::new();
    for (module_id, config) in table {
        if module_id.trim().is_empty() {
            return Err(global_config_invalid("module id must not be empty"));
        }
        if !config.is_object() {
            return Err(global_config_invalid(&format!(
                "configuration of {} must be an object",
                module_id
            )));
        }
        global.insert(module_id, config);
    }
    Ok(global)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_yaml_table() {
        let global = parse_global_config_str(
            "pentaho/visual/Bar:\n  color: red\n",
            DocumentFormat::Yaml,
        )
        .unwrap();
        assert_eq!(global.get("pentaho/visual/Bar"), Some(&json!({"color": "red"})));
    }

    #[test]
    fn test_empty_document_is_empty_table() {
        assert!(parse_global_config_str("  \n", DocumentFormat::Yaml)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_non_object_entry_is_rejected() {
        let err = parse_global_config_str(r#"{"A": [1, 2]}"#, DocumentFormat::Json).unwrap_err();
        assert!(err.message().contains("must be an object"));
    }
}
