//! Store Integration Tests
//!
//! ## Scenarios Covered
//!
//! 1. YAML and JSON rule-set documents parse with relative ids intact
//! 2. Invalid documents are rejected with InvalidInput errors
//! 3. Rule sets and the global table drive a selection end to end
//! 4. Factory dependencies load from JSON files under a root directory
//! 5. Document templates pull `$dep` values from those files

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use typecfg_core::config::{
    Apply, Collaborators, ConfigurationService, Environment, ModuleLoader, RuleSpec, SelectOptions,
};
use typecfg_core::errors::{ExErrorKind, TypeCfgError};
use typecfg_store::{
    load_global_config, load_rule_sets, parse_rule_set_file, parse_rule_set_str, DocumentFormat,
    FsModuleLoader,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_parse_yaml_rule_set() {
    // GIVEN a YAML document with three rules
    let path = fixtures_dir().join("bar_rules.yaml");

    // WHEN it is parsed
    let rule_set = parse_rule_set_file(&path).unwrap();

    // THEN the context id and rules are kept as written
    assert_eq!(rule_set.context_id.as_deref(), Some("pentaho/visual/config"));
    assert_eq!(rule_set.rules.len(), 3);
    assert_eq!(rule_set.rules[2].priority, 1);
    assert_eq!(
        rule_set.rules[2].select.target().unwrap().values(),
        vec!["../models/Bar", "../models/Line"]
    );
}

#[test]
fn test_parse_json_rule_set() {
    let rule_set = parse_rule_set_file(&fixtures_dir().join("bar_rules.json")).unwrap();

    assert_eq!(rule_set.rules.len(), 2);
    assert!(rule_set.rules[1].select.locale.is_some());
}

#[test]
fn test_rule_without_module_is_rejected() {
    let err = parse_rule_set_file(&fixtures_dir().join("invalid_no_module.yaml")).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    assert!(err.message().contains("invalid_no_module.yaml"));
    assert!(err.message().contains("select must name a module"));
}

#[test]
fn test_malformed_yaml_is_rejected() {
    let err = parse_rule_set_file(&fixtures_dir().join("invalid_syntax.yaml")).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    assert!(err.message().contains("YAML parse error"));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = parse_rule_set_file(&fixtures_dir().join("does_not_exist.yaml")).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Io);
    assert_eq!(err.op(), Some("read_rule_set"));
}

#[tokio::test]
async fn test_documents_drive_selection() {
    // GIVEN both fixture documents and the global table
    let rule_sets = load_rule_sets(&[
        fixtures_dir().join("bar_rules.yaml"),
        fixtures_dir().join("bar_rules.json"),
    ])
    .unwrap();
    let global = load_global_config(&fixtures_dir().join("global.yaml")).unwrap();

    let environment = Environment::new()
        .with_user("suzy")
        .with_theme("crystal")
        .with_application("pentaho/analyzer");
    let mut service = ConfigurationService::with_collaborators(
        environment,
        Collaborators::default().with_global(global),
    );
    for rule_set in rule_sets {
        service.add(rule_set).unwrap();
    }

    // WHEN selecting the bar model
    let config = service
        .select_async("pentaho/models/Bar", SelectOptions::default())
        .await
        .unwrap();

    // THEN the global table is the floor and the priority rule wins
    assert_eq!(
        config,
        Some(json!({
            "palette": "crystal",
            "width": 100,
            "labels": {"visible": false}
        }))
    );
    assert_eq!(service.rules_for("pentaho/models/Line").len(), 1);
    assert_eq!(service.rules_for("pentaho/models/Pie").len(), 2);
}

#[tokio::test]
async fn test_fs_loader_feeds_factories() {
    // GIVEN a module directory holding pkg/Colors.json
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(dir.path().join("pkg").join("Colors.json"), r#"["red", "blue"]"#).unwrap();

    let loader = Arc::new(FsModuleLoader::new(dir.path()));
    let mut service = ConfigurationService::with_collaborators(
        Environment::new(),
        Collaborators::default().with_loader(loader.clone()),
    );
    service
        .add_rule(
            RuleSpec::new(
                "A",
                Apply::factory(|deps| Ok(json!({"first": deps[0][0].clone()}))),
            )
            .with_deps(["pkg/Colors"]),
            None,
        )
        .unwrap();

    // WHEN selecting
    let config = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();

    // THEN the factory saw the file's value
    assert_eq!(config, Some(json!({"first": "red"})));

    // AND a missing module is a dependency load error
    let err = loader.require("pkg/Missing").await.unwrap_err();
    assert!(matches!(
        err,
        TypeCfgError::DependencyLoad { ref module_id, ref message }
            if module_id == "pkg/Missing" && message == "module not found"
    ));
}

#[tokio::test]
async fn test_document_template_reads_module_files() {
    // GIVEN a module file and a rule set referencing it with $dep
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(dir.path().join("pkg").join("Colors.json"), r#"["red", "blue"]"#).unwrap();
    let rule_set = parse_rule_set_str(
        r#"
contextId: app/config
rules:
  - select: {module: ./Chart}
    apply: {size: small}
  - select: {module: ./Chart}
    deps: [pkg/Colors]
    apply:
      palette: {"$dep": pkg/Colors}
      legend: [{"$dep": 0}]
"#,
        DocumentFormat::Yaml,
    )
    .unwrap();

    let mut service = ConfigurationService::with_collaborators(
        Environment::new(),
        Collaborators::default().with_loader(Arc::new(FsModuleLoader::new(dir.path()))),
    );
    service.add(rule_set).unwrap();

    // WHEN selecting
    let config = service
        .select_async("app/Chart", SelectOptions::default())
        .await
        .unwrap();

    // THEN both placeholders carry the file's value
    assert_eq!(
        config,
        Some(json!({
            "size": "small",
            "palette": ["red", "blue"],
            "legend": [["red", "blue"]]
        }))
    );
}

#[tokio::test]
async fn test_fs_loader_rejects_invalid_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Broken.json"), "{oops").unwrap();

    let err = FsModuleLoader::new(dir.path())
        .require("Broken")
        .await
        .unwrap_err();

    assert!(matches!(err, TypeCfgError::DependencyLoad { ref message, .. } if message.contains("invalid JSON")));
}
