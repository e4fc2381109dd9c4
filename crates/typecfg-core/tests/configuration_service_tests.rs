//! Configuration Service Tests
//!
//! ## Scenarios Covered
//!
//! 1. A more specific rule wins the merge
//! 2. Global configuration is the floor, and can be excluded
//! 3. Equal rules merge in insertion order
//! 4. Factory dependencies load once per selection, by id or alias
//! 5. A failing dependency rejects the whole selection
//! 6. Rule sets resolve relative ids against their context id

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use common::{user_rule, value_rule};
use serde_json::json;
use typecfg_core::config::{
    Apply, Collaborators, ConfigurationService, Criterion, Environment, GlobalConfig,
    ModuleRegistry, RuleSet, RuleSpec, SelectOptions, StaticModuleLoader, ValueModule,
};
use typecfg_core::TypeCfgError;

#[tokio::test]
async fn test_more_specific_rule_wins() {
    // GIVEN a generic rule and a user-specific rule for "A"
    let mut service = ConfigurationService::new(Environment::new().with_user("bob"));
    service.add_rule(value_rule("A", json!({"x": 1})), None).unwrap();
    service
        .add_rule(user_rule("A", "bob", json!({"x": 2})), None)
        .unwrap();

    // WHEN selecting as bob
    let config = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();

    // THEN the user rule is merged last
    assert_eq!(config, Some(json!({"x": 2})));
}

#[tokio::test]
async fn test_specific_rule_wins_regardless_of_insertion_order() {
    // GIVEN the specific rule inserted first
    let mut service = ConfigurationService::new(Environment::new().with_user("bob"));
    service
        .add_rule(user_rule("A", "bob", json!({"x": 2, "y": 2})), None)
        .unwrap();
    service
        .add_rule(value_rule("A", json!({"x": 1, "z": 1})), None)
        .unwrap();

    // WHEN selecting
    let config = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();

    // THEN it still overrides the generic rule, and keys merge
    assert_eq!(config, Some(json!({"x": 2, "y": 2, "z": 1})));
}

#[tokio::test]
async fn test_rule_for_other_user_is_filtered_out() {
    let mut service = ConfigurationService::new(Environment::new().with_user("ann"));
    service.add_rule(value_rule("A", json!({"x": 1})), None).unwrap();
    service
        .add_rule(user_rule("A", "bob", json!({"x": 2})), None)
        .unwrap();

    let config = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();

    assert_eq!(config, Some(json!({"x": 1})));
}

#[tokio::test]
async fn test_global_config_when_no_rules() {
    // GIVEN no rules for "Z" and a global config for it
    let collaborators =
        Collaborators::default().with_global(GlobalConfig::new().with_entry("Z", json!({"g": 1})));
    let service = ConfigurationService::with_collaborators(Environment::new(), collaborators);

    // WHEN selecting "Z"
    let config = service
        .select_async("Z", SelectOptions::default())
        .await
        .unwrap();

    // THEN the raw global config is returned
    assert_eq!(config, Some(json!({"g": 1})));
}

#[tokio::test]
async fn test_nothing_applies_resolves_none() {
    let service = ConfigurationService::new(Environment::new());
    let config = service
        .select_async("Z", SelectOptions::default())
        .await
        .unwrap();
    assert_eq!(config, None);
}

#[tokio::test]
async fn test_global_config_is_lowest_priority_and_excludable() {
    // GIVEN a global config and a rule overriding one key
    let collaborators = Collaborators::default()
        .with_global(GlobalConfig::new().with_entry("A", json!({"g": 1, "x": 0})));
    let mut service = ConfigurationService::with_collaborators(Environment::new(), collaborators);
    service.add_rule(value_rule("A", json!({"x": 1})), None).unwrap();

    // WHEN selecting with and without the global config
    let with_global = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();
    let without_global = service
        .select_async(
            "A",
            SelectOptions {
                exclude_global: true,
            },
        )
        .await
        .unwrap();

    // THEN the rule merges over the global config only when it is included
    assert_eq!(with_global, Some(json!({"g": 1, "x": 1})));
    assert_eq!(without_global, Some(json!({"x": 1})));
}

#[tokio::test]
async fn test_excluded_global_with_no_rules_is_none() {
    let collaborators =
        Collaborators::default().with_global(GlobalConfig::new().with_entry("Z", json!({"g": 1})));
    let service = ConfigurationService::with_collaborators(Environment::new(), collaborators);

    let config = service
        .select_async(
            "Z",
            SelectOptions {
                exclude_global: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(config, None);
}

#[tokio::test]
async fn test_equal_rules_merge_in_insertion_order() {
    // GIVEN two rules with identical selectors
    let mut service = ConfigurationService::new(Environment::new());
    service
        .add_rule(value_rule("A", json!({"x": "first"})), None)
        .unwrap();
    service
        .add_rule(value_rule("A", json!({"x": "second"})), None)
        .unwrap();

    // WHEN selecting
    let config = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();

    // THEN the later rule wins
    assert_eq!(config, Some(json!({"x": "second"})));
}

#[tokio::test]
async fn test_priority_beats_specificity() {
    let mut service = ConfigurationService::new(Environment::new().with_user("bob"));
    service
        .add_rule(value_rule("A", json!({"x": "prio"})).with_priority(5), None)
        .unwrap();
    service
        .add_rule(user_rule("A", "bob", json!({"x": "user"})), None)
        .unwrap();

    let config = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();

    assert_eq!(config, Some(json!({"x": "prio"})));
}

#[tokio::test]
async fn test_selection_is_repeatable() {
    let mut service = ConfigurationService::new(
        Environment::new().with_user("bob").with_locale("pt"),
    );
    service.add_rule(value_rule("A", json!({"a": 1})), None).unwrap();
    service
        .add_rule(
            value_rule("A", json!({"a": 2, "b": {"c": 1}})).with_criterion(Criterion::Locale, "pt"),
            None,
        )
        .unwrap();
    service
        .add_rule(user_rule("A", "bob", json!({"b": {"d": 2}})), None)
        .unwrap();

    let first = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();
    let second = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();

    assert_eq!(first, Some(json!({"a": 2, "b": {"c": 1, "d": 2}})));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_shared_dependency_loads_once() {
    // GIVEN two factory rules depending on the same module, one via alias
    let dep = Arc::new(ValueModule::new("pkg/Dep", json!({"v": 7})));
    let mut registry = ModuleRegistry::new();
    registry.register(dep.clone());
    registry.alias("dep", "pkg/Dep");

    let collaborators = Collaborators::default().with_meta(Arc::new(registry));
    let mut service = ConfigurationService::with_collaborators(Environment::new(), collaborators);
    service
        .add_rule(
            RuleSpec::new(
                "A",
                Apply::factory(|deps| Ok(json!({"first": deps[0]["v"].clone()}))),
            )
            .with_deps(["pkg/Dep"]),
            None,
        )
        .unwrap();
    service
        .add_rule(
            RuleSpec::new(
                "A",
                Apply::factory(|deps| Ok(json!({"second": deps[0]["v"].clone()}))),
            )
            .with_deps(["dep"]),
            None,
        )
        .unwrap();

    // WHEN selecting once
    let config = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();

    // THEN both factories saw the value and the module loaded exactly once
    assert_eq!(config, Some(json!({"first": 7, "second": 7})));
    assert_eq!(dep.load_count(), 1);
}

#[tokio::test]
async fn test_unregistered_dependency_uses_loader() {
    let loader = Arc::new(StaticModuleLoader::new().with_module("util/Colors", json!(["red"])));
    let collaborators = Collaborators::default().with_loader(loader.clone());
    let mut service = ConfigurationService::with_collaborators(Environment::new(), collaborators);
    for _ in 0..2 {
        service
            .add_rule(
                RuleSpec::new("A", Apply::factory(|deps| Ok(json!({"colors": deps[0].clone()}))))
                    .with_deps(["util/Colors"]),
                None,
            )
            .unwrap();
    }

    let config = service
        .select_async("A", SelectOptions::default())
        .await
        .unwrap();

    assert_eq!(config, Some(json!({"colors": ["red"]})));
    assert_eq!(loader.request_count("util/Colors"), 1);
}

#[tokio::test]
async fn test_missing_dependency_rejects_selection() {
    // GIVEN a factory rule whose dependency does not exist
    let mut service = ConfigurationService::new(Environment::new());
    service.add_rule(value_rule("A", json!({"x": 1})), None).unwrap();
    service
        .add_rule(
            RuleSpec::new("A", Apply::factory(|_| Ok(json!({"y": 1})))).with_deps(["nope/Missing"]),
            None,
        )
        .unwrap();

    // WHEN selecting
    let result = service.select_async("A", SelectOptions::default()).await;

    // THEN the selection fails with no partial merge
    assert!(matches!(
        result,
        Err(TypeCfgError::DependencyLoad { ref module_id, .. }) if module_id == "nope/Missing"
    ));
}

#[tokio::test]
async fn test_rule_set_resolves_relative_ids() {
    // GIVEN a rule set with a context id and relative targets and deps
    let rule_set: RuleSet = serde_json::from_value(json!({
        "contextId": "my/pkg/config",
        "rules": [
            {"select": {"module": "./Model"}, "apply": {"a": 1}},
            {"select": {"type": ["../other/View", "./Model"]}, "apply": {"b": 2}}
        ]
    }))
    .unwrap();
    let mut service = ConfigurationService::new(Environment::new());

    // WHEN adding it
    service.add(rule_set).unwrap();

    // THEN rules are stored under absolute ids
    assert_eq!(service.rules_for("my/pkg/Model").len(), 2);
    assert_eq!(service.rules_for("my/other/View").len(), 1);
    let config = service
        .select_async("my/pkg/Model", SelectOptions::default())
        .await
        .unwrap();
    assert_eq!(config, Some(json!({"a": 1, "b": 2})));
}

#[test]
fn test_add_stops_at_first_invalid_rule() {
    let rule_set: RuleSet = serde_json::from_value(json!({
        "rules": [
            {"select": {"module": "A"}, "apply": {"a": 1}},
            {"select": {"user": "bob"}, "apply": {"b": 2}},
            {"select": {"module": "B"}, "apply": {"c": 3}}
        ]
    }))
    .unwrap();
    let mut service = ConfigurationService::new(Environment::new());

    let err = service.add(rule_set).unwrap_err();

    assert!(matches!(err, TypeCfgError::ArgumentRequired { .. }));
    assert_eq!(service.rules_for("A").len(), 1);
    assert!(service.rules_for("B").is_empty());
}

#[test]
fn test_caller_rule_is_not_mutated() {
    let mut service = ConfigurationService::new(Environment::new());
    let rule = RuleSpec::new("./X", Apply::Value(json!({}))).with_deps(["./Dep"]);

    let stored = service.add_rule(rule.clone(), Some("pkg/ctx")).unwrap();

    assert_eq!(stored.module_ids, vec!["pkg/X".to_string()]);
    assert_eq!(stored.deps, vec!["pkg/Dep".to_string()]);
    assert_eq!(stored.spec.deps, rule.deps);
}
