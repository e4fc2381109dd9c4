use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{Result, TypeCfgError};

/// A selector value: one string or a list of alternatives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn values(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(v) => vec![v.as_str()],
            OneOrMany::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Scalar: equality. List: membership.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            OneOrMany::One(v) => v == value,
            OneOrMany::Many(vs) => vs.iter().any(|v| v == value),
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Environment criteria a rule may select on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    User,
    Theme,
    Locale,
    Application,
}

impl Criterion {
    /// Precedence used when ranking rules: a rule defining an earlier
    /// criterion outranks one that does not.
    pub const SPECIFICITY_ORDER: [Criterion; 4] = [
        Criterion::User,
        Criterion::Theme,
        Criterion::Locale,
        Criterion::Application,
    ];

    /// Order used when filtering; `application` is the most common
    /// criterion so it is checked first.
    pub const FILTER_ORDER: [Criterion; 4] = [
        Criterion::Application,
        Criterion::Locale,
        Criterion::Theme,
        Criterion::User,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Criterion::User => "user",
            Criterion::Theme => "theme",
            Criterion::Locale => "locale",
            Criterion::Application => "application",
        }
    }
}

/// The `select` block of a rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<OneOrMany>,
    /// Legacy alias of `module`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<OneOrMany>,
    /// Legacy alias of `module`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<OneOrMany>,
}

impl Selector {
    /// The selected module ids: `module`, else `instance`, else `type`
    pub fn target(&self) -> Option<&OneOrMany> {
        self.module
            .as_ref()
            .or(self.instance.as_ref())
            .or(self.type_.as_ref())
    }

    pub fn criterion(&self, criterion: Criterion) -> Option<&OneOrMany> {
        match criterion {
            Criterion::User => self.user.as_ref(),
            Criterion::Theme => self.theme.as_ref(),
            Criterion::Locale => self.locale.as_ref(),
            Criterion::Application => self.application.as_ref(),
        }
    }

    fn criterion_mut(&mut self, criterion: Criterion) -> &mut Option<OneOrMany> {
        match criterion {
            Criterion::User => &mut self.user,
            Criterion::Theme => &mut self.theme,
            Criterion::Locale => &mut self.locale,
            Criterion::Application => &mut self.application,
        }
    }
}

/// Signature of a configuration factory; receives the loaded dependency
/// values in declaration order.
pub type FactoryFn = dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value> + Send + Sync;

/// What a rule contributes: a plain value or a factory over its deps
#[derive(Clone)]
pub enum Apply {
    Value(serde_json::Value),
    Factory(Arc<FactoryFn>),
}

impl Apply {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Result<serde_json::Value> + Send + Sync + 'static,
    {
        Apply::Factory(Arc::new(f))
    }

    pub fn is_factory(&self) -> bool {
        matches!(self, Apply::Factory(_))
    }

    /// A factory that copies `template`, replacing every `{"$dep": ..}`
    /// object with a loaded dependency value
    ///
    /// A placeholder names a dependency either by its id as written in
    /// `deps` or by its position there.
    ///
    /// # Errors
    ///
    /// `ArgumentInvalid` when a placeholder names no declared dependency,
    /// or when no placeholder references the dependencies at all.
    pub fn from_template(template: serde_json::Value, deps: &[String]) -> Result<Self> {
        let mut placeholders = 0;
        check_template(&template, deps, &mut placeholders)?;
        if placeholders == 0 {
            return Err(TypeCfgError::argument_invalid(
                "rule.apply",
                format!("deps are never referenced with {}", DEP_PLACEHOLDER),
            ));
        }

        let deps = deps.to_vec();
        Ok(Apply::factory(move |values| fill_template(&template, &deps, values)))
    }
}

/// Key of a dependency placeholder in a rule template
pub const DEP_PLACEHOLDER: &str = "$dep";

fn placeholder(value: &serde_json::Value) -> Option<&serde_json::Value> {
    match value {
        serde_json::Value::Object(map) if map.len() == 1 => map.get(DEP_PLACEHOLDER),
        _ => None,
    }
}

fn dep_position(reference: &serde_json::Value, deps: &[String]) -> Result<usize> {
    let position = match reference {
        serde_json::Value::String(id) => deps.iter().position(|d| d == id),
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < deps.len()),
        _ => None,
    };
    position.ok_or_else(|| {
        TypeCfgError::argument_invalid(
            "rule.apply",
            format!("{} names no declared dependency", reference),
        )
    })
}

fn check_template(template: &serde_json::Value, deps: &[String], found: &mut usize) -> Result<()> {
    if let Some(reference) = placeholder(template) {
        dep_position(reference, deps)?;
        *found += 1;
        return Ok(());
    }
    match template {
        serde_json::Value::Object(map) => map
            .values()
            .try_for_each(|v| check_template(v, deps, found)),
        serde_json::Value::Array(items) => items
            .iter()
            .try_for_each(|v| check_template(v, deps, found)),
        _ => Ok(()),
    }
}

fn fill_template(
    template: &serde_json::Value,
    deps: &[String],
    values: &[serde_json::Value],
) -> Result<serde_json::Value> {
    if let Some(reference) = placeholder(template) {
        let index = dep_position(reference, deps)?;
        return values.get(index).cloned().ok_or_else(|| {
            TypeCfgError::internal(format!("dependency {} was not loaded", reference))
        });
    }
    Ok(match template {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| fill_template(v, deps, values).map(|v| (k.clone(), v)))
                .collect::<Result<serde_json::Map<_, _>>>()?,
        ),
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|v| fill_template(v, deps, values))
                .collect::<Result<Vec<_>>>()?,
        ),
        other => other.clone(),
    })
}

impl fmt::Debug for Apply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Apply::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Apply::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for Apply {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Apply::Value)
    }
}

/// A configuration rule as written by its author
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub select: Selector,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub deps: Vec<String>,
    pub apply: Apply,
}

impl RuleSpec {
    /// A rule selecting `module` and contributing `apply`
    pub fn new(module: impl Into<OneOrMany>, apply: Apply) -> Self {
        Self {
            select: Selector {
                module: Some(module.into()),
                ..Selector::default()
            },
            priority: 0,
            deps: Vec::new(),
            apply,
        }
    }

    pub fn with_criterion(mut self, criterion: Criterion, value: impl Into<OneOrMany>) -> Self {
        *self.select.criterion_mut(criterion) = Some(value.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// A document of rules sharing a base for relative module ids
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleSet {
    #[serde(default, rename = "contextId", alias = "context_id")]
    pub context_id: Option<String>,
    pub rules: Vec<RuleSpec>,
}

/// Immutable record the rule store keeps for each added rule
///
/// The caller's `RuleSpec` is never modified; the resolved ids and the
/// ordinal live here.
#[derive(Debug)]
pub struct StoredRule {
    pub ordinal: u64,
    pub module_ids: Vec<String>,
    pub deps: Vec<String>,
    pub spec: RuleSpec,
}

impl StoredRule {
    pub fn priority(&self) -> i64 {
        self.spec.priority
    }

    pub fn criterion(&self, criterion: Criterion) -> Option<&OneOrMany> {
        self.spec.select.criterion(criterion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selector_target_falls_back_to_legacy_keys() {
        let sel: Selector = serde_json::from_value(json!({"type": "A"})).unwrap();
        assert_eq!(sel.target(), Some(&OneOrMany::One("A".to_string())));

        let sel: Selector =
            serde_json::from_value(json!({"instance": ["B", "C"], "type": "A"})).unwrap();
        assert_eq!(sel.target().map(|t| t.values()), Some(vec!["B", "C"]));
    }

    #[test]
    fn test_rule_spec_deserializes_value_apply() {
        let rule: RuleSpec = serde_json::from_value(json!({
            "select": {"module": "A", "user": ["bob", "ann"]},
            "priority": 2,
            "apply": {"x": 1}
        }))
        .unwrap();
        assert_eq!(rule.priority, 2);
        assert!(rule.deps.is_empty());
        assert!(!rule.apply.is_factory());
        assert!(rule.select.user.as_ref().unwrap().matches("ann"));
    }

    #[test]
    fn test_template_fills_dependencies_by_id_and_position() {
        let deps = vec!["pkg/Colors".to_string(), "pkg/Sizes".to_string()];
        let apply = Apply::from_template(
            json!({"palette": {"$dep": "pkg/Colors"}, "sizes": [{"$dep": 1}], "k": 1}),
            &deps,
        )
        .unwrap();

        let Apply::Factory(factory) = apply else {
            panic!("template should become a factory");
        };
        let filled = factory(&[json!(["red"]), json!({"s": 10})]).unwrap();
        assert_eq!(
            filled,
            json!({"palette": ["red"], "sizes": [{"s": 10}], "k": 1})
        );
    }

    #[test]
    fn test_template_rejects_unknown_or_unused_dependencies() {
        let deps = vec!["pkg/Colors".to_string()];
        for template in [
            json!({"palette": {"$dep": "pkg/Other"}}),
            json!({"palette": {"$dep": 3}}),
            json!({"palette": "plain"}),
        ] {
            assert!(matches!(
                Apply::from_template(template, &deps),
                Err(TypeCfgError::ArgumentInvalid { .. })
            ));
        }
    }

    #[test]
    fn test_one_or_many_matches() {
        assert!(OneOrMany::from("x").matches("x"));
        assert!(!OneOrMany::from("x").matches("y"));
        assert!(OneOrMany::from(vec!["a", "b"]).matches("b"));
    }

    #[test]
    fn test_rule_set_context_id_aliases() {
        let set: RuleSet =
            serde_json::from_value(json!({"contextId": "pentaho/config", "rules": []})).unwrap();
        assert_eq!(set.context_id.as_deref(), Some("pentaho/config"));
        let set: RuleSet =
            serde_json::from_value(json!({"context_id": "x", "rules": []})).unwrap();
        assert_eq!(set.context_id.as_deref(), Some("x"));
    }
}
