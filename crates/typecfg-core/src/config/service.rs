//! Configuration service
//!
//! Stores configuration rules and resolves, for a module id and the
//! service's environment, the single merged configuration that applies.
//!
//! ## Logging
//!
//! `add_rule` and `select_async` follow the operation boundary pattern:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success with duration
//! - `log_op_error!` on failure with the error kind

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use typecfg_core_types::{RequestId, Sensitive};

use super::loader::Collaborators;
use super::matcher::{Environment, RuleFilter};
use super::merge::merge_all;
use super::rule::{Apply, FactoryFn, RuleSet, RuleSpec, StoredRule};
use super::rule_store::RuleStore;
use crate::errors::{Result, TypeCfgError};
use crate::{log_op_end, log_op_error, log_op_start};

/// Options of a single selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Never consult the global configuration table
    pub exclude_global: bool,
}

/// One step of the merge fold
enum ConfigFactory {
    Constant(Value),
    Deferred {
        apply: Arc<FactoryFn>,
        dep_indexes: Vec<usize>,
    },
}

/// Factories in merge order plus the distinct dependencies they need
#[derive(Default)]
struct SelectionPlan {
    factories: Vec<ConfigFactory>,
    dep_ids: Vec<String>,
    dep_indexes_by_id: HashMap<String, usize>,
}

impl SelectionPlan {
    /// Index of a dependency in `dep_ids`, registering it on first sight.
    /// Aliases and canonical ids share an index.
    fn dep_index(&mut self, alias_or_id: &str, collaborators: &Collaborators) -> usize {
        if let Some(&index) = self.dep_indexes_by_id.get(alias_or_id) {
            return index;
        }

        let id = collaborators
            .meta
            .get_id(alias_or_id)
            .unwrap_or_else(|| alias_or_id.to_string());

        let index = match self.dep_indexes_by_id.get(&id) {
            Some(&index) => index,
            None => {
                self.dep_ids.push(id.clone());
                let index = self.dep_ids.len() - 1;
                self.dep_indexes_by_id.insert(id, index);
                index
            }
        };
        self.dep_indexes_by_id
            .insert(alias_or_id.to_string(), index);
        index
    }
}

/// Rule store plus selection over one environment
pub struct ConfigurationService {
    environment: Environment,
    collaborators: Collaborators,
    rules: RuleStore,
    next_ordinal: u64,
}

impl ConfigurationService {
    /// A service with the in-memory default collaborators
    pub fn new(environment: Environment) -> Self {
        Self::with_collaborators(environment, Collaborators::default())
    }

    pub fn with_collaborators(environment: Environment, collaborators: Collaborators) -> Self {
        Self {
            environment,
            collaborators,
            rules: RuleStore::new(),
            next_ordinal: 0,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Add every rule of a rule set, relative ids resolved against its
    /// `context_id`. Stops at the first rule that fails.
    pub fn add(&mut self, rule_set: RuleSet) -> Result<()> {
        let context_id = rule_set.context_id;
        for rule in rule_set.rules {
            self.add_rule(rule, context_id.as_deref())?;
        }
        Ok(())
    }

    /// Store one rule under each module id it selects
    ///
    /// # Errors
    ///
    /// `ArgumentRequired` when the rule selects no module, or when a
    /// selected module id or dependency id is empty.
    pub fn add_rule(
        &mut self,
        rule: RuleSpec,
        context_id: Option<&str>,
    ) -> Result<Arc<StoredRule>> {
        log_op_start!("add_rule");
        let start = Instant::now();

        let stored = self.add_rule_impl(rule, context_id).map_err(|e| {
            log_op_error!(
                "add_rule",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "add_rule",
            duration_ms = start.elapsed().as_millis() as u64,
            ordinal = stored.ordinal,
            module_count = stored.module_ids.len()
        );

        Ok(stored)
    }

    fn add_rule_impl(
        &mut self,
        rule: RuleSpec,
        context_id: Option<&str>,
    ) -> Result<Arc<StoredRule>> {
        // The ordinal is consumed even when the rule is refused.
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        let targets = rule
            .select
            .target()
            .ok_or_else(|| TypeCfgError::argument_required("rule.select.module"))?;

        let mut module_ids: Vec<String> = Vec::new();
        for id in targets.values() {
            let resolved = self.resolve_id(id, context_id, "rule.select.module")?;
            if !module_ids.contains(&resolved) {
                module_ids.push(resolved);
            }
        }
        if module_ids.is_empty() {
            return Err(TypeCfgError::argument_required("rule.select.module"));
        }

        let deps = rule
            .deps
            .iter()
            .enumerate()
            .map(|(i, dep)| self.resolve_id(dep, context_id, &format!("rule.deps[{}]", i)))
            .collect::<Result<Vec<_>>>()?;

        let stored = Arc::new(StoredRule {
            ordinal,
            module_ids,
            deps,
            spec: rule,
        });
        self.rules.insert(Arc::clone(&stored));
        Ok(stored)
    }

    fn resolve_id(&self, id: &str, context_id: Option<&str>, arg: &str) -> Result<String> {
        if id.is_empty() {
            return Err(TypeCfgError::argument_required(arg));
        }
        let resolved = self
            .collaborators
            .resolver
            .resolve_module_id(id, context_id)?;
        if resolved.is_empty() {
            return Err(TypeCfgError::argument_required(arg));
        }
        Ok(resolved)
    }

    /// All rules stored for a module id, least specific first
    pub fn rules_for(&self, module_id: &str) -> &[Arc<StoredRule>] {
        self.rules.rules_for(module_id)
    }

    /// The rules that pass the environment filter, least specific first
    pub fn select_rules(&self, module_id: &str) -> Vec<Arc<StoredRule>> {
        let filter = RuleFilter::new(&self.environment);
        self.rules
            .rules_for(module_id)
            .iter()
            .filter(|rule| filter.matches(rule))
            .cloned()
            .collect()
    }

    /// Resolve the merged configuration of a module id
    ///
    /// Returns `None` only when no rule applies and there is no global
    /// configuration for the id.
    ///
    /// # Errors
    ///
    /// `DependencyLoad` when any dependency fails to load, or the error of a
    /// failing configuration factory. No partial merge is returned.
    pub async fn select_async(
        &self,
        module_id: &str,
        options: SelectOptions,
    ) -> Result<Option<Value>> {
        let request_id = RequestId::new();
        log_op_start!(
            "select_async",
            request_id = %request_id,
            module_id = module_id,
            user = ?self.environment.user.as_deref().map(Sensitive::new)
        );
        let start = Instant::now();

        let result = self
            .select_async_impl(module_id, options)
            .await
            .map_err(|e| {
                log_op_error!(
                    "select_async",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = %request_id
                );
                e
            })?;

        log_op_end!(
            "select_async",
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = %request_id,
            found = result.is_some()
        );

        Ok(result)
    }

    async fn select_async_impl(
        &self,
        module_id: &str,
        options: SelectOptions,
    ) -> Result<Option<Value>> {
        let global = if options.exclude_global {
            None
        } else {
            self.collaborators.global.get(module_id).cloned()
        };

        // Snapshot before awaiting; later adds do not affect this call.
        let rules = self.select_rules(module_id);
        if rules.is_empty() {
            return Ok(global);
        }

        let mut plan = SelectionPlan::default();
        if let Some(global) = global {
            plan.factories.push(ConfigFactory::Constant(global));
        }
        for rule in &rules {
            let factory = match &rule.spec.apply {
                Apply::Value(value) => ConfigFactory::Constant(value.clone()),
                Apply::Factory(apply) => ConfigFactory::Deferred {
                    apply: Arc::clone(apply),
                    dep_indexes: rule
                        .deps
                        .iter()
                        .map(|dep| plan.dep_index(dep, &self.collaborators))
                        .collect(),
                },
            };
            plan.factories.push(factory);
        }

        tracing::debug!(
            module_id = module_id,
            rule_count = rules.len(),
            dep_count = plan.dep_ids.len(),
            "selection planned"
        );

        let loaded = futures::future::try_join_all(
            plan.dep_ids.iter().map(|id| self.load_dependency(id)),
        )
        .await?;

        let mut fragments = Vec::with_capacity(plan.factories.len());
        for factory in plan.factories {
            let fragment = match factory {
                ConfigFactory::Constant(value) => value,
                ConfigFactory::Deferred { apply, dep_indexes } => {
                    let args: Vec<Value> =
                        dep_indexes.iter().map(|&i| loaded[i].clone()).collect();
                    apply(&args).map_err(|e| match e {
                        TypeCfgError::FactoryFailed { .. } => e,
                        other => TypeCfgError::FactoryFailed {
                            message: other.to_string(),
                        },
                    })?
                }
            };
            fragments.push(fragment);
        }

        Ok(Some(merge_all(fragments)))
    }

    async fn load_dependency(&self, id: &str) -> Result<Value> {
        let loaded = match self.collaborators.meta.get(id) {
            Some(meta) => meta.load().await,
            None => self.collaborators.loader.require(id).await,
        };
        loaded.map_err(|e| match e {
            TypeCfgError::DependencyLoad { .. } => e,
            other => TypeCfgError::DependencyLoad {
                module_id: id.to_string(),
                message: other.to_string(),
            },
        })
    }
}
