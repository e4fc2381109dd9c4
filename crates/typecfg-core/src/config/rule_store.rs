use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use super::matcher::compare_rules;
use super::rule::StoredRule;

/// Per-module-id rule lists, each kept sorted by [`compare_rules`]
///
/// A rule selecting several module ids is shared (one `Arc`) across the
/// lists of all of them.
#[derive(Debug, Default)]
pub struct RuleStore {
    by_module: HashMap<String, Vec<Arc<StoredRule>>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert after every rule that does not sort after it
    pub fn insert(&mut self, rule: Arc<StoredRule>) {
        for module_id in &rule.module_ids {
            let list = self.by_module.entry(module_id.clone()).or_default();
            let pos = list.partition_point(|r| compare_rules(r, &rule) != Ordering::Greater);
            list.insert(pos, Arc::clone(&rule));
        }
    }

    /// Rules for a module id, least specific first
    pub fn rules_for(&self, module_id: &str) -> &[Arc<StoredRule>] {
        self.by_module
            .get(module_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &String> {
        self.by_module.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.by_module.is_empty()
    }
}
