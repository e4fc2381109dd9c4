//! Configuration rule selection and merging
//!
//! Rules are indexed per target module id and kept sorted by specificity.
//! Selection filters a module's rules against the environment, loads the
//! dependencies of factory rules concurrently and left-folds every
//! contribution, global configuration first, with a deep merge.

pub mod loader;
pub mod matcher;
pub mod merge;
pub mod rule;
pub mod rule_store;
pub mod service;

pub use loader::{
    Collaborators, GlobalConfig, ModuleLoader, ModuleMeta, ModuleMetaService, ModuleRegistry,
    ModuleResolver, RelativeModuleResolver, StaticModuleLoader, ValueModule,
};
pub use matcher::{compare_rules, Environment, RuleFilter};
pub use merge::{merge_all, merge_into};
pub use rule::{
    Apply, Criterion, FactoryFn, OneOrMany, RuleSet, RuleSpec, Selector, StoredRule, DEP_PLACEHOLDER,
};
pub use rule_store::RuleStore;
pub use service::{ConfigurationService, SelectOptions};
