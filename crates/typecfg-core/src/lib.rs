//! typecfg core
//!
//! Two engines behind one error and logging facility:
//! - `config`: specificity-ordered configuration rules, selected against an
//!   environment and merged asynchronously with their dependencies
//! - `txn`: transactional changes over typed complex and list instances
//!   (`model`), with nested scopes and reference tracking

pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod txn;

// Used by the logging macros through `$crate`
pub use typecfg_core_types;

// Re-export commonly used types
pub use config::{ConfigurationService, Environment, RuleSet, RuleSpec, SelectOptions};
pub use errors::{ExError, ExErrorKind, Result, TypeCfgError};
pub use model::{InstanceId, Value, ValueType};
pub use txn::{Context, ScopeId, TransactionResult};
