//! typecfg store - file-backed inputs of the configuration engine
//!
//! Provides:
//! - Rule-set documents in YAML or JSON, parsed and validated
//! - The global configuration table
//! - A module loader reading JSON modules from a directory tree

pub mod errors;
pub mod fs_loader;
pub mod global;
pub mod rule_set;

// Re-export key types
pub use errors::Result;
pub use fs_loader::FsModuleLoader;
pub use global::{load_global_config, parse_global_config_str};
pub use rule_set::{load_rule_sets, parse_rule_set_file, parse_rule_set_str, DocumentFormat};
