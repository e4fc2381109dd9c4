//! Error handling for typecfg-store
//!
//! Wraps typecfg-core ExError with store-specific helpers

use typecfg_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a rule-set validation error
pub fn rule_set_invalid(reason: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("rule_set_parse")
        .with_message(reason.to_string())
}

/// Create a global configuration validation error
pub fn global_config_invalid(reason: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("global_config_parse")
        .with_message(reason.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
