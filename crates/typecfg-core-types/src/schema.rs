//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names identical across the configuration
//! engine, the transaction engine and the CLI.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";

// Configuration engine
pub const FIELD_MODULE_ID: &str = "module_id";
pub const FIELD_RULE_COUNT: &str = "rule_count";
pub const FIELD_DEP_COUNT: &str = "dep_count";

// Transaction engine
pub const FIELD_TXN_ID: &str = "txn_id";
pub const FIELD_SCOPE_ID: &str = "scope_id";
pub const FIELD_CHANGESET_COUNT: &str = "changeset_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
