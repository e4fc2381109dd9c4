use typecfg_core_types::RequestId;
use thiserror::Error;

/// Result type alias using TypeCfgError
pub type Result<T> = std::result::Result<T, TypeCfgError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable for programmatic handling,
/// tests and the CLI's exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Configuration
    ArgumentRequired,
    ArgumentInvalid,
    DependencyLoad,
    FactoryFailed,

    // Typed values
    TypeMismatch,
    ReadOnly,
    NotFound,

    // Transactions
    OperationInvalid,
    Rejected,
    Conflict,

    // Documents / IO
    InvalidInput,
    Io,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::ArgumentRequired => "ERR_ARGUMENT_REQUIRED",
            ExErrorKind::ArgumentInvalid => "ERR_ARGUMENT_INVALID",
            ExErrorKind::DependencyLoad => "ERR_DEPENDENCY_LOAD",
            ExErrorKind::FactoryFailed => "ERR_FACTORY_FAILED",
            ExErrorKind::TypeMismatch => "ERR_TYPE_MISMATCH",
            ExErrorKind::ReadOnly => "ERR_READ_ONLY",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::OperationInvalid => "ERR_OPERATION_INVALID",
            ExErrorKind::Rejected => "ERR_REJECTED",
            ExErrorKind::Conflict => "ERR_CONFLICT",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification fields for programmatic handling plus context for
/// debugging (operation, entity, correlating request).
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity context (module id, instance id, property name, ...)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, " (request_id: {})", request_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for configuration selection and transactional mutation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeCfgError {
    // ===== Configuration =====
    /// A required argument (selector target, dependency id, ...) is missing or empty
    #[error("Argument required: {name}")]
    ArgumentRequired { name: String },

    /// An argument has an unusable value (unknown property name, bad index, ...)
    #[error("Argument invalid: {name}: {reason}")]
    ArgumentInvalid { name: String, reason: String },

    /// A rule dependency failed to load
    #[error("Failed to load dependency {module_id}: {message}")]
    DependencyLoad { module_id: String, message: String },

    /// A rule's configuration factory failed
    #[error("Configuration factory failed: {message}")]
    FactoryFailed { message: String },

    // ===== Typed values =====
    /// A value cannot be cast to the expected type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Attempt to change a read-only property
    #[error("Property {property} of type {type_id} is read-only")]
    ReadOnlyProperty { type_id: String, property: String },

    /// Unknown instance id
    #[error("Instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },

    /// Unknown complex type id
    #[error("Type not found: {type_id}")]
    TypeNotFound { type_id: String },

    // ===== Transactions =====
    /// Operation not valid in the current scope/transaction state
    #[error("Operation invalid: {reason}")]
    OperationInvalid { reason: String },

    /// A transaction was rejected
    #[error("Transaction rejected: {reason}")]
    Rejected { reason: String },

    /// Committed state changed underneath the transaction so that its
    /// changes no longer apply
    #[error("Commit conflict: {message}")]
    Conflict { message: String },

    // ===== Generic =====
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TypeCfgError {
    pub fn argument_required(name: impl Into<String>) -> Self {
        Self::ArgumentRequired { name: name.into() }
    }

    pub fn argument_invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ArgumentInvalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn operation_invalid(reason: impl Into<String>) -> Self {
        Self::OperationInvalid {
            reason: reason.into(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Conversion from TypeCfgError to the canonical ExError
impl From<TypeCfgError> for ExError {
    fn from(err: TypeCfgError) -> Self {
        let message = err.to_string();
        match err {
            TypeCfgError::ArgumentRequired { name } => {
                ExError::new(ExErrorKind::ArgumentRequired).with_entity_id(name)
            }
            TypeCfgError::ArgumentInvalid { name, .. } => {
                ExError::new(ExErrorKind::ArgumentInvalid).with_entity_id(name)
            }
            TypeCfgError::DependencyLoad { module_id, .. } => {
                ExError::new(ExErrorKind::DependencyLoad)
                    .with_entity_id(module_id)
                    .with_op("load_dependency")
            }
            TypeCfgError::FactoryFailed { .. } => ExError::new(ExErrorKind::FactoryFailed),
            TypeCfgError::TypeMismatch { .. } => ExError::new(ExErrorKind::TypeMismatch),
            TypeCfgError::ReadOnlyProperty { property, .. } => {
                ExError::new(ExErrorKind::ReadOnly).with_entity_id(property)
            }
            TypeCfgError::InstanceNotFound { instance_id } => {
                ExError::new(ExErrorKind::NotFound).with_entity_id(instance_id)
            }
            TypeCfgError::TypeNotFound { type_id } => {
                ExError::new(ExErrorKind::NotFound).with_entity_id(type_id)
            }
            TypeCfgError::OperationInvalid { .. } => ExError::new(ExErrorKind::OperationInvalid),
            TypeCfgError::Rejected { .. } => ExError::new(ExErrorKind::Rejected),
            TypeCfgError::Conflict { .. } => ExError::new(ExErrorKind::Conflict),
            TypeCfgError::Serialization { .. } => ExError::new(ExErrorKind::Serialization),
            TypeCfgError::Internal { .. } => ExError::new(ExErrorKind::Internal),
        }
        .with_message(message)
    }
}

impl From<serde_json::Error> for TypeCfgError {
    fn from(err: serde_json::Error) -> Self {
        TypeCfgError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_are_stable() {
        let cases = [
            (ExErrorKind::ArgumentRequired, "ERR_ARGUMENT_REQUIRED"),
            (ExErrorKind::ArgumentInvalid, "ERR_ARGUMENT_INVALID"),
            (ExErrorKind::OperationInvalid, "ERR_OPERATION_INVALID"),
            (ExErrorKind::TypeMismatch, "ERR_TYPE_MISMATCH"),
            (ExErrorKind::ReadOnly, "ERR_READ_ONLY"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_argument_required_maps_to_kind() {
        let ex: ExError = TypeCfgError::argument_required("rule.select.module").into();
        assert_eq!(ex.kind(), ExErrorKind::ArgumentRequired);
        assert_eq!(ex.entity_id(), Some("rule.select.module"));
        assert!(ex.message().contains("rule.select.module"));
    }

    #[test]
    fn test_display_includes_code_and_request() {
        let ex = ExError::new(ExErrorKind::DependencyLoad)
            .with_op("select_async")
            .with_request_id(RequestId::from_string("req-7".to_string()))
            .with_message("boom");
        let rendered = ex.to_string();
        assert!(rendered.starts_with("[ERR_DEPENDENCY_LOAD]"));
        assert!(rendered.contains("select_async"));
        assert!(rendered.contains("req-7"));
    }

    #[test]
    fn test_source_chain() {
        let inner = ExError::new(ExErrorKind::Io).with_message("disk");
        let outer = ExError::new(ExErrorKind::DependencyLoad).with_source(inner);
        assert_eq!(
            outer.source_error().map(|e| e.kind()),
            Some(ExErrorKind::Io)
        );
    }
}
