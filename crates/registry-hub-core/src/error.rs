//! Error types shared across the registration hub.
//!
//! Every failure a caller can observe is a variant of [`HubError`]. The
//! subsystem crates define their own narrower error enums next to their
//! implementations and convert into this type at the service boundary.
//!
//! Two variants carry RPC-status semantics: [`HubError::InvalidArgument`]
//! and [`HubError::NotFound`] map to the equivalent status codes at the
//! transport; everything else surfaces as an internal failure.

/// Primary error type for registration hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The caller supplied a request the hub refuses to process.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Details about the rejected input
        message: String,
    },

    /// The requested entity does not exist in any consulted authority.
    #[error("Not found: {message}")]
    NotFound {
        /// Details about what was looked up
        message: String,
    },

    /// Relational store failure.
    #[error("Store error: {message}")]
    Store { message: String },

    /// Discovery-agent interaction failure.
    #[error("Discovery agent error: {message}")]
    Discovery { message: String },

    /// Artifact-registry interaction failure.
    #[error("Artifact registry error: {message}")]
    Artifact { message: String },

    /// Event-bus interaction failure. Never propagated to callers by the
    /// orchestrator; exists for the emitter's own result type.
    #[error("Event bus error: {message}")]
    Event { message: String },

    /// A direct call to a registered module failed.
    #[error("Module call error: {message}")]
    ModuleCall { message: String },

    /// Failure serialising or deserialising a payload.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl HubError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    pub fn artifact(message: impl Into<String>) -> Self {
        Self::Artifact {
            message: message.into(),
        }
    }

    pub fn module_call(message: impl Into<String>) -> Self {
        Self::ModuleCall {
            message: message.into(),
        }
    }

    /// True for the variants that represent caller mistakes rather than
    /// backend failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HubError::InvalidArgument { .. } | HubError::NotFound { .. }
        )
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(HubError::invalid_argument("bad port").is_client_error());
        assert!(HubError::not_found("no such module").is_client_error());
        assert!(!HubError::store("connection refused").is_client_error());
        assert!(!HubError::discovery("agent unreachable").is_client_error());
    }

    #[test]
    fn test_display_carries_message() {
        let err = HubError::not_found("Module schema not found: splitter");
        assert_eq!(
            err.to_string(),
            "Not found: Module schema not found: splitter"
        );
    }
}
