//! # Errors
//!
//! Error taxonomy shared by the sealing pipeline and the reconciler.
//!
//! Every variant names the operation that failed and the resource it was
//! acting on so callers can diagnose a failure without retrying blindly.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Lifecycle operation an error was raised from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Seal,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Seal => "seal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Certificate fetch or store I/O failed
    #[error("network error during {operation} of {resource}: {message}")]
    Network {
        operation: Operation,
        resource: String,
        message: String,
        /// Manual command that verifies the proxy path is reachable
        hint: Option<String>,
    },

    /// Malformed PEM, no certificates, or unsupported key algorithm
    #[error("failed to parse sealing certificate of {resource}: {message}")]
    Parse { resource: String, message: String },

    /// Input rejected before any network call
    #[error("invalid secret {resource}: {message}")]
    Validation { resource: String, message: String },

    /// Remote store rejected or failed to apply the sealed manifest
    #[error("{operation} failed to apply {resource} after {attempts} attempt(s): {message}")]
    Apply {
        operation: Operation,
        resource: String,
        attempts: u32,
        message: String,
    },

    /// Transport failure while checking whether the resource still exists
    #[error("failed to read {identity}: {message}")]
    Read { identity: String, message: String },

    /// Remote store failed to delete the sealed manifest
    #[error("failed to delete {resource}: {message}")]
    Delete { resource: String, message: String },

    /// Caller cancelled the operation while a call was in flight
    #[error("{operation} of {resource} was cancelled")]
    Cancelled { operation: Operation, resource: String },

    /// Manifest could not be encoded or decoded
    #[error("failed to serialize manifest: {0}")]
    Serialization(String),

    /// Encryption primitive failed
    #[error("encryption failed: {0}")]
    Crypto(String),

    /// Record was driven through a transition the state machine does not allow
    #[error("invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },
}

impl Error {
    pub(crate) fn validation(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Whether a failed apply attempt is worth repeating
    ///
    /// Deterministic failures (validation, parsing, cancellation) never are.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Apply { .. } | Self::Network { .. })
    }

    /// Remediation hint attached to proxy failures, if any
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Network { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// Operation that raised the error, where the variant implies one
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Network { operation, .. }
            | Self::Cancelled { operation, .. }
            | Self::Apply { operation, .. } => Some(*operation),
            Self::Read { .. } => Some(Operation::Read),
            Self::Delete { .. } => Some(Operation::Delete),
            Self::Parse { .. } | Self::Crypto(_) => Some(Operation::Seal),
            Self::Validation { .. } | Self::Serialization(_) | Self::InvalidTransition { .. } => {
                None
            }
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_apply_and_network_are_retryable() {
        let apply = Error::Apply {
            operation: Operation::Create,
            resource: "app/db".into(),
            attempts: 1,
            message: "conflict".into(),
        };
        let network = Error::Network {
            operation: Operation::Create,
            resource: "app/db".into(),
            message: "connection reset".into(),
            hint: None,
        };
        assert!(apply.is_retryable());
        assert!(network.is_retryable());
        assert!(!Error::parse("kube-system/sealed-secrets-controller", "no certificates").is_retryable());
        assert!(!Error::validation("app/db", "missing name").is_retryable());
        assert!(!Error::Cancelled {
            operation: Operation::Create,
            resource: "app/db".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_display_carries_operation_and_resource() {
        let err = Error::Network {
            operation: Operation::Seal,
            resource: "kube-system/sealed-secrets-controller".into(),
            message: "timed out".into(),
            hint: Some("kubectl proxy".into()),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("seal"));
        assert!(rendered.contains("kube-system/sealed-secrets-controller"));
        assert_eq!(err.hint(), Some("kubectl proxy"));
        assert_eq!(err.operation(), Some(Operation::Seal));
    }

    #[test]
    fn test_operation_of_store_errors() {
        let read = Error::Read {
            identity: "/apis/bitnami.com/v1alpha1/namespaces/app/sealedsecrets/db".into(),
            message: "connection reset".into(),
        };
        let delete = Error::Delete {
            resource: "app/db".into(),
            message: "forbidden".into(),
        };
        assert_eq!(read.operation(), Some(Operation::Read));
        assert_eq!(delete.operation(), Some(Operation::Delete));
        assert_eq!(Error::validation("app/db", "missing name").operation(), None);
    }

    #[test]
    fn test_apply_reports_its_own_operation() {
        let err = Error::Apply {
            operation: Operation::Update,
            resource: "app/db".into(),
            attempts: 3,
            message: "conflict".into(),
        };
        assert_eq!(err.operation(), Some(Operation::Update));
        assert!(err.to_string().starts_with("update failed to apply app/db"));
    }

    #[test]
    fn test_parse_names_the_controller() {
        let err = Error::parse("kube-system/sealed-secrets-controller", "no certificates");
        assert_eq!(err.operation(), Some(Operation::Seal));
        assert!(err.to_string().contains("kube-system/sealed-secrets-controller"));
    }
}
