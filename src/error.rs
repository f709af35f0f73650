//! Error types for the reconcile SDK.
//!
//! Two layers of errors exist:
//!
//! - [`ClientError`] is what the API layer (an [`ApiClient`](crate::client::ApiClient))
//!   reports: a provider error code plus message, exactly as the cloud returned it.
//! - [`ReconcileError`] is what fetchers, mutators and waiters report to the
//!   orchestrator. Every variant maps onto one [`ErrorKind`].
//!
//! [`ClientError::kind`] is the only place where provider error codes are
//! interpreted. Resource bindings must not match on error strings themselves.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The resource does not exist.
    NotFound,
    /// A cloud API call returned a failure.
    RemoteCallFailed,
    /// A waiter ran out of attempts before reaching a terminal status.
    WaiterTimeout,
    /// A waiter observed a status declared as a failure.
    WaiterFailed,
    /// The caller's parameters contradict each other or the resource schema.
    ValidationConflict,
    /// No binding is registered for the requested resource type.
    UnknownResource,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::RemoteCallFailed => "remote call failed",
            ErrorKind::WaiterTimeout => "waiter timeout",
            ErrorKind::WaiterFailed => "waiter failed",
            ErrorKind::ValidationConflict => "validation conflict",
            ErrorKind::UnknownResource => "unknown resource",
        })
    }
}

/// Provider error codes that mean "the resource does not exist".
const NOT_FOUND_CODES: &[&str] = &[
    "NotFound",
    "NotFoundException",
    "ResourceNotFoundException",
    "ResourceNotFound",
    "NoSuchEntity",
    "NoSuchBucket",
    "NoSuchKey",
    "AWS.SimpleQueueService.NonExistentQueue",
    "QueueDoesNotExist",
    "DBInstanceNotFound",
    "DBClusterNotFoundFault",
    "ClusterNotFoundException",
];

/// Provider error code suffixes that mean "the resource does not exist".
const NOT_FOUND_SUFFIXES: &[&str] = &[".NotFound", "NotFoundException", "NotFoundFault"];

/// Error code used by [`ServiceRegistry`](crate::client::ServiceRegistry) for
/// unregistered operations.
pub const UNKNOWN_OPERATION: &str = "UnknownOperation";

/// An error reported by the cloud API layer.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ClientError {
    /// The provider error code (e.g. `InvalidSubnetID.NotFound`).
    pub code: String,
    /// The provider error message.
    pub message: String,
}

impl ClientError {
    /// Create a new client error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a generic not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFound", message)
    }

    /// Classify this error.
    ///
    /// Not-found codes become [`ErrorKind::NotFound`]; everything else is a
    /// [`ErrorKind::RemoteCallFailed`].
    pub fn kind(&self) -> ErrorKind {
        let code = self.code.as_str();
        if NOT_FOUND_CODES.contains(&code)
            || NOT_FOUND_SUFFIXES.iter().any(|suffix| code.ends_with(suffix))
        {
            ErrorKind::NotFound
        } else {
            ErrorKind::RemoteCallFailed
        }
    }

    /// Whether this error means the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Errors raised while reconciling a resource.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A cloud API call failed.
    #[error("{service}.{operation} failed: {source}")]
    RemoteCallFailed {
        /// The service that was called.
        service: String,
        /// The operation that was called.
        operation: String,
        /// The provider error.
        #[source]
        source: ClientError,
    },

    /// A waiter exhausted its attempts.
    #[error("Waiter {waiter} timed out after {attempts} attempt(s)")]
    WaiterTimeout {
        /// The waiter name.
        waiter: String,
        /// How many polls were made.
        attempts: u32,
    },

    /// A waiter reached a failure status.
    #[error("Waiter {waiter} failed: {reason}")]
    WaiterFailed {
        /// The waiter name.
        waiter: String,
        /// The status or error that matched a failure acceptor.
        reason: String,
    },

    /// Parameters are contradictory or violate the resource schema.
    #[error("Validation conflict: {0}")]
    ValidationConflict(String),

    /// The requested resource type has no registered binding.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconcileError {
    /// Wrap a client error raised by `service.operation`.
    ///
    /// The provider's code is kept as the source. A not-found code raised by a
    /// mutation may name a dependency rather than the resource itself, so only
    /// fetchers fold it into absence (see [`found_or_none`](crate::fetcher::found_or_none)).
    pub fn remote(
        service: impl Into<String>,
        operation: impl Into<String>,
        source: ClientError,
    ) -> Self {
        Self::RemoteCallFailed {
            service: service.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error reports a missing resource, either directly or
    /// through a not-found provider code.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::RemoteCallFailed { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The canonical kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RemoteCallFailed { .. } => ErrorKind::RemoteCallFailed,
            Self::WaiterTimeout { .. } => ErrorKind::WaiterTimeout,
            Self::WaiterFailed { .. } => ErrorKind::WaiterFailed,
            Self::ValidationConflict(_) => ErrorKind::ValidationConflict,
            Self::UnknownResource(_) => ErrorKind::UnknownResource,
            Self::Serialization(_) => ErrorKind::ValidationConflict,
        }
    }

    /// Get the error message as a string.
    ///
    /// For remote call failures this is the provider's original message.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg) => msg.clone(),
            Self::RemoteCallFailed { source, .. } => source.message.clone(),
            Self::WaiterTimeout { .. } | Self::WaiterFailed { .. } => self.to_string(),
            Self::ValidationConflict(msg) => msg.clone(),
            Self::UnknownResource(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
        }
    }
}
