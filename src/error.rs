//! Error types for the DBaaS operator
//!
//! Errors carry enough context (provider name, resource kind, platform) to be
//! useful in status messages and logs. The reconcile engine relies on the
//! classification helpers to tell optimistic-concurrency conflicts and missing
//! objects apart from every other failure.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for DBaaS operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The referenced DBaaSProvider is not configured in this cluster
    #[error("DBaaS provider {provider} not found")]
    ProviderNotFound {
        /// Name of the DBaaSProvider that was requested
        provider: String,
    },

    /// A provider resource could not be parsed into its typed shape
    #[error("failed to parse provider resource {kind}: {message}")]
    ProviderParsing {
        /// Kind of the provider resource
        kind: String,
        /// Description of the shape mismatch
        message: String,
    },

    /// Owner-reference construction or verification failed
    #[error("ownership error: {message}")]
    Ownership {
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Invalid or missing operator configuration
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what is missing or invalid
        message: String,
    },

    /// A provider-operator installation step failed
    #[error("installation error [{platform}]: {message}")]
    Installation {
        /// Platform being installed (e.g. crunchy-bridge)
        platform: String,
        /// Description of what failed
        message: String,
    },

    /// A prerequisite resource exists but is not ready yet
    #[error("not ready: {message}")]
    NotReady {
        /// Which prerequisite is not ready
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Where the error occurred (e.g. "engine", "controller")
        context: String,
    },
}

impl Error {
    /// Create a provider-not-found error
    pub fn provider_not_found(provider: impl Into<String>) -> Self {
        Self::ProviderNotFound {
            provider: provider.into(),
        }
    }

    /// Create a provider parsing error for the given kind
    pub fn provider_parsing(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ProviderParsing {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create an ownership error
    pub fn ownership(msg: impl Into<String>) -> Self {
        Self::Ownership {
            message: msg.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an installation error for a platform
    pub fn installation(platform: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Installation {
            platform: platform.into(),
            message: msg.into(),
        }
    }

    /// Create a not-ready error
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady {
            message: msg.into(),
        }
    }

    /// Create an internal error without specific context
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// HTTP status code of the underlying API error, if any
    pub fn api_code(&self) -> Option<u16> {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => Some(ae.code),
            _ => None,
        }
    }

    /// True if the API server rejected a write because of a stale resourceVersion
    pub fn is_conflict(&self) -> bool {
        self.api_code() == Some(409)
    }

    /// True if the API server reported the target as absent
    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    /// Check if this error is retryable
    ///
    /// Configuration, parsing and ownership errors need a user fix and
    /// are not retried. Kubernetes errors are retried, including throttling,
    /// missing kinds and RBAC denials, except for requests the API server
    /// rejected as malformed or invalid (400, 422).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => match source {
                kube::Error::Api(ae) => !matches!(ae.code, 400 | 422),
                _ => true,
            },
            Error::ProviderNotFound { .. } => false,
            Error::ProviderParsing { .. } => false,
            Error::Ownership { .. } => false,
            Error::Serialization { .. } => false,
            Error::Configuration { .. } => false,
            Error::Installation { .. } => true,
            Error::NotReady { .. } => true,
            Error::Internal { .. } => true,
        }
    }
}

/// Build a kube API error with the given HTTP code (test helper)
#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::from(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} ({code})"),
        reason: reason.to_string(),
        code,
    }))
}
