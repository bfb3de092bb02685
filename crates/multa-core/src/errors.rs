//! Unified error system for the fine ledger layer
//!
//! A single error type covers every component. Integrity violations are not
//! errors; they travel inside an [`IntegrityReport`](crate::IntegrityReport).

use crate::config::Environment;
use serde::{Deserialize, Serialize};

/// Unified error type for all Multa operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum MultaError {
    /// Malformed input: bad CID, bad pagination, forbidden transition
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Fine id or content identifier absent
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found
        message: String,
    },

    /// Ledger transaction reverted, was rejected, or produced no fine id
    #[error("Ledger write failed: {message}")]
    LedgerWrite {
        /// Failure description
        message: String,
        /// Revert reason reported by the ledger program, when available
        revert_reason: Option<String>,
    },

    /// Ledger query failed
    #[error("Ledger read failed: {message}")]
    LedgerRead {
        /// Failure description with call context
        message: String,
    },

    /// Evidence retrieval exceeded its time bound
    #[error("Retrieval of {cid} timed out after {timeout_ms}ms")]
    RetrievalTimeout {
        /// Content identifier being retrieved
        cid: String,
        /// Bound that elapsed
        timeout_ms: u64,
    },

    /// Neither content-store path could serve the request
    #[error("Evidence store unavailable: {message}")]
    StoreUnavailable {
        /// Failure description
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Failure description
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Failure description
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Failure description
        message: String,
    },
}

impl MultaError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a ledger write error without a revert reason
    pub fn ledger_write(message: impl Into<String>) -> Self {
        Self::LedgerWrite {
            message: message.into(),
            revert_reason: None,
        }
    }

    /// Create a ledger write error carrying the ledger's revert reason
    pub fn reverted(message: impl Into<String>, revert_reason: Option<String>) -> Self {
        Self::LedgerWrite {
            message: message.into(),
            revert_reason,
        }
    }

    /// Create a ledger read error
    pub fn ledger_read(message: impl Into<String>) -> Self {
        Self::LedgerRead {
            message: message.into(),
        }
    }

    /// Create a retrieval timeout error
    pub fn retrieval_timeout(cid: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RetrievalTimeout {
            cid: cid.into(),
            timeout_ms,
        }
    }

    /// Create a store unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable name of the error class, used at the external boundary
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::NotFound { .. } => "NotFound",
            Self::LedgerWrite { .. } => "LedgerWriteError",
            Self::LedgerRead { .. } => "LedgerReadError",
            Self::RetrievalTimeout { .. } => "RetrievalTimeout",
            Self::StoreUnavailable { .. } => "StoreUnavailable",
            Self::Configuration { .. } => "ConfigurationError",
            Self::Serialization { .. } => "SerializationError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// HTTP-style status code for the external boundary
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::LedgerWrite { .. } | Self::LedgerRead { .. } => 502,
            Self::StoreUnavailable { .. } => 503,
            Self::RetrievalTimeout { .. } => 504,
            Self::Configuration { .. } | Self::Serialization { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Whether the caller caused the failure (no point retrying)
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound { .. })
    }
}

/// Standard Result type for Multa operations
pub type Result<T> = std::result::Result<T, MultaError>;

impl From<serde_json::Error> for MultaError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for MultaError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

/// Error rendering that crosses the external boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-style status code
    pub status: u16,
    /// Error class name
    pub kind: String,
    /// Human-readable message
    pub message: String,
    /// Full internal rendering, omitted in production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// Normalize an error for the given deployment environment
    pub fn from_error(err: &MultaError, environment: Environment) -> Self {
        let status = err.status_code();
        let production = environment == Environment::Production;

        let message = match err {
            MultaError::LedgerWrite {
                revert_reason: Some(reason),
                ..
            } => format!("{err} (reverted: {reason})"),
            _ if production && status == 500 => "An unexpected error occurred".to_string(),
            _ => err.to_string(),
        };

        Self {
            status,
            kind: err.kind().to_string(),
            message,
            detail: (!production).then(|| format!("{err:?}")),
        }
    }
}
