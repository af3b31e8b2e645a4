//! Error types for entity operations.

use thiserror::Error;

use crate::entity::EntityKind;

/// Result type alias for entity operations.
pub type Result<T> = std::result::Result<T, OpsError>;

/// Errors surfaced by the remote transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the remote service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl TransportError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

/// Errors raised by the entity-operations layer.
#[derive(Debug, Error)]
pub enum OpsError {
    /// Remote call failure, passed through unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A kind that declares no creation method was asked to create.
    #[error("{kind:?} is read-only: no create method declared")]
    ReadOnly { kind: EntityKind },

    /// One or more requested names were absent after fetch/create.
    #[error("names not found after creation: {missing:?}")]
    Verification { missing: Vec<String> },
}

impl OpsError {
    /// Missing names if this is a verification failure.
    pub fn missing_names(&self) -> Option<&[String]> {
        match self {
            Self::Verification { missing } => Some(missing),
            _ => None,
        }
    }
}
