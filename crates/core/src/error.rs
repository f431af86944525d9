//! User-facing error taxonomy.
//!
//! Lower layers have richer error types; they classify into
//! [`StorefrontError`] before anything is stored in client state or shown
//! to the customer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A classified, display-safe error.
///
/// `Clone` and `PartialEq` so it can live inside `CartState`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum StorefrontError {
    /// Request failed, timed out, or the backend answered with a non-success status.
    #[error("{0}")]
    Network(String),
    /// Identity provider or credential failure.
    #[error("{0}")]
    Auth(String),
    /// Malformed user input.
    #[error("{0}")]
    Validation(String),
}

impl StorefrontError {
    /// The message to render inline.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Network(msg) | Self::Auth(msg) | Self::Validation(msg) => msg,
        }
    }

    /// Whether retrying the same action may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<crate::EmailError> for StorefrontError {
    fn from(err: crate::EmailError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<crate::QuantityError> for StorefrontError {
    fn from(err: crate::QuantityError) -> Self {
        Self::Validation(err.to_string())
    }
}
