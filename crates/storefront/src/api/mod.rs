//! Backend REST API client.
//!
//! # Architecture
//!
//! - The backend is the source of truth for carts, prices and orders
//! - Product responses are cached in memory via `moka` (TTL from config)
//! - Cart responses are never cached
//! - Every failure is an [`ApiError`]; [`ApiError::classify`] turns it into
//!   the display-safe [`StorefrontError`] stored in cart state
//!
//! # Endpoints
//!
//! | Method   | Path                    | Use                          |
//! |----------|-------------------------|------------------------------|
//! | `GET`    | `api/cart`              | Authoritative cart           |
//! | `POST`   | `api/cart/items`        | Add a variant                |
//! | `PATCH`  | `api/cart/items`        | Set a line quantity          |
//! | `DELETE` | `api/cart/items`        | Remove a line                |
//! | `GET`    | `api/products`          | Product page                 |
//! | `GET`    | `api/products/{id}`     | Product detail               |
//! | `POST`   | `api/orders`            | Place an order               |
//! | `POST`   | `api/auth/*`            | Password, OTP and token auth |

mod cache;
mod client;
mod conversions;
pub mod types;

pub use client::{ApiClient, BackendSession, BackendUser, ProductQuery};

use atelier_core::StorefrontError;
use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status not covered below.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Session missing, expired or forbidden (401/403).
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Response parsed but violated the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Backend refused the request input (400/409/422) with a message meant
    /// for the user.
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Whether the failure is on the backend side and worth reporting.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Parse(_) | Self::InvalidResponse(_) => true,
            _ => false,
        }
    }

    /// Classify into the display-safe taxonomy.
    ///
    /// Messages never include response bodies or transport details.
    #[must_use]
    pub fn classify(&self) -> StorefrontError {
        match self {
            Self::Http(err) if err.is_timeout() => {
                StorefrontError::Network("The request timed out. Please try again.".to_string())
            }
            Self::Http(_) => StorefrontError::Network(
                "Unable to reach the store. Check your connection and try again.".to_string(),
            ),
            Self::Status { status, .. } if *status >= 500 => StorefrontError::Network(
                "The store is having trouble right now. Please try again shortly.".to_string(),
            ),
            Self::Status { .. } => {
                StorefrontError::Network("The request could not be completed.".to_string())
            }
            Self::Unauthorized => StorefrontError::Auth(
                "Your session has expired. Please sign in again.".to_string(),
            ),
            Self::NotFound(_) => {
                StorefrontError::Network("The requested item could not be found.".to_string())
            }
            Self::RateLimited(secs) => StorefrontError::Network(format!(
                "Too many requests. Try again in {secs} seconds."
            )),
            Self::Parse(_) | Self::InvalidResponse(_) => StorefrontError::Network(
                "The store sent an unexpected response. Please try again.".to_string(),
            ),
            Self::Rejected(message) => StorefrontError::Validation(message.clone()),
        }
    }
}

impl From<ApiError> for StorefrontError {
    fn from(err: ApiError) -> Self {
        err.classify()
    }
}
