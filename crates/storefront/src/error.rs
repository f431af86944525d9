//! Unified error handling with Sentry integration.
//!
//! Provides a unified `ClientError` type for session operations. Server-side
//! failures are captured to Sentry; everything is classified into the
//! display-safe [`StorefrontError`] before it reaches the UI.

use atelier_core::StorefrontError;
use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::services::auth::AuthError;

/// Error type for session-level operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Backend request failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Sign-in or sign-out failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input was rejected before any request was made.
    #[error("Validation error: {0}")]
    Validation(StorefrontError),
}

impl ClientError {
    /// Classify into the display-safe taxonomy.
    #[must_use]
    pub fn classify(&self) -> StorefrontError {
        match self {
            Self::Api(err) => err.classify(),
            Self::Auth(err) => err.clone().into(),
            // Don't expose configuration details to customers
            Self::Config(_) => StorefrontError::Network(
                "The store is unavailable right now. Please try again later.".to_string(),
            ),
            Self::Validation(err) => err.clone(),
        }
    }

    /// Capture to Sentry if this is a server-side failure.
    pub fn capture(&self) {
        match self {
            Self::Api(err) => report_api_error("session", err),
            Self::Config(_) => {
                let event_id = sentry::capture_error(self);
                tracing::error!(error = %self, sentry_event_id = %event_id, "Client error");
            }
            Self::Auth(_) | Self::Validation(_) => {}
        }
    }
}

impl From<StorefrontError> for ClientError {
    fn from(err: StorefrontError) -> Self {
        Self::Validation(err)
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Log a failed backend call and capture server errors to Sentry.
pub fn report_api_error(operation: &'static str, err: &ApiError) {
    if err.is_server_error() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            operation,
            error = %err,
            sentry_event_id = %event_id,
            "Backend request failed"
        );
    } else {
        tracing::warn!(operation, error = %err, "Backend request failed");
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Api(ApiError::NotFound("/api/products/x".to_string()));
        assert_eq!(err.to_string(), "API error: Not found: /api/products/x");

        let err = ClientError::Validation(StorefrontError::Validation("Cart is empty".to_string()));
        assert_eq!(err.to_string(), "Validation error: Cart is empty");
    }

    #[test]
    fn test_classify_hides_config_details() {
        let err = ClientError::Config(ConfigError::MissingEnvVar("ATELIER_API_URL".to_string()));
        let classified = err.classify();
        assert!(matches!(classified, StorefrontError::Network(_)));
        assert!(!classified.message().contains("ATELIER_API_URL"));
    }

    #[test]
    fn test_classify_auth_and_validation() {
        let err = ClientError::Auth(AuthError::new("Sign-in was cancelled."));
        assert_eq!(
            err.classify(),
            StorefrontError::Auth("Sign-in was cancelled.".to_string())
        );

        let err: ClientError = StorefrontError::Validation("bad".to_string()).into();
        assert_eq!(err.classify(), StorefrontError::Validation("bad".to_string()));
    }

    #[test]
    fn test_breadcrumb_without_client_is_noop() {
        add_breadcrumb("cart", "Added item", Some(&[("product_id", "p1")]));
        set_sentry_user(&"user-1", Some("ada@example.com"));
        clear_sentry_user();
    }
}
