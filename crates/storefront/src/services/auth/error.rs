//! Authentication error type.

use atelier_core::StorefrontError;
use thiserror::Error;

use super::ProviderError;

/// The one error sign-in and sign-out surface.
///
/// Provider failures arrive in provider-specific shapes; they are logged
/// and replaced by a message fit to show the customer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    message: String,
}

impl AuthError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Normalize a provider failure.
    pub(crate) fn from_provider(operation: &'static str, err: &ProviderError) -> Self {
        tracing::warn!(operation, error = %err, "Identity provider call failed");
        Self::new(match operation {
            "sign_out" => "Sign-out failed. Please try again.",
            _ => "Sign-in failed. Please try again.",
        })
    }

    /// The user-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<AuthError> for StorefrontError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_provider_hides_provider_details() {
        let provider: ProviderError = "auth/popup-closed-by-user: token=abc123".into();
        let err = AuthError::from_provider("sign_in", &provider);
        assert_eq!(err.message(), "Sign-in failed. Please try again.");
        assert!(!err.to_string().contains("abc123"));

        let err = AuthError::from_provider("sign_out", &provider);
        assert_eq!(err.message(), "Sign-out failed. Please try again.");
    }

    #[test]
    fn test_into_storefront_error() {
        let err: StorefrontError = AuthError::new("Nope").into();
        assert_eq!(err, StorefrontError::Auth("Nope".to_string()));
    }
}
