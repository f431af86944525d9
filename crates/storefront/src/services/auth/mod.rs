//! Authentication session glue.
//!
//! Wraps a third-party identity provider's popup sign-in and produces a
//! normalized [`Identity`]. The provider is an external capability modelled
//! by [`IdentityProvider`]; its errors never leave this module in their
//! original shape. Token verification is the backend's job, not ours.

mod error;

pub use error::AuthError;

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use atelier_core::{Email, StorefrontError, SubjectId};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::api::BackendSession;
use crate::error::{clear_sentry_user, set_sentry_user};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Opaque provider failure.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// What the provider's popup yields on success.
#[derive(Debug, Clone)]
pub struct ProviderCredential {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    /// Signed identity assertion for the backend to verify.
    pub id_token: SecretString,
}

/// A third-party identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the interactive popup sign-in.
    async fn sign_in_with_popup(&self) -> Result<ProviderCredential, ProviderError>;

    /// End the provider session.
    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// Provider for clients without a browser popup, such as the CLI.
///
/// Popup sign-in always fails; password and one-time-code sign-in still
/// work since they don't involve the provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessProvider;

#[async_trait]
impl IdentityProvider for HeadlessProvider {
    async fn sign_in_with_popup(&self) -> Result<ProviderCredential, ProviderError> {
        Err("popup sign-in is not available in a headless client".into())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// The signed-in user.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: SubjectId,
    pub email: Option<Email>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Identity token from the provider, or the backend session token for
    /// password and one-time-code sign-ins.
    pub token: SecretString,
    pub signed_in_at: DateTime<Utc>,
}

impl Identity {
    fn from_credential(credential: ProviderCredential) -> Result<Self, AuthError> {
        if credential.uid.trim().is_empty() || credential.id_token.expose_secret().is_empty() {
            warn!("Identity provider returned an incomplete credential");
            return Err(AuthError::new("Sign-in failed. Please try again."));
        }

        Ok(Self {
            subject: SubjectId::new(credential.uid),
            email: parse_email(credential.email),
            display_name: non_blank(credential.display_name),
            avatar_url: non_blank(credential.photo_url),
            token: credential.id_token,
            signed_in_at: Utc::now(),
        })
    }

    /// Identity for a session the backend started directly.
    #[must_use]
    pub fn from_backend(session: BackendSession) -> Self {
        Self {
            subject: session.user.id,
            email: session.user.email,
            display_name: non_blank(session.user.name),
            avatar_url: non_blank(session.user.avatar_url),
            token: session.token,
            signed_in_at: Utc::now(),
        }
    }
}

/// Drop an email the provider sent that doesn't parse; keep the identity.
fn parse_email(raw: Option<String>) -> Option<Email> {
    let raw = non_blank(raw)?;
    Email::parse(&raw)
        .inspect_err(|e| warn!(error = %e, "Identity provider returned an invalid email"))
        .ok()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check a new password against the length rules.
///
/// # Errors
///
/// Returns `StorefrontError::Validation` if the password is too short or too long.
pub fn validate_password(password: &SecretString) -> Result<(), StorefrontError> {
    let length = password.expose_secret().chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(StorefrontError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(StorefrontError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters."
        )));
    }
    Ok(())
}

// =============================================================================
// AuthSession
// =============================================================================

/// Holds the current identity for one client session.
pub struct AuthSession<P> {
    provider: P,
    current: RwLock<Option<Identity>>,
}

impl<P> std::fmt::Debug for AuthSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("signed_in", &self.is_signed_in())
            .finish_non_exhaustive()
    }
}

impl<P> AuthSession<P> {
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            current: RwLock::new(None),
        }
    }

    /// The signed-in identity, if any.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Record `identity` as the signed-in user.
    pub fn establish(&self, identity: Identity) {
        set_sentry_user(&identity.subject, identity.email.as_ref().map(Email::as_str));
        info!(subject = %identity.subject, "Signed in");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    /// Forget the signed-in user locally.
    pub fn forget(&self) {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(identity) = previous {
            info!(subject = %identity.subject, "Signed out");
        }
        clear_sentry_user();
    }
}

impl<P: IdentityProvider> AuthSession<P> {
    /// Sign in through the provider popup.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the provider fails or returns an unusable
    /// credential. The previous identity, if any, is kept.
    pub async fn sign_in(&self) -> Result<Identity, AuthError> {
        let credential = self
            .provider
            .sign_in_with_popup()
            .await
            .map_err(|e| AuthError::from_provider("sign_in", &e))?;

        let identity = Identity::from_credential(credential)?;
        self.establish(identity.clone());
        Ok(identity)
    }

    /// Sign out of the provider.
    ///
    /// The local identity is cleared even when the provider call fails, so
    /// a failed sign-out never leaves the client looking signed in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the provider fails to end its session.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self
            .provider
            .sign_out()
            .await
            .map_err(|e| AuthError::from_provider("sign_out", &e));
        self.forget();
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeProvider {
        credential: Mutex<Option<ProviderCredential>>,
        fail_sign_out: bool,
    }

    impl FakeProvider {
        fn with(credential: ProviderCredential) -> Self {
            Self {
                credential: Mutex::new(Some(credential)),
                fail_sign_out: false,
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn sign_in_with_popup(&self) -> Result<ProviderCredential, ProviderError> {
            self.credential
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| "auth/popup-closed-by-user".into())
        }

        async fn sign_out(&self) -> Result<(), ProviderError> {
            if self.fail_sign_out {
                return Err("auth/network-request-failed".into());
            }
            Ok(())
        }
    }

    fn credential(email: &str) -> ProviderCredential {
        ProviderCredential {
            uid: "uid-123".to_string(),
            email: Some(email.to_string()),
            display_name: Some("Ada Lovelace".to_string()),
            photo_url: Some(" ".to_string()),
            id_token: SecretString::from("eyJhbGciOiJSUzI1NiJ9.payload.sig"),
        }
    }

    #[tokio::test]
    async fn test_sign_in_normalizes_identity() {
        let auth = AuthSession::new(FakeProvider::with(credential("Ada@Example.COM")));

        let identity = auth.sign_in().await.unwrap();

        assert_eq!(identity.subject.as_str(), "uid-123");
        assert_eq!(identity.email.unwrap().domain(), "example.com");
        assert_eq!(identity.display_name.as_deref(), Some("Ada Lovelace"));
        assert!(identity.avatar_url.is_none());
        assert!(auth.is_signed_in());
    }

    #[tokio::test]
    async fn test_invalid_email_is_dropped() {
        let auth = AuthSession::new(FakeProvider::with(credential("not-an-email")));

        let identity = auth.sign_in().await.unwrap();

        assert!(identity.email.is_none());
        assert_eq!(identity.subject.as_str(), "uid-123");
    }

    #[tokio::test]
    async fn test_provider_failure_is_normalized() {
        let auth = AuthSession::new(FakeProvider::default());

        let err = auth.sign_in().await.unwrap_err();

        assert_eq!(err.message(), "Sign-in failed. Please try again.");
        assert!(!auth.is_signed_in());
    }

    #[tokio::test]
    async fn test_incomplete_credential_is_rejected() {
        let mut bad = credential("ada@example.com");
        bad.id_token = SecretString::from("");
        let auth = AuthSession::new(FakeProvider::with(bad));

        assert!(auth.sign_in().await.is_err());
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_identity_even_on_failure() {
        let auth = AuthSession::new(FakeProvider {
            credential: Mutex::new(Some(credential("ada@example.com"))),
            fail_sign_out: true,
        });
        auth.sign_in().await.unwrap();

        let err = auth.sign_out().await.unwrap_err();

        assert_eq!(err.message(), "Sign-out failed. Please try again.");
        assert!(!auth.is_signed_in());
    }

    #[tokio::test]
    async fn test_headless_provider() {
        let auth = AuthSession::new(HeadlessProvider);
        assert!(auth.sign_in().await.is_err());
        assert!(auth.sign_out().await.is_ok());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password(&SecretString::from("short")).is_err());
        assert!(validate_password(&SecretString::from("long enough")).is_ok());
        assert!(validate_password(&SecretString::from("x".repeat(129))).is_err());
    }
}
