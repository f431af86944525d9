//! Subcommand implementations.
//!
//! Commands report through `tracing` like the rest of the tools, so output
//! respects `RUST_LOG` and lands in Sentry breadcrumbs when enabled.

pub mod cart;
pub mod check;
pub mod products;

use atelier_storefront::services::auth::HeadlessProvider;
use atelier_storefront::{ClientConfig, ClientError, Session};
use secrecy::SecretString;
use thiserror::Error;

/// Environment variable holding the customer password for cart commands.
const PASSWORD_VAR: &str = "ATELIER_PASSWORD";

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Required argument is missing.
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    /// The storefront client failed. Shows the customer-facing message.
    #[error("{}", .0.classify())]
    Client(ClientError),
}

impl From<ClientError> for CommandError {
    fn from(err: ClientError) -> Self {
        err.capture();
        Self::Client(err)
    }
}

/// Start a headless session and sign in as `email`.
///
/// # Errors
///
/// Returns an error if no email was given, the password variable is unset,
/// or the backend rejects the credentials.
pub async fn connect(
    config: ClientConfig,
    email: Option<&str>,
) -> Result<Session<HeadlessProvider>, CommandError> {
    let email = email.ok_or(CommandError::MissingArgument("--email"))?;

    dotenvy::dotenv().ok();
    let password = std::env::var(PASSWORD_VAR)
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar(PASSWORD_VAR))?;

    let session = Session::start(config, HeadlessProvider)?;
    let identity = session.login_with_password(email, &password).await?;
    tracing::info!(
        "Signed in as {}",
        identity
            .display_name
            .as_deref()
            .unwrap_or(identity.subject.as_str())
    );
    Ok(session)
}
