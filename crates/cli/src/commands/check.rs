//! Configuration and connectivity check.
//!
//! # Usage
//!
//! ```bash
//! atelier check
//! ```
//!
//! # Environment Variables
//!
//! - `ATELIER_API_URL` - Backend base URL
//! - `ATELIER_API_TOKEN` - Optional storefront service token

use atelier_storefront::api::ProductQuery;
use atelier_storefront::services::auth::HeadlessProvider;
use atelier_storefront::{ClientConfig, Session};

use super::CommandError;

/// Print the effective configuration and request one product.
///
/// # Errors
///
/// Returns an error if the session can't start or the backend doesn't answer.
pub async fn run(config: ClientConfig) -> Result<(), CommandError> {
    let session = Session::start(config, HeadlessProvider)?;
    let config = session.config();

    tracing::info!("Backend: {}", config.api_url);
    tracing::info!(
        "Service token: {}",
        if config.api_token.is_some() { "set" } else { "not set" }
    );
    tracing::info!("Currency: {}", config.currency.code());
    tracing::info!("Image hosts: {}", config.image_hosts.join(", "));
    tracing::info!(
        "Cache: {} entries, {}s TTL",
        config.cache.capacity,
        config.cache.ttl.as_secs()
    );
    tracing::info!("Image CSP: {}", session.images().content_security_policy());

    let query = ProductQuery {
        per_page: 1,
        ..ProductQuery::default()
    };
    let page = session.products(&query).await?;
    tracing::info!("Backend reachable: {} products in the catalog", page.total);

    session.end().await;
    Ok(())
}
