//! Cart commands for a signed-in customer.
//!
//! # Usage
//!
//! ```bash
//! export ATELIER_PASSWORD=...
//! atelier cart show -e customer@example.com
//! atelier cart add prod_123 --color Red --size M -q 2 -e customer@example.com
//! atelier cart remove prod_123 --color Red --size M -e customer@example.com
//! ```

use atelier_core::{CartItem, CartKey, ProductId, Quantity, StorefrontError};
use atelier_storefront::services::auth::HeadlessProvider;
use atelier_storefront::views::CartView;
use atelier_storefront::{ClientError, Session, SyncOutcome};

use super::CommandError;

type CliSession = Session<HeadlessProvider>;

/// Fetch and print the cart.
///
/// # Errors
///
/// Returns an error if the fetch fails.
pub async fn show(session: &CliSession) -> Result<(), CommandError> {
    outcome(session.refresh_cart().await)?;
    print_cart(&session.cart_view());
    Ok(())
}

/// Add a product variant and print the reconciled cart.
///
/// # Errors
///
/// Returns an error if the selection is invalid or the backend refuses it.
pub async fn add(
    session: &CliSession,
    id: &str,
    color: Option<&str>,
    size: Option<&str>,
    quantity: u32,
) -> Result<(), CommandError> {
    let quantity = Quantity::new(quantity)
        .map_err(StorefrontError::from)
        .map_err(ClientError::from)?;
    let product = session.product(&ProductId::new(id)).await?;

    outcome(session.add_to_cart(&product, color, size, quantity).await?)?;
    tracing::info!("Added {} x {}", quantity.get(), product.title);
    print_cart(&session.cart_view());
    Ok(())
}

/// Remove a line and print the reconciled cart.
///
/// The line is looked up in the freshly fetched cart by product and options,
/// so `--color red` removes a line stored as `Red`.
///
/// # Errors
///
/// Returns a validation error if no single line matches, or an error if the
/// fetch fails or the backend refuses the removal.
pub async fn remove(
    session: &CliSession,
    id: &str,
    color: Option<&str>,
    size: Option<&str>,
) -> Result<(), CommandError> {
    outcome(session.refresh_cart().await)?;
    let key = find_line(
        session.store().state().items(),
        &ProductId::new(id),
        color,
        size,
    )?;
    outcome(session.remove_from_cart(key).await)?;
    print_cart(&session.cart_view());
    Ok(())
}

/// The key of the one cart line matching a product and its options.
fn find_line(
    items: &[CartItem],
    product_id: &ProductId,
    color: Option<&str>,
    size: Option<&str>,
) -> Result<CartKey, CommandError> {
    let mut matching = items
        .iter()
        .filter(|item| item.matches_selection(product_id, color, size));

    let message = match (matching.next(), matching.next()) {
        (Some(item), None) => return Ok(item.key.clone()),
        (None, _) => format!("{product_id} with those options is not in the cart."),
        (Some(_), Some(_)) => {
            format!("Several {product_id} lines are in the cart; pass --color and --size.")
        }
    };
    Err(ClientError::Validation(StorefrontError::Validation(message)).into())
}

fn outcome(outcome: SyncOutcome) -> Result<(), CommandError> {
    match outcome {
        SyncOutcome::Applied | SyncOutcome::Superseded => Ok(()),
        SyncOutcome::Failed(err) => Err(ClientError::from(err).into()),
    }
}

fn print_cart(view: &CartView) {
    if view.is_empty() {
        tracing::info!("Your cart is empty");
        return;
    }

    for line in &view.items {
        match &line.variant_title {
            Some(variant) => tracing::info!(
                "{} x {} ({})  {}",
                line.quantity,
                line.title,
                variant,
                line.line_price
            ),
            None => tracing::info!("{} x {}  {}", line.quantity, line.title, line.line_price),
        }
    }
    tracing::info!("{} items, subtotal {}", view.item_count, view.subtotal);
    if view.mixed_currencies {
        tracing::warn!("Some items are priced in another currency and not included in the subtotal");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        assert!(outcome(SyncOutcome::Applied).is_ok());
        assert!(outcome(SyncOutcome::Superseded).is_ok());

        let err = outcome(SyncOutcome::Failed(StorefrontError::Network(
            "Unable to reach the store.".to_string(),
        )))
        .unwrap_err();
        assert_eq!(err.to_string(), "Unable to reach the store.");
    }

    #[test]
    fn test_find_line_requires_a_match() {
        let shirt = ProductId::new("linen-shirt");
        let err = find_line(&[], &shirt, Some("red"), Some("m")).unwrap_err();
        assert_eq!(err.to_string(), "linen-shirt with those options is not in the cart.");
    }
}
