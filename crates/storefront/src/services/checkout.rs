//! Checkout: turn the current cart into an order.
//!
//! The backend prices the order; the client only sends what is in the cart
//! and where to ship it.

use atelier_core::{CartState, Order, PaymentMethod, ShippingAddress, StorefrontError};
use tracing::{info, instrument};

use crate::api::ApiClient;
use crate::error::{ClientError, add_breadcrumb, report_api_error};
use crate::sync::{CartSync, SyncOutcome};

/// Check that `state` and `address` can be submitted.
///
/// # Errors
///
/// Returns `StorefrontError::Validation` naming what is wrong.
pub fn validate_checkout(
    state: &CartState,
    address: &ShippingAddress,
) -> Result<(), StorefrontError> {
    if state.is_empty() {
        return Err(StorefrontError::Validation("Your cart is empty.".to_string()));
    }
    if state.summary().has_mixed_currencies() {
        return Err(StorefrontError::Validation(
            "Your cart has items priced in different currencies.".to_string(),
        ));
    }

    let missing = address.missing_fields();
    if !missing.is_empty() {
        let fields = missing
            .iter()
            .map(|field| field.replace('_', " "))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(StorefrontError::Validation(format!(
            "Please fill in: {fields}."
        )));
    }

    Ok(())
}

/// Place an order for the cart in `sync`'s store.
///
/// On success the cart is emptied locally and re-fetched, since the backend
/// clears it as part of the order.
///
/// # Errors
///
/// Returns `ClientError::Validation` before any request if the cart or
/// address is incomplete, or `ClientError::Api` if the backend refuses.
#[instrument(skip_all, fields(payment_method = ?payment_method))]
pub async fn place_order(
    sync: &CartSync<ApiClient>,
    address: &ShippingAddress,
    payment_method: PaymentMethod,
) -> Result<Order, ClientError> {
    let state = sync.store().state();
    validate_checkout(&state, address)?;

    let order = sync
        .source()
        .create_order(state.items(), address, payment_method)
        .await
        .inspect_err(|e| report_api_error("create_order", e))?;

    add_breadcrumb(
        "checkout",
        "Placed order",
        Some(&[("order_id", order.id.as_str())]),
    );
    info!(order_id = %order.id, total = %order.total, "Order placed");

    sync.clear_local();
    if let SyncOutcome::Failed(err) = sync.fetch_cart().await {
        // The order stands; a stale cart view is recoverable on next fetch
        tracing::warn!(error = %err, "Cart refresh after checkout failed");
    }

    Ok(order)
}
