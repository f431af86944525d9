//! Integration tests for the client session.
//!
//! These tests drive `Session` end to end against the fake backend: sign-in
//! flows, optimistic cart intents reconciled with the server, and checkout.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use atelier_core::{CartKey, PaymentMethod, ProductId, Quantity, ShippingAddress, StorefrontError};
use atelier_integration_tests::{FakeBackend, GOOGLE_ID_TOKEN, OTP, PASSWORD};
use atelier_storefront::api::ApiError;
use atelier_storefront::services::auth::{
    HeadlessProvider, IdentityProvider, ProviderCredential, ProviderError,
};
use atelier_storefront::{ClientError, Session, SyncOutcome};
use axum::http::{Method, StatusCode};
use secrecy::SecretString;

async fn signed_in(backend: &FakeBackend) -> Session<HeadlessProvider> {
    let session = Session::start(backend.config(), HeadlessProvider).unwrap();
    session
        .login_with_password("ada@example.com", &SecretString::from(PASSWORD))
        .await
        .unwrap();
    session
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Ada Lovelace".to_string(),
        phone: "+44 20 7946 0000".to_string(),
        line1: "12 St James's Square".to_string(),
        line2: Some("Flat 2".to_string()),
        city: "London".to_string(),
        state: "London".to_string(),
        postal_code: "SW1Y 4JH".to_string(),
        country: "GB".to_string(),
    }
}

fn qty(n: u32) -> Quantity {
    Quantity::new(n).unwrap()
}

// =============================================================================
// Sign-in
// =============================================================================

#[tokio::test]
async fn test_password_login_loads_existing_cart() {
    let backend = FakeBackend::start().await.unwrap();
    backend.seed_cart_line("user_ada", "canvas-tote", "-/-", 2);

    let session = Session::start(backend.config(), HeadlessProvider).unwrap();
    let identity = session
        .login_with_password("ada@example.com", &SecretString::from(PASSWORD))
        .await
        .unwrap();

    assert_eq!(identity.subject.as_str(), "user_ada");
    assert_eq!(identity.display_name.as_deref(), Some("Ada Lovelace"));
    assert!(session.auth().is_signed_in());

    let view = session.cart_view();
    assert_eq!(view.item_count, 2);
    assert_eq!(view.subtotal, "$50.00");
    assert!(!view.loading);
    assert!(view.error.is_none());
}

#[tokio::test]
async fn test_malformed_email_never_reaches_backend() {
    let backend = FakeBackend::start().await.unwrap();
    let session = Session::start(backend.config(), HeadlessProvider).unwrap();

    let err = session
        .login_with_password("not-an-email", &SecretString::from(PASSWORD))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_wrong_password_stays_signed_out() {
    let backend = FakeBackend::start().await.unwrap();
    let session = Session::start(backend.config(), HeadlessProvider).unwrap();

    let err = session
        .login_with_password("ada@example.com", &SecretString::from("nope nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Api(ApiError::Unauthorized)));
    assert!(matches!(err.classify(), StorefrontError::Auth(_)));
    assert!(!session.auth().is_signed_in());
    assert!(!session.api().has_session());
}

#[tokio::test]
async fn test_register_and_verify_signs_in() {
    let backend = FakeBackend::start().await.unwrap();
    let session = Session::start(backend.config(), HeadlessProvider).unwrap();
    let password = SecretString::from(PASSWORD);

    let weak = session
        .register("Charles", "charles@example.com", &SecretString::from("short"))
        .await
        .unwrap_err();
    assert!(matches!(weak, ClientError::Validation(_)));

    session
        .register("Charles Babbage", "charles@example.com", &password)
        .await
        .unwrap();

    let bad_code = session
        .verify_otp("charles@example.com", "12ab")
        .await
        .unwrap_err();
    assert!(matches!(bad_code, ClientError::Validation(_)));

    let identity = session
        .verify_otp("charles@example.com", OTP)
        .await
        .unwrap();
    assert_eq!(identity.display_name.as_deref(), Some("Charles Babbage"));
    assert!(session.api().has_session());
    assert!(session.cart_view().is_empty());
}

struct PopupProvider {
    id_token: &'static str,
}

#[async_trait]
impl IdentityProvider for PopupProvider {
    async fn sign_in_with_popup(&self) -> Result<ProviderCredential, ProviderError> {
        Ok(ProviderCredential {
            uid: "google-uid-1".to_string(),
            email: Some("grace@example.com".to_string()),
            display_name: Some("Grace Hopper".to_string()),
            photo_url: None,
            id_token: SecretString::from(self.id_token),
        })
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_popup_sign_in_exchanges_token() {
    let backend = FakeBackend::start().await.unwrap();
    let session = Session::start(
        backend.config(),
        PopupProvider {
            id_token: GOOGLE_ID_TOKEN,
        },
    )
    .unwrap();

    let identity = session.sign_in().await.unwrap();

    assert_eq!(identity.email.unwrap().as_str(), "grace@example.com");
    assert!(session.api().has_session());
    assert_eq!(backend.hits(&Method::POST, "/api/auth/google"), 1);
    assert_eq!(backend.hits(&Method::GET, "/api/cart"), 1);
}

#[tokio::test]
async fn test_popup_sign_in_rejected_by_backend() {
    let backend = FakeBackend::start().await.unwrap();
    let session = Session::start(
        backend.config(),
        PopupProvider {
            id_token: "forged.token.sig",
        },
    )
    .unwrap();

    let err = session.sign_in().await.unwrap_err();

    assert!(matches!(err, ClientError::Api(ApiError::Unauthorized)));
    assert!(!session.auth().is_signed_in());
    assert!(!session.api().has_session());
    assert_eq!(backend.hits(&Method::GET, "/api/cart"), 0);
}

#[tokio::test]
async fn test_headless_popup_fails_without_requests() {
    let backend = FakeBackend::start().await.unwrap();
    let session = Session::start(backend.config(), HeadlessProvider).unwrap();

    let err = session.sign_in().await.unwrap_err();

    assert!(matches!(err, ClientError::Auth(_)));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_sign_out_clears_cart_and_session() {
    let backend = FakeBackend::start().await.unwrap();
    backend.seed_cart_line("user_ada", "canvas-tote", "-/-", 1);
    let session = signed_in(&backend).await;
    assert!(!session.cart_view().is_empty());

    session.sign_out().await.unwrap();

    assert!(session.cart_view().is_empty());
    assert!(!session.auth().is_signed_in());
    assert!(!session.api().has_session());

    // A fetch after sign-out is unauthorized and leaves the cart empty
    let outcome = session.refresh_cart().await;
    assert!(matches!(outcome, SyncOutcome::Failed(StorefrontError::Auth(_))));
    assert!(session.store().state().is_empty());
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn test_mount_fetches_in_background() {
    let backend = FakeBackend::start().await.unwrap();
    backend.seed_cart_line("user_ada", "linen-shirt", "Red/M", 1);
    let session = signed_in(&backend).await;
    session.store().reset();

    let outcome = session.mount().await.unwrap();

    assert_eq!(outcome, SyncOutcome::Applied);
    assert_eq!(session.cart_view().item_count, 1);
}

#[tokio::test]
async fn test_add_to_cart_merges_and_reconciles() {
    let backend = FakeBackend::start().await.unwrap();
    let session = signed_in(&backend).await;
    let product = session.product(&ProductId::new("linen-shirt")).await.unwrap();
    let mut updates = session.subscribe();

    let first = session
        .add_to_cart(&product, Some("red"), Some("m"), qty(1))
        .await
        .unwrap();
    let second = session
        .add_to_cart(&product, Some("Red"), Some("M"), qty(2))
        .await
        .unwrap();

    assert_eq!(first, SyncOutcome::Applied);
    assert_eq!(second, SyncOutcome::Applied);
    assert!(updates.has_changed().unwrap());

    let state = updates.borrow_and_update().clone();
    assert_eq!(state.items().len(), 1);
    let key = CartKey::from_options(ProductId::new("linen-shirt"), Some("Red"), Some("M"));
    assert_eq!(state.get(&key).unwrap().quantity.get(), 3);
    assert_eq!(state.summary().total_price().display(), "$117.00");
    assert_eq!(backend.cart_quantity("user_ada"), 3);

    let view = session.cart_view();
    assert_eq!(view.items[0].variant_title.as_deref(), Some("Red / M"));
    assert_eq!(
        view.items[0].image.as_ref().unwrap().url,
        "https://res.cloudinary.com/atelier/linen-shirt.jpg"
    );
}

#[tokio::test]
async fn test_remove_finds_line_by_stored_options() {
    let backend = FakeBackend::start().await.unwrap();
    let session = signed_in(&backend).await;
    let shirt = ProductId::new("linen-shirt");
    let product = session.product(&shirt).await.unwrap();
    session
        .add_to_cart(&product, Some("red"), Some("m"), qty(1))
        .await
        .unwrap();

    // The line is stored with the product's casing, so the raw input is no key
    let raw = CartKey::from_options(shirt.clone(), Some("red"), Some("m"));
    assert!(session.store().state().get(&raw).is_none());

    let key = session
        .store()
        .state()
        .items()
        .iter()
        .find(|item| item.matches_selection(&shirt, Some("red"), Some("m")))
        .map(|item| item.key.clone())
        .unwrap();
    let outcome = session.remove_from_cart(key).await;

    assert_eq!(outcome, SyncOutcome::Applied);
    assert!(session.cart_view().is_empty());
    assert_eq!(backend.cart_quantity("user_ada"), 0);
}

#[tokio::test]
async fn test_invalid_selection_is_rejected_locally() {
    let backend = FakeBackend::start().await.unwrap();
    let session = signed_in(&backend).await;
    let product = session.product(&ProductId::new("linen-shirt")).await.unwrap();

    let missing_size = session
        .add_to_cart(&product, Some("Red"), None, qty(1))
        .await
        .unwrap_err();
    let unknown_color = session
        .add_to_cart(&product, Some("Green"), Some("M"), qty(1))
        .await
        .unwrap_err();

    assert_eq!(missing_size.classify().message(), "Please choose a size.");
    assert_eq!(
        unknown_color.classify().message(),
        "Green is not an available color."
    );
    assert_eq!(backend.hits(&Method::POST, "/api/cart/items"), 0);
    assert!(session.cart_view().is_empty());
}

#[tokio::test]
async fn test_rejected_add_rolls_back_to_server_cart() {
    let backend = FakeBackend::start().await.unwrap();
    let session = signed_in(&backend).await;
    // The product page was loaded while the item was still in stock
    let product = session.product(&ProductId::new("linen-shirt")).await.unwrap();
    backend.set_in_stock("linen-shirt", false);

    let outcome = session
        .add_to_cart(&product, Some("Red"), Some("M"), qty(1))
        .await
        .unwrap();

    let expected = StorefrontError::Validation("This item is out of stock.".to_string());
    assert_eq!(outcome, SyncOutcome::Failed(expected.clone()));

    let state = session.store().state();
    assert!(state.is_empty());
    assert_eq!(state.error(), Some(&expected));
    assert!(!state.is_loading());
}

#[tokio::test]
async fn test_failed_refresh_keeps_items() {
    let backend = FakeBackend::start().await.unwrap();
    backend.seed_cart_line("user_ada", "canvas-tote", "-/-", 1);
    let session = signed_in(&backend).await;
    backend.fail_next_with("/api/cart", StatusCode::SERVICE_UNAVAILABLE, "maintenance");

    let outcome = session.refresh_cart().await;

    assert!(matches!(outcome, SyncOutcome::Failed(StorefrontError::Network(_))));
    let view = session.cart_view();
    assert_eq!(view.item_count, 1);
    assert_eq!(
        view.error.as_deref(),
        Some("The store is having trouble right now. Please try again shortly.")
    );

    // Next successful fetch clears the error
    assert_eq!(session.refresh_cart().await, SyncOutcome::Applied);
    assert!(session.cart_view().error.is_none());
}

#[tokio::test]
async fn test_update_and_remove() {
    let backend = FakeBackend::start().await.unwrap();
    let session = signed_in(&backend).await;
    let tote = session.product(&ProductId::new("canvas-tote")).await.unwrap();
    session.add_to_cart(&tote, None, None, qty(1)).await.unwrap();
    let key = CartKey::from_options(ProductId::new("canvas-tote"), None, None);

    let outcome = session.update_quantity(key.clone(), qty(4)).await;
    assert_eq!(outcome, SyncOutcome::Applied);
    assert_eq!(session.cart_view().subtotal, "$100.00");
    assert_eq!(backend.cart_quantity("user_ada"), 4);

    let outcome = session.remove_from_cart(key).await;
    assert_eq!(outcome, SyncOutcome::Applied);
    assert!(session.cart_view().is_empty());
    assert_eq!(backend.cart_quantity("user_ada"), 0);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_product_cards_filter_images() {
    let backend = FakeBackend::start().await.unwrap();
    let session = Session::start(backend.config(), HeadlessProvider).unwrap();

    let cards = session
        .product_cards(&atelier_storefront::api::ProductQuery {
            category: Some("shirts".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(cards.len(), 2);
    let linen = &cards[0];
    assert!(linen.on_sale);
    assert_eq!(linen.price, "$39.00");
    assert_eq!(linen.compare_at_price.as_deref(), Some("$49.00"));
    assert_eq!(linen.image.as_ref().unwrap().alt, "Linen shirt");

    // Images from hosts outside the allowlist are dropped
    assert!(cards[1].image.is_none());
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_places_order_and_empties_cart() {
    let backend = FakeBackend::start().await.unwrap();
    let session = signed_in(&backend).await;
    let product = session.product(&ProductId::new("linen-shirt")).await.unwrap();
    session
        .add_to_cart(&product, Some("Blue"), Some("L"), qty(2))
        .await
        .unwrap();

    let order = session
        .checkout(&address(), PaymentMethod::Online)
        .await
        .unwrap();

    assert_eq!(order.total.display(), "$78.00");
    assert_eq!(order.lines[0].quantity.get(), 2);
    assert_eq!(order.shipping_address.line2.as_deref(), Some("Flat 2"));
    assert!(session.cart_view().is_empty());
    assert_eq!(backend.cart_quantity("user_ada"), 0);
    assert_eq!(backend.order_count(), 1);
}

#[tokio::test]
async fn test_checkout_validation_runs_before_request() {
    let backend = FakeBackend::start().await.unwrap();
    let session = signed_in(&backend).await;

    let empty = session
        .checkout(&address(), PaymentMethod::Cod)
        .await
        .unwrap_err();
    assert_eq!(empty.classify().message(), "Your cart is empty.");

    let tote = session.product(&ProductId::new("canvas-tote")).await.unwrap();
    session.add_to_cart(&tote, None, None, qty(1)).await.unwrap();
    let incomplete = ShippingAddress {
        phone: " ".to_string(),
        postal_code: String::new(),
        ..address()
    };

    let err = session
        .checkout(&incomplete, PaymentMethod::Cod)
        .await
        .unwrap_err();

    assert_eq!(err.classify().message(), "Please fill in: phone, postal code.");
    assert_eq!(backend.hits(&Method::POST, "/api/orders"), 0);
}
