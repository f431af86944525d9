//! Client session: the context object that owns the cart and the identity.

use std::sync::Arc;

use atelier_core::{
    CartItem, CartKey, CartState, Email, Order, PaymentMethod, Product, ProductId, ProductPage,
    Quantity, ShippingAddress, StorefrontError,
};
use secrecy::SecretString;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::api::{ApiClient, ProductQuery};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result, report_api_error};
use crate::images::ImagePolicy;
use crate::services::auth::{AuthSession, Identity, IdentityProvider, validate_password};
use crate::services::checkout;
use crate::store::CartStore;
use crate::sync::{CartSync, SyncOutcome};
use crate::views::{CartView, ProductCardView};

/// One customer's client session.
///
/// Owns the cart store and its sync flow, the backend client and the auth
/// glue. Cheaply cloneable via `Arc`; everything is dropped when the last
/// clone goes away.
pub struct Session<P> {
    inner: Arc<SessionInner<P>>,
}

struct SessionInner<P> {
    config: ClientConfig,
    api: ApiClient,
    cart: Arc<CartSync<ApiClient>>,
    auth: AuthSession<P>,
    images: ImagePolicy,
}

impl<P> Clone for Session<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> std::fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("auth", &self.inner.auth)
            .finish_non_exhaustive()
    }
}

impl<P: IdentityProvider> Session<P> {
    /// Start a session with an empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn start(config: ClientConfig, provider: P) -> Result<Self> {
        let api = ApiClient::new(&config)?;
        let store = CartStore::new(config.currency);
        let cart = Arc::new(CartSync::new(store, api.clone()));
        let images = ImagePolicy::new(config.image_hosts.iter().cloned());

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                api,
                cart,
                auth: AuthSession::new(provider),
                images,
            }),
        })
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the backend client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn cart(&self) -> &Arc<CartSync<ApiClient>> {
        &self.inner.cart
    }

    #[must_use]
    pub fn store(&self) -> &CartStore {
        self.inner.cart.store()
    }

    #[must_use]
    pub fn auth(&self) -> &AuthSession<P> {
        &self.inner.auth
    }

    #[must_use]
    pub fn images(&self) -> &ImagePolicy {
        &self.inner.images
    }

    /// Receiver that wakes on every cart change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.store().subscribe()
    }

    /// The cart as presentation components see it.
    #[must_use]
    pub fn cart_view(&self) -> CartView {
        CartView::build(&self.store().state(), &self.inner.images)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Start a cart fetch without waiting for it (a page mounted).
    pub fn mount(&self) -> JoinHandle<SyncOutcome> {
        self.inner.cart.spawn_fetch()
    }

    /// Fetch the cart and wait for the result.
    pub async fn refresh_cart(&self) -> SyncOutcome {
        self.inner.cart.fetch_cart().await
    }

    /// Add `quantity` of the selected variant of `product`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` if the product is out of stock or an
    /// option is missing or not offered. Backend failures are reported in
    /// the returned outcome and the store.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(
        &self,
        product: &Product,
        color: Option<&str>,
        size: Option<&str>,
        quantity: Quantity,
    ) -> Result<SyncOutcome> {
        let item = cart_item_for(product, color, size, quantity)?;
        Ok(self.inner.cart.add_item(item).await)
    }

    pub async fn update_quantity(&self, key: CartKey, quantity: Quantity) -> SyncOutcome {
        self.inner.cart.update_quantity(key, quantity).await
    }

    pub async fn remove_from_cart(&self, key: CartKey) -> SyncOutcome {
        self.inner.cart.remove_item(key).await
    }

    /// Place an order for the current cart.
    ///
    /// # Errors
    ///
    /// See [`checkout::place_order`].
    pub async fn checkout(
        &self,
        address: &ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<Order> {
        checkout::place_order(&self.inner.cart, address, payment_method).await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    pub async fn products(&self, query: &ProductQuery) -> Result<ProductPage> {
        Ok(self.inner.api.list_products(query).await?)
    }

    /// # Errors
    ///
    /// Returns an error if the product is not found or the request fails.
    pub async fn product(&self, id: &ProductId) -> Result<Product> {
        Ok(self.inner.api.get_product(id).await?)
    }

    /// A product page as cards.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    pub async fn product_cards(&self, query: &ProductQuery) -> Result<Vec<ProductCardView>> {
        let page = self.products(query).await?;
        Ok(page
            .products
            .iter()
            .map(|product| ProductCardView::build(product, &self.inner.images))
            .collect())
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Sign in through the identity provider popup and start a backend
    /// session with the provider's token.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Auth` if the provider fails, or
    /// `ClientError::Api` if the backend rejects the token. Either way the
    /// session stays signed out.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<Identity> {
        let identity = self.inner.auth.sign_in().await?;

        match self.inner.api.exchange_identity_token(&identity.token).await {
            Ok(backend) => {
                self.inner.api.set_session_token(backend.token);
                self.inner.cart.fetch_cart().await;
                Ok(identity)
            }
            Err(err) => {
                report_api_error("exchange_identity_token", &err);
                self.inner.auth.forget();
                Err(err.into())
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for a malformed email, or
    /// `ClientError::Api` if the backend rejects the credentials.
    #[instrument(skip(self, password))]
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity> {
        let email = Email::parse(email).map_err(StorefrontError::from)?;
        let backend = self.inner.api.login(&email, password).await?;
        Ok(self.establish(backend).await)
    }

    /// Create an account. Returns the backend's confirmation message; the
    /// account is usable after [`verify_otp`](Self::verify_otp).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for a blank name, malformed email or
    /// weak password, or `ClientError::Api` if the backend refuses.
    #[instrument(skip(self, name, password))]
    pub async fn register(&self, name: &str, email: &str, password: &SecretString) -> Result<String> {
        if name.trim().is_empty() {
            return Err(StorefrontError::Validation("Please enter your name.".to_string()).into());
        }
        let email = Email::parse(email).map_err(StorefrontError::from)?;
        validate_password(password)?;

        Ok(self.inner.api.register(name, &email, password).await?)
    }

    /// Finish registration or passwordless sign-in with a one-time code.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` if the code is not numeric, or
    /// `ClientError::Api` if the backend rejects it.
    #[instrument(skip(self, otp))]
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<Identity> {
        let email = Email::parse(email).map_err(StorefrontError::from)?;
        let otp = otp.trim();
        if otp.is_empty() || !otp.chars().all(|c| c.is_ascii_digit()) {
            return Err(StorefrontError::Validation(
                "Enter the numeric code from your email.".to_string(),
            )
            .into());
        }

        let backend = self.inner.api.verify_otp(&email, otp).await?;
        Ok(self.establish(backend).await)
    }

    async fn establish(&self, backend: crate::api::BackendSession) -> Identity {
        self.inner.api.set_session_token(backend.token.clone());
        let identity = Identity::from_backend(backend);
        self.inner.auth.establish(identity.clone());
        self.inner.cart.fetch_cart().await;
        identity
    }

    /// Sign out of the provider and the backend, and empty the cart view.
    ///
    /// Local state is cleared even when the provider call fails.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Auth` if the provider fails to sign out.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.inner.auth.sign_out().await;
        self.inner.api.clear_session_token();
        self.inner.cart.clear_local();
        self.store().reset();
        result.map_err(ClientError::from)
    }

    /// End the session: forget the identity and the cart.
    pub async fn end(self) {
        self.inner.auth.forget();
        self.inner.api.clear_session_token();
        self.inner.cart.clear_local();
        self.inner.api.invalidate_all().await;
    }
}

/// Build the cart line for a product selection.
fn cart_item_for(
    product: &Product,
    color: Option<&str>,
    size: Option<&str>,
    quantity: Quantity,
) -> std::result::Result<CartItem, ClientError> {
    if !product.in_stock {
        return Err(ClientError::Validation(StorefrontError::Validation(format!(
            "{} is out of stock.",
            product.title
        ))));
    }
    let color = select_option("color", color, &product.colors)?;
    let size = select_option("size", size, &product.sizes)?;

    Ok(CartItem {
        key: CartKey::from_options(product.id.clone(), color, size),
        title: product.title.clone(),
        image: product.featured_image().map(|image| image.url.clone()),
        color: color.map(String::from),
        size: size.map(String::from),
        unit_price: product.display_price(),
        quantity,
    })
}

/// Check a chosen option against what the product offers.
///
/// Products without options take none; products with options require one.
fn select_option<'a>(
    name: &str,
    chosen: Option<&str>,
    offered: &'a [String],
) -> std::result::Result<Option<&'a str>, ClientError> {
    let Some(chosen) = chosen.map(str::trim).filter(|c| !c.is_empty()) else {
        if offered.is_empty() {
            return Ok(None);
        }
        return Err(ClientError::Validation(StorefrontError::Validation(format!(
            "Please choose a {name}."
        ))));
    };

    offered
        .iter()
        .find(|option| option.eq_ignore_ascii_case(chosen))
        .map(|option| Some(option.as_str()))
        .ok_or_else(|| {
            ClientError::Validation(StorefrontError::Validation(format!(
                "{chosen} is not an available {name}."
            )))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use atelier_core::{CurrencyCode, Price, ProductImage};
    use rust_decimal::Decimal;

    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new("shirt"),
            title: "Linen Shirt".to_string(),
            description: String::new(),
            category: None,
            images: vec![ProductImage {
                url: "https://res.cloudinary.com/shirt.jpg".to_string(),
                alt_text: None,
            }],
            colors: vec!["Red".to_string(), "Blue".to_string()],
            sizes: vec!["M".to_string()],
            price: Price::new(Decimal::new(50, 0), CurrencyCode::USD),
            final_price: Some(Price::new(Decimal::new(40, 0), CurrencyCode::USD)),
            in_stock: true,
        }
    }

    #[test]
    fn test_cart_item_uses_display_price_and_variant_key() {
        let item = cart_item_for(&product(), Some("red"), Some("M"), Quantity::ONE).unwrap();

        assert_eq!(item.key.variant_id.as_str(), "Red/M");
        assert_eq!(item.color.as_deref(), Some("Red"));
        assert_eq!(item.unit_price.amount, Decimal::new(40, 0));
        assert_eq!(item.image.as_deref(), Some("https://res.cloudinary.com/shirt.jpg"));
    }

    #[test]
    fn test_missing_or_unknown_option_rejected() {
        let err = cart_item_for(&product(), None, Some("M"), Quantity::ONE).unwrap_err();
        assert_eq!(err.classify().message(), "Please choose a color.");

        let err = cart_item_for(&product(), Some("Green"), Some("M"), Quantity::ONE).unwrap_err();
        assert_eq!(err.classify().message(), "Green is not an available color.");
    }

    #[test]
    fn test_out_of_stock_rejected() {
        let mut sold_out = product();
        sold_out.in_stock = false;
        let err = cart_item_for(&sold_out, Some("Red"), Some("M"), Quantity::ONE).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_optionless_product() {
        let mut plain = product();
        plain.colors.clear();
        plain.sizes.clear();
        let item = cart_item_for(&plain, None, None, Quantity::new(2).unwrap()).unwrap();
        assert_eq!(item.key.variant_id.as_str(), "-/-");
        assert!(item.color.is_none());
    }
}
