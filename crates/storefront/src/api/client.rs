use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use atelier_core::{
    CartItem, CurrencyCode, Email, Order, PaymentMethod, Product, ProductId, ProductPage,
    ShippingAddress, SubjectId,
};
use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::ApiError;
use super::cache::{CacheKey, CacheValue};
use super::conversions::{
    address_to_wire, convert_cart, convert_order, convert_product, convert_product_page,
};
use super::types::{
    AddCartItemRequest, AuthResponse, CartResponse, CreateOrderRequest, ErrorBody,
    IdentityTokenRequest, LoginRequest, MessageResponse, OrderItemRequest, OrderResponse,
    ProductListResponse, ProductResponse, RegisterRequest, RemoveCartItemRequest,
    UpdateCartItemRequest, VerifyOtpRequest,
};
use crate::config::ClientConfig;
use crate::sync::{CartMutation, CartSource};

const MAX_LOGGED_BODY: usize = 500;

/// Parameters for a product listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    pub category: Option<String>,
    /// Free-text search. Search results are never cached.
    pub search: Option<String>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
            category: None,
            search: None,
        }
    }
}

/// A backend session obtained from one of the auth endpoints.
#[derive(Debug, Clone)]
pub struct BackendSession {
    /// Bearer token for subsequent requests.
    pub token: SecretString,
    pub user: BackendUser,
}

/// The user record returned alongside a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendUser {
    pub id: SubjectId,
    pub email: Option<Email>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront backend.
///
/// Cheap to clone; clones share the HTTP connection pool, the session token
/// and the product cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<SecretString>,
    session_token: RwLock<Option<SecretString>>,
    cache: Cache<CacheKey, CacheValue>,
    currency: CurrencyCode,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("signed_in", &self.has_session())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialization failure).
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("atelier-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(config.cache.capacity)
            .time_to_live(config.cache.ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                api_token: config.api_token.clone(),
                session_token: RwLock::new(None),
                cache,
                currency: config.currency,
            }),
        })
    }

    /// Currency used for responses that don't name one.
    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.currency
    }

    // =========================================================================
    // Session Token
    // =========================================================================

    /// Attach `token` as the bearer token of every subsequent request.
    pub fn set_session_token(&self, token: SecretString) {
        *self
            .inner
            .session_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Stop sending a bearer token.
    pub fn clear_session_token(&self) {
        *self
            .inner
            .session_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.inner
            .session_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    // =========================================================================
    // Request Plumbing
    // =========================================================================

    /// Build the URL for `segments` under the base URL.
    ///
    /// Segments are percent-encoded, so IDs can't escape their position.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut request = self.inner.client.request(method, self.endpoint(segments));

        if let Some(token) = &self.inner.api_token {
            request = request.header("X-Api-Token", token.expose_secret());
        }

        let session = self
            .inner
            .session_token
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = session.as_ref() {
            request = request.bearer_auth(token.expose_secret());
        }

        request
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let path = response.url().path().to_string();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(1);
            warn!(path = %path, retry_after, "Backend rate limited request");
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &path, body));
        }

        Ok(body)
    }

    /// Send a request and parse the JSON body of a successful response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.execute(request).await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Fetch the authoritative cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Result<Vec<CartItem>, ApiError> {
        let cart: CartResponse = self.send(self.request(Method::GET, &["api", "cart"])).await?;
        convert_cart(cart, self.inner.currency)
    }

    /// Send one cart mutation. The response body is not used; callers
    /// re-fetch the cart to reconcile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip(self), fields(product_id = %mutation.key().product_id))]
    pub async fn mutate_cart(&self, mutation: &CartMutation) -> Result<(), ApiError> {
        let segments = ["api", "cart", "items"];
        let request = match mutation {
            CartMutation::Add {
                key,
                quantity,
                color,
                size,
            } => self
                .request(Method::POST, &segments)
                .json(&AddCartItemRequest {
                    product_id: key.product_id.as_str(),
                    variant_id: key.variant_id.as_str(),
                    quantity: quantity.get(),
                    color: color.as_deref(),
                    size: size.as_deref(),
                }),
            CartMutation::UpdateQuantity { key, quantity } => self
                .request(Method::PATCH, &segments)
                .json(&UpdateCartItemRequest {
                    product_id: key.product_id.as_str(),
                    variant_id: key.variant_id.as_str(),
                    quantity: quantity.get(),
                }),
            CartMutation::Remove { key } => {
                self.request(Method::DELETE, &segments)
                    .json(&RemoveCartItemRequest {
                        product_id: key.product_id.as_str(),
                        variant_id: key.variant_id.as_str(),
                    })
            }
        };

        self.execute(request).await?;
        Ok(())
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get a page of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let cache_key = CacheKey::Products {
            page: query.page,
            per_page: query.per_page,
            category: query.category.clone(),
        };

        // Check cache (only for listings without search)
        if search.is_none()
            && let Some(CacheValue::Products(page)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let mut params: Vec<(&str, String)> = vec![
            ("page", query.page.max(1).to_string()),
            ("limit", query.per_page.to_string()),
        ];
        if let Some(category) = &query.category {
            params.push(("category", category.clone()));
        }
        if let Some(search) = search {
            params.push(("search", search.to_string()));
        }

        let response: ProductListResponse = self
            .send(self.request(Method::GET, &["api", "products"]).query(&params))
            .await?;
        let page = convert_product_page(response, self.inner.currency)?;

        if search.is_none() {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(id.clone());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let response: ProductResponse = self
            .send(self.request(Method::GET, &["api", "products", id.as_str()]))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::NotFound(format!("Product not found: {id}")),
                other => other,
            })?;
        let product = convert_product(response.product, self.inner.currency)?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    // =========================================================================
    // Order Methods
    // =========================================================================

    /// Place an order for `items`.
    ///
    /// Each call carries a fresh `Idempotency-Key`, so a retried request
    /// that the backend already processed is not charged twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects the order.
    #[instrument(skip(self, items, address), fields(lines = items.len()))]
    pub async fn create_order(
        &self,
        items: &[CartItem],
        address: &ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<Order, ApiError> {
        let body = CreateOrderRequest {
            items: items
                .iter()
                .map(|item| OrderItemRequest {
                    product_id: item.key.product_id.as_str(),
                    variant_id: item.key.variant_id.as_str(),
                    quantity: item.quantity.get(),
                    color: item.color.as_deref(),
                    size: item.size.as_deref(),
                })
                .collect(),
            shipping_address: address_to_wire(address),
            payment_method,
        };

        let response: OrderResponse = self
            .send(
                self.request(Method::POST, &["api", "orders"])
                    .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
                    .json(&body),
            )
            .await?;

        convert_order(response.order, self.inner.currency)
    }

    // =========================================================================
    // Auth Methods
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<BackendSession, ApiError> {
        let response: AuthResponse = self
            .send(
                self.request(Method::POST, &["api", "auth", "login"])
                    .json(&LoginRequest {
                        email: email.as_str(),
                        password: password.expose_secret(),
                    }),
            )
            .await?;
        Ok(backend_session(response))
    }

    /// Create an account. The backend emails a one-time code to verify.
    ///
    /// # Errors
    ///
    /// Returns an error if registration is rejected or the request fails.
    #[instrument(skip(self, name, password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<String, ApiError> {
        let response: MessageResponse = self
            .send(
                self.request(Method::POST, &["api", "auth", "register"])
                    .json(&RegisterRequest {
                        name: name.trim(),
                        email: email.as_str(),
                        password: password.expose_secret(),
                    }),
            )
            .await?;
        Ok(response.message)
    }

    /// Exchange a one-time code for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is rejected or the request fails.
    #[instrument(skip(self, otp), fields(email = %email))]
    pub async fn verify_otp(&self, email: &Email, otp: &str) -> Result<BackendSession, ApiError> {
        let response: AuthResponse = self
            .send(
                self.request(Method::POST, &["api", "auth", "verify-otp"])
                    .json(&VerifyOtpRequest {
                        email: email.as_str(),
                        otp: otp.trim(),
                    }),
            )
            .await?;
        Ok(backend_session(response))
    }

    /// Forward an identity provider token for verification and get a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the token or the request fails.
    #[instrument(skip(self, id_token))]
    pub async fn exchange_identity_token(
        &self,
        id_token: &SecretString,
    ) -> Result<BackendSession, ApiError> {
        let response: AuthResponse = self
            .send(
                self.request(Method::POST, &["api", "auth", "google"])
                    .json(&IdentityTokenRequest {
                        id_token: id_token.expose_secret(),
                    }),
            )
            .await?;
        Ok(backend_session(response))
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Invalidate a cached product.
    pub async fn invalidate_product(&self, id: &ProductId) {
        self.inner
            .cache
            .invalidate(&CacheKey::Product(id.clone()))
            .await;
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl CartSource for ApiClient {
    async fn fetch_cart(&self) -> Result<Vec<CartItem>, ApiError> {
        self.get_cart().await
    }

    async fn apply_mutation(&self, mutation: &CartMutation) -> Result<(), ApiError> {
        self.mutate_cart(mutation).await
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a non-success status to an error.
fn status_error(status: StatusCode, path: &str, body: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!(status = %status, path = %path, "Backend refused credentials");
            ApiError::Unauthorized
        }
        StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| "The request was rejected.".to_string());
            warn!(status = %status, path = %path, message = %message, "Backend rejected request");
            ApiError::Rejected(message)
        }
        _ => {
            tracing::error!(
                status = %status,
                path = %path,
                body = %truncate(&body),
                "Backend returned non-success status"
            );
            ApiError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            }
        }
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_LOGGED_BODY).collect()
}

fn backend_session(response: AuthResponse) -> BackendSession {
    let email = response.user.email.and_then(|raw| {
        Email::parse(&raw)
            .inspect_err(|e| warn!(error = %e, "Backend returned an invalid user email"))
            .ok()
    });

    BackendSession {
        token: SecretString::from(response.token),
        user: BackendUser {
            id: SubjectId::new(response.user.id),
            email,
            name: response.user.name,
            avatar_url: response.user.avatar_url,
        },
    }
}
