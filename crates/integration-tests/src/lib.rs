//! Integration tests for Atelier.
//!
//! Tests run the storefront client against [`FakeBackend`], an in-process
//! axum server speaking the backend's HTTP API. Nothing external is needed:
//!
//! ```bash
//! cargo test -p atelier-integration-tests
//! ```
//!
//! The fake keeps a product catalog, per-user carts, accounts and orders in
//! memory, records every request it receives, and can be told to fail the
//! next request to exercise error paths.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use atelier_storefront::ClientConfig;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

/// Password accepted for every seeded account.
pub const PASSWORD: &str = "correct horse battery";

/// One-time code the fake "emails" on registration.
pub const OTP: &str = "424242";

/// Identity token the fake's provider endpoint accepts.
pub const GOOGLE_ID_TOKEN: &str = "eyJhbGciOiJSUzI1NiJ9.valid.sig";

/// Service token sent by clients built with [`FakeBackend::config`].
pub const API_TOKEN: &str = "sk_test_Qm9fXr2LpW8zTn4v";

/// A request as the fake saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub api_token: Option<String>,
    pub idempotency_key: Option<String>,
}

/// A canned failure for the next matching request.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Only requests whose path starts with this prefix are failed.
    pub path_prefix: String,
    pub status: StatusCode,
    pub body: Value,
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone)]
struct CartLine {
    product_id: String,
    variant_id: String,
    color: Option<String>,
    size: Option<String>,
    quantity: u32,
}

#[derive(Debug, Clone)]
struct Account {
    id: String,
    email: String,
    name: String,
    verified: bool,
}

#[derive(Debug, Default)]
struct BackendState {
    products: Vec<Value>,
    accounts: Vec<Account>,
    sessions: HashMap<String, String>,
    carts: HashMap<String, Vec<CartLine>>,
    orders: HashMap<String, Value>,
    requests: Vec<RecordedRequest>,
    failures: Vec<Failure>,
    next_id: u64,
}

impl BackendState {
    fn product(&self, id: &str) -> Option<&Value> {
        self.products.iter().find(|p| p["id"] == id)
    }

    fn issue_session(&mut self, user_id: &str) -> String {
        self.next_id += 1;
        let token = format!("session-{}-{}", user_id, self.next_id);
        self.sessions.insert(token.clone(), user_id.to_string());
        token
    }

    fn auth_response(&mut self, account: &Account) -> Value {
        let token = self.issue_session(&account.id);
        json!({
            "token": token,
            "user": { "id": account.id, "email": account.email, "name": account.name }
        })
    }
}

type Shared = Arc<Mutex<BackendState>>;

fn lock(state: &Shared) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process fake of the storefront backend.
#[derive(Debug)]
pub struct FakeBackend {
    addr: SocketAddr,
    state: Shared,
}

impl FakeBackend {
    /// Start the fake on an ephemeral port with the seed catalog and one
    /// verified account, `ada@example.com`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener can't bind.
    pub async fn start() -> std::io::Result<Self> {
        let state: Shared = Arc::new(Mutex::new(BackendState {
            products: seed_products(),
            accounts: vec![Account {
                id: "user_ada".to_string(),
                email: "ada@example.com".to_string(),
                name: "Ada Lovelace".to_string(),
                verified: true,
            }],
            ..BackendState::default()
        }));

        let app = Router::new()
            .route("/api/cart", get(get_cart))
            .route(
                "/api/cart/items",
                post(add_item).patch(update_item).delete(remove_item),
            )
            .route("/api/products", get(list_products))
            .route("/api/products/{id}", get(get_product))
            .route("/api/orders", post(create_order))
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/verify-otp", post(verify_otp))
            .route("/api/auth/google", post(google))
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Fake backend stopped: {e}");
            }
        });

        Ok(Self { addr, state })
    }

    /// Base URL of the fake, with a trailing slash.
    #[must_use]
    pub fn url(&self) -> url::Url {
        let raw = format!("http://{}/", self.addr);
        url::Url::parse(&raw).unwrap_or_else(|_| unreachable!("socket address is a valid host"))
    }

    /// Client configuration pointing at the fake.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url());
        config.api_token = Some(API_TOKEN.into());
        config
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Number of requests received for exactly `path`.
    #[must_use]
    pub fn hits(&self, method: &Method, path: &str) -> usize {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Fail the next request under `failure.path_prefix`.
    pub fn fail_next(&self, failure: Failure) {
        lock(&self.state).failures.push(failure);
    }

    /// Convenience for [`fail_next`](Self::fail_next) with a JSON message body.
    pub fn fail_next_with(&self, path_prefix: &str, status: StatusCode, message: &str) {
        self.fail_next(Failure {
            path_prefix: path_prefix.to_string(),
            status,
            body: json!({ "message": message }),
            retry_after: None,
        });
    }

    /// Mark a seeded product as sold out.
    pub fn set_in_stock(&self, product_id: &str, in_stock: bool) {
        let mut state = lock(&self.state);
        if let Some(product) = state.products.iter_mut().find(|p| p["id"] == product_id) {
            product["inStock"] = json!(in_stock);
        }
    }

    /// Put a line straight into a user's cart, bypassing the API.
    pub fn seed_cart_line(&self, user_id: &str, product_id: &str, variant_id: &str, quantity: u32) {
        lock(&self.state)
            .carts
            .entry(user_id.to_string())
            .or_default()
            .push(CartLine {
                product_id: product_id.to_string(),
                variant_id: variant_id.to_string(),
                color: None,
                size: None,
                quantity,
            });
    }

    /// Total quantity in a user's cart on the backend.
    #[must_use]
    pub fn cart_quantity(&self, user_id: &str) -> u32 {
        lock(&self.state)
            .carts
            .get(user_id)
            .map_or(0, |lines| lines.iter().map(|l| l.quantity).sum())
    }

    /// Number of distinct orders placed.
    #[must_use]
    pub fn order_count(&self) -> usize {
        lock(&self.state).orders.len()
    }
}

// =============================================================================
// Middleware
// =============================================================================

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let headers = request.headers();
    let recorded = RecordedRequest {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(String::from),
        authorization: header(headers, "authorization"),
        api_token: header(headers, "x-api-token"),
        idempotency_key: header(headers, "idempotency-key"),
    };

    let failure = {
        let mut state = lock(&state);
        state.requests.push(recorded.clone());
        state
            .failures
            .iter()
            .position(|f| recorded.path.starts_with(&f.path_prefix))
            .map(|index| state.failures.remove(index))
    };

    match failure {
        Some(failure) => {
            let mut response = (failure.status, Json(failure.body)).into_response();
            if let Some(seconds) = failure.retry_after {
                response
                    .headers_mut()
                    .insert("retry-after", HeaderValue::from(seconds));
            }
            response
        }
        None => next.run(request).await,
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Resolve the bearer token to a user, or a 401 response.
fn authenticate(state: &BackendState, headers: &HeaderMap) -> Result<String, Response> {
    header(headers, "authorization")
        .and_then(|value| value.strip_prefix("Bearer ").map(String::from))
        .and_then(|token| state.sessions.get(&token).cloned())
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Please sign in."))
}

// =============================================================================
// Cart
// =============================================================================

fn cart_json(state: &BackendState, user_id: &str) -> Value {
    let items: Vec<Value> = state
        .carts
        .get(user_id)
        .into_iter()
        .flatten()
        .map(|line| {
            let product = state.product(&line.product_id).cloned().unwrap_or(Value::Null);
            let price = if product["finalPrice"].is_null() {
                product["price"].clone()
            } else {
                product["finalPrice"].clone()
            };
            json!({
                "productId": line.product_id,
                "variantId": line.variant_id,
                "title": product["title"],
                "image": product["images"][0]["url"],
                "color": line.color,
                "size": line.size,
                "price": price,
                "quantity": line.quantity,
            })
        })
        .collect();
    json!({ "items": items })
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    match authenticate(&state, &headers) {
        Ok(user) => Json(cart_json(&state, &user)).into_response(),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartItemBody {
    product_id: String,
    variant_id: String,
    #[serde(default)]
    quantity: u32,
    color: Option<String>,
    size: Option<String>,
}

async fn add_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CartItemBody>,
) -> Response {
    let mut state = lock(&state);
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Some(product) = state.product(&body.product_id) else {
        return error(StatusCode::NOT_FOUND, "Product not found");
    };
    if product["inStock"] == false {
        return error(StatusCode::CONFLICT, "This item is out of stock.");
    }
    if body.quantity == 0 {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Quantity must be positive.");
    }

    let lines = state.carts.entry(user).or_default();
    if let Some(line) = lines
        .iter_mut()
        .find(|l| l.product_id == body.product_id && l.variant_id == body.variant_id)
    {
        line.quantity = line.quantity.saturating_add(body.quantity);
    } else {
        lines.push(CartLine {
            product_id: body.product_id,
            variant_id: body.variant_id,
            color: body.color,
            size: body.size,
            quantity: body.quantity,
        });
    }
    Json(json!({ "ok": true })).into_response()
}

async fn update_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CartItemBody>,
) -> Response {
    let mut state = lock(&state);
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let line = state.carts.entry(user).or_default().iter_mut().find(|l| {
        l.product_id == body.product_id && l.variant_id == body.variant_id
    });
    match line {
        Some(line) => {
            line.quantity = body.quantity;
            Json(json!({ "ok": true })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "Item not in cart"),
    }
}

async fn remove_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CartItemBody>,
) -> Response {
    let mut state = lock(&state);
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    state
        .carts
        .entry(user)
        .or_default()
        .retain(|l| !(l.product_id == body.product_id && l.variant_id == body.variant_id));
    Json(json!({ "ok": true })).into_response()
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<usize>,
    limit: Option<usize>,
    category: Option<String>,
    search: Option<String>,
}

async fn list_products(State(state): State<Shared>, Query(params): Query<ListParams>) -> Response {
    let state = lock(&state);
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).max(1);

    let matching: Vec<&Value> = state
        .products
        .iter()
        .filter(|p| {
            params
                .category
                .as_deref()
                .is_none_or(|category| p["category"] == category)
        })
        .filter(|p| {
            params.search.as_deref().is_none_or(|search| {
                p["title"]
                    .as_str()
                    .is_some_and(|title| title.to_lowercase().contains(&search.to_lowercase()))
            })
        })
        .collect();

    let products: Vec<&Value> = matching
        .iter()
        .skip((page - 1) * limit)
        .take(limit)
        .copied()
        .collect();
    Json(json!({ "products": products, "page": page, "total": matching.len() })).into_response()
}

async fn get_product(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let state = lock(&state);
    match state.product(&id) {
        Some(product) => Json(json!({ "product": product })).into_response(),
        None => error(StatusCode::NOT_FOUND, "Product not found"),
    }
}

// =============================================================================
// Orders
// =============================================================================

async fn create_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Some(key) = header(&headers, "idempotency-key") else {
        return error(StatusCode::BAD_REQUEST, "Missing Idempotency-Key header.");
    };
    if let Some(order) = state.orders.get(&key) {
        return Json(json!({ "order": order })).into_response();
    }

    let cart = cart_json(&state, &user);
    let Some(lines) = cart["items"].as_array().filter(|items| !items.is_empty()) else {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Your cart is empty.");
    };

    let mut total_cents: i64 = 0;
    for line in lines {
        let price = line["price"].as_str().unwrap_or("0");
        let cents = price.replace('.', "").parse::<i64>().unwrap_or(0);
        total_cents += cents * line["quantity"].as_i64().unwrap_or(0);
    }

    state.next_id += 1;
    let order = json!({
        "id": format!("order_{}", state.next_id),
        "status": "pending",
        "paymentMethod": body["paymentMethod"],
        "items": lines,
        "total": format!("{}.{:02}", total_cents / 100, total_cents % 100),
        "shippingAddress": body["shippingAddress"],
        "createdAt": "2026-03-14T09:26:53Z",
    });
    state.orders.insert(key, order.clone());
    state.carts.remove(&user);

    (StatusCode::CREATED, Json(json!({ "order": order }))).into_response()
}

// =============================================================================
// Auth
// =============================================================================

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    let account = state
        .accounts
        .iter()
        .find(|a| a.verified && body["email"] == a.email.as_str())
        .cloned();
    match account {
        Some(account) if body["password"] == PASSWORD => {
            Json(state.auth_response(&account)).into_response()
        }
        _ => error(StatusCode::UNAUTHORIZED, "Invalid email or password."),
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if state.accounts.iter().any(|a| a.email == email) {
        return error(StatusCode::CONFLICT, "An account with this email already exists.");
    }

    state.next_id += 1;
    let account = Account {
        id: format!("user_{}", state.next_id),
        email,
        name: body["name"].as_str().unwrap_or_default().to_string(),
        verified: false,
    };
    state.accounts.push(account);
    Json(json!({ "message": "We sent a verification code to your email." })).into_response()
}

async fn verify_otp(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    if body["otp"] != OTP {
        return error(StatusCode::BAD_REQUEST, "Invalid or expired code.");
    }
    let Some(account) = state
        .accounts
        .iter_mut()
        .find(|a| body["email"] == a.email.as_str())
    else {
        return error(StatusCode::NOT_FOUND, "Account not found");
    };
    account.verified = true;
    let account = account.clone();
    Json(state.auth_response(&account)).into_response()
}

async fn google(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    if body["idToken"] != GOOGLE_ID_TOKEN {
        return error(StatusCode::UNAUTHORIZED, "Invalid identity token.");
    }
    let account = Account {
        id: "user_google".to_string(),
        email: "grace@example.com".to_string(),
        name: "Grace Hopper".to_string(),
        verified: true,
    };
    Json(state.auth_response(&account)).into_response()
}

// =============================================================================
// Seed Data
// =============================================================================

fn seed_products() -> Vec<Value> {
    vec![
        json!({
            "id": "linen-shirt",
            "title": "Linen Shirt",
            "description": "Breathable linen, relaxed fit.",
            "category": "shirts",
            "images": [{ "url": "https://res.cloudinary.com/atelier/linen-shirt.jpg", "altText": "Linen shirt" }],
            "colors": ["Red", "Blue"],
            "sizes": ["S", "M", "L"],
            "price": "49.00",
            "finalPrice": "39.00",
            "inStock": true,
        }),
        json!({
            "id": "oxford-shirt",
            "title": "Oxford Shirt",
            "category": "shirts",
            "images": [{ "url": "https://tracker.example.net/oxford.jpg" }],
            "colors": ["White"],
            "sizes": ["M"],
            "price": "59.00",
            "inStock": true,
        }),
        json!({
            "id": "canvas-tote",
            "title": "Canvas Tote",
            "category": "accessories",
            "images": [],
            "price": "25.00",
            "inStock": true,
        }),
    ]
}
