//! Request and response bodies as the backend sends them.
//!
//! These mirror the JSON wire format (camelCase, loose optionals). They are
//! converted into `atelier-core` types before leaving the `api` module.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Cart
// =============================================================================

/// `GET api/cart` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub items: Vec<WireCartItem>,
}

/// A cart line as the backend reports it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCartItem {
    pub product_id: String,
    /// Absent on backends that key variants by color and size only.
    pub variant_id: Option<String>,
    pub title: String,
    pub image: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Unit price, already promotional if a promotion applies.
    pub price: Decimal,
    pub currency: Option<String>,
    pub quantity: u32,
}

/// `POST api/cart/items` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest<'a> {
    pub product_id: &'a str,
    pub variant_id: &'a str,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<&'a str>,
}

/// `PATCH api/cart/items` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest<'a> {
    pub product_id: &'a str,
    pub variant_id: &'a str,
    pub quantity: u32,
}

/// `DELETE api/cart/items` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCartItemRequest<'a> {
    pub product_id: &'a str,
    pub variant_id: &'a str,
}

// =============================================================================
// Products
// =============================================================================

/// `GET api/products` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductListResponse {
    #[serde(default)]
    pub products: Vec<WireProduct>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub total: Option<u64>,
}

const fn first_page() -> u32 {
    1
}

/// `GET api/products/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductResponse {
    pub product: WireProduct,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProduct {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    #[serde(default)]
    pub images: Vec<WireImage>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    pub price: Decimal,
    pub final_price: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(default = "in_stock_default")]
    pub in_stock: bool,
}

const fn in_stock_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireImage {
    pub url: String,
    pub alt_text: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// `POST api/orders` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest<'a> {
    pub items: Vec<OrderItemRequest<'a>>,
    pub shipping_address: WireAddress,
    pub payment_method: atelier_core::PaymentMethod,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest<'a> {
    pub product_id: &'a str,
    pub variant_id: &'a str,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// `POST api/orders` response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub order: WireOrder,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOrder {
    pub id: String,
    #[serde(default)]
    pub status: atelier_core::OrderStatus,
    #[serde(default)]
    pub payment_method: atelier_core::PaymentMethod,
    #[serde(default)]
    pub items: Vec<WireOrderLine>,
    pub total: Decimal,
    pub currency: Option<String>,
    pub shipping_address: WireAddress,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOrderLine {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub title: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

/// `POST api/auth/google` body: the provider identity token to verify.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityTokenRequest<'a> {
    pub id_token: &'a str,
}

/// Response of the endpoints that start a session.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: WireUser,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Response of endpoints that only acknowledge (register sends an OTP).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Error body shape. Backends use either `message` or `error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorBody {
    /// The user-facing message, if the backend sent one.
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .map(|msg| msg.trim().to_string())
            .filter(|msg| !msg.is_empty())
    }
}
