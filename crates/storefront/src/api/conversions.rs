//! Conversions from wire types into `atelier-core` types.

use atelier_core::{
    CartItem, CartKey, CurrencyCode, Order, OrderId, OrderLine, Price, Product, ProductId,
    ProductImage, ProductPage, Quantity, ShippingAddress, VariantId,
};
use rust_decimal::Decimal;
use tracing::warn;

use super::ApiError;
use super::types::{
    CartResponse, ProductListResponse, WireAddress, WireCartItem, WireOrder, WireOrderLine,
    WireProduct,
};

/// Resolve the currency of a response, falling back to the configured one.
fn currency(raw: Option<&str>, default: CurrencyCode) -> Result<CurrencyCode, ApiError> {
    raw.map_or(Ok(default), |code| {
        code.parse::<CurrencyCode>()
            .map_err(ApiError::InvalidResponse)
    })
}

fn price(amount: Decimal, currency_code: CurrencyCode, field: &str) -> Result<Price, ApiError> {
    if amount.is_sign_negative() {
        return Err(ApiError::InvalidResponse(format!("negative {field}: {amount}")));
    }
    Ok(Price::new(amount, currency_code))
}

fn variant_key(
    product_id: &str,
    variant_id: Option<String>,
    color: Option<&str>,
    size: Option<&str>,
) -> CartKey {
    let product_id = ProductId::new(product_id);
    match variant_id.filter(|v| !v.is_empty()) {
        Some(variant) => CartKey::new(product_id, VariantId::new(variant)),
        None => CartKey::from_options(product_id, color, size),
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Convert the cart response into items.
///
/// Lines with a zero quantity are skipped: they cannot be represented and
/// the backend treats them as removed. Duplicate keys are left in place for
/// the store to merge.
pub fn convert_cart(
    cart: CartResponse,
    default_currency: CurrencyCode,
) -> Result<Vec<CartItem>, ApiError> {
    cart.items
        .into_iter()
        .filter_map(|line| convert_cart_item(line, default_currency).transpose())
        .collect()
}

fn convert_cart_item(
    line: WireCartItem,
    default_currency: CurrencyCode,
) -> Result<Option<CartItem>, ApiError> {
    let Ok(quantity) = Quantity::new(line.quantity) else {
        warn!(product_id = %line.product_id, "Skipping cart line with zero quantity");
        return Ok(None);
    };

    let currency_code = currency(line.currency.as_deref(), default_currency)?;
    let unit_price = price(line.price, currency_code, "cart line price")?;
    let key = variant_key(
        &line.product_id,
        line.variant_id,
        line.color.as_deref(),
        line.size.as_deref(),
    );

    Ok(Some(CartItem {
        key,
        title: line.title,
        image: line.image,
        color: line.color,
        size: line.size,
        unit_price,
        quantity,
    }))
}

// =============================================================================
// Products
// =============================================================================

pub fn convert_product(
    product: WireProduct,
    default_currency: CurrencyCode,
) -> Result<Product, ApiError> {
    let currency_code = currency(product.currency.as_deref(), default_currency)?;
    let list_price = price(product.price, currency_code, "product price")?;
    let final_price = product
        .final_price
        .map(|amount| price(amount, currency_code, "product final price"))
        .transpose()?;

    Ok(Product {
        id: ProductId::new(product.id),
        title: product.title,
        description: product.description,
        category: product.category,
        images: product
            .images
            .into_iter()
            .map(|image| ProductImage {
                url: image.url,
                alt_text: image.alt_text,
            })
            .collect(),
        colors: product.colors,
        sizes: product.sizes,
        price: list_price,
        final_price,
        in_stock: product.in_stock,
    })
}

pub fn convert_product_page(
    page: ProductListResponse,
    default_currency: CurrencyCode,
) -> Result<ProductPage, ApiError> {
    let products = page
        .products
        .into_iter()
        .map(|product| convert_product(product, default_currency))
        .collect::<Result<Vec<_>, _>>()?;
    let total = page.total.unwrap_or(products.len() as u64);

    Ok(ProductPage {
        products,
        page: page.page.max(1),
        total,
    })
}

// =============================================================================
// Orders
// =============================================================================

pub fn convert_address(address: WireAddress) -> ShippingAddress {
    ShippingAddress {
        full_name: address.full_name,
        phone: address.phone,
        line1: address.line1,
        line2: address.line2,
        city: address.city,
        state: address.state,
        postal_code: address.postal_code,
        country: address.country,
    }
}

pub fn address_to_wire(address: &ShippingAddress) -> WireAddress {
    WireAddress {
        full_name: address.full_name.trim().to_string(),
        phone: address.phone.trim().to_string(),
        line1: address.line1.trim().to_string(),
        line2: address
            .line2
            .as_deref()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from),
        city: address.city.trim().to_string(),
        state: address.state.trim().to_string(),
        postal_code: address.postal_code.trim().to_string(),
        country: address.country.trim().to_string(),
    }
}

pub fn convert_order(order: WireOrder, default_currency: CurrencyCode) -> Result<Order, ApiError> {
    let currency_code = currency(order.currency.as_deref(), default_currency)?;

    let lines = order
        .items
        .into_iter()
        .filter_map(|line| convert_order_line(line, currency_code).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Order {
        id: OrderId::new(order.id),
        status: order.status,
        payment_method: order.payment_method,
        lines,
        total: price(order.total, currency_code, "order total")?,
        shipping_address: convert_address(order.shipping_address),
        created_at: order.created_at,
    })
}

fn convert_order_line(
    line: WireOrderLine,
    currency_code: CurrencyCode,
) -> Result<Option<OrderLine>, ApiError> {
    let Ok(quantity) = Quantity::new(line.quantity) else {
        warn!(product_id = %line.product_id, "Skipping order line with zero quantity");
        return Ok(None);
    };
    let key = variant_key(
        &line.product_id,
        line.variant_id,
        line.color.as_deref(),
        line.size.as_deref(),
    );

    Ok(Some(OrderLine {
        product_id: key.product_id,
        variant_id: key.variant_id,
        title: line.title,
        quantity,
        unit_price: price(line.price, currency_code, "order line price")?,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn wire_item(product_id: &str, quantity: u32) -> WireCartItem {
        WireCartItem {
            product_id: product_id.to_string(),
            variant_id: None,
            title: "Tee".to_string(),
            image: None,
            color: Some("red".to_string()),
            size: Some("M".to_string()),
            price: Decimal::new(1000, 2),
            currency: None,
            quantity,
        }
    }

    #[test]
    fn test_convert_cart_derives_variant_and_skips_zero() {
        let cart = CartResponse {
            items: vec![wire_item("p1", 2), wire_item("p2", 0)],
        };

        let items = convert_cart(cart, CurrencyCode::EUR).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key.variant_id.as_str(), "red/M");
        assert_eq!(items[0].quantity.get(), 2);
        assert_eq!(items[0].unit_price.currency_code, CurrencyCode::EUR);
    }

    #[test]
    fn test_convert_cart_keeps_backend_variant_id() {
        let mut line = wire_item("p1", 1);
        line.variant_id = Some("sku-42".to_string());
        let items = convert_cart(CartResponse { items: vec![line] }, CurrencyCode::USD).unwrap();
        assert_eq!(items[0].key.variant_id.as_str(), "sku-42");
    }

    #[test]
    fn test_convert_cart_rejects_bad_currency_and_negative_price() {
        let mut line = wire_item("p1", 1);
        line.currency = Some("DOGE".to_string());
        assert!(matches!(
            convert_cart(CartResponse { items: vec![line] }, CurrencyCode::USD),
            Err(ApiError::InvalidResponse(_))
        ));

        let mut line = wire_item("p1", 1);
        line.price = Decimal::new(-1, 0);
        assert!(matches!(
            convert_cart(CartResponse { items: vec![line] }, CurrencyCode::USD),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_convert_product_page_defaults_total() {
        let json = r#"{"products":[
            {"id":"p1","title":"Shirt","price":"40.00","finalPrice":"30.00","currency":"INR"}
        ]}"#;
        let page: ProductListResponse = serde_json::from_str(json).unwrap();
        let page = convert_product_page(page, CurrencyCode::USD).unwrap();

        assert_eq!(page.page, 1);
        assert_eq!(page.total, 1);
        let product = &page.products[0];
        assert!(product.in_stock);
        assert!(product.is_on_sale());
        assert_eq!(product.display_price().display(), "₹30.00");
    }

    #[test]
    fn test_address_to_wire_trims() {
        let address = ShippingAddress {
            full_name: " Ada Lovelace ".to_string(),
            line2: Some("   ".to_string()),
            ..ShippingAddress::default()
        };
        let wire = address_to_wire(&address);
        assert_eq!(wire.full_name, "Ada Lovelace");
        assert!(wire.line2.is_none());
    }
}
