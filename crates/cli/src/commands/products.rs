//! Catalog browsing commands.
//!
//! # Usage
//!
//! ```bash
//! atelier products list --category shirts --limit 10
//! atelier products list --search linen
//! atelier products show prod_123
//! ```

use atelier_core::ProductId;
use atelier_storefront::api::ProductQuery;
use atelier_storefront::services::auth::HeadlessProvider;
use atelier_storefront::views::ProductCardView;
use atelier_storefront::{ClientConfig, Session};

use super::CommandError;

/// List one page of products.
///
/// # Errors
///
/// Returns an error if the backend request fails.
pub async fn list(
    config: ClientConfig,
    page: u32,
    limit: u32,
    category: Option<String>,
    search: Option<String>,
) -> Result<(), CommandError> {
    let session = Session::start(config, HeadlessProvider)?;
    let query = ProductQuery {
        page: page.max(1),
        per_page: limit.clamp(1, 100),
        category,
        search,
    };

    let page = session.products(&query).await?;
    if page.products.is_empty() {
        tracing::info!("No products found");
    }
    for product in &page.products {
        let card = ProductCardView::build(product, session.images());
        tracing::info!("{}", card_line(&card));
    }
    if page.has_next_page(query.per_page) {
        tracing::info!(
            "Showing page {} of {} products; next: --page {}",
            page.page,
            page.total,
            page.page.saturating_add(1)
        );
    }

    session.end().await;
    Ok(())
}

/// Show one product with its options.
///
/// # Errors
///
/// Returns an error if the product doesn't exist or the request fails.
pub async fn show(config: ClientConfig, id: &str) -> Result<(), CommandError> {
    let session = Session::start(config, HeadlessProvider)?;
    let product = session.product(&ProductId::new(id)).await?;
    let card = ProductCardView::build(&product, session.images());

    tracing::info!("{}", card_line(&card));
    if let Some(category) = &card.category {
        tracing::info!("  Category: {category}");
    }
    if !card.colors.is_empty() {
        tracing::info!("  Colors: {}", card.colors.join(", "));
    }
    if !card.sizes.is_empty() {
        tracing::info!("  Sizes: {}", card.sizes.join(", "));
    }
    if let Some(image) = &card.image {
        tracing::info!("  Image: {}", image.url);
    }
    if !product.description.is_empty() {
        tracing::info!("  {}", product.description);
    }

    session.end().await;
    Ok(())
}

fn card_line(card: &ProductCardView) -> String {
    let mut line = format!("{}  {}  {}", card.id, card.title, card.price);
    if let Some(compare_at) = &card.compare_at_price {
        line.push_str(&format!(" (was {compare_at})"));
    }
    if !card.in_stock {
        line.push_str("  [sold out]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> ProductCardView {
        ProductCardView {
            id: "p1".to_string(),
            title: "Silk Scarf".to_string(),
            category: None,
            price: "$45.00".to_string(),
            compare_at_price: None,
            on_sale: false,
            in_stock: true,
            image: None,
            colors: vec![],
            sizes: vec![],
        }
    }

    #[test]
    fn test_card_line() {
        assert_eq!(card_line(&card()), "p1  Silk Scarf  $45.00");
    }

    #[test]
    fn test_card_line_sale_and_sold_out() {
        let mut card = card();
        card.compare_at_price = Some("$60.00".to_string());
        card.in_stock = false;
        assert_eq!(
            card_line(&card),
            "p1  Silk Scarf  $45.00 (was $60.00)  [sold out]"
        );
    }
}
