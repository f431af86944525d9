//! Catalog reference data.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// A product image hosted on a remote CDN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    /// Absolute image URL.
    pub url: String,
    /// Alt text for accessibility.
    pub alt_text: Option<String>,
}

/// A catalog product as supplied by the backend.
///
/// Read-only on the client. `final_price` is the backend's promotional
/// price; the client picks it for display but never computes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Product title.
    pub title: String,
    /// Plain text description.
    pub description: String,
    /// Category name, if any.
    pub category: Option<String>,
    /// Images, first one is the featured image.
    pub images: Vec<ProductImage>,
    /// Available color options.
    pub colors: Vec<String>,
    /// Available size options.
    pub sizes: Vec<String>,
    /// List price.
    pub price: Price,
    /// Promotional price set by the backend.
    pub final_price: Option<Price>,
    /// Whether any variant can be bought.
    pub in_stock: bool,
}

impl Product {
    /// Price to show and charge: the promotional price when present.
    #[must_use]
    pub fn display_price(&self) -> Price {
        self.final_price.unwrap_or(self.price)
    }

    /// Whether the backend set a promotional price below the list price.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.final_price.is_some_and(|final_price| {
            final_price.currency_code == self.price.currency_code
                && final_price.amount < self.price.amount
        })
    }

    /// The featured image, if the product has any images.
    #[must_use]
    pub fn featured_image(&self) -> Option<&ProductImage> {
        self.images.first()
    }
}

/// A page of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPage {
    /// Products in this page.
    pub products: Vec<Product>,
    /// 1-based page number.
    pub page: u32,
    /// Total number of products matching the query.
    pub total: u64,
}

impl ProductPage {
    /// Whether more pages follow this one for the given page size.
    #[must_use]
    pub fn has_next_page(&self, per_page: u32) -> bool {
        u64::from(self.page) * u64::from(per_page) < self.total
    }
}
