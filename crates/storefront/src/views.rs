//! View models for presentation components.
//!
//! Renderers read these instead of store state: prices are pre-formatted,
//! images are already checked against the [`ImagePolicy`], and there is no
//! logic left for a template to get wrong.

use atelier_core::{CartItem, CartState, Product};

use crate::images::ImagePolicy;

/// Image display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub url: String,
    pub alt: String,
}

/// Cart line display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemView {
    pub product_id: String,
    pub variant_id: String,
    pub title: String,
    /// Selected options, e.g. "Red / M".
    pub variant_title: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<ImageView>,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
    pub loading: bool,
    /// Inline error message from the last failed sync.
    pub error: Option<String>,
    /// Some lines are priced in another currency and left out of the subtotal.
    pub mixed_currencies: bool,
}

impl CartView {
    #[must_use]
    pub fn build(state: &CartState, images: &ImagePolicy) -> Self {
        let summary = state.summary();
        Self {
            items: state
                .items()
                .iter()
                .map(|item| CartItemView::build(item, images))
                .collect(),
            subtotal: summary.total_price().display(),
            item_count: summary.total_count(),
            loading: state.is_loading(),
            error: state.error().map(|e| e.message().to_string()),
            mixed_currencies: summary.has_mixed_currencies(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CartItemView {
    #[must_use]
    pub fn build(item: &CartItem, images: &ImagePolicy) -> Self {
        let options: Vec<&str> = [item.color.as_deref(), item.size.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|option| !option.is_empty())
            .collect();

        Self {
            product_id: item.key.product_id.to_string(),
            variant_id: item.key.variant_id.to_string(),
            title: item.title.clone(),
            variant_title: (!options.is_empty()).then(|| options.join(" / ")),
            quantity: item.quantity.get(),
            price: item.unit_price.display(),
            line_price: item.line_total().display(),
            image: images.filter(item.image.as_deref()).map(|url| ImageView {
                url: url.to_string(),
                alt: item.title.clone(),
            }),
        }
    }
}

/// Product card display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCardView {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    /// Price to show: the promotional price when the backend set one.
    pub price: String,
    /// List price, shown struck through when on sale.
    pub compare_at_price: Option<String>,
    pub on_sale: bool,
    pub in_stock: bool,
    pub image: Option<ImageView>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
}

impl ProductCardView {
    #[must_use]
    pub fn build(product: &Product, images: &ImagePolicy) -> Self {
        let on_sale = product.is_on_sale();
        let image = product
            .images
            .iter()
            .find(|image| images.is_allowed(&image.url))
            .map(|image| ImageView {
                url: image.url.clone(),
                alt: image
                    .alt_text
                    .clone()
                    .unwrap_or_else(|| product.title.clone()),
            });

        Self {
            id: product.id.to_string(),
            title: product.title.clone(),
            category: product.category.clone(),
            price: product.display_price().display(),
            compare_at_price: on_sale.then(|| product.price.display()),
            on_sale,
            in_stock: product.in_stock,
            image,
            colors: product.colors.clone(),
            sizes: product.sizes.clone(),
        }
    }
}
