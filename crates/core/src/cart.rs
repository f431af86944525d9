//! Client-side cart state and its pure transitions.
//!
//! [`CartState`] is the one piece of client state with consistency rules:
//!
//! - at most one [`CartItem`] per [`CartKey`] (duplicates are merged by
//!   summing quantities into the first occurrence)
//! - every quantity is at least 1 (enforced by [`Quantity`])
//! - the [`CartSummary`] is recomputed from the items after every
//!   transition and cannot be set on its own
//!
//! Transitions are expressed as [`CartAction`] values and applied with
//! [`CartState::reduce`], which is pure and total.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StorefrontError;
use crate::types::{CurrencyCode, Price, ProductId, Quantity, VariantId};

/// Identity of a purchasable variant: product plus color/size combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub product_id: ProductId,
    pub variant_id: VariantId,
}

impl CartKey {
    #[must_use]
    pub const fn new(product_id: ProductId, variant_id: VariantId) -> Self {
        Self {
            product_id,
            variant_id,
        }
    }

    /// Build a key for backends that identify variants only by their options.
    ///
    /// Missing options become `-` so `(red, none)` and `(none, red)` differ.
    #[must_use]
    pub fn from_options(product_id: ProductId, color: Option<&str>, size: Option<&str>) -> Self {
        let variant = format!("{}/{}", color.unwrap_or("-"), size.unwrap_or("-"));
        Self::new(product_id, VariantId::new(variant))
    }
}

/// A variant in the cart with its display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub key: CartKey,
    pub title: String,
    /// Image URL for the cart thumbnail.
    pub image: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub unit_price: Price,
    pub quantity: Quantity,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity.get())
    }

    /// Whether this line is `product_id` with the chosen options.
    ///
    /// Options compare case-insensitively against the line's stored options,
    /// not its key, and an option left out matches any value.
    #[must_use]
    pub fn matches_selection(
        &self,
        product_id: &ProductId,
        color: Option<&str>,
        size: Option<&str>,
    ) -> bool {
        fn option_matches(stored: Option<&str>, chosen: Option<&str>) -> bool {
            match chosen.map(str::trim).filter(|c| !c.is_empty()) {
                None => true,
                Some(chosen) => stored.is_some_and(|s| s.eq_ignore_ascii_case(chosen)),
            }
        }

        self.key.product_id == *product_id
            && option_matches(self.color.as_deref(), color)
            && option_matches(self.size.as_deref(), size)
    }
}

/// Totals derived from the cart items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    total_count: u64,
    total_price: Price,
    mixed_currencies: bool,
}

impl CartSummary {
    /// Compute the summary for `items`.
    ///
    /// Lines priced in a currency other than `currency` count toward
    /// `total_count` but not `total_price`, and set `has_mixed_currencies`.
    #[must_use]
    pub fn compute(items: &[CartItem], currency: CurrencyCode) -> Self {
        let mut total_count = 0_u64;
        let mut total_price = Price::zero(currency);
        let mut mixed_currencies = false;

        for item in items {
            total_count = total_count.saturating_add(u64::from(item.quantity.get()));
            let line = item.line_total();
            match total_price.checked_add(&line) {
                Some(sum) => total_price = sum,
                None if line.currency_code != currency => mixed_currencies = true,
                None => total_price = Price::new(Decimal::MAX, currency),
            }
        }

        Self {
            total_count,
            total_price,
            mixed_currencies,
        }
    }

    /// Sum of quantities.
    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Sum of unit price times quantity.
    #[must_use]
    pub const fn total_price(&self) -> Price {
        self.total_price
    }

    #[must_use]
    pub const fn has_mixed_currencies(&self) -> bool {
        self.mixed_currencies
    }
}

/// A transition of [`CartState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Replace all items (duplicates merged).
    SetItems(Vec<CartItem>),
    SetLoading(bool),
    SetError(Option<StorefrontError>),
    /// Add an item, merging into an existing line with the same key.
    AddItem(CartItem),
    /// Remove the line with this key. No-op when absent.
    RemoveItem(CartKey),
    /// Set the quantity of a line. No-op when absent.
    UpdateQuantity { key: CartKey, quantity: Quantity },
    /// Remove every item.
    Clear,
}

/// The cart as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    items: Vec<CartItem>,
    summary: CartSummary,
    loading: bool,
    error: Option<StorefrontError>,
    currency: CurrencyCode,
}

impl Default for CartState {
    fn default() -> Self {
        Self::new(CurrencyCode::default())
    }
}

impl CartState {
    /// An empty cart priced in `currency`.
    #[must_use]
    pub fn new(currency: CurrencyCode) -> Self {
        Self {
            items: Vec::new(),
            summary: CartSummary::compute(&[], currency),
            loading: false,
            error: None,
            currency,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub const fn summary(&self) -> &CartSummary {
        &self.summary
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub const fn error(&self) -> Option<&StorefrontError> {
        self.error.as_ref()
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &CartKey) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.key == key)
    }

    /// Apply `action` and return the resulting state.
    #[must_use]
    pub fn reduce(mut self, action: CartAction) -> Self {
        self.apply(action);
        self
    }

    /// Apply `action` in place.
    pub fn apply(&mut self, action: CartAction) {
        match action {
            CartAction::SetItems(items) => self.items = merge_duplicates(items),
            CartAction::SetLoading(loading) => self.loading = loading,
            CartAction::SetError(error) => self.error = error,
            CartAction::AddItem(item) => {
                if let Some(existing) = self.items.iter_mut().find(|i| i.key == item.key) {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                } else {
                    self.items.push(item);
                }
            }
            CartAction::RemoveItem(key) => self.items.retain(|item| item.key != key),
            CartAction::UpdateQuantity { key, quantity } => {
                if let Some(existing) = self.items.iter_mut().find(|i| i.key == key) {
                    existing.quantity = quantity;
                }
            }
            CartAction::Clear => self.items.clear(),
        }
        self.summary = CartSummary::compute(&self.items, self.currency);
    }
}

/// Collapse lines sharing a key into the first occurrence, summing quantities.
fn merge_duplicates(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut positions: HashMap<CartKey, usize> = HashMap::with_capacity(items.len());
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());

    for item in items {
        if let Some(existing) = positions.get(&item.key).and_then(|&pos| merged.get_mut(pos)) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            positions.insert(item.key.clone(), merged.len());
            merged.push(item);
        }
    }

    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: &str, qty: u32, price: i64) -> CartItem {
        CartItem {
            key: CartKey::new(ProductId::new(id), VariantId::new("default")),
            title: format!("Product {id}"),
            image: None,
            color: None,
            size: None,
            unit_price: Price::new(Decimal::new(price, 0), CurrencyCode::USD),
            quantity: Quantity::new(qty).unwrap(),
        }
    }

    fn key(id: &str) -> CartKey {
        CartKey::new(ProductId::new(id), VariantId::new("default"))
    }

    fn usd(amount: i64) -> Price {
        Price::new(Decimal::new(amount, 0), CurrencyCode::USD)
    }

    #[test]
    fn test_add_and_remove_scenario() {
        let state = CartState::default().reduce(CartAction::SetItems(vec![item("a", 2, 10)]));
        assert_eq!(state.summary().total_count(), 2);
        assert_eq!(state.summary().total_price(), usd(20));

        let state = state.reduce(CartAction::AddItem(item("b", 1, 5)));
        assert_eq!(state.summary().total_count(), 3);
        assert_eq!(state.summary().total_price(), usd(25));

        let state = state.reduce(CartAction::RemoveItem(key("a")));
        assert_eq!(state.summary().total_count(), 1);
        assert_eq!(state.summary().total_price(), usd(5));
    }

    #[test]
    fn test_summary_tracks_latest_set_items() {
        let lists = [
            vec![item("a", 1, 3), item("b", 4, 2)],
            vec![],
            vec![item("c", 7, 11)],
            vec![item("a", 2, 10), item("d", 3, 1), item("e", 1, 100)],
        ];

        let mut state = CartState::default();
        for list in lists {
            let expected_count: u64 = list.iter().map(|i| u64::from(i.quantity.get())).sum();
            let expected_total: Decimal = list
                .iter()
                .map(|i| i.unit_price.amount * Decimal::from(i.quantity.get()))
                .sum();

            state = state.reduce(CartAction::SetItems(list));
            assert_eq!(state.summary().total_count(), expected_count);
            assert_eq!(state.summary().total_price().amount, expected_total);
        }
    }

    #[test]
    fn test_set_items_merges_duplicate_keys() {
        let mut duplicate = item("a", 3, 99);
        duplicate.title = "Ignored title".to_string();

        let state = CartState::default().reduce(CartAction::SetItems(vec![
            item("a", 2, 10),
            item("b", 1, 5),
            duplicate,
        ]));

        assert_eq!(state.items().len(), 2);
        let merged = state.get(&key("a")).unwrap();
        assert_eq!(merged.quantity.get(), 5);
        assert_eq!(merged.title, "Product a");
        assert_eq!(merged.unit_price, usd(10));
        assert_eq!(state.items()[0].key, key("a"));
        assert_eq!(state.summary().total_count(), 6);
        assert_eq!(state.summary().total_price(), usd(55));
    }

    #[test]
    fn test_add_existing_key_merges() {
        let state = CartState::default()
            .reduce(CartAction::AddItem(item("a", 1, 10)))
            .reduce(CartAction::AddItem(item("a", 2, 10)));

        assert_eq!(state.items().len(), 1);
        assert_eq!(state.summary().total_count(), 3);
    }

    #[test]
    fn test_variants_of_same_product_are_distinct() {
        let red = CartKey::from_options(ProductId::new("shirt"), Some("red"), Some("M"));
        let blue = CartKey::from_options(ProductId::new("shirt"), Some("blue"), Some("M"));
        assert_ne!(red, blue);
        assert_eq!(red.variant_id.as_str(), "red/M");

        let mut a = item("shirt", 1, 10);
        a.key = red;
        let mut b = item("shirt", 1, 10);
        b.key = blue;

        let state = CartState::default().reduce(CartAction::SetItems(vec![a, b]));
        assert_eq!(state.items().len(), 2);
    }

    #[test]
    fn test_matches_selection_ignores_option_case() {
        let mut line = item("shirt", 1, 10);
        line.key = CartKey::from_options(ProductId::new("shirt"), Some("Red"), Some("M"));
        line.color = Some("Red".to_string());
        line.size = Some("M".to_string());
        let shirt = ProductId::new("shirt");

        assert!(line.matches_selection(&shirt, Some("red"), Some("m")));
        assert!(line.matches_selection(&shirt, None, Some("M")));
        assert!(!line.matches_selection(&shirt, Some("Blue"), Some("M")));
        assert!(!line.matches_selection(&ProductId::new("tote"), None, None));

        let plain = item("tote", 1, 25);
        assert!(plain.matches_selection(&ProductId::new("tote"), None, None));
        assert!(!plain.matches_selection(&ProductId::new("tote"), Some("Red"), None));
    }

    #[test]
    fn test_summary_saturates_on_overflow() {
        let mut huge = item("a", 2, 0);
        huge.unit_price = Price::new(Decimal::MAX, CurrencyCode::USD);
        let state = CartState::default().reduce(CartAction::SetItems(vec![huge, item("b", 1, 5)]));

        assert_eq!(state.summary().total_price().amount, Decimal::MAX);
        assert!(!state.summary().has_mixed_currencies());
    }

    #[test]
    fn test_update_quantity() {
        let state = CartState::default()
            .reduce(CartAction::SetItems(vec![item("a", 2, 10)]))
            .reduce(CartAction::UpdateQuantity {
                key: key("a"),
                quantity: Quantity::new(5).unwrap(),
            });
        assert_eq!(state.summary().total_price(), usd(50));
    }

    #[test]
    fn test_missing_key_is_noop() {
        let before = CartState::default().reduce(CartAction::SetItems(vec![item("a", 2, 10)]));
        let after = before
            .clone()
            .reduce(CartAction::RemoveItem(key("zzz")))
            .reduce(CartAction::UpdateQuantity {
                key: key("zzz"),
                quantity: Quantity::ONE,
            });
        assert_eq!(before, after);
    }

    #[test]
    fn test_loading_and_error_leave_items_alone() {
        let state = CartState::default()
            .reduce(CartAction::SetItems(vec![item("a", 2, 10)]))
            .reduce(CartAction::SetLoading(true))
            .reduce(CartAction::SetError(Some(StorefrontError::Network(
                "offline".to_string(),
            ))));

        assert!(state.is_loading());
        assert_eq!(state.error().map(StorefrontError::message), Some("offline"));
        assert_eq!(state.summary().total_count(), 2);

        let state = state.reduce(CartAction::SetError(None)).reduce(CartAction::Clear);
        assert!(state.error().is_none());
        assert!(state.is_empty());
        assert_eq!(state.summary().total_price(), usd(0));
    }

    #[test]
    fn test_mixed_currency_lines_flagged() {
        let mut euro = item("b", 1, 7);
        euro.unit_price = Price::new(Decimal::new(7, 0), CurrencyCode::EUR);

        let state = CartState::new(CurrencyCode::USD)
            .reduce(CartAction::SetItems(vec![item("a", 1, 10), euro]));

        assert!(state.summary().has_mixed_currencies());
        assert_eq!(state.summary().total_count(), 2);
        assert_eq!(state.summary().total_price(), usd(10));
    }
}
