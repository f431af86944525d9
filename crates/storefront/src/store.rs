//! Session-owned holder of the cart state.
//!
//! Built on a `tokio::sync::watch` channel: every write replaces the state
//! atomically, readers take consistent snapshots, and subscribers are woken
//! after each change.

use std::sync::Arc;

use atelier_core::{CartAction, CartState, CurrencyCode};
use tokio::sync::watch;

/// The cart store.
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone)]
pub struct CartStore {
    tx: Arc<watch::Sender<CartState>>,
}

impl CartStore {
    /// An empty cart priced in `currency`.
    #[must_use]
    pub fn new(currency: CurrencyCode) -> Self {
        let (tx, _rx) = watch::channel(CartState::new(currency));
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.tx.borrow().clone()
    }

    /// Apply `action` and notify subscribers.
    pub fn dispatch(&self, action: CartAction) {
        self.tx.send_modify(|state| state.apply(action));
    }

    /// Apply the actions produced by `update` atomically, if any.
    ///
    /// `update` runs while the store is locked, so a decision it makes from
    /// outside state (such as a request ticket) can't race another write.
    /// Subscribers are notified only when it returns actions. Returns
    /// whether anything was applied.
    pub fn dispatch_if<F>(&self, update: F) -> bool
    where
        F: FnOnce(&CartState) -> Option<Vec<CartAction>>,
    {
        self.tx.send_if_modified(|state| match update(state) {
            Some(actions) => {
                for action in actions {
                    state.apply(action);
                }
                true
            }
            None => false,
        })
    }

    /// Receiver that observes every subsequent change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.tx.subscribe()
    }

    /// Return to an empty cart, keeping the currency.
    pub fn reset(&self) {
        self.tx.send_modify(|state| *state = CartState::new(state.currency()));
    }
}
