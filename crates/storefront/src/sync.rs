//! Cart synchronization: fetch the authoritative cart and reconcile it into
//! the store.
//!
//! # Ordering
//!
//! Every fetch takes a ticket from a monotonic counter. A response is
//! applied only if its ticket is still the latest issued one, and that check
//! runs inside the store write ([`CartStore::dispatch_if`]), so a newer
//! request either wins the check or is issued after the write lands. Stale
//! responses are dropped without touching items, `loading` or `error`.
//!
//! Local intents (add, remove, update quantity) are optimistic: they take a
//! ticket too, which invalidates every fetch still in flight, apply the
//! change to the store, send it to the backend and then re-fetch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use atelier_core::{CartAction, CartItem, CartKey, Quantity, StorefrontError};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::api::ApiError;
use crate::error::{add_breadcrumb, report_api_error};
use crate::store::CartStore;

/// A cart change to send to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartMutation {
    Add {
        key: CartKey,
        quantity: Quantity,
        color: Option<String>,
        size: Option<String>,
    },
    UpdateQuantity {
        key: CartKey,
        quantity: Quantity,
    },
    Remove {
        key: CartKey,
    },
}

impl CartMutation {
    /// The line this mutation targets.
    #[must_use]
    pub const fn key(&self) -> &CartKey {
        match self {
            Self::Add { key, .. } | Self::UpdateQuantity { key, .. } | Self::Remove { key } => key,
        }
    }

    const fn describe(&self) -> &'static str {
        match self {
            Self::Add { .. } => "Added item",
            Self::UpdateQuantity { .. } => "Updated quantity",
            Self::Remove { .. } => "Removed item",
        }
    }
}

/// Where the authoritative cart lives.
#[async_trait]
pub trait CartSource: Send + Sync {
    /// Fetch the full cart.
    async fn fetch_cart(&self) -> Result<Vec<CartItem>, ApiError>;

    /// Apply one change to the cart.
    async fn apply_mutation(&self, mutation: &CartMutation) -> Result<(), ApiError>;
}

/// What happened to a synchronization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The response was the latest and the store now reflects it.
    Applied,
    /// The request failed.
    ///
    /// The error is written to the store only when this request's own fetch
    /// is the latest. If a rejected intent's re-fetch is superseded, the
    /// store shows whatever the newer request produced and the rejection is
    /// reported to the caller alone.
    Failed(StorefrontError),
    /// A newer request was issued before this one completed; its response
    /// was discarded.
    Superseded,
}

/// Fetch-and-reconcile flow for one session's cart.
pub struct CartSync<S> {
    store: CartStore,
    source: S,
    latest: AtomicU64,
}

impl<S: std::fmt::Debug> std::fmt::Debug for CartSync<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSync")
            .field("source", &self.source)
            .field("latest", &self.latest.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<S: CartSource> CartSync<S> {
    #[must_use]
    pub const fn new(store: CartStore, source: S) -> Self {
        Self {
            store,
            source,
            latest: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &CartStore {
        &self.store
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    fn issue_ticket(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    /// Fetch the cart and apply the response if it is still the latest.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> SyncOutcome {
        self.fetch_with(None).await
    }

    /// Run [`fetch_cart`](Self::fetch_cart) on the runtime without waiting.
    pub fn spawn_fetch(self: &Arc<Self>) -> JoinHandle<SyncOutcome>
    where
        S: 'static,
    {
        let sync = Arc::clone(self);
        tokio::spawn(async move { sync.fetch_cart().await })
    }

    /// Fetch and reconcile. `carried` is an earlier failure in the same
    /// user action that should stay visible even if this fetch succeeds.
    async fn fetch_with(&self, carried: Option<StorefrontError>) -> SyncOutcome {
        let ticket = self.issue_ticket();

        self.store.dispatch_if(|_| {
            self.is_latest(ticket)
                .then(|| vec![CartAction::SetLoading(true), CartAction::SetError(None)])
        });

        let (actions, outcome) = match self.source.fetch_cart().await {
            Ok(items) => {
                let error = carried.clone();
                let outcome = carried.map_or(SyncOutcome::Applied, SyncOutcome::Failed);
                (
                    vec![
                        CartAction::SetItems(items),
                        CartAction::SetLoading(false),
                        CartAction::SetError(error),
                    ],
                    outcome,
                )
            }
            Err(err) => {
                report_api_error("fetch_cart", &err);
                let error = carried.unwrap_or_else(|| err.classify());
                (
                    vec![
                        CartAction::SetLoading(false),
                        CartAction::SetError(Some(error.clone())),
                    ],
                    SyncOutcome::Failed(error),
                )
            }
        };

        let applied = self
            .store
            .dispatch_if(|_| self.is_latest(ticket).then_some(actions));

        if applied {
            outcome
        } else {
            debug!(ticket, "Discarding superseded cart response");
            SyncOutcome::Superseded
        }
    }

    /// Empty the cart locally, discarding every fetch still in flight.
    ///
    /// The discarded fetches will never clear `loading`, so it is cleared
    /// here along with the items.
    pub fn clear_local(&self) {
        self.issue_ticket();
        self.store.dispatch_if(|_| {
            Some(vec![
                CartAction::Clear,
                CartAction::SetLoading(false),
                CartAction::SetError(None),
            ])
        });
    }

    // =========================================================================
    // Optimistic Intents
    // =========================================================================

    /// Add `item`, merging into an existing line with the same key.
    #[instrument(skip(self, item), fields(product_id = %item.key.product_id))]
    pub async fn add_item(&self, item: CartItem) -> SyncOutcome {
        let mutation = CartMutation::Add {
            key: item.key.clone(),
            quantity: item.quantity,
            color: item.color.clone(),
            size: item.size.clone(),
        };
        self.apply_intent(CartAction::AddItem(item), mutation).await
    }

    /// Remove the line for `key`.
    #[instrument(skip(self), fields(product_id = %key.product_id))]
    pub async fn remove_item(&self, key: CartKey) -> SyncOutcome {
        self.apply_intent(
            CartAction::RemoveItem(key.clone()),
            CartMutation::Remove { key },
        )
        .await
    }

    /// Set the quantity of the line for `key`.
    #[instrument(skip(self), fields(product_id = %key.product_id))]
    pub async fn update_quantity(&self, key: CartKey, quantity: Quantity) -> SyncOutcome {
        self.apply_intent(
            CartAction::UpdateQuantity {
                key: key.clone(),
                quantity,
            },
            CartMutation::UpdateQuantity { key, quantity },
        )
        .await
    }

    async fn apply_intent(&self, action: CartAction, mutation: CartMutation) -> SyncOutcome {
        add_breadcrumb(
            "cart",
            mutation.describe(),
            Some(&[
                ("product_id", mutation.key().product_id.as_str()),
                ("variant_id", mutation.key().variant_id.as_str()),
            ]),
        );

        // Fetches issued before this point predate the local change
        self.issue_ticket();
        self.store.dispatch(action);

        let rejected = match self.source.apply_mutation(&mutation).await {
            Ok(()) => None,
            Err(err) => {
                report_api_error("apply_mutation", &err);
                Some(err.classify())
            }
        };

        match (rejected.clone(), self.fetch_with(rejected).await) {
            (Some(error), SyncOutcome::Superseded) => SyncOutcome::Failed(error),
            (_, outcome) => outcome,
        }
    }
}
