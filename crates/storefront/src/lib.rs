//! Atelier Storefront client library.
//!
//! Everything a storefront front end needs besides rendering: the backend
//! API client, the session-owned cart store with its race-free
//! synchronization flow, identity provider glue, checkout, and view models
//! for presentation components.
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_storefront::{ClientConfig, Session, services::auth::HeadlessProvider};
//!
//! let session = Session::start(ClientConfig::from_env()?, HeadlessProvider)?;
//! session.refresh_cart().await;
//! let view = session.cart_view();
//! println!("{} items, {}", view.item_count, view.subtotal);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod images;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
pub mod views;

pub use config::ClientConfig;
pub use error::ClientError;
pub use state::Session;
pub use store::CartStore;
pub use sync::{CartMutation, CartSource, CartSync, SyncOutcome};
