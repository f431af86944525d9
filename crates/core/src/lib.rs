//! Atelier Core - Shared types library.
//!
//! This crate provides common types used across all Atelier components:
//! - `storefront` - Client session: backend API, cart store and sync, sign-in
//! - `cli` - Diagnostic command-line tool
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O,
//! no HTTP clients, no async. This keeps it lightweight and easy to test.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, quantities, emails, products and orders
//! - [`cart`] - Cart state, summary and the pure reducer
//! - [`error`] - The classified, display-safe error taxonomy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod error;
pub mod types;

pub use cart::{CartAction, CartItem, CartKey, CartState, CartSummary};
pub use error::StorefrontError;
pub use types::*;
