//! Core types for Atelier.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod quantity;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use order::{Order, OrderLine, ShippingAddress};
pub use price::{CurrencyCode, Price};
pub use product::{Product, ProductImage, ProductPage};
pub use quantity::{Quantity, QuantityError};
pub use status::*;
