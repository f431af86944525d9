//! Session services.
//!
//! # Services
//!
//! - `auth` - Identity provider glue and the signed-in identity
//! - `checkout` - Cart validation and order placement

pub mod auth;
pub mod checkout;
