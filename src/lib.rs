//! Tally
//!
//! Tally is the checkout pricing and validation engine of a storefront. It
//! validates shipping addresses and phone numbers against a country table,
//! applies discount codes, resolves shipping costs, computes the one
//! authoritative order total and reconciles it with the amount the payment
//! processor captured.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tally::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(StoreConfig::from_set("default")?.build()?);
//! let cart = CartConfig::from_set("scenario-b")?.cart(store.currency())?;
//!
//! let mut session = CheckoutSession::with_cart(store, cart);
//! let total = session.apply_discount("SAVE10")?;
//!
//! println!("{}", total.total());
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod countries;
pub mod discounts;
pub mod payments;
pub mod prelude;
pub mod pricing;
pub mod receipt;
pub mod shipping;
pub mod store;
pub mod totals;
