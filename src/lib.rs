//! CityCart - Hyperlocal Grocery Storefront
//!
//! Multi-city catalog, cart, checkout and order tracking backed by flat
//! JSON documents.
//!
//! ## Features
//! - Per-city inventory and pricing
//! - Inventory-aware order placement with line snapshots
//! - Append-only order status history with guarded transitions
//! - Coupon validation and checkout fee arithmetic
//! - Related-product recommendations

pub mod cart;
pub mod catalog;
pub mod config;
pub mod coupons;
pub mod error;
pub mod geo;
pub mod models;
pub mod notify;
pub mod orders;
pub mod recommend;
pub mod store;

pub use error::{Error, Result};
