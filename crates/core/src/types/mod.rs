//! Core types for Laced.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod filter;
pub mod id;
pub mod listing;
pub mod price;

pub use cart::{CartLine, CartLineError, ProductSnapshot, merge_cart_lines, validate_lines};
pub use filter::FilterSelection;
pub use id::UserId;
pub use listing::{FacetDescriptor, ListingItem, ListingPage};
pub use price::{LOADING_PLACEHOLDER, PRICE_UNAVAILABLE, PriceFormat, render_price};
