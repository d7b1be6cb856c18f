//! Laced storefront library.
//!
//! Exposes the storefront as a library so the listing pipeline, provider
//! clients, and route handlers are testable outside the binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod currency;
pub mod error;
pub mod listing;
pub mod providers;
pub mod routes;
pub mod state;
