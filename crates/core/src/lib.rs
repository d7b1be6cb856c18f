//! Laced Core - Shared types library.
//!
//! This crate provides the domain types used across the Laced storefront:
//! listing items and pages, facet filter selections, price rendering,
//! cart lines and the cart merge rule, and type-safe IDs.
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows
//! it to be used anywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
