//! Cart lines and the merge-on-login rule.
//!
//! A cart is a flat list of lines keyed by `(product_id, size)`. The same
//! product in two sizes is two lines; the same product and size is always a
//! single line with a summed quantity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Denormalized product data captured when a line is added, so the cart can
/// render without re-fetching the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub name: String,
    pub slug: String,
    pub image_url: String,
}

/// One line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub size: String,
    /// Always at least 1; a removed line is deleted, not zeroed.
    pub quantity: u32,
    /// Unit price in integer USD cents at the time the line was added.
    pub unit_price_cents_usd: u64,
    pub product: ProductSnapshot,
    /// When the line was first added.
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Identity key for merging: two lines are "the same line" iff both
    /// product ID and size match.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (self.product_id.as_str(), self.size.as_str())
    }
}

/// Violations of the cart invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartLineError {
    #[error("cart line for product {product_id} size {size} has zero quantity")]
    ZeroQuantity { product_id: String, size: String },

    #[error("duplicate cart line for product {product_id} size {size}")]
    DuplicateLine { product_id: String, size: String },
}

/// Validate cart invariants: every quantity >= 1 and no two lines share a
/// `(product_id, size)` key.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_lines(lines: &[CartLine]) -> Result<(), CartLineError> {
    let mut seen = std::collections::BTreeSet::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(CartLineError::ZeroQuantity {
                product_id: line.product_id.clone(),
                size: line.size.clone(),
            });
        }
        if !seen.insert(line.key()) {
            return Err(CartLineError::DuplicateLine {
                product_id: line.product_id.clone(),
                size: line.size.clone(),
            });
        }
    }
    Ok(())
}

/// Merge a local guest cart into the persisted cart.
///
/// Remote lines keep their order and metadata; a local line matching a
/// remote `(product_id, size)` key adds its quantity to the remote line,
/// and local-only lines are appended. The result never contains duplicate
/// keys, regardless of the inputs.
#[must_use]
pub fn merge_cart_lines(local: Vec<CartLine>, remote: Vec<CartLine>) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(remote.len() + local.len());

    for line in remote.into_iter().chain(local) {
        match merged.iter_mut().find(|m| m.key() == line.key()) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
            }
            None => merged.push(line),
        }
    }

    merged
}
