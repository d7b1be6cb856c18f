//! Normalized listing types shared by every product-data provider.

use serde::{Deserialize, Serialize};

/// A single product entry in a listing, normalized from a provider record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingItem {
    /// Provider-scoped product identifier.
    pub id: String,
    /// URL slug for the product detail page.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Primary image URL.
    pub image_url: String,
    /// Price in integer USD cents. `0` is the "price unavailable" sentinel,
    /// never a real zero price.
    pub price_cents_usd: u64,
}

impl ListingItem {
    /// Whether the item carries a real price.
    #[must_use]
    pub const fn price_available(&self) -> bool {
        self.price_cents_usd > 0
    }
}

/// A filterable product attribute and its selectable option values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetDescriptor {
    /// Stable facet identifier (e.g. `brand`, `size`).
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Selectable option values.
    pub options: Vec<String>,
}

/// One page of normalized listing results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    /// Items on this page, in provider order.
    pub items: Vec<ListingItem>,
    /// Whether the provider reports further pages.
    pub has_more: bool,
    /// Provider-reported total result count across all pages.
    pub total_count: u64,
    /// Facet metadata, when the provider returns refinements.
    #[serde(default)]
    pub facets: Vec<FacetDescriptor>,
}

impl ListingPage {
    /// An empty result page. Used when a provider response cannot be
    /// interpreted, so the view degrades to "no results" instead of crashing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            total_count: 0,
            facets: Vec::new(),
        }
    }
}
