//! Render-ready projection of a listing snapshot.
//!
//! The view model is where controller state, the cached exchange rate, and
//! price formatting meet. Templates only read fields and call accessor
//! methods; all branching on phase and error kind happens here, and retry
//! routing is driven by the tagged [`RetryAction`] rather than by matching
//! on message text.

use laced_core::{FacetDescriptor, FilterSelection, PriceFormat, render_price};

use super::controller::{ControllerState, Phase};
use crate::providers::PAGE_SIZE;

/// Images in the first rows load eagerly; everything below lazy-loads.
const EAGER_IMAGE_COUNT: u64 = 8;

/// Which subsystem a retry banner re-runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Re-fetch the exchange rate.
    Currency,
    /// Re-run the failed listing fetch.
    Listing,
}

/// A dismissible error banner with one retry affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBanner {
    pub action: RetryAction,
    pub message: String,
    retry_href: String,
}

impl ErrorBanner {
    #[must_use]
    pub fn retry_href(&self) -> &str {
        &self.retry_href
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self.action {
            RetryAction::Currency => "Retry Currency",
            RetryAction::Listing => "Retry Products",
        }
    }
}

/// One grid tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItemView {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub image_url: String,
    /// Already-formatted price text, including the unavailable and loading
    /// placeholders.
    pub price_label: String,
    /// Above-the-fold hint for image loading.
    pub eager_image: bool,
}

/// Everything a listing template needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingViewModel {
    /// Placeholder tiles to draw while the first page is in flight.
    pub skeleton_count: usize,
    pub items: Vec<ListingItemView>,
    pub banners: Vec<ErrorBanner>,
    /// Page the scroll sentinel should request next, when there is one.
    pub next_page: Option<u32>,
    pub end_of_list: bool,
    pub no_results: bool,
    /// Offer "clear filters" alongside the no-results message.
    pub show_clear_filters: bool,
    pub facets: Vec<FacetDescriptor>,
    pub filters: FilterSelection,
}

impl ListingViewModel {
    /// Project controller state into render-ready form.
    ///
    /// `rate` is the cached exchange rate if any; `currency_failed` says
    /// the last refresh attempt failed, which adds the currency banner
    /// while items still render with "…" placeholders.
    #[must_use]
    pub fn build(
        state: &ControllerState,
        rate: Option<f64>,
        currency_failed: bool,
        format: &PriceFormat,
        listing_path: &str,
    ) -> Self {
        let items = state
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| ListingItemView {
                id: item.id.clone(),
                slug: item.slug.clone(),
                name: item.name.clone(),
                image_url: item.image_url.clone(),
                price_label: render_price(item.price_cents_usd, rate, format),
                eager_image: state.offset + (i as u64) < EAGER_IMAGE_COUNT,
            })
            .collect();

        // The listing path may already carry filter parameters.
        let sep = if listing_path.contains('?') { '&' } else { '?' };
        let mut banners = Vec::new();
        if currency_failed && rate.is_none() {
            banners.push(ErrorBanner {
                action: RetryAction::Currency,
                message: "Prices are temporarily unavailable.".to_owned(),
                retry_href: format!("{listing_path}{sep}retry=currency"),
            });
        }
        if let Phase::Error { message, .. } = &state.phase {
            banners.push(ErrorBanner {
                action: RetryAction::Listing,
                message: message.clone(),
                retry_href: format!("{listing_path}{sep}retry=listing"),
            });
        }

        let loaded = state.phase == Phase::Loaded;
        Self {
            skeleton_count: if state.phase == Phase::LoadingInitial {
                PAGE_SIZE as usize
            } else {
                0
            },
            items,
            banners,
            next_page: (loaded && state.has_more).then(|| state.current_page + 1),
            end_of_list: !state.has_more && state.accumulated() > 0 && loaded,
            no_results: state.phase == Phase::Empty,
            show_clear_filters: state.phase == Phase::Empty && !state.filters.is_empty(),
            facets: state.facets.clone(),
            filters: state.filters.clone(),
        }
    }
}
