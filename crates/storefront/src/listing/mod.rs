//! Listing pipeline.
//!
//! One parameterized implementation of the fetch/paginate/filter state
//! machine, shared by every listing surface. Pages supply only a provider
//! binding and a source identifier; the controller owns pagination state,
//! the in-flight guard, and the generation counter that discards superseded
//! responses. [`view`] projects a controller snapshot plus the current
//! exchange rate into render-ready data.

pub mod controller;
pub mod view;

pub use controller::{ControllerState, FailedOp, ListingController, Phase};
pub use view::{ErrorBanner, ListingItemView, ListingViewModel, RetryAction};
