//! Pagination/infinite-scroll state machine.
//!
//! One controller instance drives one listing surface. Invariants it owns:
//!
//! - At most one fetch in flight per controller (`in_flight` guard).
//! - A generation counter per operation: filter changes and resets bump the
//!   generation, and a response whose generation no longer matches is
//!   discarded instead of overwriting newer state.
//! - A filter change always resets items, page, and `has_more` before the
//!   re-fetch, in one place.
//! - After a failure the controller never re-fetches passively; only an
//!   explicit [`ListingController::retry`] re-enters the loading states.

use laced_core::{FacetDescriptor, FilterSelection, ListingItem, ListingPage};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::providers::ListingProvider;

/// Which operation failed, so retry re-runs the right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedOp {
    /// The initial page-1 fetch.
    Initial,
    /// A subsequent page append.
    More,
}

/// Listing lifecycle phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No fetch issued yet.
    Initial,
    /// Page-1 fetch in flight.
    LoadingInitial,
    /// Items present; `has_more` says whether a sentinel should be shown.
    Loaded,
    /// Append fetch in flight; prior items stay visible.
    LoadingMore,
    /// Zero results and no further pages. Terminal until filters change.
    Empty,
    /// Last operation failed. Items from earlier pages are retained.
    Error { op: FailedOp, message: String },
}

/// A point-in-time copy of the controller's state, safe to hand to views.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub phase: Phase,
    /// Accumulated items across loaded pages.
    pub items: Vec<ListingItem>,
    /// Last successfully loaded page, `0` before any page landed.
    pub current_page: u32,
    pub has_more: bool,
    /// Provider-reported total, `0` until a response carries one.
    pub total_count: u64,
    /// Facet metadata from the most recent response that carried any.
    pub facets: Vec<FacetDescriptor>,
    pub filters: FilterSelection,
    /// Items loaded before this controller instance took over. Nonzero only
    /// when the controller was resumed mid-listing (fragment requests).
    pub offset: u64,
}

impl ControllerState {
    fn fresh(filters: FilterSelection) -> Self {
        Self {
            phase: Phase::Initial,
            items: Vec::new(),
            current_page: 0,
            has_more: true,
            total_count: 0,
            facets: Vec::new(),
            filters,
            offset: 0,
        }
    }

    /// Items loaded here plus items the resume offset accounts for.
    #[must_use]
    pub fn accumulated(&self) -> u64 {
        self.offset + self.items.len() as u64
    }
}

struct Inner {
    state: ControllerState,
    generation: u64,
    in_flight: bool,
}

/// What asked for a fetch. The page to request is derived from the state
/// under the same lock that admits the fetch.
#[derive(Debug, Clone, Copy)]
enum Trigger {
    Initial,
    More,
    Retry,
}

/// Drives one listing through the fetch/paginate lifecycle.
pub struct ListingController<P> {
    provider: P,
    source: String,
    inner: Mutex<Inner>,
}

impl<P: ListingProvider> ListingController<P> {
    pub fn new(provider: P, source: impl Into<String>) -> Self {
        Self {
            provider,
            source: source.into(),
            inner: Mutex::new(Inner {
                state: ControllerState::fresh(FilterSelection::new()),
                generation: 0,
                in_flight: false,
            }),
        }
    }

    /// The current state.
    pub async fn snapshot(&self) -> ControllerState {
        self.inner.lock().await.state.clone()
    }

    /// Fetch page 1, replacing any existing items.
    #[instrument(skip(self), fields(source = %self.source))]
    pub async fn load_initial(&self) -> ControllerState {
        self.run_fetch(Trigger::Initial).await
    }

    /// Fetch the next page and append it.
    ///
    /// A no-op unless the listing is `Loaded` with `has_more`. In
    /// particular the `Error` phase refuses passive loads; recovery goes
    /// through [`Self::retry`] so a failing endpoint is never hammered by
    /// scroll events.
    #[instrument(skip(self), fields(source = %self.source))]
    pub async fn load_more(&self) -> ControllerState {
        self.run_fetch(Trigger::More).await
    }

    /// Re-run the operation that failed. A no-op outside the `Error` phase.
    #[instrument(skip(self), fields(source = %self.source))]
    pub async fn retry(&self) -> ControllerState {
        self.run_fetch(Trigger::Retry).await
    }

    /// Replace the filter selection and reload from page 1.
    ///
    /// The reset (items cleared, page back to 1, `has_more` true, error
    /// cleared) happens here, synchronously, before the fetch; the
    /// generation bump makes any still-in-flight response a discard.
    #[instrument(skip(self, filters), fields(source = %self.source))]
    pub async fn set_filters(&self, filters: FilterSelection) -> ControllerState {
        {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.in_flight = false;
            inner.state = ControllerState::fresh(filters);
        }
        self.run_fetch(Trigger::Initial).await
    }

    /// Drop all filters and reload from page 1.
    pub async fn clear_filters(&self) -> ControllerState {
        self.set_filters(FilterSelection::new()).await
    }

    /// Position the controller as if `last_page` pages (`offset` items)
    /// were already loaded elsewhere, so the next [`Self::load_more`]
    /// fetches `last_page + 1`. Used by fragment requests that continue a
    /// listing another response started.
    pub async fn resume_at(&self, last_page: u32, offset: u64, filters: FilterSelection) {
        let mut inner = self.inner.lock().await;
        inner.state = ControllerState {
            phase: Phase::Loaded,
            current_page: last_page,
            offset,
            ..ControllerState::fresh(filters)
        };
    }

    /// Admission, page selection, and the in-flight/generation bookkeeping
    /// all happen under one lock acquisition, so a concurrent filter change
    /// cannot land between a passed precondition and the fetch it admitted.
    async fn run_fetch(&self, trigger: Trigger) -> ControllerState {
        let (generation, filters, page, op) = {
            let mut inner = self.inner.lock().await;
            if inner.in_flight {
                return inner.state.clone();
            }
            let (op, page) = match trigger {
                Trigger::Initial => (FailedOp::Initial, 1),
                Trigger::More => {
                    if inner.state.phase != Phase::Loaded || !inner.state.has_more {
                        return inner.state.clone();
                    }
                    (FailedOp::More, inner.state.current_page + 1)
                }
                Trigger::Retry => match &inner.state.phase {
                    Phase::Error { op, .. } => {
                        let op = *op;
                        let page = match op {
                            FailedOp::Initial => 1,
                            FailedOp::More => inner.state.current_page + 1,
                        };
                        (op, page)
                    }
                    _ => return inner.state.clone(),
                },
            };
            inner.in_flight = true;
            inner.generation += 1;
            inner.state.phase = match op {
                FailedOp::Initial => Phase::LoadingInitial,
                FailedOp::More => Phase::LoadingMore,
            };
            (inner.generation, inner.state.filters.clone(), page, op)
        };

        let result = self.provider.fetch_page(&self.source, page, &filters).await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            // Superseded while in flight; a newer operation owns the state.
            debug!(page, "discarding stale listing response");
            return inner.state.clone();
        }
        inner.in_flight = false;

        match result {
            Ok(fetched) => apply_page(&mut inner.state, page, op, fetched),
            Err(e) => {
                inner.state.phase = Phase::Error {
                    op,
                    message: e.to_string(),
                };
            }
        }
        inner.state.clone()
    }
}

/// Fold a successful page into the state.
fn apply_page(state: &mut ControllerState, page: u32, op: FailedOp, fetched: ListingPage) {
    let new_count = fetched.items.len();

    match op {
        FailedOp::Initial => state.items = fetched.items,
        FailedOp::More => state.items.extend(fetched.items),
    }
    state.current_page = page;
    if fetched.total_count > 0 {
        state.total_count = fetched.total_count;
    }
    if !fetched.facets.is_empty() {
        state.facets = fetched.facets;
    }

    // Accumulated count never exceeds the reported total.
    if state.total_count > 0 && state.accumulated() > state.total_count {
        let excess = (state.accumulated() - state.total_count) as usize;
        let keep = state.items.len().saturating_sub(excess);
        state.items.truncate(keep);
    }

    state.has_more = fetched.has_more
        && new_count > 0
        && (state.total_count == 0 || state.accumulated() < state.total_count);

    state.phase = if state.items.is_empty() && state.offset == 0 {
        state.has_more = false;
        Phase::Empty
    } else {
        Phase::Loaded
    };
}
