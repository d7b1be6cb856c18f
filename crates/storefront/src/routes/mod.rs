//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                             - Redirect to the default listing
//! GET  /health                       - Health check
//!
//! # Listings
//! GET  /collections/{slug}           - Listing page (filters via f_* params)
//! GET  /collections/{slug}/items     - Next-page item grid fragment (HTMX)
//!
//! # JSON API
//! GET  /api/collections/{slug}       - Collection page as JSON (?page=N)
//! GET  /api/currency/rate            - Current exchange rate (?refresh=true)
//!
//! # Cart
//! GET  /api/cart/{user_id}           - Load a user's cart
//! PUT  /api/cart/{user_id}           - Replace a user's cart
//! POST /api/cart/{user_id}/merge     - Merge a guest cart into the saved one
//! ```

pub mod cart;
pub mod collections;
pub mod currency;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the collection (listing page) routes router.
pub fn collection_routes() -> Router<AppState> {
    Router::new()
        .route("/{slug}", get(collections::show))
        .route("/{slug}/items", get(collections::items))
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/collections/{slug}", get(collections::api_show))
        .route("/currency/rate", get(currency::rate))
        .route("/cart/{user_id}", get(cart::show).put(cart::replace))
        .route("/cart/{user_id}/merge", post(cart::merge))
}

/// Create the complete application router (state not yet attached).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/collections/new-arrivals") }))
        .nest("/collections", collection_routes())
        .nest("/api", api_routes())
}
