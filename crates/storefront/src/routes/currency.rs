//! Exchange-rate API route handler.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::state::AppState;

/// Query parameters for the rate endpoint.
#[derive(Debug, Deserialize)]
pub struct RateQuery {
    /// Bypass the cache. Backs the "Retry Currency" affordance.
    #[serde(default)]
    pub refresh: bool,
}

/// Rate endpoint response.
#[derive(Debug, Serialize)]
pub struct RateResponse {
    /// USD to display-currency multiplier.
    pub rate: f64,
    /// ISO 4217 code of the display currency.
    pub code: String,
}

/// Serve the current exchange rate, fetching on a cache miss.
#[instrument(skip(state))]
pub async fn rate(
    State(state): State<AppState>,
    Query(query): Query<RateQuery>,
) -> Result<Json<RateResponse>> {
    let rate = state.currency().rate(query.refresh).await?;
    Ok(Json(RateResponse {
        rate,
        code: state.config().currency.code.clone(),
    }))
}
