//! Cart API route handlers.
//!
//! The cart travels as a whole JSON document. Guests keep their cart
//! client-side; on login the client posts it to the merge endpoint, which
//! folds it into whatever the user had saved before.

use axum::{
    Json,
    extract::{Path, State},
};
use laced_core::{CartLine, UserId};
use tracing::instrument;

use crate::error::Result;
use crate::state::AppState;

/// Load a user's saved cart.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<CartLine>>> {
    let lines = state.cart().load(user_id).await?;
    Ok(Json(lines))
}

/// Replace a user's cart with the submitted lines.
#[instrument(skip(state, lines))]
pub async fn replace(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(lines): Json<Vec<CartLine>>,
) -> Result<Json<Vec<CartLine>>> {
    state.cart().save(user_id, &lines).await?;
    Ok(Json(lines))
}

/// Merge a guest cart into the user's saved cart and return the result.
#[instrument(skip(state, lines))]
pub async fn merge(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(lines): Json<Vec<CartLine>>,
) -> Result<Json<Vec<CartLine>>> {
    let merged = state.cart().merge_on_login(user_id, lines).await?;
    Ok(Json(merged))
}
