//! Cart persistence.
//!
//! The cart is an opaque per-user document: one JSONB column holding the
//! full line array, written whole on every save. The store only promises
//! single-document atomicity; the merge rule itself lives in `laced-core`
//! so it stays testable without a database.
//!
//! A `Memory` backend backs tests and local development without Postgres.

use std::collections::HashMap;
use std::sync::Arc;

use laced_core::{CartLine, CartLineError, UserId, merge_cart_lines, validate_lines};
use sqlx::PgPool;
use sqlx::Row as _;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

/// Errors from cart load/save/merge.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cart document error: {0}")]
    Document(#[from] serde_json::Error),

    #[error("invalid cart: {0}")]
    Invalid(#[from] CartLineError),
}

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Memory(Arc<RwLock<HashMap<UserId, Vec<CartLine>>>>),
}

/// Get/set document store for carts, keyed by user ID.
#[derive(Clone)]
pub struct CartStore {
    backend: Backend,
}

impl CartStore {
    /// Store carts in the `storefront_cart` table.
    #[must_use]
    pub const fn postgres(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    /// Store carts in process memory. Tests and local development only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(HashMap::new()))),
        }
    }

    /// Load a user's cart. A user with no saved cart gets an empty one.
    ///
    /// # Errors
    ///
    /// Database or document-decoding failures.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn load(&self, user: UserId) -> Result<Vec<CartLine>, CartError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query("SELECT lines FROM storefront_cart WHERE user_id = $1")
                    .bind(user)
                    .fetch_optional(pool)
                    .await?;
                match row {
                    Some(row) => {
                        let document: serde_json::Value = row.try_get("lines")?;
                        Ok(serde_json::from_value(document)?)
                    }
                    None => Ok(Vec::new()),
                }
            }
            Backend::Memory(map) => Ok(map.read().await.get(&user).cloned().unwrap_or_default()),
        }
    }

    /// Replace a user's cart with `lines`, validating the invariants first.
    ///
    /// # Errors
    ///
    /// `CartError::Invalid` when the lines violate the cart invariants,
    /// otherwise database or encoding failures.
    #[instrument(skip(self, lines), fields(user = %user, lines = lines.len()))]
    pub async fn save(&self, user: UserId, lines: &[CartLine]) -> Result<(), CartError> {
        validate_lines(lines)?;

        match &self.backend {
            Backend::Postgres(pool) => {
                let document = serde_json::to_value(lines)?;
                sqlx::query(
                    r"
                    INSERT INTO storefront_cart (user_id, lines, updated_at)
                    VALUES ($1, $2, NOW())
                    ON CONFLICT (user_id)
                    DO UPDATE SET lines = EXCLUDED.lines, updated_at = NOW()
                    ",
                )
                .bind(user)
                .bind(document)
                .execute(pool)
                .await?;
                Ok(())
            }
            Backend::Memory(map) => {
                map.write().await.insert(user, lines.to_vec());
                Ok(())
            }
        }
    }

    /// Merge a guest cart into the user's saved cart and persist the result.
    ///
    /// Saved lines keep their order and metadata; matching `(product, size)`
    /// keys sum quantities; guest-only lines append. Returns the merged
    /// cart.
    ///
    /// # Errors
    ///
    /// Load/save failures. The merge itself cannot fail.
    #[instrument(skip(self, local), fields(user = %user, local = local.len()))]
    pub async fn merge_on_login(
        &self,
        user: UserId,
        local: Vec<CartLine>,
    ) -> Result<Vec<CartLine>, CartError> {
        let remote = self.load(user).await?;
        let merged = merge_cart_lines(local, remote);
        self.save(user, &merged).await?;
        Ok(merged)
    }
}
