//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cart::CartStore;
use crate::config::StorefrontConfig;
use crate::currency::CurrencyService;
use crate::providers::{ProviderError, ProviderRegistry};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The currency service and provider registry
/// are constructed exactly once here, so every page shares the same rate
/// cache and page cache instead of each owning its own copy.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    registry: ProviderRegistry,
    currency: CurrencyService,
    cart: CartStore,
}

impl AppState {
    /// Create application state backed by Postgres.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider client cannot be constructed.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, ProviderError> {
        let registry = ProviderRegistry::new(&config.providers)?;
        let currency = CurrencyService::from_config(&config.currency);
        let cart = CartStore::postgres(pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool: Some(pool),
                registry,
                currency,
                cart,
            }),
        })
    }

    /// Create application state with the in-memory cart backend and no
    /// database pool. Tests and local development only.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider client cannot be constructed.
    pub fn without_database(config: StorefrontConfig) -> Result<Self, ProviderError> {
        let registry = ProviderRegistry::new(&config.providers)?;
        let currency = CurrencyService::from_config(&config.currency);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool: None,
                registry,
                currency,
                cart: CartStore::in_memory(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool, if one exists.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get a reference to the provider registry.
    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    /// Get a reference to the shared exchange-rate service.
    #[must_use]
    pub fn currency(&self) -> &CurrencyService {
        &self.inner.currency
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }
}
