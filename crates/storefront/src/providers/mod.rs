//! Product-data provider clients.
//!
//! Three external providers with incompatible response shapes feed the
//! listing pipeline. Each client normalizes its wire format into
//! [`ListingPage`] so the controller and views never see provider-specific
//! structure:
//!
//! - [`sneaks`] - sneaker marketplace aggregator (REST, static API key)
//! - [`resale`] - secondary marketplace (OAuth2 client credentials with a
//!   cached token, request timeout, and bounded linear-backoff retry)
//! - [`market`] - general marketplace search API (static API key, returns
//!   facet refinements)
//!
//! Error policy: non-2xx statuses and provider-embedded error fields become
//! typed [`ProviderError`]s for the caller to surface; an unexpected body
//! shape is logged and mapped to [`ListingPage::empty`] so a malformed
//! response degrades to "no results" instead of crashing a page. No retries
//! at this layer (the resale token fetch is the deliberate exception).

pub mod market;
pub mod resale;
pub mod sneaks;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use laced_core::{FilterSelection, ListingPage};
use moka::future::Cache;
use thiserror::Error;
use tracing::debug;

use crate::config::ProvidersConfig;

pub use market::MarketClient;
pub use resale::ResaleClient;
pub use sneaks::SneaksClient;

/// Items requested per listing page.
pub const PAGE_SIZE: u32 = 24;

/// Cached unfiltered pages per registry instance.
const PAGE_CACHE_CAPACITY: u64 = 1000;

/// Page cache TTL.
const PAGE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Errors from listing providers. Distinct from currency errors by
/// construction so retry affordances route on the variant.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("provider HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status or an embedded error
    /// field.
    #[error("provider API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Authentication against the provider failed.
    #[error("provider auth error: {0}")]
    Auth(String),

    /// The requested source does not exist at the provider.
    #[error("not found: {0}")]
    NotFound(String),
}

/// A paginated, filterable product-data source.
#[allow(async_fn_in_trait)]
pub trait ListingProvider {
    /// Provider name as used in URLs and cache keys.
    fn name(&self) -> &'static str;

    /// Fetch one page of a listing.
    ///
    /// `source` identifies the collection/brand/search scope at the
    /// provider, `page` is 1-based.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] for transport failures, non-success
    /// responses, and unknown sources.
    async fn fetch_page(
        &self,
        source: &str,
        page: u32,
        filters: &FilterSelection,
    ) -> Result<ListingPage, ProviderError>;
}

/// Static dispatch over the configured provider clients.
#[derive(Clone)]
pub enum AnyProvider {
    Sneaks(SneaksClient),
    Resale(ResaleClient),
    Market(MarketClient),
}

impl ListingProvider for AnyProvider {
    fn name(&self) -> &'static str {
        match self {
            Self::Sneaks(p) => p.name(),
            Self::Resale(p) => p.name(),
            Self::Market(p) => p.name(),
        }
    }

    async fn fetch_page(
        &self,
        source: &str,
        page: u32,
        filters: &FilterSelection,
    ) -> Result<ListingPage, ProviderError> {
        match self {
            Self::Sneaks(p) => p.fetch_page(source, page, filters).await,
            Self::Resale(p) => p.fetch_page(source, page, filters).await,
            Self::Market(p) => p.fetch_page(source, page, filters).await,
        }
    }
}

/// All configured providers plus a shared page cache.
///
/// Unfiltered pages are cached for five minutes; filtered requests always
/// go to the provider (mirroring how search queries are never cached).
#[derive(Clone)]
pub struct ProviderRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    providers: HashMap<&'static str, AnyProvider>,
    cache: Cache<String, ListingPage>,
}

impl ProviderRegistry {
    /// Build clients for every configured provider.
    ///
    /// # Errors
    ///
    /// Returns an error if an API key cannot be turned into a valid header.
    pub fn new(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let sneaks = SneaksClient::new(&config.sneaks)?;
        let resale = ResaleClient::new(&config.resale)?;
        let market = MarketClient::new(&config.market)?;

        let mut providers: HashMap<&'static str, AnyProvider> = HashMap::new();
        providers.insert(sneaks.name(), AnyProvider::Sneaks(sneaks));
        providers.insert(resale.name(), AnyProvider::Resale(resale));
        providers.insert(market.name(), AnyProvider::Market(market));

        let cache = Cache::builder()
            .max_capacity(PAGE_CACHE_CAPACITY)
            .time_to_live(PAGE_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(RegistryInner { providers, cache }),
        })
    }

    /// Look up a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AnyProvider> {
        self.inner.providers.get(name)
    }

    /// Fetch one page via a named provider, consulting the page cache for
    /// unfiltered requests.
    ///
    /// # Errors
    ///
    /// `ProviderError::NotFound` if the provider name is unknown, otherwise
    /// whatever the provider client returns.
    pub async fn fetch_page(
        &self,
        provider: &str,
        source: &str,
        page: u32,
        filters: &FilterSelection,
    ) -> Result<ListingPage, ProviderError> {
        let client = self
            .get(provider)
            .ok_or_else(|| ProviderError::NotFound(format!("unknown provider: {provider}")))?;

        let cacheable = filters.is_empty();
        let cache_key = format!("{provider}:{source}:{page}");

        if cacheable
            && let Some(cached) = self.inner.cache.get(&cache_key).await
        {
            debug!(%cache_key, "listing page cache hit");
            return Ok(cached);
        }

        let result = client.fetch_page(source, page, filters).await?;

        if cacheable {
            self.inner.cache.insert(cache_key, result.clone()).await;
        }

        Ok(result)
    }
}

/// Adapter binding a registry to one provider name, so the listing
/// controller stays generic over a single [`ListingProvider`].
#[derive(Clone)]
pub struct RegistryProvider {
    registry: ProviderRegistry,
    provider: &'static str,
}

impl RegistryProvider {
    /// Bind `registry` to the provider registered under `name`.
    #[must_use]
    pub fn bind(registry: &ProviderRegistry, name: &str) -> Option<Self> {
        let provider = registry.get(name)?.name();
        Some(Self {
            registry: registry.clone(),
            provider,
        })
    }
}

impl ListingProvider for RegistryProvider {
    fn name(&self) -> &'static str {
        self.provider
    }

    async fn fetch_page(
        &self,
        source: &str,
        page: u32,
        filters: &FilterSelection,
    ) -> Result<ListingPage, ProviderError> {
        self.registry
            .fetch_page(self.provider, source, page, filters)
            .await
    }
}

/// Append the active filters to a provider query string, one comma-joined
/// parameter per facet.
pub(crate) fn append_filter_params(
    query: &mut url::form_urlencoded::Serializer<'_, String>,
    filters: &FilterSelection,
) {
    for (facet, values) in filters.iter() {
        let joined = values.iter().cloned().collect::<Vec<_>>().join(",");
        query.append_pair(facet, &joined);
    }
}

/// Convert a provider price in whole currency units (dollars) to integer
/// cents, mapping absent/invalid prices to the `0` sentinel.
pub(crate) fn dollars_to_cents(price: Option<f64>) -> u64 {
    use rust_decimal::Decimal;
    use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

    price
        .and_then(Decimal::from_f64)
        .map(|d| d * Decimal::from(100))
        .and_then(|d| d.round().to_u64())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollars_to_cents_rounds_and_defaults() {
        assert_eq!(dollars_to_cents(Some(120.0)), 12_000);
        assert_eq!(dollars_to_cents(Some(99.995)), 10_000);
        assert_eq!(dollars_to_cents(None), 0);
        assert_eq!(dollars_to_cents(Some(-5.0)), 0);
        assert_eq!(dollars_to_cents(Some(f64::NAN)), 0);
    }

    #[test]
    fn filter_params_are_comma_joined() {
        let mut filters = FilterSelection::new();
        filters.toggle("brand", "nike");
        filters.toggle("brand", "adidas");

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        append_filter_params(&mut query, &filters);
        assert_eq!(query.finish(), "brand=adidas%2Cnike");
    }

    // Handlers are spawned onto the runtime, so every fetch future must be
    // Send. Query-string building keeps its serializer out of the future's
    // captured state; this fails to compile if that regresses.
    #[test]
    #[allow(clippy::unwrap_used)]
    fn fetch_page_futures_are_send() {
        use std::time::Duration;

        use secrecy::SecretString;

        use crate::config::{MarketConfig, ResaleConfig, SneaksConfig};

        fn assert_send(_: impl Send) {}

        let filters = FilterSelection::new();

        let sneaks = SneaksClient::new(&SneaksConfig {
            api_url: "http://localhost".to_owned(),
            api_key: SecretString::from("k"),
        })
        .unwrap();
        assert_send(sneaks.fetch_page("air-max", 1, &filters));

        let resale = ResaleClient::new(&ResaleConfig {
            api_url: "http://localhost".to_owned(),
            token_url: "http://localhost/oauth/token".to_owned(),
            client_id: "client".to_owned(),
            client_secret: SecretString::from("s"),
            request_timeout: Duration::from_secs(5),
            max_attempts: 1,
            retry_backoff: Duration::from_millis(1),
        })
        .unwrap();
        assert_send(resale.fetch_page("jordan", 1, &filters));

        let market = MarketClient::new(&MarketConfig {
            api_url: "http://localhost".to_owned(),
            api_key: SecretString::from("k"),
        })
        .unwrap();
        assert_send(market.fetch_page("running", 1, &filters));
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::Api {
            status: 502,
            message: "bad gateway".to_owned(),
        };
        assert_eq!(err.to_string(), "provider API error: 502 - bad gateway");

        let err = ProviderError::NotFound("air-max".to_owned());
        assert_eq!(err.to_string(), "not found: air-max");
    }
}
