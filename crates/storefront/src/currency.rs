//! Exchange-rate service.
//!
//! One `CurrencyService` instance is constructed at startup and shared
//! through [`crate::state::AppState`]; every page reads the same cached
//! rate with a single freshness window. A failed refresh serves the last
//! known-good rate (stale-if-error) instead of clearing it, and currency
//! failures are a dedicated error type so the retry UI never has to match
//! on message text.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::CurrencyConfig;

/// Errors from the exchange-rate integration. Distinct from provider
/// (listing) errors by construction.
#[derive(Debug, Error)]
pub enum CurrencyError {
    /// HTTP request failed.
    #[error("currency HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The rate API answered with a non-success envelope.
    #[error("currency API error: status {0}")]
    Api(u16),

    /// The response body did not have the expected shape.
    #[error("currency response shape error: {0}")]
    Shape(String),
}

/// Wire shape of the rate endpoint: `{ status_code, data: { mid } }` where
/// `mid` is the USD -> local-currency multiplier.
#[derive(Debug, Deserialize)]
struct RateEnvelope {
    status_code: u16,
    data: Option<RateData>,
}

#[derive(Debug, Deserialize)]
struct RateData {
    mid: f64,
}

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: f64,
    fetched_at: Instant,
}

/// Time-boxed cache around the exchange-rate API.
pub struct CurrencyService {
    client: reqwest::Client,
    api_url: String,
    ttl: Duration,
    cached: RwLock<Option<CachedRate>>,
}

impl CurrencyService {
    /// Create a service with an explicit endpoint and freshness window.
    #[must_use]
    pub fn new(api_url: String, ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Create a service from configuration.
    #[must_use]
    pub fn from_config(config: &CurrencyConfig) -> Self {
        Self::new(config.api_url.clone(), config.ttl)
    }

    /// The cached rate, if any, regardless of freshness.
    ///
    /// Fragment rendering uses this synchronous peek: a stale rate still
    /// renders real prices, and refreshes stay with the full-page handler.
    #[must_use]
    pub fn cached(&self) -> Option<f64> {
        self.cached
            .read()
            .ok()
            .and_then(|guard| (*guard).map(|c| c.rate))
    }

    /// Get the USD -> local-currency rate.
    ///
    /// A cache hit inside the freshness window (and no `force_refresh`)
    /// returns without I/O. Otherwise one HTTP call is made; on success the
    /// cache is replaced, on failure a previously cached value is served
    /// stale rather than dropped.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyError` only when the fetch fails and no prior rate
    /// exists to fall back on.
    #[instrument(skip(self))]
    pub async fn rate(&self, force_refresh: bool) -> Result<f64, CurrencyError> {
        if !force_refresh
            && let Some(cached) = self.fresh_rate()
        {
            debug!("currency cache hit");
            return Ok(cached);
        }

        match self.fetch_rate().await {
            Ok(rate) => {
                if let Ok(mut guard) = self.cached.write() {
                    *guard = Some(CachedRate {
                        rate,
                        fetched_at: Instant::now(),
                    });
                }
                Ok(rate)
            }
            Err(e) => match self.cached() {
                // Stale-if-error: keep serving the last known-good rate.
                Some(stale) => {
                    warn!(error = %e, "currency refresh failed, serving stale rate");
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// The cached rate when it is still inside the freshness window.
    fn fresh_rate(&self) -> Option<f64> {
        let guard = self.cached.read().ok()?;
        (*guard)
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| c.rate)
    }

    /// One GET against the rate endpoint.
    async fn fetch_rate(&self) -> Result<f64, CurrencyError> {
        let response = self.client.get(&self.api_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CurrencyError::Api(status.as_u16()));
        }

        let envelope: RateEnvelope = response
            .json()
            .await
            .map_err(|e| CurrencyError::Shape(e.to_string()))?;

        if envelope.status_code != 200 {
            return Err(CurrencyError::Api(envelope.status_code));
        }

        let mid = envelope
            .data
            .map(|d| d.mid)
            .ok_or_else(|| CurrencyError::Shape("missing data.mid".to_owned()))?;
        if !mid.is_finite() || mid <= 0.0 {
            return Err(CurrencyError::Shape(format!("non-positive mid: {mid}")));
        }

        Ok(mid)
    }
}
