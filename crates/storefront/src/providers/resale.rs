//! Secondary marketplace client.
//!
//! OAuth2 client-credentials auth: the access token is fetched with Basic
//! auth against the token endpoint, cached until shortly before expiry, and
//! invalidated once on a 401. The token fetch carries an explicit timeout
//! and a bounded retry with linear backoff; listing fetches themselves are
//! never retried automatically.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use laced_core::{FilterSelection, ListingItem, ListingPage};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::{PAGE_SIZE, ProviderError, append_filter_params, dollars_to_cents};
use crate::config::ResaleConfig;

/// Renew the token this long before its reported expiry.
const TOKEN_EXPIRY_LEEWAY: Duration = Duration::from_secs(30);

/// Client for the secondary marketplace API.
#[derive(Clone)]
pub struct ResaleClient {
    inner: Arc<ResaleClientInner>,
}

struct ResaleClientInner {
    client: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    max_attempts: u32,
    retry_backoff: Duration,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Wire shape of the token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Wire shape of the search endpoint response.
#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    results: Vec<ResaleItem>,
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    total: u64,
    #[serde(default)]
    has_next: bool,
}

#[derive(Debug, Deserialize)]
struct ResaleItem {
    id: String,
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    /// Lowest ask in whole USD.
    #[serde(default)]
    lowest_ask: Option<f64>,
}

impl ResaleClient {
    /// Create a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ResaleConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ResaleClientInner {
                client,
                base_url: config.api_url.clone(),
                token_url: config.token_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                max_attempts: config.max_attempts.max(1),
                retry_backoff: config.retry_backoff,
                token: RwLock::new(None),
            }),
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        "resale"
    }

    /// Fetch one page of marketplace search results.
    ///
    /// # Errors
    ///
    /// Typed failures for auth, transport, and non-success responses. A
    /// body that fails to decode is logged and mapped to an empty page.
    #[instrument(skip(self, filters), fields(source = %source, page = page))]
    pub(crate) async fn fetch_page(
        &self,
        source: &str,
        page: u32,
        filters: &FilterSelection,
    ) -> Result<ListingPage, ProviderError> {
        let token = self.token().await?;

        let response = self.search(source, page, filters, &token).await?;
        let status = response.status();

        // One re-auth when the cached token was revoked server-side.
        let response = if status == reqwest::StatusCode::UNAUTHORIZED {
            debug!("cached token rejected, re-authenticating");
            self.invalidate_token().await;
            let token = self.token().await?;
            self.search(source, page, filters, &token).await?
        } else {
            response
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(source.to_owned()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Auth("token rejected twice".to_owned()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;
        match serde_json::from_str::<SearchEnvelope>(&body) {
            Ok(envelope) => Ok(normalize(envelope)),
            Err(e) => {
                warn!(error = %e, "resale response did not match expected shape");
                Ok(ListingPage::empty())
            }
        }
    }

    async fn search(
        &self,
        source: &str,
        page: u32,
        filters: &FilterSelection,
        token: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        // The serializer is dropped before any await so the future stays Send.
        let query = {
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            query
                .append_pair("query", source)
                .append_pair("page", &page.to_string())
                .append_pair("per_page", &PAGE_SIZE.to_string());
            append_filter_params(&mut query, filters);
            query.finish()
        };

        let url = format!("{}/search?{}", self.inner.base_url, query);
        Ok(self
            .inner
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?)
    }

    /// A valid access token, from cache or freshly fetched.
    async fn token(&self) -> Result<String, ProviderError> {
        {
            let guard = self.inner.token.read().await;
            if let Some(token) = guard.as_ref()
                && token.expires_at > Instant::now()
            {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = self.inner.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = guard.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.access_token.clone());
        }

        let fetched = self.fetch_token().await?;
        let access_token = fetched.access_token.clone();
        *guard = Some(fetched);
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.inner.token.write().await = None;
    }

    /// Client-credentials token fetch with bounded retry and linear backoff.
    async fn fetch_token(&self) -> Result<CachedToken, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 1..=self.inner.max_attempts {
            match self.try_fetch_token().await {
                Ok(token) => return Ok(token),
                Err(e) if retryable(&e) && attempt < self.inner.max_attempts => {
                    warn!(attempt, error = %e, "resale token fetch failed, retrying");
                    tokio::time::sleep(self.inner.retry_backoff * attempt).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // Unreachable in practice: the loop either returns a token or the
        // final error. Kept total for the compiler.
        Err(last_error
            .unwrap_or_else(|| ProviderError::Auth("token fetch never attempted".to_owned())))
    }

    async fn try_fetch_token(&self) -> Result<CachedToken, ProviderError> {
        let basic = BASE64.encode(format!(
            "{}:{}",
            self.inner.client_id,
            self.inner.client_secret.expose_secret()
        ));

        let response = self
            .inner
            .client
            .post(&self.inner.token_url)
            .header("Authorization", format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Auth(format!("malformed token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_LEEWAY),
        })
    }
}

/// Whether a token-fetch failure is worth another attempt.
fn retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::Http(_) => true,
        ProviderError::Api { status, .. } => *status >= 500,
        ProviderError::Auth(_) | ProviderError::NotFound(_) => false,
    }
}

/// Map the marketplace envelope into the common listing shape.
fn normalize(envelope: SearchEnvelope) -> ListingPage {
    let total = envelope.pagination.total;
    let items: Vec<ListingItem> = envelope
        .results
        .into_iter()
        .map(|r| ListingItem {
            slug: r.slug.unwrap_or_else(|| r.id.clone()),
            id: r.id,
            name: r.title,
            image_url: r.image_url.unwrap_or_default(),
            price_cents_usd: dollars_to_cents(r.lowest_ask),
        })
        .collect();

    ListingPage {
        has_more: envelope.pagination.has_next && !items.is_empty(),
        total_count: total,
        items,
        facets: Vec::new(),
    }
}
