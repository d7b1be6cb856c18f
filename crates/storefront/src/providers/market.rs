//! General marketplace search client.
//!
//! Static-key search API. The only provider that reports facet refinements,
//! which the listing view turns into filter controls.

use laced_core::{FacetDescriptor, FilterSelection, ListingItem, ListingPage};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{instrument, warn};

use super::{PAGE_SIZE, ProviderError, append_filter_params, dollars_to_cents};
use crate::config::MarketConfig;

/// Client for the marketplace search API.
#[derive(Clone)]
pub struct MarketClient {
    client: reqwest::Client,
    base_url: String,
}

/// Wire shape of a search response.
#[derive(Debug, Deserialize)]
struct MarketEnvelope {
    #[serde(default)]
    items: Vec<MarketItem>,
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    refinements: Vec<MarketRefinement>,
}

#[derive(Debug, Deserialize)]
struct MarketItem {
    id: String,
    name: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    image: Option<String>,
    /// Price in whole USD.
    #[serde(default)]
    price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketRefinement {
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    values: Vec<String>,
}

impl MarketClient {
    /// Create a client with the API key installed as a default header.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid header value.
    pub fn new(config: &MarketConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-API-Key",
            HeaderValue::from_str(config.api_key.expose_secret())
                .map_err(|e| ProviderError::Auth(format!("invalid market API key: {e}")))?,
        );

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        "market"
    }

    /// Fetch one page of search results, including facet refinements.
    ///
    /// # Errors
    ///
    /// Typed failures for transport errors and non-success statuses. A body
    /// that fails to decode is logged and mapped to an empty page.
    #[instrument(skip(self, filters), fields(source = %source, page = page))]
    pub(crate) async fn fetch_page(
        &self,
        source: &str,
        page: u32,
        filters: &FilterSelection,
    ) -> Result<ListingPage, ProviderError> {
        // The serializer is dropped before any await so the future stays Send.
        let query = {
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            query
                .append_pair("q", source)
                .append_pair("page", &page.to_string())
                .append_pair("hitsPerPage", &PAGE_SIZE.to_string());
            append_filter_params(&mut query, filters);
            query.finish()
        };

        let url = format!("{}/search?{}", self.base_url, query);
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(source.to_owned()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::Auth(format!(
                "market API rejected the key: {status}"
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;
        match serde_json::from_str::<MarketEnvelope>(&body) {
            Ok(envelope) => Ok(normalize(envelope, page)),
            Err(e) => {
                warn!(error = %e, "market response did not match expected shape");
                Ok(ListingPage::empty())
            }
        }
    }
}

/// Map the search envelope into the common listing shape.
fn normalize(envelope: MarketEnvelope, page: u32) -> ListingPage {
    let items: Vec<ListingItem> = envelope
        .items
        .into_iter()
        .map(|i| ListingItem {
            slug: i.slug.unwrap_or_else(|| i.id.clone()),
            id: i.id,
            name: i.name,
            image_url: i.image.unwrap_or_default(),
            price_cents_usd: dollars_to_cents(i.price),
        })
        .collect();

    let facets = envelope
        .refinements
        .into_iter()
        .filter(|r| !r.values.is_empty())
        .map(|r| FacetDescriptor {
            label: r.label.unwrap_or_else(|| r.id.clone()),
            id: r.id,
            options: r.values,
        })
        .collect();

    let fetched = u64::from(page) * u64::from(PAGE_SIZE);
    let has_more = !items.is_empty() && fetched < envelope.total_count;

    ListingPage {
        items,
        has_more,
        total_count: envelope.total_count,
        facets,
    }
}
