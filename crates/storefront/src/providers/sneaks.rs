//! Sneaker marketplace aggregator client.
//!
//! Query-string REST API with a static key header. The aggregator reports a
//! flat product array plus a total count; `hasMore` is derived from how far
//! pagination has advanced against that total.

use laced_core::{FilterSelection, ListingItem, ListingPage};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{instrument, warn};

use super::{PAGE_SIZE, ProviderError, append_filter_params, dollars_to_cents};
use crate::config::SneaksConfig;

/// Client for the sneaker aggregator API.
#[derive(Clone)]
pub struct SneaksClient {
    client: reqwest::Client,
    base_url: String,
}

/// Wire shape of a product browse response.
#[derive(Debug, Deserialize)]
struct SneaksEnvelope {
    #[serde(default)]
    products: Vec<SneaksProduct>,
    #[serde(default)]
    total: u64,
    /// Some aggregator failures come back as HTTP 200 with an error field.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SneaksProduct {
    #[serde(rename = "styleID")]
    style_id: String,
    #[serde(rename = "shoeName")]
    shoe_name: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(rename = "urlKey", default)]
    url_key: Option<String>,
    #[serde(rename = "retailPrice", default)]
    retail_price: Option<f64>,
}

impl SneaksClient {
    /// Create a client with the API key installed as a default header.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid header value.
    pub fn new(config: &SneaksConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-API-Key",
            HeaderValue::from_str(config.api_key.expose_secret()).map_err(|e| {
                ProviderError::Auth(format!("invalid sneaks API key: {e}"))
            })?,
        );

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        "sneaks"
    }

    /// Fetch one page of the aggregator's product browse endpoint.
    ///
    /// # Errors
    ///
    /// Typed failures for transport errors, non-success statuses, and
    /// envelope-embedded errors. A body that fails to decode is logged and
    /// mapped to an empty page.
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
                .append_pair("keyword", source)
                .append_pair("page", &page.to_string())
                .append_pair("limit", &PAGE_SIZE.to_string());
            append_filter_params(&mut query, filters);
            query.finish()
        };

        let url = format!("{}/products?{}", self.base_url, query);
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(source.to_owned()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;
        let envelope: SneaksEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Unexpected shape degrades to an empty result set.
                warn!(error = %e, "sneaks response did not match expected shape");
                return Ok(ListingPage::empty());
            }
        };

        if let Some(message) = envelope.error {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(normalize(envelope, page))
    }
}

/// Map the aggregator envelope into the common listing shape.
fn normalize(envelope: SneaksEnvelope, page: u32) -> ListingPage {
    let items: Vec<ListingItem> = envelope
        .products
        .into_iter()
        .map(|p| ListingItem {
            slug: p
                .url_key
                .unwrap_or_else(|| p.style_id.to_lowercase()),
            id: p.style_id,
            name: p.shoe_name,
            image_url: p.thumbnail.unwrap_or_default(),
            price_cents_usd: dollars_to_cents(p.retail_price),
        })
        .collect();

    let fetched = u64::from(page) * u64::from(PAGE_SIZE);
    let has_more = !items.is_empty() && fetched < envelope.total;

    ListingPage {
        items,
        has_more,
        total_count: envelope.total,
        facets: Vec::new(),
    }
}
