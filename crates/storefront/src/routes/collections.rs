//! Collection listing route handlers.
//!
//! The HTML page renders the first listing page server-side; an HTMX
//! sentinel at the bottom of the grid requests `/collections/{slug}/items`
//! fragments for subsequent pages. The JSON variant under
//! `/api/collections/{slug}` serves the same data to non-HTML callers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use laced_core::{FacetDescriptor, FilterSelection};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::listing::{ListingController, ListingViewModel};
use crate::providers::{PAGE_SIZE, ProviderError, RegistryProvider};
use crate::state::AppState;

/// A facet option with its toggle link, precomputed for the template.
#[derive(Debug, Clone)]
pub struct FacetOptionView {
    pub value: String,
    pub selected: bool,
    pub href: String,
}

/// A filter group in the sidebar.
#[derive(Debug, Clone)]
pub struct FacetView {
    pub label: String,
    pub options: Vec<FacetOptionView>,
}

/// Collection listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "collections/show.html")]
pub struct CollectionShowTemplate {
    pub slug: String,
    pub title: String,
    pub listing: ListingViewModel,
    pub facets: Vec<FacetView>,
    /// Fragment URL the scroll sentinel requests next, when more pages exist.
    pub next_href: Option<String>,
    pub clear_href: String,
}

/// Item grid fragment template (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/listing_items.html")]
pub struct ListingItemsTemplate {
    pub listing: ListingViewModel,
    pub next_href: Option<String>,
    pub clear_href: String,
}

/// Query parameters shared by the page and fragment handlers. Facet filters
/// arrive as separate `f_`-prefixed pairs, so the raw pair list is parsed
/// rather than a fixed struct.
#[derive(Debug, PartialEq, Eq)]
struct ListingParams {
    page: u32,
    provider: Option<String>,
    retry_currency: bool,
    filters: FilterSelection,
}

fn parse_params(pairs: &[(String, String)]) -> ListingParams {
    let mut page = 1;
    let mut provider = None;
    let mut retry_currency = false;
    for (key, value) in pairs {
        match key.as_str() {
            "page" => page = value.parse().unwrap_or(1),
            "provider" => provider = Some(value.clone()),
            "retry" => retry_currency = value == "currency",
            _ => {}
        }
    }

    let borrowed: Vec<(&str, &str)> = pairs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    ListingParams {
        page: page.max(1),
        provider,
        retry_currency,
        filters: FilterSelection::from_query_pairs(borrowed),
    }
}

/// `"new-arrivals"` -> `"New Arrivals"`.
fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a listing URL for `slug` carrying the filter selection, an
/// optional page, and an optional provider override.
fn listing_href(
    slug: &str,
    fragment: bool,
    page: Option<u32>,
    provider: Option<&str>,
    filters: &FilterSelection,
) -> String {
    let path = if fragment {
        format!("/collections/{slug}/items")
    } else {
        format!("/collections/{slug}")
    };

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if let Some(page) = page {
        query.append_pair("page", &page.to_string());
    }
    if let Some(provider) = provider {
        query.append_pair("provider", provider);
    }
    for (key, value) in filters.to_query_pairs() {
        query.append_pair(&key, &value);
    }

    let query = query.finish();
    if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    }
}

/// Precompute toggle links for every facet option.
fn facet_views(
    slug: &str,
    provider: Option<&str>,
    facets: &[FacetDescriptor],
    filters: &FilterSelection,
) -> Vec<FacetView> {
    facets
        .iter()
        .map(|facet| FacetView {
            label: facet.label.clone(),
            options: facet
                .options
                .iter()
                .map(|value| {
                    let mut toggled = filters.clone();
                    toggled.toggle(&facet.id, value);
                    FacetOptionView {
                        value: value.clone(),
                        selected: filters.contains(&facet.id, value),
                        href: listing_href(slug, false, None, provider, &toggled),
                    }
                })
                .collect(),
        })
        .collect()
}

fn bind_provider(state: &AppState, requested: Option<&str>) -> Result<RegistryProvider> {
    let name = requested.unwrap_or(&state.config().default_provider);
    RegistryProvider::bind(state.providers(), name)
        .ok_or_else(|| AppError::NotFound(format!("unknown provider: {name}")))
}

/// The cached-or-fetched rate plus whether the lookup ultimately failed.
async fn current_rate(state: &AppState, force_refresh: bool) -> (Option<f64>, bool) {
    match state.currency().rate(force_refresh).await {
        Ok(rate) => (Some(rate), false),
        Err(e) => {
            tracing::warn!(error = %e, "exchange rate unavailable");
            (None, true)
        }
    }
}

/// Display a collection listing page.
#[instrument(skip(state, pairs))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let params = parse_params(&pairs);
    let provider = bind_provider(&state, params.provider.as_deref())?;

    let (rate, currency_failed) = current_rate(&state, params.retry_currency).await;

    let controller = ListingController::new(provider, slug.clone());
    let snapshot = if params.filters.is_empty() {
        controller.load_initial().await
    } else {
        controller.set_filters(params.filters.clone()).await
    };

    let listing_path = listing_href(&slug, false, None, params.provider.as_deref(), &snapshot.filters);
    let listing = ListingViewModel::build(
        &snapshot,
        rate,
        currency_failed,
        &state.config().currency.format,
        &listing_path,
    );

    let next_href = listing.next_page.map(|page| {
        listing_href(
            &slug,
            true,
            Some(page),
            params.provider.as_deref(),
            &snapshot.filters,
        )
    });
    let facets = facet_views(
        &slug,
        params.provider.as_deref(),
        &snapshot.facets,
        &snapshot.filters,
    );

    Ok(CollectionShowTemplate {
        title: title_from_slug(&slug),
        clear_href: listing_href(&slug, false, None, params.provider.as_deref(), &FilterSelection::new()),
        slug,
        listing,
        facets,
        next_href,
    }
    .into_response())
}

/// Serve the next page of a listing as an HTMX fragment.
///
/// The controller is positioned after the pages earlier responses already
/// rendered, so `page` lands as an append with the same clamping rules as
/// a scroll on a long-lived instance.
#[instrument(skip(state, pairs))]
pub async fn items(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let params = parse_params(&pairs);
    let provider = bind_provider(&state, params.provider.as_deref())?;

    // Fragments never wait on a rate fetch; the full page owns the refresh
    // and the currency banner. A missing rate renders placeholder prices.
    let rate = state.currency().cached();

    let controller = ListingController::new(provider, slug.clone());
    let loaded_pages = params.page - 1;
    controller
        .resume_at(
            loaded_pages,
            u64::from(loaded_pages) * u64::from(PAGE_SIZE),
            params.filters.clone(),
        )
        .await;
    let snapshot = controller.load_more().await;

    let listing_path = listing_href(&slug, false, None, params.provider.as_deref(), &snapshot.filters);
    let listing = ListingViewModel::build(
        &snapshot,
        rate,
        false,
        &state.config().currency.format,
        &listing_path,
    );

    let next_href = listing.next_page.map(|page| {
        listing_href(
            &slug,
            true,
            Some(page),
            params.provider.as_deref(),
            &snapshot.filters,
        )
    });

    Ok(ListingItemsTemplate {
        clear_href: listing_href(&slug, false, None, params.provider.as_deref(), &FilterSelection::new()),
        listing,
        next_href,
    }
    .into_response())
}

/// Query parameters for the JSON collection endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiQuery {
    pub page: Option<u32>,
    pub provider: Option<String>,
}

/// One product in the JSON collection response. `price` is a decimal USD
/// amount; callers multiply by 100 for integer cents.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProduct {
    pub id: String,
    pub name: String,
    pub image: String,
    pub price: f64,
    pub slug: String,
}

/// JSON collection page envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCollectionPage {
    pub products: Vec<ApiProduct>,
    pub has_more: bool,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Serve one page of a collection as JSON.
///
/// Provider failures other than an unknown source degrade to an empty
/// envelope carrying an `error` message, so API consumers keep a stable
/// shape to parse.
#[instrument(skip(state))]
pub async fn api_show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ApiQuery>,
) -> Result<Json<ApiCollectionPage>> {
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(AppError::BadRequest("page must be at least 1".to_owned()));
    }
    let provider = query
        .provider
        .as_deref()
        .unwrap_or(&state.config().default_provider);
    if state.providers().get(provider).is_none() {
        return Err(AppError::NotFound(format!("unknown provider: {provider}")));
    }

    let fetched = state
        .providers()
        .fetch_page(provider, &slug, page, &FilterSelection::new())
        .await;

    let envelope = match fetched {
        Ok(result) => ApiCollectionPage {
            products: result
                .items
                .into_iter()
                .map(|item| ApiProduct {
                    id: item.id,
                    name: item.name,
                    image: item.image_url,
                    #[allow(clippy::cast_precision_loss)]
                    price: item.price_cents_usd as f64 / 100.0,
                    slug: item.slug,
                })
                .collect(),
            has_more: result.has_more,
            total: result.total_count,
            error: None,
        },
        Err(ProviderError::NotFound(source)) => {
            return Err(AppError::NotFound(source));
        }
        Err(e) => {
            tracing::warn!(error = %e, "collection fetch failed, serving error envelope");
            ApiCollectionPage {
                products: Vec::new(),
                has_more: false,
                total: 0,
                error: Some("Product service unavailable".to_owned()),
            }
        }
    };

    Ok(Json(envelope))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::time::Duration;

    use laced_core::PriceFormat;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{
        CurrencyConfig, MarketConfig, ProvidersConfig, ResaleConfig, SneaksConfig,
        StorefrontConfig,
    };

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn params_default_to_page_one_without_filters() {
        let params = parse_params(&pairs(&[]));
        assert_eq!(params.page, 1);
        assert_eq!(params.provider, None);
        assert!(!params.retry_currency);
        assert!(params.filters.is_empty());
    }

    #[test]
    fn params_pick_up_page_provider_and_filters() {
        let params = parse_params(&pairs(&[
            ("page", "3"),
            ("provider", "market"),
            ("f_brand", "nike,adidas"),
            ("f_size", "42"),
        ]));
        assert_eq!(params.page, 3);
        assert_eq!(params.provider.as_deref(), Some("market"));
        assert!(params.filters.contains("brand", "nike"));
        assert!(params.filters.contains("brand", "adidas"));
        assert!(params.filters.contains("size", "42"));
    }

    #[test]
    fn garbage_page_falls_back_to_one() {
        let params = parse_params(&pairs(&[("page", "zero"), ("page", "0")]));
        assert_eq!(params.page, 1);
    }

    #[test]
    fn retry_flag_only_matches_currency() {
        assert!(parse_params(&pairs(&[("retry", "currency")])).retry_currency);
        assert!(!parse_params(&pairs(&[("retry", "listing")])).retry_currency);
    }

    #[test]
    fn titles_come_from_slugs() {
        assert_eq!(title_from_slug("new-arrivals"), "New Arrivals");
        assert_eq!(title_from_slug("air-max"), "Air Max");
        assert_eq!(title_from_slug("sale"), "Sale");
    }

    #[test]
    fn listing_href_is_canonical() {
        let mut filters = FilterSelection::new();
        filters.toggle("brand", "nike");
        filters.toggle("brand", "adidas");

        let href = listing_href("air-max", true, Some(2), None, &filters);
        assert_eq!(
            href,
            "/collections/air-max/items?page=2&f_brand=adidas%2Cnike"
        );

        let href = listing_href("air-max", false, None, None, &FilterSelection::new());
        assert_eq!(href, "/collections/air-max");
    }

    #[test]
    fn facet_links_toggle_the_selection() {
        let mut filters = FilterSelection::new();
        filters.toggle("brand", "nike");
        let facets = vec![FacetDescriptor {
            id: "brand".to_owned(),
            label: "Brand".to_owned(),
            options: vec!["nike".to_owned(), "adidas".to_owned()],
        }];

        let views = facet_views("air-max", None, &facets, &filters);
        assert_eq!(views.len(), 1);

        let nike = &views[0].options[0];
        assert!(nike.selected);
        // Clicking the selected value removes it.
        assert_eq!(nike.href, "/collections/air-max");

        let adidas = &views[0].options[1];
        assert!(!adidas.selected);
        assert_eq!(
            adidas.href,
            "/collections/air-max?f_brand=adidas%2Cnike"
        );
    }

    /// State with every integration pointed at one mock server and the
    /// in-memory cart backend.
    fn test_state(server: &MockServer) -> AppState {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            base_url: "http://localhost".to_owned(),
            default_provider: "sneaks".to_owned(),
            currency: CurrencyConfig {
                api_url: format!("{}/rate", server.uri()),
                ttl: Duration::from_secs(3600),
                code: "IDR".to_owned(),
                format: PriceFormat::default(),
            },
            providers: ProvidersConfig {
                sneaks: SneaksConfig {
                    api_url: server.uri(),
                    api_key: SecretString::from("key"),
                },
                resale: ResaleConfig {
                    api_url: server.uri(),
                    token_url: format!("{}/oauth/token", server.uri()),
                    client_id: "client".to_owned(),
                    client_secret: SecretString::from("secret"),
                    request_timeout: Duration::from_secs(5),
                    max_attempts: 1,
                    retry_backoff: Duration::from_millis(1),
                },
                market: MarketConfig {
                    api_url: server.uri(),
                    api_key: SecretString::from("key"),
                },
            },
            sentry_dsn: None,
        };
        AppState::without_database(config).unwrap()
    }

    fn sneaks_body(total: u64) -> serde_json::Value {
        json!({
            "products": [{
                "styleID": "CW2288-111",
                "shoeName": "Air Max 90",
                "thumbnail": "https://img.example.com/am90.jpg",
                "urlKey": "air-max-90",
                "retailPrice": 150.0,
            }],
            "total": total,
        })
    }

    #[tokio::test]
    async fn api_serves_a_page_of_products() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sneaks_body(1)))
            .mount(&server)
            .await;

        let Json(page) = api_show(
            State(test_state(&server)),
            Path("air-max".to_owned()),
            Query(ApiQuery {
                page: Some(1),
                provider: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(page.products.len(), 1);
        assert_eq!(page.products[0].id, "CW2288-111");
        assert_eq!(page.products[0].slug, "air-max-90");
        assert!((page.products[0].price - 150.0).abs() < f64::EPSILON);
        assert_eq!(page.total, 1);
        assert!(!page.has_more);
        assert!(page.error.is_none());
    }

    #[tokio::test]
    async fn api_provider_failure_keeps_a_stable_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let Json(page) = api_show(
            State(test_state(&server)),
            Path("air-max".to_owned()),
            Query(ApiQuery {
                page: None,
                provider: None,
            }),
        )
        .await
        .unwrap();

        assert!(page.products.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.total, 0);
        assert_eq!(page.error.as_deref(), Some("Product service unavailable"));
    }

    #[tokio::test]
    async fn api_unknown_provider_is_not_found() {
        let server = MockServer::start().await;

        let err = api_show(
            State(test_state(&server)),
            Path("air-max".to_owned()),
            Query(ApiQuery {
                page: Some(1),
                provider: Some("stockx".to_owned()),
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn api_unknown_collection_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = api_show(
            State(test_state(&server)),
            Path("does-not-exist".to_owned()),
            Query(ApiQuery {
                page: Some(1),
                provider: None,
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn api_page_zero_is_rejected() {
        let server = MockServer::start().await;

        let err = api_show(
            State(test_state(&server)),
            Path("air-max".to_owned()),
            Query(ApiQuery {
                page: Some(0),
                provider: None,
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn fragments_read_the_rate_cache_without_fetching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status_code": 200,
                "data": { "mid": 3400.0 },
            })))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sneaks_body(30)))
            .mount(&server)
            .await;

        let response = items(
            State(test_state(&server)),
            Path("air-max".to_owned()),
            Query(pairs(&[("page", "2")])),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        // With nothing cached the fragment renders the loading placeholder
        // instead of waiting on the rate endpoint (the mock expects 0 calls).
        assert!(html.contains("Air Max 90"));
        assert!(html.contains("\u{2026}"));
    }
}
