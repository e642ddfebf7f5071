//! Client for the Tesco groceries "resources" endpoint.
//!
//! The endpoint batches named resources; we only ever ask for one
//! `productsByCategory` page of a single superdepartment. Requests are
//! throttled client-side because the upstream is rate-sensitive.

use crate::catalogue::images::{LARGE_IMAGE_SIZE, SMALL_IMAGE_SIZE, sized_image_url};
use crate::catalogue::json::decode_with_context;
use crate::catalogue::{CatalogueClient, Item, UpstreamError};
use crate::utils::{fmt_duration, log_if_slow, truncate};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_URL: &str = "https://www.tesco.com/groceries/en-GB/resources";

/// The upstream stalls indefinitely on requests without a browser user agent.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/111.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SLOW_FETCH: Duration = Duration::from_secs(2);

/// Longest slice of an error body kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 512;

/// Connection settings for [`TescoClient`].
#[derive(Debug, Clone)]
pub struct TescoOptions {
    pub url: String,
    pub superdepartment: String,
    pub csrf_token: Option<String>,
    pub cookie: Option<String>,
    pub requests_per_minute: u32,
}

pub struct TescoClient {
    http: reqwest::Client,
    options: TescoOptions,
    window: usize,
    limiter: DefaultDirectRateLimiter,
}

impl TescoClient {
    /// Build a client returning `window` items per fetch.
    pub fn new(options: TescoOptions, window: usize) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let per_minute = NonZeroU32::new(options.requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            options,
            window,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    fn request_body(&self, page: u32) -> serde_json::Value {
        serde_json::json!({
            "resources": [
                {
                    "type": "productsByCategory",
                    "params": {
                        "query": { "page": page },
                        "superdepartment": self.options.superdepartment,
                    },
                },
            ],
        })
    }
}

#[async_trait]
impl CatalogueClient for TescoClient {
    async fn fetch(&self, page: u32, offset: usize) -> Result<Vec<Item>, UpstreamError> {
        self.limiter.until_ready().await;
        let start = Instant::now();

        let mut request = self
            .http
            .post(&self.options.url)
            .header(header::ACCEPT, "application/json")
            .json(&self.request_body(page));
        if let Some(token) = &self.options.csrf_token {
            request = request.header("x-csrf-token", token);
        }
        if let Some(cookie) = &self.options.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        log_if_slow(start, SLOW_FETCH, "catalogue fetch");

        if !status.is_success() {
            warn!(page, status = status.as_u16(), "catalogue returned an error status");
            return Err(UpstreamError::BadStatus {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let items = parse_window(&body, page, offset, self.window)?;
        debug!(
            page,
            offset,
            elapsed = fmt_duration(start.elapsed()),
            "catalogue page fetched"
        );
        Ok(items)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourcesResponse {
    products_by_category: Option<ProductsByCategory>,
}

#[derive(Deserialize)]
struct ProductsByCategory {
    data: CategoryData,
}

#[derive(Deserialize)]
struct CategoryData {
    results: CategoryResults,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryResults {
    page_information: Option<PageInformation>,
    product_items: Vec<ProductItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInformation {
    page_size: Option<u32>,
}

#[derive(Deserialize)]
struct ProductItem {
    product: Product,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Product {
    title: String,
    price: f64,
    default_image_url: String,
}

impl From<Product> for Item {
    fn from(product: Product) -> Self {
        Item {
            image_url_small: sized_image_url(&product.default_image_url, SMALL_IMAGE_SIZE),
            image_url_large: sized_image_url(&product.default_image_url, LARGE_IMAGE_SIZE),
            title: product.title,
            price: product.price,
        }
    }
}

/// Decode a resources response and cut the `[offset, offset + window)` slice.
///
/// Fails when the catalogue field is missing instead of yielding an empty
/// list, and when the page is too short to fill the window.
pub(crate) fn parse_window(
    body: &str,
    page: u32,
    offset: usize,
    window: usize,
) -> Result<Vec<Item>, UpstreamError> {
    let response: ResourcesResponse = decode_with_context(body)
        .map_err(|source| UpstreamError::ParseFailed { page, source })?;

    let Some(catalogue) = response.products_by_category else {
        warn!(
            page,
            body = truncate(body, ERROR_BODY_LIMIT),
            "catalogue response is missing productsByCategory"
        );
        return Err(UpstreamError::MissingCatalogue);
    };

    let results = catalogue.data.results;
    if let Some(size) = results.page_information.and_then(|info| info.page_size) {
        debug!(page, page_size = size, "catalogue page information");
    }

    let available = results.product_items.len();
    if offset + window > available {
        return Err(UpstreamError::ShortPage {
            page,
            available,
            needed: offset + window,
        });
    }

    Ok(results
        .product_items
        .into_iter()
        .skip(offset)
        .take(window)
        .map(|item| Item::from(item.product))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_body(count: usize) -> String {
        let products: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "product": {
                        "id": format!("{}", 1000 + i),
                        "title": format!("Product {i}"),
                        "price": 1.0 + i as f64,
                        "defaultImageUrl": format!("https://img.example/{i}.jpg?h=225&w=225"),
                    }
                })
            })
            .collect();
        serde_json::json!({
            "productsByCategory": {
                "data": {
                    "results": {
                        "pageInformation": { "pageSize": count, "pageNo": 3 },
                        "productItems": products,
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn window_is_cut_at_offset() {
        let items = parse_window(&page_body(24), 3, 7, 5).unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].title, "Product 7");
        assert_eq!(items[4].title, "Product 11");
        assert_eq!(items[0].price, 8.0);
        assert_eq!(items[0].image_url_small, "https://img.example/7.jpg?h=225&w=225");
        assert_eq!(items[0].image_url_large, "https://img.example/7.jpg?h=540&w=540");
    }

    #[test]
    fn last_full_window_fits() {
        let items = parse_window(&page_body(24), 0, 19, 5).unwrap();
        assert_eq!(items.last().unwrap().title, "Product 23");
    }

    #[test]
    fn missing_catalogue_fails_loudly() {
        let err = parse_window(r#"{"error": "forbidden"}"#, 1, 0, 5).unwrap_err();
        assert!(matches!(err, UpstreamError::MissingCatalogue));
    }

    #[test]
    fn short_page_is_rejected() {
        let err = parse_window(&page_body(8), 2, 6, 5).unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::ShortPage {
                page: 2,
                available: 8,
                needed: 11
            }
        ));
    }

    #[test]
    fn malformed_product_reports_path() {
        let body = r#"{"productsByCategory": {"data": {"results": {"productItems": [{"product": {"title": "Tea", "price": null, "defaultImageUrl": "x"}}]}}}}"#;
        let err = parse_window(body, 4, 0, 1).unwrap_err();
        let UpstreamError::ParseFailed { page, source } = err else {
            panic!("expected a parse failure");
        };
        assert_eq!(page, 4);
        assert!(source.to_string().contains("productItems[0].product.price"));
    }

    #[test]
    fn request_body_targets_superdepartment() {
        let client = TescoClient::new(
            TescoOptions {
                url: DEFAULT_URL.to_string(),
                superdepartment: "food-cupboard".to_string(),
                csrf_token: None,
                cookie: None,
                requests_per_minute: 30,
            },
            5,
        )
        .unwrap();
        let body = client.request_body(12);
        assert_eq!(body["resources"][0]["type"], "productsByCategory");
        assert_eq!(body["resources"][0]["params"]["query"]["page"], 12);
        assert_eq!(body["resources"][0]["params"]["superdepartment"], "food-cupboard");
    }
}
