//! HTTP client for the Shopify Admin `orders.json` endpoint.

use std::time::Duration;

use reqwest::Client;

use crate::error::ShopifyError;
use crate::pagination::extract_next_cursor;
use crate::retry::retry_with_backoff;
use crate::types::{ShopifyOrder, ShopifyOrdersResponse};

/// Maximum number of pages to fetch before returning an error.
/// Prevents infinite loops on cycling cursors.
pub const MAX_PAGES: usize = 100;

const ADMIN_API_VERSION: &str = "2024-01";

/// Credentials and location for one connected store, resolved by the
/// (out-of-scope) OAuth/credential service before any call into this crate.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    pub store_id: String,
    /// Origin of the store's Admin API, e.g. `https://rosarium.myshopify.com`.
    pub base_url: String,
    pub access_token: String,
}

/// Client for fetching orders from connected stores.
///
/// Handles rate limiting (429), not-found (404), and other non-2xx responses
/// as typed errors, and follows `Link` header cursors across pages.
/// Transient errors (429, network failures) are retried with exponential
/// backoff up to `max_retries` additional attempts.
pub struct OrdersClient {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl OrdersClient {
    /// Creates an `OrdersClient` with configured timeout, `User-Agent`, and
    /// retry policy. Set `max_retries` to `0` to disable retries.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ShopifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Fetches every order carrying `date_tag` from `store`.
    ///
    /// Pages are followed via `Link` cursors; the Admin API has no reliable
    /// server-side tag filter, so filtering happens here after each page.
    /// `inter_request_delay_ms` is applied between page requests (never
    /// before the first).
    ///
    /// All-or-nothing: a failed page discards earlier pages and returns the
    /// error, since a partial order set would make the sync report lie about
    /// which orders exist remotely.
    ///
    /// # Errors
    ///
    /// Propagates any error from the page fetch, or
    /// [`ShopifyError::PaginationLimit`] past [`MAX_PAGES`] pages.
    pub async fn fetch_orders_by_date_tag(
        &self,
        store: &StoreHandle,
        date_tag: &str,
        limit: u32,
        inter_request_delay_ms: u64,
    ) -> Result<Vec<ShopifyOrder>, ShopifyError> {
        let mut matching: Vec<ShopifyOrder> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > MAX_PAGES {
                return Err(ShopifyError::PaginationLimit {
                    store_id: store.store_id.clone(),
                    max_pages: MAX_PAGES,
                });
            }

            if page_count > 1 && inter_request_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(inter_request_delay_ms)).await;
            }

            let (orders, link_header) = self
                .fetch_orders_page(store, limit, cursor.as_deref())
                .await?;

            matching.extend(
                orders
                    .into_iter()
                    .filter(|o| o.tags.iter().any(|t| t == date_tag)),
            );

            cursor = extract_next_cursor(link_header.as_deref());
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!(
            store_id = %store.store_id,
            date_tag,
            pages = page_count,
            orders = matching.len(),
            "fetched remote orders for date tag"
        );

        Ok(matching)
    }

    /// Fetches one page of orders, returning the parsed body and the raw
    /// `Link` header for cursor extraction.
    ///
    /// # Errors
    ///
    /// - [`ShopifyError::RateLimited`]: HTTP 429 after all retries exhausted.
    /// - [`ShopifyError::NotFound`]: HTTP 404 (not retried).
    /// - [`ShopifyError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ShopifyError::Http`]: network failure after all retries exhausted.
    /// - [`ShopifyError::Deserialize`]: body is not a valid orders response.
    pub async fn fetch_orders_page(
        &self,
        store: &StoreHandle,
        limit: u32,
        page_info: Option<&str>,
    ) -> Result<(Vec<ShopifyOrder>, Option<String>), ShopifyError> {
        let url = Self::orders_url(store, limit, page_info)?;

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            let store_id = store.store_id.clone();
            let token = store.access_token.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .header("X-Shopify-Access-Token", &token)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(2);
                    return Err(ShopifyError::RateLimited {
                        store_id,
                        retry_after_secs,
                    });
                }

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(ShopifyError::NotFound { url });
                }

                if !status.is_success() {
                    return Err(ShopifyError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                // Take the Link header before consuming the body.
                let link_header = response
                    .headers()
                    .get(reqwest::header::LINK)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);

                let body = response.text().await?;
                let parsed = serde_json::from_str::<ShopifyOrdersResponse>(&body).map_err(|e| {
                    ShopifyError::Deserialize {
                        context: format!("orders page from {store_id}"),
                        source: e,
                    }
                })?;

                Ok((parsed.orders, link_header))
            }
        })
        .await
    }

    /// Builds the `orders.json` URL for the given store, page size, and
    /// optional cursor. Shopify rejects any filter parameter alongside
    /// `page_info`, so `status=any` is only sent on the first page.
    fn orders_url(
        store: &StoreHandle,
        limit: u32,
        page_info: Option<&str>,
    ) -> Result<String, ShopifyError> {
        let origin = store.base_url.trim_end_matches('/');
        let base = format!("{origin}/admin/api/{ADMIN_API_VERSION}/orders.json");
        let mut url =
            reqwest::Url::parse(&base).map_err(|e| ShopifyError::InvalidStoreUrl {
                store_url: store.base_url.clone(),
                reason: e.to_string(),
            })?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &limit.to_string());
            match page_info {
                Some(cursor) => {
                    pairs.append_pair("page_info", cursor);
                }
                None => {
                    pairs.append_pair("status", "any");
                }
            }
        }

        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StoreHandle {
        StoreHandle {
            store_id: "store-1".to_string(),
            base_url: "https://rosarium.myshopify.com/".to_string(),
            access_token: "shpat_test".to_string(),
        }
    }

    #[test]
    fn first_page_url_carries_status_filter() {
        let url = OrdersClient::orders_url(&store(), 250, None).unwrap();
        assert_eq!(
            url,
            "https://rosarium.myshopify.com/admin/api/2024-01/orders.json?limit=250&status=any"
        );
    }

    #[test]
    fn cursor_page_url_omits_filters() {
        let url = OrdersClient::orders_url(&store(), 250, Some("abc")).unwrap();
        assert!(url.contains("page_info=abc"));
        assert!(!url.contains("status=any"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let bad = StoreHandle {
            store_id: "store-1".to_string(),
            base_url: "not a url".to_string(),
            access_token: String::new(),
        };
        let err = OrdersClient::orders_url(&bad, 250, None).unwrap_err();
        assert!(matches!(err, ShopifyError::InvalidStoreUrl { .. }));
    }
}
