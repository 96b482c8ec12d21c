use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {store_id} (retry after {retry_after_secs}s)")]
    RateLimited {
        store_id: String,
        retry_after_secs: u64,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid order payload (order {order_id}): {reason}")]
    Validation { order_id: String, reason: String },

    #[error("pagination limit reached for {store_id}: exceeded {max_pages} pages")]
    PaginationLimit { store_id: String, max_pages: usize },

    #[error("invalid store URL \"{store_url}\": {reason}")]
    InvalidStoreUrl { store_url: String, reason: String },
}
