//! HTTP client and payload types for the Shopify Admin orders API.
//!
//! Two ingestion producers consume this crate: the webhook handler (single
//! order payloads pushed by Shopify) and the manual sync path (full order
//! fetches per store and delivery-date tag). Both hand the same
//! [`ShopifyOrder`] shape to the reconciler.

mod client;
mod error;
mod pagination;
mod retry;
mod types;
mod validate;

pub use client::{OrdersClient, StoreHandle, MAX_PAGES};
pub use error::ShopifyError;
pub use pagination::extract_next_cursor;
pub use types::{ShopifyLineItem, ShopifyOrder, ShopifyOrdersResponse};
pub use validate::validate_order;
