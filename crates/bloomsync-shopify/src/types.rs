//! Shopify Admin API payload types for the `orders.json` endpoint and the
//! `orders/create` / `orders/updated` webhook topics.
//!
//! ## Observed shape notes
//!
//! ### Tags
//! The Admin REST API and webhook payloads carry order tags as a single
//! **comma-separated string** (`"25/01/2025, birthday"`), unlike the public
//! products endpoint which uses a JSON array. Some intermediaries re-emit
//! webhooks with tags already split into an array, so deserialization
//! accepts both and normalizes to `Vec<String>` with whitespace trimmed and
//! tag order preserved.
//!
//! ### Line-item `price`
//! A decimal string (e.g. `"59.00"`), never a JSON number. Passed through
//! as-is; the data layer casts it to `NUMERIC` on persistence.
//!
//! ### `product_id` / `variant_id`
//! `null` for custom (draft-order) line items, so both are `Option<i64>`.
//! Classification treats such items as unknown products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Top-level response from `GET /admin/api/.../orders.json`.
#[derive(Debug, Deserialize)]
pub struct ShopifyOrdersResponse {
    pub orders: Vec<ShopifyOrder>,
}

/// A single order, as received from the Admin API or a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyOrder {
    /// Shopify numeric order ID.
    pub id: i64,

    /// Human-facing order name (e.g. `"#1042"`). Absent on some topics.
    #[serde(default)]
    pub name: Option<String>,

    /// Order creation time; the delivery-date fallback when no date tag is
    /// present.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Raw tags, order preserved. See module docs for the dual wire shape.
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub line_items: Vec<ShopifyLineItem>,
}

/// A single order line item.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyLineItem {
    /// Shopify numeric line-item ID, stable across webhook redeliveries.
    pub id: i64,

    #[serde(default)]
    pub product_id: Option<i64>,

    #[serde(default)]
    pub variant_id: Option<i64>,

    pub title: String,

    pub quantity: i32,

    /// Unit price as a decimal string (`"59.00"`). May be absent on
    /// zero-priced items from some store configurations.
    #[serde(default)]
    pub price: Option<String>,
}

/// Accepts tags as either a comma-separated string or a JSON array of
/// strings, normalizing to a trimmed `Vec<String>`.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTags {
        Joined(String),
        Split(Vec<String>),
    }

    let raw = Option::<RawTags>::deserialize(deserializer)?;
    Ok(match raw {
        None => Vec::new(),
        Some(RawTags::Joined(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        Some(RawTags::Split(v)) => v
            .into_iter()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_deserialize_from_comma_separated_string() {
        let order: ShopifyOrder = serde_json::from_str(
            r#"{"id": 1, "tags": "25/01/2025, birthday , ", "line_items": []}"#,
        )
        .unwrap();
        assert_eq!(order.tags, vec!["25/01/2025", "birthday"]);
    }

    #[test]
    fn tags_deserialize_from_array() {
        let order: ShopifyOrder =
            serde_json::from_str(r#"{"id": 1, "tags": ["25/01/2025", "birthday"]}"#).unwrap();
        assert_eq!(order.tags, vec!["25/01/2025", "birthday"]);
    }

    #[test]
    fn missing_tags_default_to_empty() {
        let order: ShopifyOrder = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert!(order.tags.is_empty());
        assert!(order.line_items.is_empty());
    }

    #[test]
    fn null_tags_default_to_empty() {
        let order: ShopifyOrder = serde_json::from_str(r#"{"id": 1, "tags": null}"#).unwrap();
        assert!(order.tags.is_empty());
    }

    #[test]
    fn line_item_optional_fields_accept_null() {
        let item: ShopifyLineItem = serde_json::from_str(
            r#"{"id": 9, "product_id": null, "variant_id": null, "title": "Custom wrap", "quantity": 1}"#,
        )
        .unwrap();
        assert!(item.product_id.is_none());
        assert!(item.variant_id.is_none());
        assert!(item.price.is_none());
    }
}
