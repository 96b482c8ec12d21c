//! Structural validation of order payloads before reconciliation.
//!
//! A payload that fails here is rejected with a 4xx by the webhook handler,
//! or recorded as a per-order failure during a batch sync. Validation never
//! aborts the rest of a batch.

use crate::error::ShopifyError;
use crate::types::ShopifyOrder;

/// Checks the invariants the reconciler relies on: a positive order id, and
/// for every line item a positive id, a non-empty title, and quantity >= 1.
///
/// # Errors
///
/// Returns [`ShopifyError::Validation`] naming the first violated field.
pub fn validate_order(order: &ShopifyOrder) -> Result<(), ShopifyError> {
    let order_id = order.id.to_string();

    if order.id <= 0 {
        return Err(ShopifyError::Validation {
            order_id,
            reason: "order id must be positive".to_string(),
        });
    }

    for item in &order.line_items {
        if item.id <= 0 {
            return Err(ShopifyError::Validation {
                order_id,
                reason: format!("line item id must be positive, got {}", item.id),
            });
        }
        if item.title.trim().is_empty() {
            return Err(ShopifyError::Validation {
                order_id,
                reason: format!("line item {} has an empty title", item.id),
            });
        }
        if item.quantity < 1 {
            return Err(ShopifyError::Validation {
                order_id,
                reason: format!(
                    "line item {} has quantity {}, expected >= 1",
                    item.id, item.quantity
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::types::ShopifyLineItem;

    use super::*;

    fn valid_order() -> ShopifyOrder {
        serde_json::from_str(
            r#"{
                "id": 1001,
                "tags": "25/01/2025",
                "line_items": [
                    {"id": 11, "product_id": 5, "variant_id": 7, "title": "Rose Bouquet", "quantity": 2, "price": "59.00"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_order() {
        assert!(validate_order(&valid_order()).is_ok());
    }

    #[test]
    fn rejects_non_positive_order_id() {
        let mut order = valid_order();
        order.id = 0;
        let err = validate_order(&order).unwrap_err();
        assert!(matches!(err, ShopifyError::Validation { .. }), "{err}");
    }

    #[test]
    fn rejects_zero_quantity_line_item() {
        let mut order = valid_order();
        order.line_items[0].quantity = 0;
        let err = validate_order(&order).unwrap_err();
        assert!(err.to_string().contains("quantity"), "{err}");
    }

    #[test]
    fn rejects_empty_title() {
        let mut order = valid_order();
        order.line_items[0].title = "   ".to_string();
        let err = validate_order(&order).unwrap_err();
        assert!(err.to_string().contains("empty title"), "{err}");
    }

    #[test]
    fn order_without_line_items_is_valid() {
        let mut order = valid_order();
        order.line_items = Vec::<ShopifyLineItem>::new();
        assert!(validate_order(&order).is_ok());
    }
}
