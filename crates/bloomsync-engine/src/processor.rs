//! Line-item expansion and classification.
//!
//! Each order line item becomes `quantity` individually addressable units
//! ("cards"), each with a deterministic id so that reprocessing the same
//! order yields the same set. The whole idempotence story rests on that
//! property.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use bloomsync_db::LabelRow;
use bloomsync_shopify::ShopifyOrder;

/// The label name that marks a product as an add-on (ribbon, card, vase).
pub const ADD_ON_LABEL: &str = "Add-Ons";

/// One unit of work derived from a line item. Recomputed on every
/// reconciliation pass and diffed against the prior set by `card_id`;
/// never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedLineItem {
    pub card_id: String,
    pub line_item_id: String,
    /// Zero-based index within the line item's quantity.
    pub ordinal: i32,
    pub title: String,
    pub is_add_on: bool,
    pub is_express: bool,
}

/// Saved labels for one product, as maintained by the label CRUD service.
#[derive(Debug, Clone)]
pub struct ProductLabels {
    pub names: Vec<String>,
    pub priority: i32,
}

/// Resolves a product reference to its locally saved labels.
///
/// `None` means the product was never saved or synced locally, a normal
/// data-quality condition that degrades to the default classification,
/// never an error.
pub trait LabelLookup {
    fn lookup(&self, product_id: Option<i64>, variant_id: Option<i64>) -> Option<&ProductLabels>;
}

/// In-memory label catalog, loaded once per reconciliation pass.
///
/// Variant-level rows take precedence over product-level rows
/// (`variant_id IS NULL`) for the same product.
#[derive(Debug, Default)]
pub struct LabelCatalog {
    by_variant: HashMap<(i64, i64), ProductLabels>,
    by_product: HashMap<i64, ProductLabels>,
}

impl LabelCatalog {
    #[must_use]
    pub fn from_rows(rows: Vec<LabelRow>) -> Self {
        let mut catalog = Self::default();
        for row in rows {
            let labels = ProductLabels {
                names: row.label_names,
                priority: row.priority,
            };
            match row.variant_id {
                Some(variant_id) => {
                    catalog
                        .by_variant
                        .insert((row.product_id, variant_id), labels);
                }
                None => {
                    catalog.by_product.insert(row.product_id, labels);
                }
            }
        }
        catalog
    }
}

impl LabelLookup for LabelCatalog {
    fn lookup(&self, product_id: Option<i64>, variant_id: Option<i64>) -> Option<&ProductLabels> {
        let product_id = product_id?;
        if let Some(variant_id) = variant_id {
            if let Some(labels) = self.by_variant.get(&(product_id, variant_id)) {
                return Some(labels);
            }
        }
        self.by_product.get(&product_id)
    }
}

/// Deterministic card id for one unit of a line item.
///
/// Hash of `"{line_item_id}:{ordinal}"`, truncated to 16 hex chars: stable
/// across reprocessing, unique in practice within a tenant since Shopify
/// line-item ids are globally unique.
#[must_use]
pub fn card_id(line_item_id: i64, ordinal: i32) -> String {
    let digest = Sha256::digest(format!("{line_item_id}:{ordinal}").as_bytes());
    format!("{digest:x}")[..16].to_string()
}

/// Expands an order's line items into processed units and classifies each.
///
/// - `quantity` copies per line item, each with its own deterministic id.
/// - `is_add_on` when the product's saved labels include [`ADD_ON_LABEL`];
///   unknown products default to `false` with a data-quality warning.
/// - `is_express` when the title contains "express" (case-insensitive).
///   Express units are flagged for UI highlighting and excluded from the
///   work-card split (see [`work_card_split`]) but retained here so the
///   order record stays complete.
#[must_use]
pub fn process(order: &ShopifyOrder, labels: &impl LabelLookup) -> Vec<ProcessedLineItem> {
    let mut units = Vec::new();

    for item in &order.line_items {
        let saved = labels.lookup(item.product_id, item.variant_id);
        if saved.is_none() {
            tracing::warn!(
                order_id = order.id,
                line_item_id = item.id,
                product_id = ?item.product_id,
                variant_id = ?item.variant_id,
                "product has no saved labels, defaulting to main item"
            );
        }
        let is_add_on = saved.is_some_and(|l| l.names.iter().any(|n| n == ADD_ON_LABEL));
        let is_express = item.title.to_lowercase().contains("express");

        for ordinal in 0..item.quantity {
            units.push(ProcessedLineItem {
                card_id: card_id(item.id, ordinal),
                line_item_id: item.id.to_string(),
                ordinal,
                title: item.title.clone(),
                is_add_on,
                is_express,
            });
        }
    }

    units
}

/// Splits processed units into the (main, add-on) card sets shown to the
/// florist. Express units appear in neither; they never get a work card.
#[must_use]
pub fn work_card_split(
    units: &[ProcessedLineItem],
) -> (Vec<&ProcessedLineItem>, Vec<&ProcessedLineItem>) {
    let workable = units.iter().filter(|u| !u.is_express);
    workable.partition(|u| !u.is_add_on)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubLookup(HashMap<i64, ProductLabels>);

    impl LabelLookup for StubLookup {
        fn lookup(
            &self,
            product_id: Option<i64>,
            _variant_id: Option<i64>,
        ) -> Option<&ProductLabels> {
            self.0.get(&product_id?)
        }
    }

    fn labels(pairs: &[(i64, &[&str])]) -> StubLookup {
        StubLookup(
            pairs
                .iter()
                .map(|(id, names)| {
                    (
                        *id,
                        ProductLabels {
                            names: names.iter().map(ToString::to_string).collect(),
                            priority: 0,
                        },
                    )
                })
                .collect(),
        )
    }

    fn order(items: serde_json::Value) -> ShopifyOrder {
        serde_json::from_value(serde_json::json!({
            "id": 1001,
            "tags": "25/01/2025",
            "line_items": items
        }))
        .expect("valid order fixture")
    }

    #[test]
    fn emits_quantity_copies_with_distinct_deterministic_ids() {
        let order = order(serde_json::json!([
            {"id": 11, "product_id": 7001, "variant_id": 8001, "title": "Rose Bouquet", "quantity": 3}
        ]));
        let lookup = labels(&[]);

        let first = process(&order, &lookup);
        let second = process(&order, &lookup);

        assert_eq!(first.len(), 3);
        assert_eq!(first, second, "reprocessing must be deterministic");

        let mut ids: Vec<_> = first.iter().map(|u| u.card_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3, "each unit needs a distinct card id");
    }

    #[test]
    fn card_id_depends_on_line_item_and_ordinal() {
        assert_eq!(card_id(11, 0), card_id(11, 0));
        assert_ne!(card_id(11, 0), card_id(11, 1));
        assert_ne!(card_id(11, 0), card_id(12, 0));
        assert_eq!(card_id(11, 0).len(), 16);
    }

    #[test]
    fn add_on_label_classifies_unit() {
        let order = order(serde_json::json!([
            {"id": 11, "product_id": 7001, "variant_id": 8001, "title": "Ribbon", "quantity": 1},
            {"id": 12, "product_id": 7002, "variant_id": 8002, "title": "Rose Bouquet", "quantity": 1}
        ]));
        let lookup = labels(&[(7001, &["Add-Ons"]), (7002, &["Bouquets"])]);

        let units = process(&order, &lookup);
        assert!(units[0].is_add_on, "labeled Add-Ons");
        assert!(!units[1].is_add_on, "labeled Bouquets");
    }

    #[test]
    fn unknown_product_defaults_to_main_item_without_erroring() {
        let order = order(serde_json::json!([
            {"id": 11, "product_id": null, "variant_id": null, "title": "Custom wrap", "quantity": 1}
        ]));
        let units = process(&order, &labels(&[]));
        assert_eq!(units.len(), 1);
        assert!(!units[0].is_add_on);
    }

    #[test]
    fn express_title_is_flagged_case_insensitively() {
        let order = order(serde_json::json!([
            {"id": 11, "product_id": 7001, "variant_id": 8001, "title": "Rose Bouquet - Express", "quantity": 1},
            {"id": 12, "product_id": 7001, "variant_id": 8001, "title": "EXPRESS delivery upgrade", "quantity": 1},
            {"id": 13, "product_id": 7002, "variant_id": 8002, "title": "Tulip Bundle", "quantity": 1}
        ]));
        let units = process(&order, &labels(&[]));
        assert!(units[0].is_express);
        assert!(units[1].is_express);
        assert!(!units[2].is_express);
    }

    #[test]
    fn express_units_are_excluded_from_both_card_sets() {
        let order = order(serde_json::json!([
            {"id": 11, "product_id": 7001, "variant_id": 8001, "title": "Rose Bouquet - Express", "quantity": 1},
            {"id": 12, "product_id": 7002, "variant_id": 8002, "title": "Ribbon", "quantity": 1},
            {"id": 13, "product_id": 7003, "variant_id": 8003, "title": "Tulip Bundle", "quantity": 1}
        ]));
        let lookup = labels(&[(7002, &["Add-Ons"])]);
        let units = process(&order, &lookup);

        // Express unit is retained in the processed record...
        assert_eq!(units.len(), 3);

        // ...but appears in neither work-card set.
        let (main, add_ons) = work_card_split(&units);
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].title, "Tulip Bundle");
        assert_eq!(add_ons.len(), 1);
        assert_eq!(add_ons[0].title, "Ribbon");
    }

    #[test]
    fn variant_level_labels_take_precedence() {
        let rows = vec![
            LabelRow {
                product_id: 7001,
                variant_id: None,
                label_names: vec!["Bouquets".to_string()],
                priority: 1,
            },
            LabelRow {
                product_id: 7001,
                variant_id: Some(8001),
                label_names: vec!["Add-Ons".to_string()],
                priority: 2,
            },
        ];
        let catalog = LabelCatalog::from_rows(rows);

        let variant_hit = catalog.lookup(Some(7001), Some(8001)).expect("variant row");
        assert_eq!(variant_hit.names, vec!["Add-Ons"]);

        let product_fallback = catalog.lookup(Some(7001), Some(9999)).expect("product row");
        assert_eq!(product_fallback.names, vec!["Bouquets"]);

        assert!(catalog.lookup(Some(7777), Some(8001)).is_none());
        assert!(catalog.lookup(None, None).is_none());
    }
}
