//! Order reconciliation: the single write path from a Shopify order payload
//! to the local order, card, and state tables.
//!
//! Webhooks deliver one order at a time; manual sync delivers a batch. Both
//! funnel into [`Reconciler::upsert_order`], so replaying a webhook or
//! re-running a sync converges on the same rows instead of duplicating them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::PgPool;

use bloomsync_core::tags::{extract_delivery_date, extract_time_window};
use bloomsync_core::types::CardStateView;
use bloomsync_db::{NewLineItem, NewOrder, NewProcessedCard};
use bloomsync_shopify::{validate_order, ShopifyOrder};

use crate::processor::{process, LabelCatalog};
use crate::EngineError;

/// What one reconciliation pass did to one order.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Local row id of the order.
    pub order_id: i64,
    /// Total units after quantity expansion, express included.
    pub unit_count: usize,
    /// Default state rows created this pass (first sighting of a
    /// non-express unit). Full views, for realtime fan-out.
    pub created_cards: Vec<CardStateView>,
    /// States soft-deleted this pass because their unit vanished from the
    /// order. Returned for realtime fan-out.
    pub removed_cards: Vec<CardStateView>,
    /// The delivery date was taken from `created_at` because no tag parsed.
    pub used_fallback_date: bool,
}

/// Per-order entry in a [`SyncReport`]. One bad order never aborts the
/// batch; its error is carried here instead.
#[derive(Debug)]
pub struct OrderSyncResult {
    pub shopify_order_id: i64,
    pub outcome: Result<ReconcileOutcome, EngineError>,
}

/// The result of a manual sync batch.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub results: Vec<OrderSyncResult>,
    /// Set when the batch was cancelled between orders; every order already
    /// in `results` is fully committed.
    pub cancelled: bool,
}

impl SyncReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Reconciles Shopify order payloads into the local tables.
#[derive(Clone)]
pub struct Reconciler {
    pool: PgPool,
}

impl Reconciler {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ingests one order payload (webhook path).
    ///
    /// Loads the tenant's label catalog for this single order; the batch
    /// path loads it once per batch instead.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Shopify`] if the payload fails validation, or
    /// [`EngineError::Db`] if any write fails.
    pub async fn upsert_order(
        &self,
        tenant_id: &str,
        store_id: &str,
        order: &ShopifyOrder,
    ) -> Result<ReconcileOutcome, EngineError> {
        let rows = bloomsync_db::load_label_catalog(&self.pool, tenant_id).await?;
        let catalog = LabelCatalog::from_rows(rows);
        self.upsert_order_with_catalog(tenant_id, store_id, order, &catalog)
            .await
    }

    /// Reconciles a batch of orders fetched by manual sync.
    ///
    /// Orders are committed one at a time; a failure is recorded in the
    /// report and the batch continues. `cancel` is checked between orders,
    /// so cancellation never leaves a single order half-reconciled.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] only if the label catalog cannot be
    /// loaded; per-order failures live in the report.
    pub async fn sync_orders(
        &self,
        tenant_id: &str,
        store_id: &str,
        orders: &[ShopifyOrder],
        cancel: &AtomicBool,
    ) -> Result<SyncReport, EngineError> {
        let rows = bloomsync_db::load_label_catalog(&self.pool, tenant_id).await?;
        let catalog = LabelCatalog::from_rows(rows);

        let mut report = SyncReport::default();
        for order in orders {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(
                    tenant_id,
                    store_id,
                    completed = report.results.len(),
                    remaining = orders.len() - report.results.len(),
                    "sync cancelled between orders"
                );
                report.cancelled = true;
                break;
            }

            let outcome = self
                .upsert_order_with_catalog(tenant_id, store_id, order, &catalog)
                .await;
            if let Err(error) = &outcome {
                tracing::warn!(
                    tenant_id,
                    shopify_order_id = order.id,
                    %error,
                    "order failed to reconcile, continuing batch"
                );
            }
            report.results.push(OrderSyncResult {
                shopify_order_id: order.id,
                outcome,
            });
        }

        Ok(report)
    }

    async fn upsert_order_with_catalog(
        &self,
        tenant_id: &str,
        store_id: &str,
        order: &ShopifyOrder,
        catalog: &LabelCatalog,
    ) -> Result<ReconcileOutcome, EngineError> {
        validate_order(order)?;

        let tagged_date = extract_delivery_date(&order.tags);
        let used_fallback_date = tagged_date.is_none();
        let delivery_date = tagged_date.or_else(|| order.created_at.map(|t| t.date_naive()));
        if used_fallback_date {
            tracing::warn!(
                tenant_id,
                shopify_order_id = order.id,
                fallback = ?delivery_date,
                "no delivery date tag, falling back to order creation date"
            );
        }
        let time_window = extract_time_window(&order.tags).as_tag();

        let order_id = bloomsync_db::upsert_order(
            &self.pool,
            &NewOrder {
                tenant_id: tenant_id.to_string(),
                store_id: store_id.to_string(),
                shopify_order_id: order.id.to_string(),
                delivery_date,
                time_window,
                tags: order.tags.clone(),
            },
        )
        .await?;

        let line_items: Vec<NewLineItem> = order
            .line_items
            .iter()
            .map(|item| NewLineItem {
                line_item_id: item.id.to_string(),
                product_id: item.product_id,
                variant_id: item.variant_id,
                title: item.title.clone(),
                quantity: item.quantity,
                unit_price: item.price.clone(),
            })
            .collect();
        bloomsync_db::replace_line_items(&self.pool, order_id, &line_items).await?;

        let prior_ids = bloomsync_db::list_card_ids_for_order(&self.pool, order_id).await?;
        let units = process(order, catalog);

        let mut created_cards = Vec::new();
        for unit in &units {
            bloomsync_db::upsert_processed_card(
                &self.pool,
                &NewProcessedCard {
                    tenant_id: tenant_id.to_string(),
                    card_id: unit.card_id.clone(),
                    order_id,
                    line_item_id: unit.line_item_id.clone(),
                    ordinal: unit.ordinal,
                    title: unit.title.clone(),
                    is_add_on: unit.is_add_on,
                    is_express: unit.is_express,
                },
            )
            .await?;

            // Express units are display-only: no state row, no work card.
            if !unit.is_express {
                if let Some(view) =
                    bloomsync_db::upsert_default(&self.pool, tenant_id, &unit.card_id).await?
                {
                    created_cards.push(view);
                }
            }
        }

        let current_ids: HashSet<&str> = units.iter().map(|u| u.card_id.as_str()).collect();
        let vanished: Vec<String> = prior_ids
            .into_iter()
            .filter(|id| !current_ids.contains(id.as_str()))
            .collect();

        bloomsync_db::delete_processed_cards(&self.pool, order_id, &vanished).await?;
        let removed_cards = bloomsync_db::mark_stale(&self.pool, tenant_id, &vanished).await?;

        tracing::debug!(
            tenant_id,
            shopify_order_id = order.id,
            order_id,
            units = units.len(),
            created = created_cards.len(),
            removed = removed_cards.len(),
            "order reconciled"
        );

        Ok(ReconcileOutcome {
            order_id,
            unit_count: units.len(),
            created_cards,
            removed_cards,
            used_fallback_date,
        })
    }
}
