//! Shopify webhook ingestion for the `orders/create` and `orders/updated`
//! topics. Both topics carry the same payload shape and reconcile the same
//! way, so a single endpoint serves both registrations.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use bloomsync_core::types::{OrderCardPatch, RealtimeUpdate, UpdateKind};
use bloomsync_engine::{EngineError, ReconcileOutcome, Reconciler};
use bloomsync_shopify::{ShopifyError, ShopifyOrder};

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct WebhookParams {
    pub tenant_id: String,
    pub store_id: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub order_id: i64,
    pub unit_count: usize,
    pub created_card_ids: Vec<String>,
    pub removed_card_ids: Vec<String>,
}

/// Synchronous ingestion: Shopify only gets its 200 once the order is fully
/// reconciled, so its redelivery machinery doubles as our retry queue.
pub async fn receive_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<WebhookParams>,
    Json(order): Json<ShopifyOrder>,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    let reconciler = Reconciler::new(state.pool.clone());
    let outcome = reconciler
        .upsert_order(&params.tenant_id, &params.store_id, &order)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    publish_reconcile_events(&state, &params.tenant_id, &outcome);

    tracing::info!(
        tenant_id = %params.tenant_id,
        shopify_order_id = order.id,
        units = outcome.unit_count,
        created = outcome.created_cards.len(),
        removed = outcome.removed_cards.len(),
        "webhook order reconciled"
    );

    Ok(Json(ApiResponse {
        data: WebhookAck {
            order_id: outcome.order_id,
            unit_count: outcome.unit_count,
            removed_card_ids: outcome
                .removed_cards
                .iter()
                .map(|c| c.card_id.clone())
                .collect(),
            created_card_ids: outcome
                .created_cards
                .iter()
                .map(|c| c.card_id.clone())
                .collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Fans out what one reconciliation pass did: a creation event per new card
/// and a deletion event per soft-deleted card. Each event carries the full
/// row so subscribers apply it without a follow-up fetch.
pub(super) fn publish_reconcile_events(
    state: &AppState,
    tenant_id: &str,
    outcome: &ReconcileOutcome,
) {
    for created in &outcome.created_cards {
        state.publish(RealtimeUpdate {
            kind: UpdateKind::OrderCreated,
            card_id: created.card_id.clone(),
            tenant_id: tenant_id.to_string(),
            timestamp: created.updated_at,
            updated_by: created.updated_by.clone(),
            changed_fields: OrderCardPatch::default(),
            state: created.clone(),
        });
    }
    for removed in &outcome.removed_cards {
        state.publish(RealtimeUpdate {
            kind: UpdateKind::OrderDeleted,
            card_id: removed.card_id.clone(),
            tenant_id: tenant_id.to_string(),
            timestamp: removed.updated_at,
            updated_by: removed.updated_by.clone(),
            changed_fields: OrderCardPatch::default(),
            state: removed.clone(),
        });
    }
}

pub(super) fn map_engine_error(request_id: String, error: &EngineError) -> ApiError {
    match error {
        EngineError::Shopify(ShopifyError::Validation { order_id, reason }) => ApiError::new(
            request_id,
            "validation_error",
            format!("order {order_id}: {reason}"),
        ),
        EngineError::Shopify(other) => {
            tracing::warn!(error = %other, "upstream Shopify error");
            ApiError::new(request_id, "upstream_unavailable", other.to_string())
        }
        EngineError::Db(db) => super::map_db_error(request_id, db),
    }
}
