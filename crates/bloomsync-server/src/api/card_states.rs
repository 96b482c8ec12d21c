//! The polling changes feed and the card-state patch endpoint.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloomsync_core::types::{CardStateView, OrderCardPatch, RealtimeUpdate, UpdateKind};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::{Actor, RequestId};

#[derive(Debug, Deserialize)]
pub struct ChangesParams {
    pub tenant_id: String,
    /// Watermark from the previous poll; omitted on the first poll.
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ChangesData {
    pub changes: Vec<CardStateView>,
    pub server_timestamp: DateTime<Utc>,
}

/// Returns every card state of the tenant changed since the watermark, plus
/// the watermark for the next poll. Omitting `since` replays everything;
/// that is the initial full load.
pub async fn list_changes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ChangesParams>,
) -> Result<Json<ApiResponse<ChangesData>>, ApiError> {
    let since = params.since.unwrap_or(DateTime::UNIX_EPOCH);
    let page = bloomsync_db::list_changes_since(&state.pool, &params.tenant_id, since)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ChangesData {
            changes: page.changes,
            server_timestamp: page.server_timestamp,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PatchParams {
    pub tenant_id: String,
}

/// Applies a partial update to one card and fans it out to SSE subscribers.
///
/// Concurrent patches to the same card resolve last-write-wins at the row
/// level; a patch against a card that reconciliation has since removed is a
/// `409 conflict_stale`, telling the client to drop the card locally.
pub async fn patch_card_state(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(actor): Extension<Actor>,
    Path(card_id): Path<String>,
    Query(params): Query<PatchParams>,
    Json(patch): Json<OrderCardPatch>,
) -> Result<Json<ApiResponse<CardStateView>>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            "patch contains no fields",
        ));
    }

    let view = bloomsync_db::apply_patch(&state.pool, &params.tenant_id, &card_id, &patch, &actor.0)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    state.publish(RealtimeUpdate {
        kind: UpdateKind::OrderUpdated,
        card_id: view.card_id.clone(),
        tenant_id: view.tenant_id.clone(),
        timestamp: view.updated_at,
        updated_by: view.updated_by.clone(),
        changed_fields: patch,
        state: view.clone(),
    });

    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}
