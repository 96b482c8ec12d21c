//! Manual sync: fetch every remote order for one delivery date and
//! reconcile the lot, with mid-batch cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use bloomsync_core::tags::extract_delivery_date;
use bloomsync_core::StoreConfig;
use bloomsync_engine::Reconciler;
use bloomsync_shopify::{OrdersClient, StoreHandle};

use super::webhooks::publish_reconcile_events;
use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

const SYNC_PAGE_SIZE: u32 = 250;

/// Selects every store of the tenant instead of one configured store id.
const ALL_STORES: &str = "all";

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub tenant_id: String,
    /// A configured store id, or `"all"` for every store of the tenant.
    /// Store credentials never travel in the request; they are resolved
    /// from the startup configuration.
    pub store_id: String,
    /// Delivery date tag to sync, in the florist convention (`dd/mm/yyyy`).
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct SyncResultItem {
    pub store_id: String,
    pub shopify_order_id: i64,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub unit_count: usize,
    pub created: usize,
    pub removed: usize,
}

/// A store whose remote fetch or batch setup failed outright. Orders from
/// other stores are still reported; the batch is never all-or-nothing.
#[derive(Debug, Serialize)]
pub struct StoreFailure {
    pub store_id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub results: Vec<SyncResultItem>,
    pub store_failures: Vec<StoreFailure>,
}

/// Runs a full sync for the requested store (or all of the tenant's stores)
/// and delivery date. The response only arrives once the batch is done (or
/// cancelled); each listed order is individually committed.
pub async fn run_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<ApiResponse<SyncResponse>>, ApiError> {
    if extract_delivery_date(std::slice::from_ref(&request.date)).is_none() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!("date {:?} is not a dd/mm/yyyy delivery tag", request.date),
        ));
    }

    let stores: Vec<&StoreConfig> = state
        .stores
        .iter()
        .filter(|s| {
            s.tenant_id == request.tenant_id
                && (request.store_id == ALL_STORES || s.store_id == request.store_id)
        })
        .collect();
    if stores.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!(
                "no configured store matches {:?} for tenant {:?}",
                request.store_id, request.tenant_id
            ),
        ));
    }

    let client = OrdersClient::new(
        state.shopify.request_timeout_secs,
        &state.shopify.user_agent,
        state.shopify.max_retries,
        state.shopify.retry_backoff_base_secs,
    )
    .map_err(|e| {
        tracing::error!(error = %e, "failed to build Shopify client");
        ApiError::new(req_id.0.clone(), "internal_error", "client construction failed")
    })?;

    // Register the cancel flag before the first commit so a cancel request
    // arriving mid-batch is observed between orders.
    let cancel = Arc::new(AtomicBool::new(false));
    state
        .sync_cancels
        .lock()
        .await
        .insert(request.tenant_id.clone(), Arc::clone(&cancel));

    let response = sync_stores(&state, &client, &request, &stores, &cancel).await;

    state.sync_cancels.lock().await.remove(&request.tenant_id);

    tracing::info!(
        tenant_id = %request.tenant_id,
        store_id = %request.store_id,
        date = %request.date,
        total = response.total,
        succeeded = response.succeeded,
        failed = response.failed,
        failed_stores = response.store_failures.len(),
        cancelled = response.cancelled,
        "manual sync finished"
    );

    Ok(Json(ApiResponse {
        data: response,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Fetches and reconciles each store in turn, sharing one cancel flag so a
/// mid-batch cancellation also skips the remaining stores.
///
/// Never all-or-nothing: a store whose fetch or batch setup fails is
/// recorded in `store_failures` and the remaining stores still run, so
/// already-committed orders always show up in the report.
async fn sync_stores(
    state: &AppState,
    client: &OrdersClient,
    request: &SyncRequest,
    stores: &[&StoreConfig],
    cancel: &Arc<AtomicBool>,
) -> SyncResponse {
    let reconciler = Reconciler::new(state.pool.clone());
    let mut results = Vec::new();
    let mut store_failures = Vec::new();
    let mut succeeded = 0;
    let mut failed = 0;
    let mut cancelled = false;

    for store in stores {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }

        let handle = StoreHandle {
            store_id: store.store_id.clone(),
            base_url: store.base_url.clone(),
            access_token: store.access_token.clone(),
        };
        let orders = match client
            .fetch_orders_by_date_tag(
                &handle,
                &request.date,
                SYNC_PAGE_SIZE,
                state.shopify.inter_request_delay_ms,
            )
            .await
        {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %request.tenant_id,
                    store_id = %store.store_id,
                    error = %e,
                    "remote order fetch failed, continuing with other stores"
                );
                store_failures.push(StoreFailure {
                    store_id: store.store_id.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let report = match reconciler
            .sync_orders(&request.tenant_id, &store.store_id, &orders, cancel)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %request.tenant_id,
                    store_id = %store.store_id,
                    error = %e,
                    "batch setup failed, continuing with other stores"
                );
                store_failures.push(StoreFailure {
                    store_id: store.store_id.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        for r in &report.results {
            match &r.outcome {
                Ok(outcome) => {
                    publish_reconcile_events(state, &request.tenant_id, outcome);
                    results.push(SyncResultItem {
                        store_id: store.store_id.clone(),
                        shopify_order_id: r.shopify_order_id,
                        status: "ok",
                        error: None,
                        unit_count: outcome.unit_count,
                        created: outcome.created_cards.len(),
                        removed: outcome.removed_cards.len(),
                    });
                }
                Err(error) => results.push(SyncResultItem {
                    store_id: store.store_id.clone(),
                    shopify_order_id: r.shopify_order_id,
                    status: "error",
                    error: Some(error.to_string()),
                    unit_count: 0,
                    created: 0,
                    removed: 0,
                }),
            }
        }
        succeeded += report.succeeded();
        failed += report.failed();
        if report.cancelled {
            cancelled = true;
            break;
        }
    }

    SyncResponse {
        total: results.len(),
        succeeded,
        failed,
        cancelled,
        results,
        store_failures,
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub tenant_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// False when no sync was running for the tenant.
    pub cancel_requested: bool,
}

/// Requests cancellation of the tenant's in-flight sync. Takes effect at the
/// next order boundary; already-committed orders stay committed.
pub async fn cancel_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<CancelRequest>,
) -> Json<ApiResponse<CancelResponse>> {
    let cancel_requested = match state.sync_cancels.lock().await.get(&request.tenant_id) {
        Some(flag) => {
            flag.store(true, Ordering::Relaxed);
            true
        }
        None => false,
    };

    if cancel_requested {
        tracing::info!(tenant_id = %request.tenant_id, "sync cancellation requested");
    }

    Json(ApiResponse {
        data: CancelResponse { cancel_requested },
        meta: ResponseMeta::new(req_id.0),
    })
}
