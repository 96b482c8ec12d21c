mod card_states;
mod realtime;
mod sync;
mod webhooks;

use std::{
    collections::HashMap,
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{broadcast, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use bloomsync_core::types::RealtimeUpdate;
use bloomsync_core::{AppConfig, StoreConfig};

use crate::middleware::{
    actor_identity, enforce_rate_limit, request_id, require_bearer_auth, AuthState,
    RateLimitState, RequestId,
};

/// Settings for outbound Shopify calls made by the manual sync endpoint.
#[derive(Debug, Clone)]
pub struct ShopifySettings {
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
    pub inter_request_delay_ms: u64,
}

impl Default for ShopifySettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: "bloomsync/0.1".to_string(),
            max_retries: 3,
            retry_backoff_base_secs: 1,
            inter_request_delay_ms: 0,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Fan-out channel feeding every connected SSE client. Senders never
    /// block; a lagging subscriber drops messages and recovers via polling.
    pub realtime: broadcast::Sender<RealtimeUpdate>,
    pub shopify: ShopifySettings,
    /// Configured store handles the manual sync endpoint may pull from.
    /// Resolved once at startup; credential rotation means a restart.
    pub stores: Arc<Vec<StoreConfig>>,
    pub heartbeat: Duration,
    /// Per-tenant cancellation flags for in-flight manual syncs.
    pub sync_cancels: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: &AppConfig) -> Self {
        let (realtime, _) = broadcast::channel(config.realtime_channel_capacity);
        Self {
            pool,
            realtime,
            shopify: ShopifySettings {
                request_timeout_secs: config.shopify_request_timeout_secs,
                user_agent: config.shopify_user_agent.clone(),
                max_retries: config.shopify_max_retries,
                retry_backoff_base_secs: config.shopify_retry_backoff_base_secs,
                inter_request_delay_ms: config.shopify_inter_request_delay_ms,
            },
            stores: Arc::new(config.shopify_stores.clone()),
            heartbeat: Duration::from_secs(config.realtime_heartbeat_secs),
            sync_cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Publishes a realtime update. A send error only means no SSE client is
    /// connected right now, which is fine; polling clients catch up.
    pub fn publish(&self, update: RealtimeUpdate) {
        let _ = self.realtime.send(update);
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict_stale" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_unavailable" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &bloomsync_db::DbError) -> ApiError {
    match error {
        bloomsync_db::DbError::NotFound => {
            ApiError::new(request_id, "not_found", "card not found")
        }
        bloomsync_db::DbError::StaleCard { card_id } => ApiError::new(
            request_id,
            "conflict_stale",
            format!("card {card_id} was removed by order reconciliation"),
        ),
        other => {
            tracing::error!(error = %other, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-actor-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/webhooks/orders", post(webhooks::receive_order))
        .route("/api/v1/orders/sync", post(sync::run_sync))
        .route("/api/v1/orders/sync/cancel", post(sync::cancel_sync))
        .route(
            "/api/v1/card-states/changes",
            get(card_states::list_changes),
        )
        .route(
            "/api/v1/card-states/{card_id}",
            patch(card_states::patch_card_state),
        )
        .route("/api/v1/realtime/orders", get(realtime::stream_updates))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(axum::middleware::from_fn(actor_identity)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match bloomsync_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(240, Duration::from_secs(60))
}

#[cfg(test)]
pub(crate) fn test_state(pool: PgPool, stores: Vec<StoreConfig>) -> AppState {
    let (realtime, _) = broadcast::channel(64);
    AppState {
        pool,
        realtime,
        shopify: ShopifySettings::default(),
        stores: Arc::new(stores),
        heartbeat: Duration::from_secs(15),
        sync_cancels: Arc::new(Mutex::new(HashMap::new())),
    }
}
