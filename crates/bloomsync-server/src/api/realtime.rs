//! Server-sent events stream of card changes.
//!
//! SSE is an optimization over the polling feed, never a replacement: the
//! broadcast channel drops messages for lagging subscribers, and clients are
//! expected to reconcile through `GET /card-states/changes` whenever the
//! stream (re)connects.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub tenant_id: String,
}

/// Opens a tenant-scoped SSE stream.
///
/// Emits a `connected` event first (the client's cue to run a catch-up
/// poll), then an `order_update` event per change. Heartbeats are comments
/// sent by the keep-alive layer so idle connections survive proxies.
pub async fn stream_updates(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let tenant_id = params.tenant_id;
    tracing::debug!(%tenant_id, "sse client connected");

    let connected = stream::once(async {
        Ok(Event::default().event("connected").data("{}"))
    });

    let updates = BroadcastStream::new(state.realtime.subscribe()).filter_map(move |msg| {
        let event = match msg {
            Ok(update) if update.tenant_id == tenant_id => serde_json::to_string(&update)
                .ok()
                .map(|json| Ok(Event::default().event("order_update").data(json))),
            // Other tenants' updates, or a lagged receiver that skipped
            // messages. Skips are recovered by the next poll.
            _ => None,
        };
        futures::future::ready(event)
    });

    Sse::new(connected.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(state.heartbeat)
            .text("heartbeat"),
    )
}
