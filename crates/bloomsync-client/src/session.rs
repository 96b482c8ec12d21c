//! Client sync session: watermark polling, deduplication, echo suppression,
//! and burst coalescing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use bloomsync_core::types::{CardStateView, OrderCardPatch, RealtimeUpdate};

use crate::api::ChangesApi;
use crate::error::ClientError;

const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(300);

/// A change the UI should apply.
#[derive(Debug, Clone, PartialEq)]
pub enum CardChange {
    Upserted(CardStateView),
    /// The card was removed by reconciliation; drop it from the board.
    Removed { card_id: String },
}

impl CardChange {
    fn card_id(&self) -> &str {
        match self {
            CardChange::Upserted(view) => &view.card_id,
            CardChange::Removed { card_id } => card_id,
        }
    }
}

/// Result of an optimistic patch.
#[derive(Debug)]
pub enum PatchOutcome {
    /// Server accepted; the returned state is authoritative.
    Applied(CardStateView),
    /// Server reports the card was removed meanwhile. The caller's
    /// optimistic edit must be rolled back by dropping the card.
    RejectedStale { card_id: String },
}

/// One tenant's live view of the card-state feed.
///
/// Both transports feed the same path: poll results go through
/// [`SyncSession::tick`], SSE payloads through [`SyncSession::ingest`].
/// Either way a change is admitted once, so running both transports at the
/// same time is safe and is the intended deployment.
pub struct SyncSession<A: ChangesApi> {
    api: A,
    watermark: Option<DateTime<Utc>>,
    /// Last admitted `updated_at` per card. Changes at or before this are
    /// duplicates (redelivery, SSE/poll overlap, or our own echo).
    last_seen: HashMap<String, DateTime<Utc>>,
    buffer: Vec<CardChange>,
    buffer_opened_at: Option<Instant>,
    coalesce_window: Duration,
}

impl<A: ChangesApi> SyncSession<A> {
    #[must_use]
    pub fn new(api: A) -> Self {
        Self {
            api,
            watermark: None,
            last_seen: HashMap::new(),
            buffer: Vec::new(),
            buffer_opened_at: None,
            coalesce_window: DEFAULT_COALESCE_WINDOW,
        }
    }

    #[must_use]
    pub fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window = window;
        self
    }

    /// Initial full load. Stale rows are skipped; they are tombstones for
    /// cards this session never rendered.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from the feed request.
    pub async fn start(&mut self) -> Result<Vec<CardChange>, ClientError> {
        let page = self.api.fetch_changes(None).await?;
        self.watermark = Some(page.server_timestamp);

        let mut changes = Vec::new();
        for view in page.changes {
            self.last_seen.insert(view.card_id.clone(), view.updated_at);
            if !view.is_stale {
                changes.push(CardChange::Upserted(view));
            }
        }
        tracing::debug!(cards = changes.len(), "initial load complete");
        Ok(changes)
    }

    /// One timer tick: fetch changes past the watermark and admit them into
    /// the coalescing buffer. Call [`SyncSession::drain`] for the UI batch.
    ///
    /// # Errors
    ///
    /// Propagates any [`ClientError`] from the feed request. The watermark
    /// only advances on success, so a failed tick is retried wholesale by
    /// the next one; no backoff is needed at a fixed interval.
    pub async fn tick(&mut self) -> Result<(), ClientError> {
        let page = self.api.fetch_changes(self.watermark).await?;
        self.watermark = Some(page.server_timestamp);
        for view in page.changes {
            self.admit(view);
        }
        Ok(())
    }

    /// Feeds one SSE-delivered update into the session. The event carries
    /// the full post-change row, so both transports admit through the same
    /// dedup path; a deletion arrives as the stale row and surfaces as
    /// [`CardChange::Removed`].
    pub fn ingest(&mut self, update: RealtimeUpdate) {
        self.admit(update.state);
    }

    /// Returns the buffered changes once the coalescing window has elapsed
    /// since the first buffered change (bursts collapse into one batch).
    /// An empty vec means nothing is ready yet.
    pub fn drain(&mut self, now: Instant) -> Vec<CardChange> {
        let Some(opened_at) = self.buffer_opened_at else {
            return Vec::new();
        };
        if now.duration_since(opened_at) < self.coalesce_window {
            return Vec::new();
        }
        self.buffer_opened_at = None;
        std::mem::take(&mut self.buffer)
    }

    /// Ends the session, returning whatever is still buffered so the caller
    /// can apply or discard it. All sync state is dropped; a later
    /// [`SyncSession::start`] performs a fresh full load.
    pub fn stop(&mut self) -> Vec<CardChange> {
        self.watermark = None;
        self.last_seen.clear();
        self.buffer_opened_at = None;
        std::mem::take(&mut self.buffer)
    }

    /// Applies a patch through the server, recording the result so the echo
    /// arriving later over the feed is not re-emitted to the UI.
    ///
    /// # Errors
    ///
    /// Propagates transport errors; the caller keeps its optimistic state
    /// and may retry. A stale rejection is NOT an error: it returns
    /// [`PatchOutcome::RejectedStale`] so the caller rolls back.
    pub async fn submit_patch(
        &mut self,
        card_id: &str,
        patch: &OrderCardPatch,
    ) -> Result<PatchOutcome, ClientError> {
        match self.api.patch_card(card_id, patch).await {
            Ok(view) => {
                // Our own write: record it as seen so the feed echo is
                // swallowed instead of re-rendering the card.
                self.last_seen.insert(view.card_id.clone(), view.updated_at);
                Ok(PatchOutcome::Applied(view))
            }
            Err(ClientError::StaleCard { card_id }) => {
                tracing::info!(card_id, "patch rejected, card removed meanwhile");
                Ok(PatchOutcome::RejectedStale { card_id })
            }
            Err(other) => Err(other),
        }
    }

    fn admit(&mut self, view: CardStateView) {
        if let Some(seen) = self.last_seen.get(&view.card_id) {
            if view.updated_at <= *seen {
                return;
            }
        }
        self.last_seen.insert(view.card_id.clone(), view.updated_at);

        let change = if view.is_stale {
            CardChange::Removed {
                card_id: view.card_id,
            }
        } else {
            CardChange::Upserted(view)
        };

        // Within one batch the newest change per card wins.
        self.buffer.retain(|c| c.card_id() != change.card_id());
        self.buffer.push(change);
        if self.buffer_opened_at.is_none() {
            self.buffer_opened_at = Some(Instant::now());
        }
    }
}
