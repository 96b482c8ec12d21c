//! Database operations for `card_states`, the mutable florist-owned
//! projection and the single shared resource of the whole engine.
//!
//! All writers (user actions, webhook reconciliation, manual sync) come
//! through [`apply_patch`] or [`mark_stale`]. Both are single-statement row
//! updates, so concurrency needs no global lock: Postgres row-level
//! atomicity gives last-write-wins per `card_id`, which is the documented
//! conflict policy.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bloomsync_core::types::{CardStateView, CardStatus, OrderCardPatch};

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct CardStateRow {
    card_id: String,
    tenant_id: String,
    status: String,
    assigned_to: Option<String>,
    notes: Option<String>,
    sort_order: i32,
    is_stale: bool,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl CardStateRow {
    fn into_view(self) -> Result<CardStateView, DbError> {
        let status: CardStatus = self
            .status
            .parse()
            .map_err(|reason| DbError::InvalidRow { reason })?;
        Ok(CardStateView {
            card_id: self.card_id,
            tenant_id: self.tenant_id,
            status,
            assigned_to: self.assigned_to,
            notes: self.notes,
            sort_order: self.sort_order,
            is_stale: self.is_stale,
            updated_at: self.updated_at,
            updated_by: self.updated_by,
        })
    }
}

const STATE_COLUMNS: &str = "card_id, tenant_id, status, assigned_to, notes, \
                             sort_order, is_stale, updated_at, updated_by";

/// Fetches one card's state.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// on an undecodable status.
pub async fn get_state(
    pool: &PgPool,
    tenant_id: &str,
    card_id: &str,
) -> Result<Option<CardStateView>, DbError> {
    let row = sqlx::query_as::<_, CardStateRow>(&format!(
        "SELECT {STATE_COLUMNS} FROM card_states WHERE tenant_id = $1 AND card_id = $2"
    ))
    .bind(tenant_id)
    .bind(card_id)
    .fetch_optional(pool)
    .await?;

    row.map(CardStateRow::into_view).transpose()
}

/// Creates the default state row for a newly sighted card.
///
/// Idempotent: conflicts on `(tenant_id, card_id)` are ignored, so two
/// concurrent reconciliation passes cannot double-create. A re-sighted card
/// that was previously soft-deleted is revived instead.
///
/// Returns the created row on first sighting, `None` when it already
/// existed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails, or
/// [`DbError::InvalidRow`] on an undecodable status.
pub async fn upsert_default(
    pool: &PgPool,
    tenant_id: &str,
    card_id: &str,
) -> Result<Option<CardStateView>, DbError> {
    let row = sqlx::query_as::<_, CardStateRow>(&format!(
        "INSERT INTO card_states (tenant_id, card_id, updated_by) \
         VALUES ($1, $2, 'system') \
         ON CONFLICT (tenant_id, card_id) DO NOTHING \
         RETURNING {STATE_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(card_id)
    .fetch_optional(pool)
    .await?;

    if row.is_none() {
        // Reconciliation re-surfaced a card that was soft-deleted earlier.
        sqlx::query(
            "UPDATE card_states SET \
                 is_stale   = FALSE, \
                 updated_at = GREATEST(NOW(), updated_at + interval '1 microsecond'), \
                 updated_by = 'system' \
             WHERE tenant_id = $1 AND card_id = $2 AND is_stale = TRUE",
        )
        .bind(tenant_id)
        .bind(card_id)
        .execute(pool)
        .await?;
    }

    row.map(CardStateRow::into_view).transpose()
}

/// Applies a partial patch to one card's state.
///
/// The single mutation entry point for every user action. `updated_at` is
/// always bumped to server time, never client-supplied, and
/// `GREATEST(NOW(), updated_at + 1µs)` keeps it strictly increasing per row
/// even if the wall clock steps backwards; the feed's watermark correctness
/// depends on this.
///
/// # Errors
///
/// - [`DbError::StaleCard`]: the card was soft-deleted by reconciliation;
///   the caller should drop it locally rather than retry.
/// - [`DbError::NotFound`]: no state row exists for this card.
/// - [`DbError::Sqlx`]: the statement fails.
pub async fn apply_patch(
    pool: &PgPool,
    tenant_id: &str,
    card_id: &str,
    patch: &OrderCardPatch,
    actor: &str,
) -> Result<CardStateView, DbError> {
    let set_assigned = patch.assigned_to.is_some();
    let assigned_to = patch.assigned_to.clone().flatten();
    let set_notes = patch.notes.is_some();
    let notes = patch.notes.clone().flatten();

    let row = sqlx::query_as::<_, CardStateRow>(&format!(
        "UPDATE card_states SET \
             status      = COALESCE($3, status), \
             assigned_to = CASE WHEN $4 THEN $5 ELSE assigned_to END, \
             notes       = CASE WHEN $6 THEN $7 ELSE notes END, \
             sort_order  = COALESCE($8, sort_order), \
             updated_at  = GREATEST(NOW(), updated_at + interval '1 microsecond'), \
             updated_by  = $9 \
         WHERE tenant_id = $1 AND card_id = $2 AND is_stale = FALSE \
         RETURNING {STATE_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(card_id)
    .bind(patch.status.map(CardStatus::as_str))
    .bind(set_assigned)
    .bind(assigned_to)
    .bind(set_notes)
    .bind(notes)
    .bind(patch.sort_order)
    .bind(actor)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => row.into_view(),
        None => {
            // Distinguish "soft-deleted meanwhile" from "never existed".
            match get_state(pool, tenant_id, card_id).await? {
                Some(state) if state.is_stale => Err(DbError::StaleCard {
                    card_id: card_id.to_string(),
                }),
                _ => Err(DbError::NotFound),
            }
        }
    }
}

/// Soft-deletes the given cards (reconciliation found them gone from
/// Shopify). Rows are kept so an in-flight poll observes the `is_stale`
/// transition as a deletion event instead of the row silently vanishing.
///
/// Returns the updated rows for realtime fan-out; already-stale cards are
/// skipped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails, or
/// [`DbError::InvalidRow`] on an undecodable status.
pub async fn mark_stale(
    pool: &PgPool,
    tenant_id: &str,
    card_ids: &[String],
) -> Result<Vec<CardStateView>, DbError> {
    if card_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, CardStateRow>(&format!(
        "UPDATE card_states SET \
             is_stale   = TRUE, \
             updated_at = GREATEST(NOW(), updated_at + interval '1 microsecond'), \
             updated_by = 'system' \
         WHERE tenant_id = $1 AND card_id = ANY($2) AND is_stale = FALSE \
         RETURNING {STATE_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(card_ids)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CardStateRow::into_view).collect()
}

/// One page of the change-detection feed.
#[derive(Debug, Clone)]
pub struct ChangesPage {
    pub changes: Vec<CardStateView>,
    /// The client's next watermark.
    pub server_timestamp: DateTime<Utc>,
}

/// Returns every state row of the tenant changed strictly after `since`,
/// plus a fresh server timestamp.
///
/// The returned watermark trails `NOW()` by a safety lag. A patch whose
/// statement-start `NOW()` predates this read can still commit after the
/// row scan below; without the lag the next poll's `updated_at > since`
/// window would skip that row forever. With it the row is re-delivered on
/// the next poll instead, which is safe because clients deduplicate by
/// `(card_id, updated_at)`. An empty result is success, never an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails, or [`DbError::InvalidRow`]
/// on an undecodable status.
pub async fn list_changes_since(
    pool: &PgPool,
    tenant_id: &str,
    since: DateTime<Utc>,
) -> Result<ChangesPage, DbError> {
    let server_timestamp: DateTime<Utc> =
        sqlx::query_scalar("SELECT NOW() - interval '1 second'")
            .fetch_one(pool)
            .await?;

    let rows = sqlx::query_as::<_, CardStateRow>(&format!(
        "SELECT {STATE_COLUMNS} FROM card_states \
         WHERE tenant_id = $1 AND updated_at > $2 \
         ORDER BY updated_at ASC"
    ))
    .bind(tenant_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    let changes = rows
        .into_iter()
        .map(CardStateRow::into_view)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ChangesPage {
        changes,
        server_timestamp,
    })
}
