//! Database operations for `processed_cards`, the per-unit projection of
//! order line items.

use sqlx::PgPool;

use crate::DbError;

/// A row from the `processed_cards` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessedCardRow {
    pub id: i64,
    pub tenant_id: String,
    pub card_id: String,
    pub order_id: i64,
    pub line_item_id: String,
    pub ordinal: i32,
    pub title: String,
    pub is_add_on: bool,
    pub is_express: bool,
}

/// A processed card produced by the line-item processor.
#[derive(Debug, Clone)]
pub struct NewProcessedCard {
    pub tenant_id: String,
    pub card_id: String,
    pub order_id: i64,
    pub line_item_id: String,
    pub ordinal: i32,
    pub title: String,
    pub is_add_on: bool,
    pub is_express: bool,
}

/// Upserts a processed card.
///
/// `card_id` is deterministic, so reprocessing the same order conflicts on
/// `(tenant_id, card_id)` and refreshes the classification fields in place.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_processed_card(pool: &PgPool, card: &NewProcessedCard) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO processed_cards \
             (tenant_id, card_id, order_id, line_item_id, ordinal, title, is_add_on, is_express) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (tenant_id, card_id) DO UPDATE SET \
             order_id     = EXCLUDED.order_id, \
             line_item_id = EXCLUDED.line_item_id, \
             ordinal      = EXCLUDED.ordinal, \
             title        = EXCLUDED.title, \
             is_add_on    = EXCLUDED.is_add_on, \
             is_express   = EXCLUDED.is_express",
    )
    .bind(&card.tenant_id)
    .bind(&card.card_id)
    .bind(card.order_id)
    .bind(&card.line_item_id)
    .bind(card.ordinal)
    .bind(&card.title)
    .bind(card.is_add_on)
    .bind(card.is_express)
    .execute(pool)
    .await?;

    Ok(())
}

/// Lists the current card ids for one order, used to diff a freshly
/// regenerated card set against what the last pass produced.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_card_ids_for_order(pool: &PgPool, order_id: i64) -> Result<Vec<String>, DbError> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT card_id FROM processed_cards WHERE order_id = $1 ORDER BY line_item_id, ordinal",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Deletes processed cards that vanished from an order. The matching
/// `card_states` rows are soft-deleted separately so in-flight polls still
/// observe the removal instead of a silent disappearance.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_processed_cards(
    pool: &PgPool,
    order_id: i64,
    card_ids: &[String],
) -> Result<(), DbError> {
    if card_ids.is_empty() {
        return Ok(());
    }

    sqlx::query("DELETE FROM processed_cards WHERE order_id = $1 AND card_id = ANY($2)")
        .bind(order_id)
        .bind(card_ids)
        .execute(pool)
        .await?;

    Ok(())
}
