//! Database operations for `orders` and `order_line_items`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub tenant_id: String,
    pub store_id: String,
    pub shopify_order_id: String,
    pub delivery_date: Option<NaiveDate>,
    pub time_window: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `order_line_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineItemRow {
    pub id: i64,
    pub order_id: i64,
    pub line_item_id: String,
    pub product_id: Option<i64>,
    pub variant_id: Option<i64>,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

/// Canonical order fields produced by the reconciler.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub tenant_id: String,
    pub store_id: String,
    pub shopify_order_id: String,
    pub delivery_date: Option<NaiveDate>,
    pub time_window: Option<String>,
    pub tags: Vec<String>,
}

/// One line item as received from Shopify, ready for persistence.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub line_item_id: String,
    pub product_id: Option<i64>,
    pub variant_id: Option<i64>,
    pub title: String,
    pub quantity: i32,
    /// Decimal string from the Shopify payload; cast to `NUMERIC(10,2)` by
    /// the database engine on insert.
    pub unit_price: Option<String>,
}

/// Upserts an order row.
///
/// Conflicts on `(tenant_id, shopify_order_id)` update `store_id`,
/// `delivery_date`, `time_window`, `tags`, and `updated_at` in place, so a
/// redelivered webhook or a repeated sync refreshes the row instead of
/// duplicating it. The delivery date may legitimately change here when an
/// order is re-tagged and re-synced.
///
/// Returns the internal `id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_order(pool: &PgPool, order: &NewOrder) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO orders \
             (tenant_id, store_id, shopify_order_id, delivery_date, time_window, tags) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (tenant_id, shopify_order_id) DO UPDATE SET \
             store_id      = EXCLUDED.store_id, \
             delivery_date = EXCLUDED.delivery_date, \
             time_window   = EXCLUDED.time_window, \
             tags          = EXCLUDED.tags, \
             updated_at    = NOW() \
         RETURNING id",
    )
    .bind(&order.tenant_id)
    .bind(&order.store_id)
    .bind(&order.shopify_order_id)
    .bind(order.delivery_date)
    .bind(&order.time_window)
    .bind(&order.tags)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Replaces the full line-item set of an order in one transaction.
///
/// Line items are refreshed wholesale on every reconciliation pass; a
/// delete-and-insert inside a single transaction keeps concurrent readers
/// from observing a half-written set.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back.
pub async fn replace_line_items(
    pool: &PgPool,
    order_id: i64,
    items: &[NewLineItem],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM order_line_items WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    for item in items {
        sqlx::query(
            "INSERT INTO order_line_items \
                 (order_id, line_item_id, product_id, variant_id, title, quantity, unit_price) \
             VALUES ($1, $2, $3, $4, $5, $6, $7::numeric(10,2))",
        )
        .bind(order_id)
        .bind(&item.line_item_id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(&item.title)
        .bind(item.quantity)
        .bind(&item.unit_price)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Looks up an order by its Shopify source id within a tenant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_by_source(
    pool: &PgPool,
    tenant_id: &str,
    shopify_order_id: &str,
) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(
        "SELECT id, tenant_id, store_id, shopify_order_id, delivery_date, \
                time_window, tags, created_at, updated_at \
         FROM orders \
         WHERE tenant_id = $1 AND shopify_order_id = $2",
    )
    .bind(tenant_id)
    .bind(shopify_order_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
