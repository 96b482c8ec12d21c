//! Read-only lookup against `product_labels`.
//!
//! The table is owned by the product-label CRUD service; this engine only
//! consumes it to classify line items. A missing row is a normal condition
//! (product never saved locally), not an error.

use sqlx::PgPool;

use crate::DbError;

/// A row from the `product_labels` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LabelRow {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub label_names: Vec<String>,
    pub priority: i32,
}

/// Loads the tenant's full label catalog in one round trip.
///
/// Reconciliation classifies every unit of every line item, so a single
/// batch load beats a per-item query; catalogs are small (hundreds of
/// products per florist).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_label_catalog(pool: &PgPool, tenant_id: &str) -> Result<Vec<LabelRow>, DbError> {
    let rows = sqlx::query_as::<_, LabelRow>(
        "SELECT product_id, variant_id, label_names, priority \
         FROM product_labels \
         WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
