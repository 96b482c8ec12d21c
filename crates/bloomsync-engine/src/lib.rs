//! The reconciliation pipeline: order upserts, line-item expansion and
//! classification, and card-state bookkeeping.
//!
//! Two producers feed this crate (the webhook handler and the manual sync
//! path), and both call the same [`Reconciler::upsert_order`] entry point.
//! There is no producer-specific branching inside the core logic.

mod processor;
mod reconciler;

use thiserror::Error;

pub use processor::{
    card_id, process, work_card_split, LabelCatalog, LabelLookup, ProcessedLineItem,
    ProductLabels, ADD_ON_LABEL,
};
pub use reconciler::{OrderSyncResult, ReconcileOutcome, Reconciler, SyncReport};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Shopify(#[from] bloomsync_shopify::ShopifyError),
    #[error(transparent)]
    Db(#[from] bloomsync_db::DbError),
}
