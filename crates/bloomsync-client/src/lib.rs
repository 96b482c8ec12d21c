//! Client-side sync for board UIs: initial load, watermark polling, SSE
//! consumption, and optimistic patches.
//!
//! The server guarantees at-least-once delivery (a change can appear on both
//! the polling feed and the SSE stream, or twice across polls), so
//! [`SyncSession`] deduplicates by `(card_id, updated_at)` and suppresses
//! the echo of the client's own writes. Rendering stays idempotent: feeding
//! the same change twice produces one UI event.

mod api;
mod error;
mod session;
mod sse;

pub use api::{ChangesApi, ChangesPage, HttpChangesApi};
pub use error::ClientError;
pub use session::{CardChange, PatchOutcome, SyncSession};
pub use sse::{decode_frame, SseClient, SseEvent, SseFrame, SseParser};
