//! Wire types shared by the server, engine, and client crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a work card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Unassigned,
    Assigned,
    Completed,
}

impl CardStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CardStatus::Unassigned => "unassigned",
            CardStatus::Assigned => "assigned",
            CardStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for CardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unassigned" => Ok(CardStatus::Unassigned),
            "assigned" => Ok(CardStatus::Assigned),
            "completed" => Ok(CardStatus::Completed),
            other => Err(format!("unknown card status: {other}")),
        }
    }
}

/// Full view of one card's mutable state, as served by the changes feed and
/// the patch endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardStateView {
    pub card_id: String,
    pub tenant_id: String,
    pub status: CardStatus,
    pub assigned_to: Option<String>,
    pub notes: Option<String>,
    pub sort_order: i32,
    pub is_stale: bool,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Partial patch of a card's state.
///
/// Outer `None` means "leave unchanged"; for the nullable fields,
/// `Some(None)` means "clear". Serde maps a missing JSON key to `None` and
/// an explicit `null` to `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderCardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CardStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub assigned_to: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

/// Distinguishes a missing JSON key (field untouched) from an explicit
/// `null` (field cleared): a present value, including `null`, always
/// lands in the outer `Some`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

impl OrderCardPatch {
    /// True when the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assigned_to.is_none()
            && self.notes.is_none()
            && self.sort_order.is_none()
    }
}

/// Kind of change carried by a realtime update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    OrderCreated,
    OrderUpdated,
    OrderDeleted,
}

/// One change event, delivered over both the polling feed and the SSE
/// channel. Transient; never persisted beyond the feed window.
///
/// Carries the full post-change state, not just the patch: a subscriber can
/// apply the event directly without a follow-up fetch, and a deletion event
/// arrives as the stale row itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeUpdate {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub card_id: String,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
    pub updated_by: String,
    pub changed_fields: OrderCardPatch,
    pub state: CardStateView,
}
