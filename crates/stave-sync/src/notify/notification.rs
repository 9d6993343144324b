//! Parsing of Plex notification payloads.
//!
//! ```json
//! {"NotificationContainer": {"type": "timeline", "TimelineEntry": [
//!     {"itemID": "101", "sectionID": "4", "state": 5, "type": 10, "queueSize": 1}
//! ]}}
//! ```

use serde::Deserialize;
use stave_core::model::{EntityKind, NativeKey};

use crate::error::{SyncError, SyncResult};
use crate::reconcile::{Change, ChangeState};

const STATE_PROCESSED: i64 = 5;
const STATE_DELETED: i64 = 9;

impl ChangeState {
    /// Map a timeline state code. Intermediate states (created, progress,
    /// matching, downloading, processing) map to `None`.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            STATE_PROCESSED => Some(Self::Processed),
            STATE_DELETED => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Ids arrive as either JSON strings or numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(rename = "NotificationContainer")]
    container: Container,
}

#[derive(Debug, Deserialize)]
struct Container {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "TimelineEntry", default)]
    timeline: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "itemID")]
    item_id: RawId,
    #[serde(rename = "sectionID")]
    section_id: Option<RawId>,
    state: i64,
    #[serde(rename = "type")]
    item_type: u32,
    #[serde(rename = "queueSize")]
    queue_size: Option<i64>,
}

/// One entry of a timeline notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub key: NativeKey,
    pub section_id: Option<String>,
    /// `None` for item types outside the music tree.
    pub kind: Option<EntityKind>,
    pub state: i64,
    /// Items still outstanding in the upstream batch, this one included.
    pub queue_size: Option<i64>,
}

impl TimelineEntry {
    /// The change this entry asks for, if it is one we act on.
    #[must_use]
    pub fn change(&self) -> Option<Change> {
        Some(Change {
            kind: self.kind?,
            key: self.key,
            state: ChangeState::from_code(self.state)?,
        })
    }

    /// Whether this entry closes an upstream batch.
    #[must_use]
    pub fn ends_batch(&self) -> bool {
        matches!(self.queue_size, None | Some(1))
    }
}

/// A parsed notification message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Timeline(Vec<TimelineEntry>),
    /// Any other notification type (playing, activity, ...).
    Other(String),
}

fn entry(value: serde_json::Value) -> SyncResult<TimelineEntry> {
    let raw: RawEntry = serde_json::from_value(value)
        .map_err(|e| SyncError::MalformedNotification(e.to_string()))?;
    let item_id = raw.item_id.into_string();
    let key = item_id
        .trim()
        .parse()
        .map(NativeKey::new)
        .map_err(|_| SyncError::MalformedNotification(format!("non-numeric itemID {item_id:?}")))?;
    Ok(TimelineEntry {
        key,
        section_id: raw.section_id.map(RawId::into_string),
        kind: EntityKind::from_type_code(raw.item_type),
        state: raw.state,
        queue_size: raw.queue_size,
    })
}

/// Parse a raw notification message.
///
/// # Errors
///
/// Timeline entries are parsed one by one. A bad entry is logged and
/// dropped; the rest of the message is kept.
///
/// # Errors
///
/// Returns [`SyncError::MalformedNotification`] if the message is not a
/// notification container, or if it carries timeline entries and none of
/// them is usable.
pub fn parse_notification(text: &str) -> SyncResult<Notification> {
    let payload: Payload =
        serde_json::from_str(text).map_err(|e| SyncError::MalformedNotification(e.to_string()))?;
    let container = payload.container;
    if container.kind != "timeline" {
        return Ok(Notification::Other(container.kind));
    }

    let total = container.timeline.len();
    let mut last_error = None;
    let mut entries = Vec::with_capacity(total);
    for value in container.timeline {
        match entry(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                log::warn!("Dropping timeline entry: {e}");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if entries.is_empty() => Err(e),
        _ => {
            if entries.len() < total {
                log::debug!("Kept {} of {total} timeline entries", entries.len());
            }
            Ok(Notification::Timeline(entries))
        }
    }
}
