//! Timeline entries: the positions in a room's timeline that tiles are built from.

use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use ruma::{MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedTransactionId, OwnedUserId, EventId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::content::MessageContent;

/// The identifier of a timeline entry: a confirmed event ID or,
/// for entries that are still being sent, the local transaction ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEntryId {
    Event(OwnedEventId),
    Transaction(OwnedTransactionId),
}

impl fmt::Display for TimelineEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(id) => write!(f, "{id}"),
            Self::Transaction(id) => write!(f, "{id}"),
        }
    }
}

/// The confirmed (remote) aggregation of one reaction key on an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationInfo {
    pub count: u32,
    /// Whether the logged-in user is one of the senders of this reaction.
    #[serde(default)]
    pub me: bool,
    #[serde(default)]
    pub first_timestamp: Option<MilliSecondsSinceUnixEpoch>,
}

/// A handle to a local event that has been queued for sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEventHandle {
    pub transaction_id: OwnedTransactionId,
    #[serde(default)]
    pub has_started_sending: bool,
}

/// A reaction (or the redaction of one) that was queued locally but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAnnotation {
    /// `+1` while a reaction is queued, `-1` while a redaction of our reaction is queued.
    pub count: i32,
    #[serde(default)]
    pub annotation_entry: Option<PendingEventHandle>,
    #[serde(default)]
    pub redaction_entry: Option<PendingEventHandle>,
}

impl PendingAnnotation {
    pub fn will_annotate(&self) -> bool {
        self.count > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipChange {
    Joined,
    Left,
    Invited,
    Kicked,
    Banned,
    ProfileChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum EntryKind {
    Message(MessageContent),
    /// A message whose content has been removed.
    Redacted,
    Membership {
        change: MembershipChange,
        target: OwnedUserId,
    },
    /// A hole in the locally known timeline that can be back-filled.
    Gap,
}

/// One position in a room's timeline.
///
/// Entries are owned by the timeline source; tiles only keep a shared reference
/// and get a new `Arc` whenever the entry changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: TimelineEntryId,
    pub sender: OwnedUserId,
    #[serde(default)]
    pub display_name: Option<String>,
    /// `None` while the entry is still pending (not yet acknowledged by the server).
    #[serde(default)]
    pub timestamp: Option<MilliSecondsSinceUnixEpoch>,
    pub kind: EntryKind,
    #[serde(default)]
    pub annotations: Option<IndexMap<String, AnnotationInfo>>,
    #[serde(default)]
    pub pending_annotations: Option<IndexMap<String, PendingAnnotation>>,
    /// The ID of the event this entry replies to.
    #[serde(default)]
    pub context_event_id: Option<OwnedEventId>,
    /// The full entry this entry replies to, once it has been loaded.
    #[serde(default)]
    pub context_entry: Option<Arc<TimelineEntry>>,
    #[serde(default)]
    pub is_unverified: bool,
}

impl TimelineEntry {
    pub fn event_id(&self) -> Option<&EventId> {
        match &self.id {
            TimelineEntryId::Event(id) => Some(id),
            TimelineEntryId::Transaction(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timestamp.is_none()
    }

    pub fn is_redacted(&self) -> bool {
        matches!(self.kind, EntryKind::Redacted)
    }

    pub fn is_reply(&self) -> bool {
        self.context_event_id.is_some()
    }

    pub fn content(&self) -> Option<&MessageContent> {
        match &self.kind {
            EntryKind::Message(content) => Some(content),
            _ => None,
        }
    }

    /// Whether the logged-in user has reacted with `key`, taking queued
    /// reactions and queued redactions into account.
    pub fn have_annotation(&self, key: &str) -> bool {
        let have_remote = self.annotations.as_ref()
            .and_then(|a| a.get(key))
            .is_some_and(|a| a.me);
        let pending = self.pending_annotations.as_ref().and_then(|p| p.get(key));
        let will_annotate = pending.is_some_and(PendingAnnotation::will_annotate);
        if have_remote {
            pending.is_none() || will_annotate
        } else {
            will_annotate
        }
    }

    /// Builds the content of an `m.reaction` event annotating this entry with `key`.
    pub fn annotate(&self, key: &str) -> Value {
        json!({
            "m.relates_to": {
                "rel_type": "m.annotation",
                "event_id": self.id.to_string(),
                "key": key,
            }
        })
    }

    /// Builds the content of a message replying to this entry.
    ///
    /// The body carries the usual quoted fallback of the replied-to message
    /// for clients that don't render replies.
    pub fn reply(&self, msgtype: &str, body: &str) -> Value {
        let quoted = self.content().map(MessageContent::body).unwrap_or_default();
        let mut fallback = String::new();
        for (i, line) in quoted.lines().enumerate() {
            if i == 0 {
                fallback.push_str(&format!("> <{}> {line}\n", self.sender));
            } else {
                fallback.push_str(&format!("> {line}\n"));
            }
        }
        if !fallback.is_empty() {
            fallback.push('\n');
        }
        json!({
            "msgtype": msgtype,
            "body": format!("{fallback}{body}"),
            "m.relates_to": {
                "m.in_reply_to": { "event_id": self.id.to_string() }
            }
        })
    }
}
