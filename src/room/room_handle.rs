//! The seam between the room view-model and the messaging SDK that backs a room.

use std::{fmt, future::Future};

use eyeball::Subscriber;
use indexmap::IndexMap;
use ruma::{EventId, OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, TransactionId};
use serde_json::Value;

use crate::{
    errors::SdkError,
    power_levels::RoomPowerLevels,
    timeline::{TimelineEntryId, TimelineHandle},
};

/// In-memory file data, tagged with its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl Blob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self { data, mime_type: mime_type.into() }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("mime_type", &self.mime_type)
            .field("size", &bytesize::ByteSize::b(self.size()))
            .finish()
    }
}

/// Attachments of an event, keyed by the content path their URL is written to
/// once uploaded, e.g. `url` or `info.thumbnail_url`.
pub type Attachments<U> = IndexMap<&'static str, U>;

/// How the logged-in user came to leave an archived room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
    Left,
    Kicked,
    Banned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDetails {
    pub kind: ArchiveKind,
    /// The member who kicked or banned the user.
    pub actor: Option<OwnedUserId>,
    pub actor_name: Option<String>,
    pub reason: Option<String>,
}

impl ArchiveDetails {
    pub fn left() -> Self {
        Self { kind: ArchiveKind::Left, actor: None, actor_name: None, reason: None }
    }
}

/// A room, as provided by the messaging SDK.
///
/// All async methods suspend only on network or storage access; the view-models
/// never call them concurrently for the same room.
pub trait RoomHandle: Send + Sync + 'static {
    /// A pending upload created by [`RoomHandle::create_attachment`],
    /// uploaded when the event carrying it is sent.
    type Upload: Send + fmt::Debug;

    fn room_id(&self) -> &RoomId;

    fn name(&self) -> Option<String>;

    fn is_archived(&self) -> bool;

    /// Details on why the room is archived, if it is.
    fn archive_details(&self) -> Option<ArchiveDetails>;

    fn is_encrypted(&self) -> bool;

    fn is_joined(&self) -> bool;

    fn open_timeline(&self) -> impl Future<Output = Result<TimelineHandle, SdkError>> + Send;

    fn observe_power_levels(&self) -> impl Future<Output = Result<Subscriber<RoomPowerLevels>, SdkError>> + Send;

    fn send_event(
        &self,
        event_type: &str,
        content: Value,
        attachments: Option<Attachments<Self::Upload>>,
    ) -> impl Future<Output = Result<(), SdkError>> + Send;

    fn send_redaction(
        &self,
        id: &TimelineEntryId,
        reason: Option<&str>,
    ) -> impl Future<Output = Result<(), SdkError>> + Send;

    fn create_attachment(&self, blob: Blob, filename: &str) -> Self::Upload;

    fn get_state(
        &self,
        event_type: &str,
        state_key: &str,
    ) -> impl Future<Output = Result<Option<Value>, SdkError>> + Send;

    fn set_state(
        &self,
        event_type: &str,
        state_key: &str,
        content: Value,
    ) -> impl Future<Output = Result<(), SdkError>> + Send;

    /// Looks up the event ID of the logged-in user's confirmed `key` reaction to `event_id`.
    fn own_annotation_event(
        &self,
        event_id: &EventId,
        key: &str,
    ) -> impl Future<Output = Result<Option<OwnedEventId>, SdkError>> + Send;

    /// Removes a queued event from the send queue before it is sent.
    fn abort_pending_event(&self, transaction_id: &TransactionId) -> impl Future<Output = Result<(), SdkError>> + Send;

    fn clear_unread(&self) -> impl Future<Output = Result<(), SdkError>> + Send;

    fn mark_typing(&self) -> impl Future<Output = Result<(), SdkError>> + Send;

    /// Joins the room with the given ID or alias, resolving once the room is joined.
    fn join_room(&self, room_id_or_alias: &str) -> impl Future<Output = Result<OwnedRoomId, SdkError>> + Send;

    fn leave(&self) -> impl Future<Output = Result<(), SdkError>> + Send;

    fn forget(&self) -> impl Future<Output = Result<(), SdkError>> + Send;

    fn rejoin(&self) -> impl Future<Output = Result<(), SdkError>> + Send;

    /// Releases the resources held for an archived room.
    fn release(&self);
}
