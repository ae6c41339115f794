//! In-memory stand-ins for the messaging SDK and the host platform, used by tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crossbeam_channel::{Sender, unbounded};
use eyeball::{SharedObservable, Subscriber};
use imbl::Vector;
use ruma::{EventId, OwnedEventId, OwnedRoomId, OwnedTransactionId, RoomId, TransactionId};
use serde_json::Value;

use super::{
    attachments::{LoadedVideo, PickedFile, Platform},
    room_handle::{ArchiveDetails, Attachments, Blob, RoomHandle},
};
use crate::{
    errors::{AttachmentError, SdkError},
    image_utils::{LoadedImage, test_images::png},
    power_levels::{RoomPowerLevels, test_levels},
    timeline::{TimelineDiffs, TimelineEntry, TimelineEntryId, TimelineHandle},
};

/// Something the code under test asked the room to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Event { event_type: String, content: Value, attachments: Vec<&'static str> },
    Redaction { target: TimelineEntryId, reason: Option<String> },
    Abort(OwnedTransactionId),
    State { event_type: String, state_key: String, content: Value },
    Join(String),
}

#[derive(Debug)]
pub struct MockUpload {
    pub filename: String,
    pub size: u64,
}

#[derive(Debug)]
pub struct MockRoom {
    room_id: OwnedRoomId,
    archive: Option<ArchiveDetails>,
    power_levels: SharedObservable<RoomPowerLevels>,
    entries: Mutex<Vector<Arc<TimelineEntry>>>,
    timeline_sender: Mutex<Option<Sender<TimelineDiffs>>>,
    timeline_error: Mutex<Option<SdkError>>,
    send_error: Mutex<Option<SdkError>>,
    join_result: Mutex<Result<OwnedRoomId, SdkError>>,
    state: Mutex<HashMap<(String, String), Value>>,
    own_annotation: Mutex<Option<OwnedEventId>>,
    sent: Mutex<Vec<Sent>>,
    clear_unread_calls: AtomicUsize,
    typing_calls: AtomicUsize,
    released: AtomicUsize,
}

impl MockRoom {
    pub fn new() -> Self {
        Self {
            room_id: RoomId::parse("!room:example.org").unwrap(),
            archive: None,
            power_levels: SharedObservable::new(test_levels::default_levels()),
            entries: Mutex::new(Vector::new()),
            timeline_sender: Mutex::new(None),
            timeline_error: Mutex::new(None),
            send_error: Mutex::new(None),
            join_result: Mutex::new(Ok(RoomId::parse("!joined:example.org").unwrap())),
            state: Mutex::new(HashMap::new()),
            own_annotation: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            clear_unread_calls: AtomicUsize::new(0),
            typing_calls: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn archived(details: ArchiveDetails) -> Self {
        Self { archive: Some(details), ..Self::new() }
    }

    pub fn with_entries(self, entries: impl IntoIterator<Item = TimelineEntry>) -> Self {
        *self.entries.lock().unwrap() = entries.into_iter().map(Arc::new).collect();
        self
    }

    pub fn set_power_levels(&self, power_levels: RoomPowerLevels) {
        self.power_levels.set(power_levels);
    }

    pub fn fail_timeline_with(&self, error: SdkError) {
        *self.timeline_error.lock().unwrap() = Some(error);
    }

    pub fn fail_sends_with(&self, error: SdkError) {
        *self.send_error.lock().unwrap() = Some(error);
    }

    pub fn set_join_result(&self, result: Result<OwnedRoomId, SdkError>) {
        *self.join_result.lock().unwrap() = result;
    }

    pub fn set_own_annotation(&self, event_id: &str) {
        *self.own_annotation.lock().unwrap() = Some(EventId::parse(event_id).unwrap());
    }

    pub fn push_timeline_diffs(&self, diffs: TimelineDiffs) {
        let sender = self.timeline_sender.lock().unwrap();
        sender.as_ref().expect("timeline not opened").send(diffs).unwrap();
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn state(&self, event_type: &str) -> Option<Value> {
        self.state.lock().unwrap().get(&(event_type.to_owned(), String::new())).cloned()
    }

    pub fn clear_unread_calls(&self) -> usize {
        self.clear_unread_calls.load(Ordering::SeqCst)
    }

    pub fn typing_calls(&self) -> usize {
        self.typing_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn record(&self, sent: Sent) -> Result<(), SdkError> {
        if let Some(error) = self.send_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

impl RoomHandle for MockRoom {
    type Upload = MockUpload;

    fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn name(&self) -> Option<String> {
        Some("Rustaceans".to_owned())
    }

    fn is_archived(&self) -> bool {
        self.archive.is_some()
    }

    fn archive_details(&self) -> Option<ArchiveDetails> {
        self.archive.clone()
    }

    fn is_encrypted(&self) -> bool {
        true
    }

    fn is_joined(&self) -> bool {
        self.archive.is_none()
    }

    async fn open_timeline(&self) -> Result<TimelineHandle, SdkError> {
        if let Some(error) = self.timeline_error.lock().unwrap().clone() {
            return Err(error);
        }
        let (sender, updates) = unbounded();
        *self.timeline_sender.lock().unwrap() = Some(sender);
        Ok(TimelineHandle { entries: self.entries.lock().unwrap().clone(), updates })
    }

    async fn observe_power_levels(&self) -> Result<Subscriber<RoomPowerLevels>, SdkError> {
        Ok(self.power_levels.subscribe())
    }

    async fn send_event(
        &self,
        event_type: &str,
        content: Value,
        attachments: Option<Attachments<MockUpload>>,
    ) -> Result<(), SdkError> {
        let attachments = attachments.map(|a| a.keys().copied().collect()).unwrap_or_default();
        self.record(Sent::Event { event_type: event_type.to_owned(), content, attachments })
    }

    async fn send_redaction(&self, id: &TimelineEntryId, reason: Option<&str>) -> Result<(), SdkError> {
        self.record(Sent::Redaction { target: id.clone(), reason: reason.map(ToOwned::to_owned) })
    }

    fn create_attachment(&self, blob: Blob, filename: &str) -> MockUpload {
        MockUpload { filename: filename.to_owned(), size: blob.size() }
    }

    async fn get_state(&self, event_type: &str, state_key: &str) -> Result<Option<Value>, SdkError> {
        Ok(self.state.lock().unwrap().get(&(event_type.to_owned(), state_key.to_owned())).cloned())
    }

    async fn set_state(&self, event_type: &str, state_key: &str, content: Value) -> Result<(), SdkError> {
        self.record(Sent::State {
            event_type: event_type.to_owned(),
            state_key: state_key.to_owned(),
            content: content.clone(),
        })?;
        self.state.lock().unwrap().insert((event_type.to_owned(), state_key.to_owned()), content);
        Ok(())
    }

    async fn own_annotation_event(&self, _event_id: &EventId, _key: &str) -> Result<Option<OwnedEventId>, SdkError> {
        Ok(self.own_annotation.lock().unwrap().clone())
    }

    async fn abort_pending_event(&self, transaction_id: &TransactionId) -> Result<(), SdkError> {
        self.record(Sent::Abort(transaction_id.to_owned()))
    }

    async fn clear_unread(&self) -> Result<(), SdkError> {
        self.clear_unread_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mark_typing(&self) -> Result<(), SdkError> {
        self.typing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn join_room(&self, room_id_or_alias: &str) -> Result<OwnedRoomId, SdkError> {
        self.sent.lock().unwrap().push(Sent::Join(room_id_or_alias.to_owned()));
        self.join_result.lock().unwrap().clone()
    }

    async fn leave(&self) -> Result<(), SdkError> {
        Ok(())
    }

    async fn forget(&self) -> Result<(), SdkError> {
        Ok(())
    }

    async fn rejoin(&self) -> Result<(), SdkError> {
        Ok(())
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Videos of this type fail to load on [`MockPlatform`].
pub const UNPLAYABLE_VIDEO_MIME_TYPE: &str = "video/webm";

/// A platform whose file picker returns a preset file once.
#[derive(Debug)]
pub struct MockPlatform {
    picked: Mutex<Option<PickedFile>>,
    pixel_permission: bool,
    thumbnail_requests: Mutex<Vec<u32>>,
}

impl MockPlatform {
    pub fn picking(file: Option<PickedFile>) -> Self {
        Self {
            picked: Mutex::new(file),
            pixel_permission: true,
            thumbnail_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn without_pixel_permission(self) -> Self {
        Self { pixel_permission: false, ..self }
    }

    pub fn thumbnail_requests(&self) -> Vec<u32> {
        self.thumbnail_requests.lock().unwrap().clone()
    }
}

impl Platform for MockPlatform {
    fn has_read_pixel_permission(&self) -> bool {
        self.pixel_permission
    }

    async fn open_file(&self, _accept: Option<&str>) -> Option<PickedFile> {
        self.picked.lock().unwrap().take()
    }

    async fn load_video(&self, blob: Blob) -> Result<LoadedVideo, AttachmentError> {
        if blob.mime_type == UNPLAYABLE_VIDEO_MIME_TYPE {
            return Err(AttachmentError::UnsupportedVideo(blob.mime_type));
        }
        Ok(LoadedVideo { blob, width: 640, height: 360, duration: Some(1500) })
    }

    async fn video_thumbnail(&self, video: &LoadedVideo, max_dimension: u32) -> Result<LoadedImage, AttachmentError> {
        self.thumbnail_requests.lock().unwrap().push(max_dimension);
        let width = video.width.min(max_dimension);
        LoadedImage::load(png(width, width * video.height / video.width))
    }
}
