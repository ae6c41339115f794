//! The view-model of an open room: its tile list, its composer, and everything
//! the user can do from the room screen.

use std::sync::Arc;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender, unbounded};
use eyeball::{SharedObservable, Subscriber};
use futures_util::{
    FutureExt,
    future::{AbortHandle, Abortable, Aborted},
};
use ruma::{EventId, OwnedEventId, OwnedRoomId, OwnedUserId, RoomId};
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{
    attachments::{self, AttachmentHooks, AttachmentOutcome, PickedFile, Platform},
    commands::{self, ParsedMessage},
    composer::{ArchivedViewModel, ComposerState, ComposerVariant, ComposerViewModel, RestrictedViewModel},
    room_handle::{ArchiveDetails, RoomHandle},
    room_members::{RoomMember, RoomMembers},
};
use crate::{
    config::RoomViewConfig,
    errors::{AttachmentError, SdkError},
    power_levels::{PINNED_EVENTS_TYPE, ROOM_MESSAGE_TYPE, RoomPowerLevels, UserPowerLevels},
    shared::observable::{ChangeNotifier, PropertyChange},
    timeline::{
        TileAction, TileKindResolver, TileList, TileOptions, TimelineEntry, default_tile_kind_for_entry,
        content::{ClaimContent, MessageContent, TxContent},
    },
    utils,
};

/// Actions the room view-model asks the host app to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    /// Navigate to the given room, e.g. after a successful `/join`.
    OpenRoom(OwnedRoomId),
}

/// The single error shown on the room screen.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ErrorSlot {
    Timeline(String),
    Send(String),
}

/// The content of an `m.room.pinned_events` state event.
#[derive(Debug, Default, Deserialize)]
struct PinnedEvents {
    #[serde(default)]
    pinned: Vec<OwnedEventId>,
}

#[derive(Debug)]
struct ClearUnreadTimer {
    abort_handle: AbortHandle,
    task: JoinHandle<anyhow::Result<()>>,
}

#[derive(Debug)]
pub struct RoomViewModel<R: RoomHandle> {
    room: Arc<R>,
    own_user_id: OwnedUserId,
    config: Arc<RoomViewConfig>,
    tile_kind_for_entry: TileKindResolver,
    tile_list: Option<TileList>,
    composer: Option<ComposerVariant>,
    power_levels: Option<Subscriber<RoomPowerLevels>>,
    user_power_levels: SharedObservable<UserPowerLevels>,
    can_send_message: Option<bool>,
    error: Option<ErrorSlot>,
    clear_unread_timer: Option<ClearUnreadTimer>,
    tile_actions: (Sender<TileAction>, Receiver<TileAction>),
    room_actions: (Sender<RoomAction>, Receiver<RoomAction>),
    members: RoomMembers,
    notifier: ChangeNotifier,
}

impl<R: RoomHandle> RoomViewModel<R> {
    pub fn new(room: Arc<R>, own_user_id: OwnedUserId, config: Arc<RoomViewConfig>) -> Self {
        let composer = room.is_archived().then(|| {
            let details = room.archive_details().unwrap_or_else(ArchiveDetails::left);
            ComposerVariant::Archived(ArchivedViewModel::new(details))
        });
        Self {
            room,
            own_user_id,
            config,
            tile_kind_for_entry: default_tile_kind_for_entry,
            tile_list: None,
            composer,
            power_levels: None,
            user_power_levels: SharedObservable::new(UserPowerLevels::empty()),
            can_send_message: None,
            error: None,
            clear_unread_timer: None,
            tile_actions: unbounded(),
            room_actions: unbounded(),
            members: RoomMembers::default(),
            notifier: ChangeNotifier::default(),
        }
    }

    /// Uses `resolver` instead of the default mapping from entries to tile kinds.
    pub fn with_tile_kind_resolver(mut self, resolver: TileKindResolver) -> Self {
        self.tile_kind_for_entry = resolver;
        self
    }

    /// Starts observing power levels, opens the timeline and schedules clearing the unread count.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn load(&mut self) {
        if !self.room.is_archived() {
            match self.room.observe_power_levels().await {
                Ok(mut subscriber) => {
                    let power_levels = subscriber.next_now();
                    self.power_levels = Some(subscriber);
                    self.apply_power_levels(&power_levels);
                }
                Err(e) => error!(room_id = %self.room.room_id(), "Failed to observe power levels: {e}"),
            }
        }

        match self.room.open_timeline().await {
            Ok(timeline) => {
                let options = TileOptions {
                    room_id: self.room.room_id().to_owned(),
                    own_user_id: self.own_user_id.clone(),
                    power_levels: self.user_power_levels.clone(),
                    tile_kind_for_entry: self.tile_kind_for_entry,
                    config: Arc::clone(&self.config),
                    actions: self.tile_actions.0.clone(),
                };
                if let Some(mut old) = self.tile_list.replace(TileList::new(timeline, Arc::new(options))) {
                    old.dispose();
                }
                self.notifier.emit_property("timelineViewModel");
            }
            Err(e) => {
                error!(room_id = %self.room.room_id(), "room.open_timeline(): {e}");
                self.set_error(ErrorSlot::Timeline(e.message));
            }
        }
        self.clear_unread_after_delay();
    }

    /// Applies everything that happened since the last call:
    /// power level changes, timeline diffs and actions requested by tiles.
    pub fn process_updates(&mut self) {
        self.process_power_levels();
        if let Some(tile_list) = self.tile_list.as_mut() {
            tile_list.process_updates();
        }
        self.process_tile_actions();
    }

    fn process_power_levels(&mut self) {
        let Some(subscriber) = self.power_levels.as_mut() else { return };
        let mut latest = None;
        while let Some(Some(power_levels)) = subscriber.next().now_or_never() {
            latest = Some(power_levels);
        }
        if let Some(power_levels) = latest {
            self.apply_power_levels(&power_levels);
        }
    }

    fn apply_power_levels(&mut self, power_levels: &RoomPowerLevels) {
        let user_power_levels = UserPowerLevels::from(power_levels, &self.own_user_id);
        self.user_power_levels.set_if_not_eq(user_power_levels);
        if self.room.is_archived() {
            return;
        }
        let can_send_message = user_power_levels.can_send_message();
        if self.can_send_message == Some(can_send_message) {
            return;
        }
        debug!(room_id = %self.room.room_id(), can_send_message, "Recreating composer");
        if let Some(mut old) = self.composer.take() {
            old.dispose();
        }
        self.composer = Some(if can_send_message {
            ComposerVariant::Composer(ComposerViewModel::new(self.room.is_encrypted()))
        } else {
            ComposerVariant::Restricted(RestrictedViewModel::default())
        });
        self.can_send_message = Some(can_send_message);
        self.notifier.emit_property("powerLevelObservable");
    }

    fn process_tile_actions(&mut self) {
        while let Ok(action) = self.tile_actions.1.try_recv() {
            match action {
                TileAction::StartReply(entry) => self.start_reply(entry),
            }
        }
    }

    fn clear_unread_after_delay(&mut self) {
        if self.room.is_archived()
            || self.clear_unread_timer.as_ref().is_some_and(|timer| !timer.task.is_finished())
        {
            return;
        }
        let (abort_handle, registration) = AbortHandle::new_pair();
        let room = Arc::clone(&self.room);
        let delay = self.config.clear_unread_delay();
        let clear_unread = async move {
            tokio::time::sleep(delay).await;
            room.clear_unread().await
        };
        let task = tokio::spawn(async move {
            match Abortable::new(clear_unread, registration).await {
                Ok(result) => result.context("failed to clear the room's unread state"),
                Err(Aborted) => Ok(()),
            }
        });
        self.clear_unread_timer = Some(ClearUnreadTimer { abort_handle, task });
    }

    /// Waits for the pending clear-unread timer, if any, and returns its result.
    pub async fn wait_for_clear_unread(&mut self) -> anyhow::Result<()> {
        let Some(timer) = self.clear_unread_timer.take() else { return Ok(()) };
        let result = timer.task.await.context("clear-unread task panicked")?;
        if let Err(e) = &result {
            error!(room_id = %self.room.room_id(), "{e:#}");
        }
        result
    }

    pub fn focus(&mut self) {
        self.clear_unread_after_delay();
    }

    pub fn dispose(&mut self) {
        if let Some(mut tile_list) = self.tile_list.take() {
            tile_list.dispose();
        }
        if let Some(mut composer) = self.composer.take() {
            composer.dispose();
        }
        self.power_levels = None;
        if self.room.is_archived() {
            self.room.release();
        }
        // The aborted task stays in place so `wait_for_clear_unread` can still join it.
        if let Some(timer) = self.clear_unread_timer.as_ref() {
            timer.abort_handle.abort();
        }
        self.notifier.close();
    }

    /// Called by the host whenever the room's summary changed.
    pub fn on_room_change(&mut self) {
        if let Some(composer) = self.composer.as_mut() {
            composer.emit_change();
        }
        self.notifier.emit(None);
    }

    // ---- Properties ----

    pub fn subscribe(&mut self) -> Receiver<PropertyChange> {
        self.notifier.subscribe()
    }

    /// Receives the navigation requests of this room.
    pub fn room_actions(&self) -> Receiver<RoomAction> {
        self.room_actions.1.clone()
    }

    pub fn kind(&self) -> &'static str {
        "room"
    }

    pub fn id(&self) -> &RoomId {
        self.room.room_id()
    }

    pub fn name(&self) -> String {
        self.room.name().filter(|name| !name.is_empty()).unwrap_or_else(|| "Empty Room".to_owned())
    }

    pub fn avatar_letter(&self) -> String {
        utils::avatar_initials(&self.name())
    }

    pub fn avatar_color_number(&self) -> u8 {
        utils::identifier_color_number(self.room.room_id().as_str())
    }

    pub fn is_encrypted(&self) -> bool {
        self.room.is_encrypted()
    }

    pub fn tile_list(&self) -> Option<&TileList> {
        self.tile_list.as_ref()
    }

    pub fn tile_list_mut(&mut self) -> Option<&mut TileList> {
        self.tile_list.as_mut()
    }

    pub fn composer(&self) -> Option<&ComposerVariant> {
        self.composer.as_ref()
    }

    pub fn composer_mut(&mut self) -> Option<&mut ComposerVariant> {
        self.composer.as_mut()
    }

    pub fn composer_state(&self) -> Option<ComposerState> {
        self.composer.as_ref().map(ComposerVariant::state)
    }

    pub fn user_power_levels(&self) -> UserPowerLevels {
        self.user_power_levels.get()
    }

    pub fn members(&self) -> &RoomMembers {
        &self.members
    }

    pub fn update_members(&mut self, members: Vec<RoomMember>) {
        if self.members.update(members) {
            self.notifier.emit_property("members");
        }
    }

    /// The error to show on the room screen, or an empty string.
    pub fn error(&self) -> String {
        match &self.error {
            Some(ErrorSlot::Timeline(message)) => format!("Something went wrong loading the timeline: {message}"),
            Some(ErrorSlot::Send(message)) => format!("Something went wrong sending your message: {message}"),
            None => String::new(),
        }
    }

    fn set_error(&mut self, error: ErrorSlot) {
        self.error = Some(error);
        self.notifier.emit_property("error");
    }

    fn set_send_error(&mut self, message: impl Into<String>) {
        self.set_error(ErrorSlot::Send(message.into()));
    }

    pub fn dismiss_error(&mut self) {
        if matches!(self.error, Some(ErrorSlot::Send(_))) {
            self.error = None;
        }
        self.notifier.emit_property("error");
    }

    pub fn can_leave(&self) -> bool {
        self.room.is_joined()
    }

    pub fn can_forget(&self) -> bool {
        self.room.is_archived()
    }

    pub fn can_rejoin(&self) -> bool {
        self.room.is_archived()
    }

    // ---- Commands ----

    pub async fn leave_room(&self) -> Result<(), SdkError> {
        self.room.leave().await
    }

    pub async fn forget_room(&self) -> Result<(), SdkError> {
        self.room.forget().await
    }

    pub async fn rejoin_room(&self) -> Result<(), SdkError> {
        self.room.rejoin().await
    }

    pub async fn upload_typing(&self) {
        if self.room.is_archived() {
            return;
        }
        if let Err(e) = self.room.mark_typing().await {
            warn!(room_id = %self.room.room_id(), "Failed to send typing notice: {e}");
        }
    }

    /// Updates the composer's draft and sends a typing notice when the user starts typing.
    pub async fn set_composer_input(&mut self, input: impl Into<String>) {
        let started_typing = self.composer.as_mut()
            .and_then(ComposerVariant::as_composer_mut)
            .is_some_and(|composer| composer.set_input(input));
        if started_typing {
            self.upload_typing().await;
        }
    }

    pub fn start_reply(&mut self, entry: Arc<TimelineEntry>) {
        if self.room.is_archived() {
            return;
        }
        match self.composer.as_mut().and_then(ComposerVariant::as_composer_mut) {
            Some(composer) => composer.set_replying_to(entry),
            None => debug!(room_id = %self.room.room_id(), "Cannot start reply without a composer"),
        }
    }

    /// Sends the text entered into the composer, running it as a command if it starts with `/`.
    ///
    /// Returns `false` if nothing was sent because the text was empty, the room is
    /// archived, or sending failed.
    pub async fn send_message(&mut self, text: &str) -> bool {
        if self.room.is_archived() || text.is_empty() {
            return false;
        }
        match commands::parse_message(text) {
            ParsedMessage::Send { msgtype, body } => {
                let replying_to = self.composer.as_ref()
                    .and_then(ComposerVariant::as_composer)
                    .and_then(|composer| composer.replying_to().cloned());
                let content = match &replying_to {
                    Some(entry) => entry.reply(msgtype, &body),
                    None => json!({ "msgtype": msgtype, "body": body }),
                };
                if let Err(e) = self.room.send_event(ROOM_MESSAGE_TYPE, content, None).await {
                    error!(room_id = %self.room.room_id(), "room.send_message(): {e}");
                    self.set_send_error(e.message);
                    return false;
                }
                if let Some(composer) = self.composer.as_mut().and_then(ComposerVariant::as_composer_mut) {
                    composer.clear_replying_to();
                }
            }
            ParsedMessage::Join(room) => self.join_room(&room).await,
            ParsedMessage::Error(message) => self.set_send_error(message),
            ParsedMessage::Nothing => {}
        }
        true
    }

    async fn join_room(&mut self, room: &str) {
        match self.room.join_room(room).await {
            Ok(room_id) => {
                if self.room_actions.0.send(RoomAction::OpenRoom(room_id)).is_err() {
                    warn!("Joined {room}, but nobody is listening for room actions");
                }
            }
            Err(e) => {
                error!(room, "/join failed: {e}");
                self.set_send_error(commands::join_error_message(room, &e));
            }
        }
    }

    async fn send_custom_message(&mut self, content: MessageContent) -> bool {
        if self.room.is_archived() {
            return false;
        }
        let result = match serde_json::to_value(&content) {
            Ok(content) => self.room.send_event(ROOM_MESSAGE_TYPE, content, None).await,
            Err(e) => Err(SdkError::new(e.to_string())),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(room_id = %self.room.room_id(), msgtype = ?content.msgtype(), "Failed to send message: {e}");
                self.set_send_error(e.message);
                false
            }
        }
    }

    /// Sends a token transfer. Its body is the transfer's message.
    pub async fn send_tx_message(&mut self, tx: TxContent) -> bool {
        let body = tx.message.clone().unwrap_or_default();
        self.send_custom_message(MessageContent::Tx(TxContent { body, ..tx })).await
    }

    pub async fn send_claim_message(&mut self, claim: ClaimContent) -> bool {
        let body = claim.message.clone().unwrap_or_default();
        self.send_custom_message(MessageContent::Claim(ClaimContent { body, ..claim })).await
    }

    /// The IDs of the room's pinned events.
    pub async fn pinned_events(&self) -> Result<Vec<OwnedEventId>, SdkError> {
        let Some(content) = self.room.get_state(PINNED_EVENTS_TYPE, "").await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_value::<PinnedEvents>(content) {
            Ok(pinned_events) => Ok(pinned_events.pinned),
            Err(e) => {
                warn!(room_id = %self.room.room_id(), "Ignoring malformed pinned events: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// Pins `event_id` if it isn't pinned, unpins it otherwise.
    pub async fn toggle_pinned_message(&mut self, event_id: &EventId) -> bool {
        if self.room.is_archived() {
            return false;
        }
        let result: Result<(), SdkError> = async {
            let mut pinned = self.pinned_events().await?;
            match pinned.iter().position(|pinned_id| &**pinned_id == event_id) {
                Some(index) => { pinned.remove(index); }
                None => pinned.push(event_id.to_owned()),
            }
            self.room.set_state(PINNED_EVENTS_TYPE, "", json!({ "pinned": pinned })).await
        }.await;
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(room_id = %self.room.room_id(), "room.toggle_pinned_message(): {e}");
                self.set_send_error(e.message);
                false
            }
        }
    }

    fn attachment_outcome(&mut self, result: Result<AttachmentOutcome, AttachmentError>) -> AttachmentOutcome {
        result.unwrap_or_else(|e| {
            error!(room_id = %self.room.room_id(), "Failed to send attachment: {e}");
            let message = match e {
                AttachmentError::Sdk(e) => e.message,
                other => other.to_string(),
            };
            self.set_send_error(message);
            AttachmentOutcome::Failed
        })
    }

    pub async fn pick_and_send_file<P: Platform>(&mut self, platform: &P, hooks: &mut AttachmentHooks) -> AttachmentOutcome {
        let result = attachments::pick_and_send_file(&*self.room, platform, &self.config, hooks).await;
        self.attachment_outcome(result)
    }

    pub async fn pick_and_send_picture<P: Platform>(&mut self, platform: &P, hooks: &mut AttachmentHooks) -> AttachmentOutcome {
        let result = attachments::pick_and_send_picture(&*self.room, platform, &self.config, hooks).await;
        self.attachment_outcome(result)
    }

    pub async fn pick_and_send_video<P: Platform>(&mut self, platform: &P) -> AttachmentOutcome {
        let result = attachments::pick_and_send_video(&*self.room, platform, &self.config).await;
        self.attachment_outcome(result)
    }

    pub async fn send_pasted_picture<P: Platform>(&mut self, platform: &P, file: PickedFile) -> AttachmentOutcome {
        let result = attachments::send_pasted_picture(&*self.room, platform, &self.config, file).await;
        self.attachment_outcome(result)
    }
}
