//! The view-model of a single timeline tile.
//!
//! A [`Tile`] wraps one [`TimelineEntry`] and derives everything a view needs to
//! render it: sender info, formatted date and time, whether it continues the
//! previous message, its reactions, the thread it anchors, and a nested tile for
//! the message it replies to.
//!
//! Tiles are owned by the [`TileList`](super::TileList), which
//! serializes all updates to a tile and calls [`Tile::update_previous_sibling`]
//! whenever the tile's predecessor changes.

use std::{borrow::Cow, sync::Arc};

use chrono::NaiveDate;
use crossbeam_channel::Receiver;
use ruma::{EventId, MilliSecondsSinceUnixEpoch, UserId};
use tracing::{debug, warn};

use super::{
    content::MessageContent,
    entry::{TimelineEntry, TimelineEntryId},
    reactions::ReactionsViewModel,
    tile_kind::{TileAction, TileKind, TileOptions},
};
use crate::{
    errors::SdkError,
    power_levels::{REACTION_TYPE, ROOM_MESSAGE_TYPE, UserPowerLevels},
    room::{RoomHandle, RoomMembers},
    shared::observable::{ChangeNotifier, PropertyChange},
    utils,
};

const DEFAULT_TOKEN_LOGO: &str = "https://storage.googleapis.com/gamic-prod/token/logo/8.png";
const DEFAULT_TOKEN_NAME: &str = "token name";
const DEFAULT_TX_MESSAGE: &str = "🎁 Mystery Box 🎁";

/// What the owning list should do with a tile after its entry was updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateAction {
    /// The tile's properties changed and its view should refresh.
    pub should_update: bool,
    /// The tile can no longer render its entry and must be rebuilt as a different kind.
    pub should_replace: bool,
    pub param: Option<&'static str>,
}

impl UpdateAction {
    pub fn update(param: Option<&'static str>) -> Self {
        Self { should_update: true, should_replace: false, param }
    }

    pub fn replace(param: Option<&'static str>) -> Self {
        Self { should_update: false, should_replace: true, param }
    }
}

/// The result of a reaction command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    Sent,
    Redacted,
    /// A queued redaction of the same reaction was aborted instead of sending a new reaction.
    AbortedRedaction,
    AlreadyReacted,
    NotYetReacted,
    PowerLevelLacking,
    /// The user had reacted, but their reaction event could not be found.
    NoReaction,
}

/// Render-ready details of a token transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxDetails<'a> {
    pub token_logo: &'a str,
    pub token_name: &'a str,
    pub message: &'a str,
}

/// Render-ready details of an image, video or file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDetails<'a> {
    pub label: &'a str,
    pub mime_type: Option<&'a str>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug)]
pub struct Tile {
    kind: TileKind,
    entry: Arc<TimelineEntry>,
    options: Arc<TileOptions>,
    day: Option<NaiveDate>,
    is_continuation: bool,
    is_same_day: bool,
    is_new_own: bool,
    reactions: Option<ReactionsViewModel>,
    thread_anchor: Option<String>,
    reply_tile: Option<Box<Tile>>,
    notifier: ChangeNotifier,
}

impl Tile {
    pub fn new(kind: TileKind, entry: Arc<TimelineEntry>, options: Arc<TileOptions>) -> Self {
        let day = entry.timestamp.as_ref().and_then(utils::local_day);
        let mut tile = Self {
            kind,
            entry,
            options,
            day,
            is_continuation: false,
            is_same_day: false,
            is_new_own: false,
            reactions: None,
            thread_anchor: None,
            reply_tile: None,
            notifier: ChangeNotifier::default(),
        };
        if tile.kind.is_message() {
            if tile.entry.annotations.is_some() || tile.entry.pending_annotations.is_some() {
                tile.update_reactions();
                tile.update_thread_anchor();
            }
            tile.update_reply_tile_if_needed(None);
        }
        tile
    }

    /// Builds a tile for `entry` with the resolver from `options`,
    /// or returns `None` if the entry isn't rendered.
    pub fn for_entry(entry: Arc<TimelineEntry>, options: &Arc<TileOptions>) -> Option<Self> {
        let kind = (options.tile_kind_for_entry)(&entry)?;
        Some(Self::new(kind, entry, Arc::clone(options)))
    }

    pub fn subscribe(&mut self) -> Receiver<PropertyChange> {
        self.notifier.subscribe()
    }

    pub fn emit_change(&mut self, property: Option<&'static str>) {
        self.notifier.emit(property);
    }

    /// Recomputes the continuation, same-day and new-own flags relative to the
    /// tile that now precedes this one.
    pub fn update_previous_sibling(&mut self, prev: Option<&Tile>) {
        if !self.kind.is_message() {
            return;
        }
        let window = i64::try_from(self.options.config.continuation_window_ms).unwrap_or(i64::MAX);

        // Pending entries have no timestamp, so they never continue (or are continued by) another message.
        let is_continuation = prev.is_some_and(|prev| {
            prev.kind.is_message()
                && prev.sender() == self.sender()
                && match (self.timestamp_millis(), prev.timestamp_millis()) {
                    (Some(mine), Some(theirs)) => mine - theirs < window,
                    _ => false,
                }
        });
        if is_continuation != self.is_continuation {
            self.is_continuation = is_continuation;
            self.notifier.emit_property("isContinuation");
        }

        let is_same_day = prev.is_some_and(|prev| prev.kind.is_dated() && prev.day == self.day);
        if is_same_day != self.is_same_day {
            self.is_same_day = is_same_day;
            self.notifier.emit_property("isSameDay");
        }

        let is_new_own = prev.is_none_or(|prev| prev.is_own() != self.is_own());
        if is_new_own != self.is_new_own {
            self.is_new_own = is_new_own;
            self.notifier.emit_property("isNewOwn");
        }
    }

    /// Points this tile at a new version of its entry.
    ///
    /// If the new entry must be rendered as a different kind of tile, the entry is
    /// not adopted and the returned action asks the owner to replace this tile.
    pub fn update_entry(&mut self, entry: Arc<TimelineEntry>, param: Option<&'static str>) -> UpdateAction {
        let action = if (self.options.tile_kind_for_entry)(&entry) != Some(self.kind) {
            UpdateAction::replace(param)
        } else {
            self.day = entry.timestamp.as_ref().and_then(utils::local_day);
            self.entry = entry;
            UpdateAction::update(param)
        };
        if self.kind.is_message() {
            if action.should_update {
                self.update_reactions();
                self.update_thread_anchor();
            }
            self.update_reply_tile_if_needed(param);
        }
        action
    }

    fn update_reactions(&mut self) {
        let TimelineEntry { annotations, pending_annotations, .. } = &*self.entry;
        let changed = if annotations.is_none() && pending_annotations.is_none() {
            self.reactions.take().is_some()
        } else {
            let reactions = self.reactions.get_or_insert_with(ReactionsViewModel::default);
            reactions.update(annotations.as_ref(), pending_annotations.as_ref())
        };
        if changed {
            self.notifier.emit_property("reactions");
        }
    }

    /// Only confirmed reactions can anchor a thread. Once found, the anchor is never cleared.
    fn update_thread_anchor(&mut self) {
        let Some(annotations) = &self.entry.annotations else { return };
        let prefix = &self.options.config.thread_anchor_prefix;
        let Some(thread_key) = annotations.keys().find(|key| key.starts_with(prefix.as_str())) else { return };
        if self.thread_anchor.as_ref() != Some(thread_key) {
            self.thread_anchor = Some(thread_key.clone());
            self.notifier.emit_property("threadAnchor");
        }
    }

    fn update_reply_tile_if_needed(&mut self, param: Option<&'static str>) {
        let Some(reply_entry) = self.entry.context_entry.clone() else { return };
        let action = self.reply_tile.as_mut()
            .map(|reply_tile| reply_tile.update_entry(Arc::clone(&reply_entry), param));

        if action.is_none_or(|action| action.should_replace) {
            if let Some(mut old) = self.reply_tile.take() {
                old.dispose();
            }
            self.reply_tile = Tile::for_entry(reply_entry, &self.options).map(Box::new);
            if self.reply_tile.is_none() {
                debug!(event = %self.entry.id, "Replied-to entry has no tile kind; showing no reply preview");
            }
        }
        if action.is_some_and(|action| action.should_update)
            && let Some(reply_tile) = self.reply_tile.as_mut()
        {
            reply_tile.emit_change(None);
        }
    }

    /// Releases the nested reply tile and reactions, and disconnects all observers.
    pub fn dispose(&mut self) {
        if let Some(mut reply_tile) = self.reply_tile.take() {
            reply_tile.dispose();
        }
        self.reactions = None;
        self.notifier.close();
    }

    pub fn is_disposed(&self) -> bool {
        self.notifier.is_closed()
    }

    // ---- Properties ----

    pub fn kind(&self) -> TileKind {
        self.kind
    }

    pub fn shape(&self) -> &'static str {
        if self.kind == TileKind::Text && matches!(self.content(), Some(MessageContent::Emote(_))) {
            "message-status"
        } else {
            self.kind.as_str()
        }
    }

    pub fn entry(&self) -> &Arc<TimelineEntry> {
        &self.entry
    }

    pub fn id(&self) -> &TimelineEntryId {
        &self.entry.id
    }

    pub fn event_id(&self) -> Option<&EventId> {
        self.entry.event_id()
    }

    pub fn sender(&self) -> &UserId {
        &self.entry.sender
    }

    /// The sender's display name, falling back to the user ID. Guest IDs (`@u_…`) are shortened to `GG…`.
    pub fn display_name(&self) -> Cow<'_, str> {
        utils::shorten_guest_name(self.entry.display_name.as_deref().unwrap_or(self.entry.sender.as_str()))
    }

    pub fn is_own(&self) -> bool {
        self.entry.sender == self.options.own_user_id
    }

    pub fn is_pending(&self) -> bool {
        self.entry.is_pending()
    }

    pub fn is_unverified(&self) -> bool {
        self.entry.is_unverified
    }

    pub fn is_reply(&self) -> bool {
        self.entry.is_reply()
    }

    pub fn is_continuation(&self) -> bool {
        self.is_continuation
    }

    pub fn is_same_day(&self) -> bool {
        self.is_same_day
    }

    pub fn is_new_own(&self) -> bool {
        self.is_new_own
    }

    fn timestamp_millis(&self) -> Option<i64> {
        self.entry.timestamp.map(|ts| ts.get().into())
    }

    pub fn date(&self) -> Option<String> {
        self.entry.timestamp.as_ref().and_then(utils::format_local_date)
    }

    pub fn time(&self) -> Option<String> {
        self.entry.timestamp.as_ref().and_then(utils::format_local_time)
    }

    pub fn avatar_color_number(&self) -> u8 {
        utils::identifier_color_number(self.entry.sender.as_str())
    }

    pub fn avatar_letter(&self) -> String {
        utils::avatar_initials(self.entry.sender.as_str())
    }

    pub fn permalink(&self) -> String {
        utils::event_permalink(self.options.room_id.as_str(), &self.entry.id.to_string())
    }

    /// The reactions to show, or `None` if there are none or the message was redacted.
    pub fn reactions(&self) -> Option<&ReactionsViewModel> {
        if self.kind == TileKind::Redacted {
            return None;
        }
        self.reactions.as_ref()
    }

    /// The thread this message anchors, or `None` if there is none or the message was redacted.
    pub fn thread_anchor(&self) -> Option<&str> {
        if self.kind == TileKind::Redacted {
            return None;
        }
        self.thread_anchor.as_deref()
    }

    /// The tile of the replied-to message.
    ///
    /// Hidden whenever the entry no longer references a replied-to event,
    /// even if a stale nested tile is still around.
    pub fn reply_tile(&self) -> Option<&Tile> {
        self.entry.context_event_id.as_ref()?;
        self.reply_tile.as_deref()
    }

    pub fn reply_tile_mut(&mut self) -> Option<&mut Tile> {
        self.entry.context_event_id.as_ref()?;
        self.reply_tile.as_deref_mut()
    }

    fn power_levels(&self) -> UserPowerLevels {
        self.options.power_levels.get()
    }

    pub fn can_redact(&self) -> bool {
        self.power_levels().can_redact_from_sender(&self.entry.sender, &self.options.own_user_id)
    }

    pub fn can_react(&self) -> bool {
        self.power_levels().can_send_reaction()
    }

    /// Whether the user's read marker is past this message.
    pub fn is_read_already(&self, read_marker: Option<MilliSecondsSinceUnixEpoch>) -> bool {
        match (read_marker, self.entry.timestamp) {
            (Some(marker), Some(ts)) => marker > ts,
            _ => false,
        }
    }

    pub fn content(&self) -> Option<&MessageContent> {
        self.entry.content()
    }

    pub fn body(&self) -> Option<&str> {
        match self.content()? {
            MessageContent::Text(c) | MessageContent::Emote(c) | MessageContent::Notice(c) => Some(&c.body),
            _ => None,
        }
    }

    pub fn tx_details(&self) -> Option<TxDetails<'_>> {
        let MessageContent::Tx(tx) = self.content()? else { return None };
        let token = tx.token_data.as_ref();
        Some(TxDetails {
            token_logo: token.and_then(|t| t.logo.as_deref()).unwrap_or(DEFAULT_TOKEN_LOGO),
            token_name: token.and_then(|t| t.name.as_deref()).unwrap_or(DEFAULT_TOKEN_NAME),
            message: tx.message.as_deref().unwrap_or(DEFAULT_TX_MESSAGE),
        })
    }

    pub fn claim_value(&self) -> Option<&str> {
        match self.content()? {
            MessageContent::Claim(claim) => claim.value.as_deref(),
            _ => None,
        }
    }

    pub fn media_details(&self) -> Option<MediaDetails<'_>> {
        match self.content()? {
            MessageContent::Image(media) | MessageContent::Video(media) | MessageContent::File(media) => {
                let info = media.info.as_ref();
                Some(MediaDetails {
                    label: &media.body,
                    mime_type: info.and_then(|i| i.mimetype.as_deref()),
                    width: info.and_then(|i| i.w),
                    height: info.and_then(|i| i.h),
                })
            }
            _ => None,
        }
    }

    /// The members mentioned in this message's body, for highlighting.
    pub fn highlighted_mentions<'m>(&self, members: &'m RoomMembers) -> Vec<&'m str> {
        self.body().map(|body| members.mentions_in(body)).unwrap_or_default()
    }

    // ---- Commands ----

    /// Asks the room view-model to start a reply to this message.
    pub fn start_reply(&self) {
        if self.options.actions.send(TileAction::StartReply(Arc::clone(&self.entry))).is_err() {
            warn!(event = %self.entry.id, "Cannot start reply: the room view-model is gone");
        }
    }

    pub async fn reply<R: RoomHandle>(&self, room: &R, msgtype: &str, body: &str) -> Result<(), SdkError> {
        room.send_event(ROOM_MESSAGE_TYPE, self.entry.reply(msgtype, body), None).await
    }

    pub async fn redact<R: RoomHandle>(&self, room: &R, reason: Option<&str>) -> Result<(), SdkError> {
        room.send_redaction(&self.entry.id, reason).await
    }

    pub async fn react<R: RoomHandle>(&self, room: &R, key: &str) -> Result<ReactionOutcome, SdkError> {
        if !self.can_react() {
            debug!(event = %self.entry.id, key, powerlevel_lacking = true, "Not reacting");
            return Ok(ReactionOutcome::PowerLevelLacking);
        }
        if self.entry.have_annotation(key) {
            debug!(event = %self.entry.id, key, already_reacted = true, "Not reacting");
            return Ok(ReactionOutcome::AlreadyReacted);
        }
        let redaction = self.entry.pending_annotations.as_ref()
            .and_then(|pending| pending.get(key))
            .and_then(|pending| pending.redaction_entry.as_ref());
        if let Some(redaction) = redaction
            && !redaction.has_started_sending
        {
            debug!(event = %self.entry.id, key, abort_redaction = true, "Aborting queued redaction");
            room.abort_pending_event(&redaction.transaction_id).await?;
            return Ok(ReactionOutcome::AbortedRedaction);
        }
        room.send_event(REACTION_TYPE, self.entry.annotate(key), None).await?;
        Ok(ReactionOutcome::Sent)
    }

    pub async fn redact_reaction<R: RoomHandle>(&self, room: &R, key: &str) -> Result<ReactionOutcome, SdkError> {
        let own_user_id = &self.options.own_user_id;
        if !self.power_levels().can_redact_from_sender(own_user_id, own_user_id) {
            debug!(event = %self.entry.id, key, powerlevel_lacking = true, "Not redacting reaction");
            return Ok(ReactionOutcome::PowerLevelLacking);
        }
        if !self.entry.have_annotation(key) {
            debug!(event = %self.entry.id, key, not_yet_reacted = true, "Not redacting reaction");
            return Ok(ReactionOutcome::NotYetReacted);
        }
        let pending = self.entry.pending_annotations.as_ref()
            .and_then(|pending| pending.get(key))
            .and_then(|pending| pending.annotation_entry.as_ref());
        let target = match pending {
            Some(handle) => Some(TimelineEntryId::Transaction(handle.transaction_id.clone())),
            None => match self.entry.event_id() {
                Some(event_id) => room.own_annotation_event(event_id, key).await?.map(TimelineEntryId::Event),
                None => None,
            },
        };
        let Some(target) = target else {
            debug!(event = %self.entry.id, key, no_reaction = true, "Own reaction not found");
            return Ok(ReactionOutcome::NoReaction);
        };
        room.send_redaction(&target, None).await?;
        Ok(ReactionOutcome::Redacted)
    }

    pub async fn toggle_reaction<R: RoomHandle>(&self, room: &R, key: &str) -> Result<ReactionOutcome, SdkError> {
        if self.entry.have_annotation(key) {
            self.redact_reaction(room, key).await
        } else {
            self.react(room, key).await
        }
    }
}
