//! Resolving which kind of tile (if any) renders a given timeline entry.

use std::sync::Arc;

use crossbeam_channel::Sender;
use eyeball::SharedObservable;
use ruma::{OwnedRoomId, OwnedUserId};

use super::{
    content::MessageContent,
    entry::{EntryKind, TimelineEntry},
};
use crate::{config::RoomViewConfig, power_levels::UserPowerLevels};

/// The closed set of tile kinds this crate knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    /// `m.text`, `m.emote` and `m.notice` messages.
    Text,
    Image,
    Video,
    File,
    Tx,
    Claim,
    Redacted,
    Membership,
    Gap,
}

impl TileKind {
    /// Whether this is a message tile, i.e., one that shows a sender and can carry
    /// reactions and replies. Redacted messages are still message tiles.
    pub fn is_message(self) -> bool {
        !matches!(self, Self::Membership | Self::Gap)
    }

    /// Whether this tile takes part in calendar-day grouping.
    pub fn is_dated(self) -> bool {
        self != Self::Gap
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "message",
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
            Self::Tx => "tx",
            Self::Claim => "claim",
            Self::Redacted => "redacted",
            Self::Membership => "announcement",
            Self::Gap => "gap",
        }
    }
}

/// A function that picks the tile kind for an entry, or `None` if the entry isn't rendered.
pub type TileKindResolver = fn(&TimelineEntry) -> Option<TileKind>;

/// The default mapping from timeline entries to tile kinds.
pub fn default_tile_kind_for_entry(entry: &TimelineEntry) -> Option<TileKind> {
    match &entry.kind {
        EntryKind::Gap => Some(TileKind::Gap),
        EntryKind::Redacted => Some(TileKind::Redacted),
        EntryKind::Membership { .. } => Some(TileKind::Membership),
        EntryKind::Message(content) => match content {
            MessageContent::Text(_) | MessageContent::Emote(_) | MessageContent::Notice(_) => Some(TileKind::Text),
            MessageContent::Image(_) => Some(TileKind::Image),
            MessageContent::Video(_) => Some(TileKind::Video),
            MessageContent::File(_) => Some(TileKind::File),
            MessageContent::Tx(_) => Some(TileKind::Tx),
            MessageContent::Claim(_) => Some(TileKind::Claim),
            MessageContent::Unknown => None,
        },
    }
}

/// Actions that a tile asks its room view-model to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum TileAction {
    /// The user wants to reply to the given entry.
    StartReply(Arc<TimelineEntry>),
}

/// The configuration and services shared by all tiles of one room.
#[derive(Debug, Clone)]
pub struct TileOptions {
    pub room_id: OwnedRoomId,
    pub own_user_id: OwnedUserId,
    /// The logged-in user's permissions, kept current by the room view-model.
    pub power_levels: SharedObservable<UserPowerLevels>,
    pub tile_kind_for_entry: TileKindResolver,
    pub config: Arc<RoomViewConfig>,
    pub actions: Sender<TileAction>,
}
