//! Timeline entries and the tiles that present them.

pub mod content;
pub mod entry;
pub mod reactions;
pub mod tile;
pub mod tile_kind;
pub mod tile_list;

pub use entry::{AnnotationInfo, EntryKind, MembershipChange, PendingAnnotation, PendingEventHandle, TimelineEntry, TimelineEntryId};
pub use reactions::{ReactionViewModel, ReactionsViewModel};
pub use tile::{MediaDetails, ReactionOutcome, Tile, TxDetails, UpdateAction};
pub use tile_kind::{TileAction, TileKind, TileKindResolver, TileOptions, default_tile_kind_for_entry};
pub use tile_list::{TileList, TimelineDiffs, TimelineHandle};
