//! The room screen: its view-model, composer variants, commands and attachments.

pub mod attachments;
pub mod commands;
pub mod composer;
pub mod room_handle;
pub mod room_members;
pub mod room_view_model;

#[cfg(test)]
pub(crate) mod test_support;

pub use attachments::{AttachmentHooks, AttachmentOutcome, LoadedVideo, PickedFile, Platform};
pub use composer::{ArchivedViewModel, ComposerState, ComposerVariant, ComposerViewModel, RestrictedViewModel};
pub use room_handle::{ArchiveDetails, ArchiveKind, Attachments, Blob, RoomHandle};
pub use room_members::{RoomMember, RoomMembers};
pub use room_view_model::{RoomAction, RoomViewModel};
