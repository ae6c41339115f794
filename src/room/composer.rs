//! The bottom bar of a room: a message composer, or a notice explaining why the user can't send.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::room_handle::{ArchiveDetails, ArchiveKind};
use crate::{
    shared::observable::{ChangeNotifier, PropertyChange},
    timeline::TimelineEntry,
};

/// Which composer variant a room currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerState {
    /// The user can send messages.
    Composer,
    /// The user lacks the power level to send messages.
    Restricted,
    /// The room is archived and read-only.
    Archived,
}

#[derive(Debug)]
pub enum ComposerVariant {
    Composer(ComposerViewModel),
    Restricted(RestrictedViewModel),
    Archived(ArchivedViewModel),
}

impl ComposerVariant {
    pub fn state(&self) -> ComposerState {
        match self {
            Self::Composer(_) => ComposerState::Composer,
            Self::Restricted(_) => ComposerState::Restricted,
            Self::Archived(_) => ComposerState::Archived,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Composer(_) => "composer",
            Self::Restricted(_) | Self::Archived(_) => "disabled",
        }
    }

    /// The notice shown instead of a composer, if any.
    pub fn description(&self) -> Option<String> {
        match self {
            Self::Composer(_) => None,
            Self::Restricted(restricted) => Some(restricted.description().to_owned()),
            Self::Archived(archived) => Some(archived.description()),
        }
    }

    pub fn as_composer(&self) -> Option<&ComposerViewModel> {
        match self {
            Self::Composer(composer) => Some(composer),
            _ => None,
        }
    }

    pub fn as_composer_mut(&mut self) -> Option<&mut ComposerViewModel> {
        match self {
            Self::Composer(composer) => Some(composer),
            _ => None,
        }
    }

    fn notifier(&mut self) -> &mut ChangeNotifier {
        match self {
            Self::Composer(c) => &mut c.notifier,
            Self::Restricted(r) => &mut r.notifier,
            Self::Archived(a) => &mut a.notifier,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<PropertyChange> {
        self.notifier().subscribe()
    }

    pub fn emit_change(&mut self) {
        self.notifier().emit(None);
    }

    pub fn dispose(&mut self) {
        if let Self::Composer(composer) = self {
            composer.replying_to = None;
        }
        self.notifier().close();
    }
}

/// The draft message and reply state of a room the user can send to.
#[derive(Debug, Default)]
pub struct ComposerViewModel {
    input: String,
    replying_to: Option<Arc<TimelineEntry>>,
    is_encrypted: bool,
    notifier: ChangeNotifier,
}

impl ComposerViewModel {
    pub fn new(is_encrypted: bool) -> Self {
        Self { is_encrypted, ..Default::default() }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Updates the draft text.
    ///
    /// Returns `true` if the user just started typing, i.e., a typing
    /// notification should be sent to the room.
    pub fn set_input(&mut self, input: impl Into<String>) -> bool {
        let input = input.into();
        let started_typing = self.input.is_empty() && !input.is_empty();
        if input != self.input {
            self.input = input;
            self.notifier.emit_property("input");
        }
        started_typing
    }

    pub fn clear_input(&mut self) {
        self.set_input(String::new());
    }

    pub fn replying_to(&self) -> Option<&Arc<TimelineEntry>> {
        self.replying_to.as_ref()
    }

    pub fn set_replying_to(&mut self, entry: Arc<TimelineEntry>) {
        self.replying_to = Some(entry);
        self.notifier.emit_property("replyingTo");
    }

    pub fn clear_replying_to(&mut self) {
        if self.replying_to.take().is_some() {
            self.notifier.emit_property("replyingTo");
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }
}

#[derive(Debug, Default)]
pub struct RestrictedViewModel {
    notifier: ChangeNotifier,
}

impl RestrictedViewModel {
    pub fn description(&self) -> &'static str {
        "You do not have the powerlevel necessary to send messages"
    }
}

#[derive(Debug)]
pub struct ArchivedViewModel {
    details: ArchiveDetails,
    notifier: ChangeNotifier,
}

impl ArchivedViewModel {
    pub fn new(details: ArchiveDetails) -> Self {
        Self { details, notifier: ChangeNotifier::default() }
    }

    pub fn description(&self) -> String {
        let ArchiveDetails { kind, actor, actor_name, reason } = &self.details;
        let verb = match kind {
            ArchiveKind::Left => return "You left this room".to_owned(),
            ArchiveKind::Kicked => "kicked",
            ArchiveKind::Banned => "banned",
        };
        let by = actor_name.as_deref()
            .or(actor.as_ref().map(|a| a.as_str()))
            .unwrap_or("an unknown user");
        match reason {
            Some(reason) => format!("You were {verb} from the room by {by} because: {reason}"),
            None => format!("You were {verb} from the room by {by}."),
        }
    }
}
