//! The permissions a room's power levels grant to the logged-in user.

use bitflags::bitflags;
use ruma::{
    UserId,
    events::{MessageLikeEventType, StateEventType},
};

pub use ruma::events::room::power_levels::RoomPowerLevels;

pub const ROOM_MESSAGE_TYPE: &str = "m.room.message";
pub const REACTION_TYPE: &str = "m.reaction";
pub const PINNED_EVENTS_TYPE: &str = "m.room.pinned_events";

bitflags! {
    /// The power levels of the currently logged-in user in a given room.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct UserPowerLevels: u8 {
        const SEND_MESSAGE = 1 << 0;
        const SEND_REACTION = 1 << 1;
        const REDACT_OWN = 1 << 2;
        const REDACT_OTHERS = 1 << 3;
        const PIN = 1 << 4;
    }
}

impl UserPowerLevels {
    /// Computes what `user_id` is allowed to do in a room with the given power levels.
    pub fn from(power_levels: &RoomPowerLevels, user_id: &UserId) -> Self {
        let mut flags = Self::empty();
        flags.set(
            Self::SEND_MESSAGE,
            power_levels.user_can_send_message(user_id, MessageLikeEventType::RoomMessage),
        );
        flags.set(
            Self::SEND_REACTION,
            power_levels.user_can_send_message(user_id, MessageLikeEventType::Reaction),
        );
        flags.set(Self::REDACT_OWN, power_levels.user_can_redact_own_event(user_id));
        flags.set(Self::REDACT_OTHERS, power_levels.user_can_redact_event_of_other(user_id));
        flags.set(
            Self::PIN,
            power_levels.user_can_send_state(user_id, StateEventType::RoomPinnedEvents),
        );
        flags
    }

    pub fn can_send_message(self) -> bool {
        self.contains(Self::SEND_MESSAGE)
    }

    pub fn can_send_reaction(self) -> bool {
        self.contains(Self::SEND_REACTION)
    }

    pub fn can_pin(self) -> bool {
        self.contains(Self::PIN)
    }

    /// Whether the user may redact an event sent by `sender`.
    pub fn can_redact_from_sender(self, sender: &UserId, own_user_id: &UserId) -> bool {
        if sender == own_user_id {
            self.contains(Self::REDACT_OWN)
        } else {
            self.contains(Self::REDACT_OTHERS)
        }
    }
}


#[cfg(test)]
pub(crate) mod test_levels {
    use ruma::events::room::power_levels::RoomPowerLevelsEventContent;
    use serde_json::{Value, json};

    use super::RoomPowerLevels;

    /// Builds power levels from `m.room.power_levels` content; omitted fields take the Matrix defaults.
    pub fn levels(content: Value) -> RoomPowerLevels {
        serde_json::from_value::<RoomPowerLevelsEventContent>(content).unwrap().into()
    }

    pub fn default_levels() -> RoomPowerLevels {
        levels(json!({}))
    }
}
