//! The members of a room, as needed for mention highlighting.
//!
//! Owned by the room's [`RoomViewModel`](super::RoomViewModel) and passed to tiles explicitly.

use ruma::{OwnedUserId, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    pub user_id: OwnedUserId,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl RoomMember {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.user_id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomMembers {
    members: Vec<RoomMember>,
}

impl RoomMembers {
    pub fn new(members: Vec<RoomMember>) -> Self {
        Self { members }
    }

    /// Replaces the member list, returning `true` if it changed.
    pub fn update(&mut self, members: Vec<RoomMember>) -> bool {
        if members == self.members {
            return false;
        }
        debug!(old = self.members.len(), new = members.len(), "Updating room members");
        self.members = members;
        true
    }

    pub fn get(&self, user_id: &UserId) -> Option<&RoomMember> {
        self.members.iter().find(|m| &*m.user_id == user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoomMember> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The user IDs of all members mentioned in `body`, either by their full
    /// user ID or as `@display name`, in member-list order.
    pub fn mentions_in(&self, body: &str) -> Vec<&str> {
        self.members.iter()
            .filter(|member| {
                body.contains(member.user_id.as_str())
                    || member.display_name.as_deref()
                        .is_some_and(|name| !name.is_empty() && body.contains(&format!("@{name}")))
            })
            .map(|member| member.user_id.as_str())
            .collect()
    }
}
