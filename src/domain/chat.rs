use chrono::{DateTime, Utc};

use super::{message::Message, user::User};

pub const UNNAMED_GROUP_TITLE: &str = "Unnamed group";
pub const UNKNOWN_USER_TITLE: &str = "Unknown user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub chat_id: i64,
    pub name: Option<String>,
    pub is_group: bool,
    pub participants: Vec<User>,
    pub last_message: Option<Message>,
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Timestamp the chat list sorts by: last message if any, creation time otherwise.
    pub fn recency_key(&self) -> DateTime<Utc> {
        self.last_message
            .as_ref()
            .map(|message| message.created_at)
            .unwrap_or(self.created_at)
    }

    /// A direct chat always has exactly two participants.
    pub fn is_well_formed(&self) -> bool {
        self.is_group || self.participants.len() == 2
    }

    /// Title shown to `viewer_id`: the group name, or the other participant of a direct chat.
    pub fn display_name(&self, viewer_id: Option<i64>) -> String {
        if self.is_group {
            return self
                .name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(UNNAMED_GROUP_TITLE)
                .to_owned();
        }

        self.participants
            .iter()
            .find(|participant| Some(participant.id) != viewer_id)
            .map(|participant| participant.name.clone())
            .unwrap_or_else(|| UNKNOWN_USER_TITLE.to_owned())
    }

    pub fn participant(&self, user_id: i64) -> Option<&User> {
        self.participants.iter().find(|user| user.id == user_id)
    }

    pub fn add_participant(&mut self, user: User) -> bool {
        if self.participant(user.id).is_some() {
            return false;
        }

        self.participants.push(user);
        true
    }

    pub fn remove_participant(&mut self, user_id: i64) -> bool {
        let before = self.participants.len();
        self.participants.retain(|user| user.id != user_id);
        before != self.participants.len()
    }
}

/// Sorts chats most-recent first; ties keep their relative order.
pub fn sort_by_recency(chats: &mut [Chat]) {
    chats.sort_by(|left, right| right.recency_key().cmp(&left.recency_key()));
}
