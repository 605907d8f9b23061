use std::collections::VecDeque;

use super::{
    chat::{sort_by_recency, Chat},
    events::RealtimeEvent,
    message::Message,
};

/// How many confirmed message ids are remembered for redelivery checks.
const SEEN_MESSAGE_WINDOW: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatListUiState {
    Loading,
    Ready,
    Empty,
    Error,
}

/// Recency-ordered chat collection plus the active selection and unread counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatListState {
    ui_state: ChatListUiState,
    chats: Vec<Chat>,
    active_chat_id: Option<i64>,
    seen_message_ids: VecDeque<i64>,
}

impl Default for ChatListState {
    fn default() -> Self {
        Self {
            ui_state: ChatListUiState::Loading,
            chats: Vec::new(),
            active_chat_id: None,
            seen_message_ids: VecDeque::new(),
        }
    }
}

impl ChatListState {
    pub fn ui_state(&self) -> ChatListUiState {
        self.ui_state.clone()
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn chat(&self, chat_id: i64) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.chat_id == chat_id)
    }

    pub fn active_chat_id(&self) -> Option<i64> {
        self.active_chat_id
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.active_chat_id.and_then(|chat_id| self.chat(chat_id))
    }

    pub fn set_loading(&mut self) {
        self.ui_state = ChatListUiState::Loading;
        self.chats.clear();
    }

    /// Replaces the collection. The active selection survives when the chat is still present.
    pub fn set_ready(&mut self, mut chats: Vec<Chat>) {
        if chats.is_empty() {
            self.set_empty();
            return;
        }

        sort_by_recency(&mut chats);
        self.ui_state = ChatListUiState::Ready;
        self.chats = chats;

        if let Some(chat_id) = self.active_chat_id {
            match self.chat_mut(chat_id) {
                Some(chat) => chat.unread_count = 0,
                None => self.active_chat_id = None,
            }
        }
    }

    pub fn set_empty(&mut self) {
        self.ui_state = ChatListUiState::Empty;
        self.chats.clear();
        self.active_chat_id = None;
    }

    pub fn set_error(&mut self) {
        self.ui_state = ChatListUiState::Error;
        self.chats.clear();
        self.active_chat_id = None;
    }

    /// Makes `chat_id` the active chat and zeroes its unread counter.
    pub fn select(&mut self, chat_id: i64) -> Option<&Chat> {
        let chat = self.chat_mut(chat_id)?;
        chat.unread_count = 0;
        self.active_chat_id = Some(chat_id);
        self.chat(chat_id)
    }

    pub fn clear_selection(&mut self) {
        self.active_chat_id = None;
    }

    /// Inserts a chat or replaces the entry with the same id, keeping recency order.
    pub fn upsert(&mut self, chat: Chat) {
        match self.chat_mut(chat.chat_id) {
            Some(existing) => *existing = chat,
            None => self.chats.push(chat),
        }

        sort_by_recency(&mut self.chats);
        self.ui_state = ChatListUiState::Ready;
    }

    /// Applies a push event; returns true when the visible list changed.
    pub fn apply_event(&mut self, event: &RealtimeEvent) -> bool {
        match event {
            RealtimeEvent::MessageCreated(message) => self.record_message(message),
            RealtimeEvent::ChatCreated(chat) => {
                self.upsert(chat.clone());
                true
            }
            RealtimeEvent::UserJoined { chat_id, user } => self
                .chat_mut(*chat_id)
                .is_some_and(|chat| chat.add_participant(user.clone())),
            RealtimeEvent::UserLeft { chat_id, user } => self
                .chat_mut(*chat_id)
                .is_some_and(|chat| chat.remove_participant(user.id)),
            RealtimeEvent::Typing { .. } | RealtimeEvent::MessageFailed { .. } => false,
        }
    }

    fn record_message(&mut self, message: &Message) -> bool {
        let is_active = self.active_chat_id == Some(message.chat_id);
        if self.chat(message.chat_id).is_none() || self.is_redelivery(message) {
            return false;
        }
        self.remember(message);

        let Some(chat) = self.chat_mut(message.chat_id) else {
            return false;
        };

        let is_newer = chat
            .last_message
            .as_ref()
            .map_or(true, |last| last.created_at <= message.created_at);
        if is_newer {
            chat.last_message = Some(message.clone());
            chat.updated_at = chat.updated_at.max(message.created_at);
        }

        if !is_active {
            chat.unread_count = chat.unread_count.saturating_add(1);
        }

        sort_by_recency(&mut self.chats);
        true
    }

    fn is_redelivery(&self, message: &Message) -> bool {
        let Some(server_id) = message.server_id else {
            return false;
        };

        self.seen_message_ids.contains(&server_id)
            || self
                .chat(message.chat_id)
                .and_then(|chat| chat.last_message.as_ref())
                .is_some_and(|last| last.server_id == Some(server_id))
    }

    fn remember(&mut self, message: &Message) {
        let Some(server_id) = message.server_id else {
            return;
        };

        if self.seen_message_ids.len() == SEEN_MESSAGE_WINDOW {
            self.seen_message_ids.pop_front();
        }
        self.seen_message_ids.push_back(server_id);
    }

    fn chat_mut(&mut self, chat_id: i64) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|chat| chat.chat_id == chat_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::domain::{
        message::{DeliveryStatus, MessageKind},
        user::User,
    };

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn user(id: i64) -> User {
        User {
            id,
            name: format!("user-{id}"),
            email: format!("user-{id}@example.com"),
            created_at: at(1),
        }
    }

    fn message(server_id: i64, chat_id: i64, created_at: DateTime<Utc>) -> Message {
        Message {
            server_id: Some(server_id),
            client_id: None,
            chat_id,
            author_id: 2,
            author_name: None,
            content: "hello".to_owned(),
            kind: MessageKind::Text,
            created_at,
            status: DeliveryStatus::Sent,
        }
    }

    fn chat(chat_id: i64, created_at: DateTime<Utc>) -> Chat {
        Chat {
            chat_id,
            name: None,
            is_group: false,
            participants: vec![user(1), user(2)],
            last_message: None,
            unread_count: 0,
            created_at,
            updated_at: created_at,
        }
    }

    fn ids(state: &ChatListState) -> Vec<i64> {
        state.chats().iter().map(|chat| chat.chat_id).collect()
    }

    #[test]
    fn default_state_is_loading_without_selection() {
        let state = ChatListState::default();

        assert_eq!(state.ui_state(), ChatListUiState::Loading);
        assert!(state.chats().is_empty());
        assert_eq!(state.active_chat_id(), None);
    }

    #[test]
    fn set_ready_orders_by_last_message_or_creation_time() {
        let mut state = ChatListState::default();
        let mut with_message = chat(2, at(2));
        with_message.last_message = Some(message(1, 2, at(3)));

        state.set_ready(vec![chat(1, at(1)), with_message]);

        assert_eq!(state.ui_state(), ChatListUiState::Ready);
        assert_eq!(ids(&state), vec![2, 1]);
    }

    #[test]
    fn set_ready_with_empty_list_transitions_to_empty_state() {
        let mut state = ChatListState::default();

        state.set_ready(vec![]);

        assert_eq!(state.ui_state(), ChatListUiState::Empty);
        assert_eq!(state.active_chat_id(), None);
    }

    #[test]
    fn set_error_clears_items_and_selection() {
        let mut state = ChatListState::default();
        state.set_ready(vec![chat(1, at(1))]);
        state.select(1);

        state.set_error();

        assert_eq!(state.ui_state(), ChatListUiState::Error);
        assert!(state.chats().is_empty());
        assert_eq!(state.active_chat_id(), None);
    }

    #[test]
    fn selecting_a_chat_resets_its_unread_counter() {
        let mut state = ChatListState::default();
        let mut unread = chat(1, at(1));
        unread.unread_count = 4;
        state.set_ready(vec![unread]);

        let selected = state.select(1).expect("chat exists");

        assert_eq!(selected.unread_count, 0);
        assert_eq!(state.active_chat_id(), Some(1));
    }

    #[test]
    fn selecting_unknown_chat_keeps_previous_selection() {
        let mut state = ChatListState::default();
        state.set_ready(vec![chat(1, at(1))]);
        state.select(1);

        assert!(state.select(42).is_none());
        assert_eq!(state.active_chat_id(), Some(1));
    }

    #[test]
    fn message_for_inactive_chat_increments_unread_exactly_once_per_event() {
        let mut state = ChatListState::default();
        state.set_ready(vec![chat(1, at(1)), chat(2, at(2))]);
        state.select(1);

        state.apply_event(&RealtimeEvent::MessageCreated(message(10, 2, at(5))));
        state.apply_event(&RealtimeEvent::MessageCreated(message(11, 2, at(6))));
        state.apply_event(&RealtimeEvent::MessageCreated(message(12, 1, at(7))));

        assert_eq!(state.chat(2).map(|c| c.unread_count), Some(2));
        assert_eq!(state.chat(1).map(|c| c.unread_count), Some(0));
    }

    #[test]
    fn redelivered_message_is_counted_once() {
        let mut state = ChatListState::default();
        state.set_ready(vec![chat(1, at(1)), chat(2, at(2))]);
        state.select(1);

        assert!(state.apply_event(&RealtimeEvent::MessageCreated(message(10, 2, at(5)))));
        assert!(state.apply_event(&RealtimeEvent::MessageCreated(message(11, 2, at(6)))));
        assert!(!state.apply_event(&RealtimeEvent::MessageCreated(message(10, 2, at(5)))));
        assert!(!state.apply_event(&RealtimeEvent::MessageCreated(message(11, 2, at(6)))));

        assert_eq!(state.chat(2).map(|c| c.unread_count), Some(2));
        assert_eq!(
            state.chat(2).and_then(|c| c.last_message.as_ref()).and_then(|m| m.server_id),
            Some(11)
        );
    }

    #[test]
    fn redelivery_of_the_loaded_last_message_is_ignored() {
        let mut current = chat(2, at(2));
        current.last_message = Some(message(10, 2, at(5)));
        let mut state = ChatListState::default();
        state.set_ready(vec![chat(1, at(1)), current]);
        state.select(1);

        assert!(!state.apply_event(&RealtimeEvent::MessageCreated(message(10, 2, at(5)))));
        assert_eq!(state.chat(2).map(|c| c.unread_count), Some(0));
    }

    #[test]
    fn incoming_message_moves_chat_to_the_top() {
        let mut state = ChatListState::default();
        state.set_ready(vec![chat(1, at(1)), chat(2, at(2))]);
        assert_eq!(ids(&state), vec![2, 1]);

        state.apply_event(&RealtimeEvent::MessageCreated(message(10, 1, at(9))));

        assert_eq!(ids(&state), vec![1, 2]);
        assert_eq!(
            state.chat(1).and_then(|c| c.last_message.as_ref()).and_then(|m| m.server_id),
            Some(10)
        );
    }

    #[test]
    fn late_delivery_of_older_message_keeps_newer_last_message() {
        let mut state = ChatListState::default();
        let mut current = chat(1, at(1));
        current.last_message = Some(message(20, 1, at(8)));
        state.set_ready(vec![current]);

        state.apply_event(&RealtimeEvent::MessageCreated(message(19, 1, at(7))));

        assert_eq!(
            state.chat(1).and_then(|c| c.last_message.as_ref()).and_then(|m| m.server_id),
            Some(20)
        );
    }

    #[test]
    fn message_for_unknown_chat_is_ignored() {
        let mut state = ChatListState::default();
        state.set_ready(vec![chat(1, at(1))]);

        assert!(!state.apply_event(&RealtimeEvent::MessageCreated(message(1, 9, at(2)))));
    }

    #[test]
    fn chat_created_event_inserts_in_recency_order() {
        let mut state = ChatListState::default();
        state.set_ready(vec![chat(1, at(1))]);

        state.apply_event(&RealtimeEvent::ChatCreated(chat(5, at(3))));
        state.apply_event(&RealtimeEvent::ChatCreated(chat(5, at(3))));

        assert_eq!(ids(&state), vec![5, 1]);
    }

    #[test]
    fn chat_created_on_empty_list_makes_it_ready() {
        let mut state = ChatListState::default();
        state.set_ready(vec![]);

        state.apply_event(&RealtimeEvent::ChatCreated(chat(5, at(3))));

        assert_eq!(state.ui_state(), ChatListUiState::Ready);
    }

    #[test]
    fn participant_events_update_membership() {
        let mut state = ChatListState::default();
        let mut group = chat(1, at(1));
        group.is_group = true;
        state.set_ready(vec![group]);

        assert!(state.apply_event(&RealtimeEvent::UserJoined {
            chat_id: 1,
            user: user(3),
        }));
        assert!(state.apply_event(&RealtimeEvent::UserLeft {
            chat_id: 1,
            user: user(1),
        }));

        let members: Vec<_> = state
            .chat(1)
            .map(|c| c.participants.iter().map(|u| u.id).collect())
            .unwrap_or_default();
        assert_eq!(members, vec![2, 3]);
    }

    #[test]
    fn refresh_preserves_active_selection_when_chat_survives() {
        let mut state = ChatListState::default();
        state.set_ready(vec![chat(1, at(1)), chat(2, at(2))]);
        state.select(2);

        let mut refreshed = chat(2, at(2));
        refreshed.unread_count = 3;
        state.set_ready(vec![refreshed, chat(3, at(3))]);

        assert_eq!(state.active_chat_id(), Some(2));
        assert_eq!(state.chat(2).map(|c| c.unread_count), Some(0));

        state.set_ready(vec![chat(3, at(3))]);
        assert_eq!(state.active_chat_id(), None);
    }

    #[test]
    fn fresh_chat_without_messages_outranks_stale_conversation() {
        let now = at(20);
        let mut stale = chat(1, now - Duration::days(30));
        stale.last_message = Some(message(1, 1, now - Duration::days(3)));
        let mut state = ChatListState::default();

        state.set_ready(vec![stale, chat(2, now - Duration::minutes(2))]);

        assert_eq!(ids(&state), vec![2, 1]);
    }
}
