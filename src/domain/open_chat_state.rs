use chrono::Duration;

use super::message::{ClientMessageId, DeliveryStatus, Message};

/// How far a confirmation may predate its optimistic entry and still be matched
/// by content. Covers clock skew between client and server.
const RECONCILE_CLOCK_SKEW_SECS: i64 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenChatUiState {
    Empty,
    Loading,
    Ready,
    Error,
}

/// Identifies one history fetch. Results for a ticket that is no longer current
/// belong to an abandoned chat and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    chat_id: i64,
    generation: u64,
}

impl LoadTicket {
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// New entry inserted at the given index.
    Appended(usize),
    /// An optimistic entry was replaced by its confirmation; index after replacement.
    Reconciled(usize),
    /// Server id already present.
    Duplicate,
    /// Message targets a chat other than the open one.
    OtherChat,
    /// No chat is open, or the message carries no server id.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChatState {
    chat_id: Option<i64>,
    generation: u64,
    messages: Vec<Message>,
    ui_state: OpenChatUiState,
}

impl Default for OpenChatState {
    fn default() -> Self {
        Self {
            chat_id: None,
            generation: 0,
            messages: Vec::new(),
            ui_state: OpenChatUiState::Empty,
        }
    }
}

impl OpenChatState {
    pub fn chat_id(&self) -> Option<i64> {
        self.chat_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn ui_state(&self) -> OpenChatUiState {
        self.ui_state.clone()
    }

    pub fn is_open(&self) -> bool {
        self.chat_id.is_some()
    }

    pub fn set_loading(&mut self, chat_id: i64) -> LoadTicket {
        self.generation = self.generation.wrapping_add(1);
        self.chat_id = Some(chat_id);
        self.messages.clear();
        self.ui_state = OpenChatUiState::Loading;

        LoadTicket {
            chat_id,
            generation: self.generation,
        }
    }

    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.chat_id = None;
        self.messages.clear();
        self.ui_state = OpenChatUiState::Empty;
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.chat_id == Some(ticket.chat_id) && self.generation == ticket.generation
    }

    /// Merges fetched history with entries that arrived while it was loading.
    /// Returns false and leaves the state untouched when the ticket is stale.
    pub fn set_ready(&mut self, ticket: LoadTicket, history: Vec<Message>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        for message in history {
            if message.chat_id == ticket.chat_id {
                self.absorb_confirmed(message);
            }
        }

        self.messages.sort_by_key(|message| message.created_at);
        self.ui_state = OpenChatUiState::Ready;
        true
    }

    pub fn set_error(&mut self, ticket: LoadTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.ui_state = OpenChatUiState::Error;
        true
    }

    /// Inserts a locally originated entry in creation-time order.
    pub fn push_optimistic(&mut self, message: Message) -> Option<usize> {
        if self.chat_id != Some(message.chat_id) {
            return None;
        }

        Some(self.insert_sorted(message))
    }

    pub fn apply_confirmed(&mut self, message: Message) -> ApplyOutcome {
        match self.chat_id {
            None => ApplyOutcome::Ignored,
            Some(chat_id) if chat_id != message.chat_id => ApplyOutcome::OtherChat,
            Some(_) => self.absorb_confirmed(message),
        }
    }

    /// Flags a pending send as failed. Confirmed entries are never downgraded.
    pub fn mark_failed(&mut self, client_id: ClientMessageId) -> bool {
        match self.pending_mut(client_id) {
            Some(message) if message.status == DeliveryStatus::Sending => {
                message.status = DeliveryStatus::Failed;
                true
            }
            _ => false,
        }
    }

    /// Moves a failed entry back to `sending` and returns it for re-issue.
    pub fn begin_retry(&mut self, client_id: ClientMessageId) -> Option<Message> {
        let message = self.pending_mut(client_id)?;
        if message.status != DeliveryStatus::Failed {
            return None;
        }

        message.status = DeliveryStatus::Sending;
        Some(message.clone())
    }

    fn pending_mut(&mut self, client_id: ClientMessageId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .find(|message| message.is_optimistic() && message.client_id == Some(client_id))
    }

    fn absorb_confirmed(&mut self, mut message: Message) -> ApplyOutcome {
        let Some(server_id) = message.server_id else {
            return ApplyOutcome::Ignored;
        };

        if self
            .messages
            .iter()
            .any(|existing| existing.server_id == Some(server_id))
        {
            return ApplyOutcome::Duplicate;
        }

        message.status = DeliveryStatus::Sent;

        let Some(slot) = self.pending_slot(&message) else {
            return ApplyOutcome::Appended(self.insert_sorted(message));
        };

        if message.client_id.is_none() {
            message.client_id = self.messages[slot].client_id;
        }
        self.messages[slot] = message;

        if self.is_ordered_around(slot) {
            return ApplyOutcome::Reconciled(slot);
        }

        let moved = self.messages.remove(slot);
        ApplyOutcome::Reconciled(self.insert_sorted(moved))
    }

    fn pending_slot(&self, confirmed: &Message) -> Option<usize> {
        if let Some(client_id) = confirmed.client_id {
            return self.messages.iter().position(|message| {
                message.is_optimistic() && message.client_id == Some(client_id)
            });
        }

        let skew = Duration::seconds(RECONCILE_CLOCK_SKEW_SECS);
        self.messages.iter().position(|message| {
            message.is_optimistic()
                && message.author_id == confirmed.author_id
                && message.content == confirmed.content
                && confirmed.created_at >= message.created_at - skew
        })
    }

    fn is_ordered_around(&self, index: usize) -> bool {
        let current = self.messages[index].created_at;
        let after_previous = index == 0 || self.messages[index - 1].created_at <= current;
        let before_next = self
            .messages
            .get(index + 1)
            .map_or(true, |next| current <= next.created_at);

        after_previous && before_next
    }

    fn insert_sorted(&mut self, message: Message) -> usize {
        let index = self
            .messages
            .partition_point(|existing| existing.created_at <= message.created_at);
        self.messages.insert(index, message);
        index
    }
}
