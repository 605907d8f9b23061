//! Keeps the open chat's message list in step with history fetches, local
//! sends and the realtime stream.

use chrono::{DateTime, Duration, Utc};

use crate::{
    domain::{
        events::{EventKind, RealtimeEvent},
        message::{ClientMessageId, DeliveryStatus, Message},
        open_chat_state::{ApplyOutcome, LoadTicket, OpenChatState},
        typing::{TypingIndicator, TypingThrottle},
        user::User,
    },
    remote::event_bus::Subscription,
    usecases::{
        contracts::RealtimeChannel,
        load_messages::{load_messages, LoadMessagesError, LoadMessagesQuery, MessagesSource},
        send_message::{validate_text, SendMessageError},
    },
};

const CHAT_EVENT_KINDS: [EventKind; 3] = [
    EventKind::MessageCreated,
    EventKind::Typing,
    EventKind::MessageFailed,
];

/// Result of handing a message to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReceipt {
    pub client_id: ClientMessageId,
    /// `Sending` once the channel took it, `Failed` when it refused.
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// No failed entry carries this correlation id.
    NotFailed,
}

pub struct MessageSync {
    state: OpenChatState,
    subscription: Option<Subscription>,
    typing: TypingIndicator,
    throttle: TypingThrottle,
}

impl MessageSync {
    pub fn new(typing_ttl: Duration) -> Self {
        Self {
            state: OpenChatState::default(),
            subscription: None,
            typing: TypingIndicator::new(typing_ttl),
            throttle: TypingThrottle::new(typing_ttl),
        }
    }

    pub fn state(&self) -> &OpenChatState {
        &self.state
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.state.chat_id()
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    pub fn typing_user(&self, now: DateTime<Utc>) -> Option<i64> {
        self.typing.typing_user(now)
    }

    /// Leaves the current room and opens `chat_id`. Returns the ticket the
    /// history fetch must present to `complete_load`.
    pub fn switch_chat(
        &mut self,
        channel: &dyn RealtimeChannel,
        chat_id: Option<i64>,
    ) -> Option<LoadTicket> {
        if let Some(previous) = self.state.chat_id() {
            channel.leave_chat(previous);
        }

        self.subscription = None;
        self.state.clear();
        self.typing.clear();
        self.throttle.reset();

        let chat_id = chat_id?;
        channel.join_chat(chat_id);
        self.subscription = Some(channel.events().subscribe(&CHAT_EVENT_KINDS));

        tracing::debug!(chat_id, "opened chat");
        Some(self.state.set_loading(chat_id))
    }

    /// Applies a history result. Returns false for a superseded ticket.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Message>, LoadMessagesError>,
    ) -> bool {
        match result {
            Ok(history) => {
                let applied = self.state.set_ready(ticket, history);
                if !applied {
                    tracing::debug!(chat_id = ticket.chat_id(), "dropped stale history");
                }
                applied
            }
            Err(error) => {
                tracing::warn!(
                    code = "HISTORY_LOAD_FAILED",
                    chat_id = ticket.chat_id(),
                    error = ?error,
                    "failed to load chat history"
                );
                self.state.set_error(ticket)
            }
        }
    }

    /// Switches to `chat_id` and loads its history in one step.
    pub fn activate(
        &mut self,
        channel: &dyn RealtimeChannel,
        source: &dyn MessagesSource,
        chat_id: Option<i64>,
    ) -> Result<(), LoadMessagesError> {
        let Some(ticket) = self.switch_chat(channel, chat_id) else {
            return Ok(());
        };

        let result = load_messages(source, LoadMessagesQuery::new(ticket.chat_id()))
            .map(|output| output.messages);
        let error = result.as_ref().err().cloned();
        self.complete_load(ticket, result);

        error.map_or(Ok(()), Err)
    }

    /// Shows the message immediately, then hands it to the channel.
    pub fn send(
        &mut self,
        channel: &dyn RealtimeChannel,
        author: &User,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<SendReceipt, SendMessageError> {
        let content = validate_text(content)?;
        let chat_id = self.state.chat_id().ok_or(SendMessageError::NoActiveChat)?;

        let client_id = ClientMessageId::generate();
        let mut message =
            Message::optimistic(chat_id, author.id, Some(author.name.clone()), content, now);
        message.client_id = Some(client_id);
        self.state.push_optimistic(message);
        self.throttle.reset();

        Ok(self.dispatch(channel, chat_id, content, client_id))
    }

    /// Re-issues a failed send under its original correlation id.
    pub fn retry(
        &mut self,
        channel: &dyn RealtimeChannel,
        client_id: ClientMessageId,
    ) -> Result<SendReceipt, RetryError> {
        let message = self
            .state
            .begin_retry(client_id)
            .ok_or(RetryError::NotFailed)?;

        tracing::info!(code = "MESSAGE_RETRY", chat_id = message.chat_id, "retrying send");
        Ok(self.dispatch(channel, message.chat_id, &message.content, client_id))
    }

    /// Drains pending events for the open chat and expires the typing
    /// indicator. Returns true when anything visible changed.
    pub fn pump(&mut self, viewer_id: Option<i64>, now: DateTime<Utc>) -> bool {
        let mut changed = self.typing.expire(now);
        for event in self.drain_subscription() {
            changed |= self.apply_event(&event, viewer_id, now);
        }
        changed
    }

    pub fn apply_event(
        &mut self,
        event: &RealtimeEvent,
        viewer_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.state.chat_id() != Some(event.chat_id()) {
            return false;
        }

        match event {
            RealtimeEvent::MessageCreated(message) => {
                if self.typing.typing_user(now) == Some(message.author_id) {
                    self.typing.clear();
                }

                match self.state.apply_confirmed(message.clone()) {
                    ApplyOutcome::Appended(_) | ApplyOutcome::Reconciled(_) => true,
                    ApplyOutcome::Duplicate => {
                        tracing::debug!(
                            chat_id = message.chat_id,
                            server_id = ?message.server_id,
                            "ignored duplicate delivery"
                        );
                        false
                    }
                    ApplyOutcome::OtherChat | ApplyOutcome::Ignored => false,
                }
            }
            RealtimeEvent::Typing { user_id, .. } => {
                if Some(*user_id) == viewer_id {
                    return false;
                }
                self.typing.observe(*user_id, now);
                true
            }
            RealtimeEvent::MessageFailed { client_id, .. } => self.state.mark_failed(*client_id),
            RealtimeEvent::ChatCreated(_)
            | RealtimeEvent::UserJoined { .. }
            | RealtimeEvent::UserLeft { .. } => false,
        }
    }

    /// Emits a typing signal at most once per TTL.
    pub fn notify_typing(&mut self, channel: &dyn RealtimeChannel, now: DateTime<Utc>) -> bool {
        let Some(chat_id) = self.state.chat_id() else {
            return false;
        };
        if !self.throttle.should_send(now) {
            return false;
        }

        match channel.send_typing(chat_id) {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(chat_id, error = %error, "typing signal not sent");
                false
            }
        }
    }

    fn dispatch(
        &mut self,
        channel: &dyn RealtimeChannel,
        chat_id: i64,
        content: &str,
        client_id: ClientMessageId,
    ) -> SendReceipt {
        let status = match channel.send_message(chat_id, content, client_id) {
            Ok(()) => DeliveryStatus::Sending,
            Err(error) => {
                tracing::warn!(
                    code = "MESSAGE_SEND_REFUSED",
                    chat_id,
                    error = ?error,
                    "channel refused the message"
                );
                self.state.mark_failed(client_id);
                DeliveryStatus::Failed
            }
        };

        SendReceipt { client_id, status }
    }

    fn drain_subscription(&self) -> Vec<RealtimeEvent> {
        self.subscription
            .as_ref()
            .map(Subscription::drain)
            .unwrap_or_default()
    }
}
