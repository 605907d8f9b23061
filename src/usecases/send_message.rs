//! Use case for sending a message to a chat.
//!
//! Both the realtime channel and the REST client implement `MessageSender`;
//! the shell sends over the socket, one-shot CLI sends go over HTTP.

use crate::domain::message::ClientMessageId;

/// Command to send a message to a specific chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub chat_id: i64,
    pub text: String,
    /// Correlation id echoed back on the confirmed message.
    pub client_id: ClientMessageId,
}

/// Errors reported by a sender implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMessageSourceError {
    /// User is not authorized.
    Unauthorized,
    /// Target chat was not found or is not accessible.
    ChatNotFound,
    /// Service is temporarily unavailable.
    Unavailable,
    /// The realtime channel has no live connection.
    NotConnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    /// Message text is empty after trimming whitespace.
    EmptyMessage,
    /// No chat is open to send into.
    NoActiveChat,
    Unauthorized,
    ChatNotFound,
    /// Network or channel failure; the message may be retried.
    TemporarilyUnavailable,
}

pub trait MessageSender {
    /// Sends `text` to `chat_id`, tagged with `client_id`.
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        client_id: ClientMessageId,
    ) -> Result<(), SendMessageSourceError>;
}

impl<T: MessageSender + ?Sized> MessageSender for &T {
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        client_id: ClientMessageId,
    ) -> Result<(), SendMessageSourceError> {
        (*self).send_message(chat_id, text, client_id)
    }
}

/// Returns the trimmed text, or `EmptyMessage` when nothing is left.
pub fn validate_text(text: &str) -> Result<&str, SendMessageError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SendMessageError::EmptyMessage);
    }

    Ok(text)
}

/// Sends a message to the specified chat.
///
/// Validates the message text (must not be empty after trimming) and delegates
/// to the `MessageSender` implementation.
pub fn send_message(
    sender: &dyn MessageSender,
    command: SendMessageCommand,
) -> Result<(), SendMessageError> {
    let text = validate_text(&command.text)?;

    sender
        .send_message(command.chat_id, text, command.client_id)
        .map_err(map_source_error)
}

pub(crate) fn map_source_error(error: SendMessageSourceError) -> SendMessageError {
    match error {
        SendMessageSourceError::Unauthorized => SendMessageError::Unauthorized,
        SendMessageSourceError::ChatNotFound => SendMessageError::ChatNotFound,
        SendMessageSourceError::Unavailable | SendMessageSourceError::NotConnected => {
            SendMessageError::TemporarilyUnavailable
        }
    }
}
