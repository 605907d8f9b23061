use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind tag carried on the wire with every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

impl MessageKind {
    /// Returns a display label for non-text kinds, or None for plain text.
    pub fn display_label(&self) -> Option<&'static str> {
        match self {
            MessageKind::Text => None,
            MessageKind::Image => Some("[Image]"),
            MessageKind::File => Some("[File]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Client-generated correlation id attached to every locally originated send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientMessageId(Uuid);

impl ClientMessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl fmt::Display for ClientMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server-assigned id; `None` while the entry is optimistic.
    pub server_id: Option<i64>,
    pub client_id: Option<ClientMessageId>,
    pub chat_id: i64,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl Message {
    /// Builds the locally rendered entry for a send that has not been acknowledged yet.
    pub fn optimistic(
        chat_id: i64,
        author_id: i64,
        author_name: Option<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            server_id: None,
            client_id: Some(ClientMessageId::generate()),
            chat_id,
            author_id,
            author_name,
            content: content.into(),
            kind: MessageKind::Text,
            created_at,
            status: DeliveryStatus::Sending,
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.server_id.is_none()
    }

    pub fn is_confirmed(&self) -> bool {
        self.server_id.is_some()
    }

    /// Returns the display content: kind label + text, or just text for plain messages.
    pub fn display_content(&self) -> String {
        match (self.kind.display_label(), self.content.is_empty()) {
            (Some(label), true) => label.to_owned(),
            (Some(label), false) => format!("{} {}", label, self.content),
            (None, _) => self.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str, kind: MessageKind) -> Message {
        Message {
            server_id: Some(1),
            client_id: None,
            chat_id: 1,
            author_id: 7,
            author_name: Some("Ana".to_owned()),
            content: content.to_owned(),
            kind,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            status: DeliveryStatus::Sent,
        }
    }

    #[test]
    fn display_label_is_absent_for_text() {
        assert_eq!(MessageKind::Text.display_label(), None);
    }

    #[test]
    fn display_content_returns_text_only_for_text_messages() {
        assert_eq!(msg("Hello", MessageKind::Text).display_content(), "Hello");
    }

    #[test]
    fn display_content_returns_label_when_content_is_empty() {
        assert_eq!(msg("", MessageKind::Image).display_content(), "[Image]");
    }

    #[test]
    fn display_content_combines_label_and_content() {
        assert_eq!(
            msg("report.pdf", MessageKind::File).display_content(),
            "[File] report.pdf"
        );
    }

    #[test]
    fn optimistic_message_starts_sending_with_correlation_id() {
        let message = Message::optimistic(3, 7, None, "hi", DateTime::<Utc>::UNIX_EPOCH);

        assert!(message.is_optimistic());
        assert!(message.client_id.is_some());
        assert_eq!(message.status, DeliveryStatus::Sending);
    }

    #[test]
    fn each_optimistic_message_gets_a_distinct_correlation_id() {
        let first = Message::optimistic(3, 7, None, "hi", DateTime::<Utc>::UNIX_EPOCH);
        let second = Message::optimistic(3, 7, None, "hi", DateTime::<Utc>::UNIX_EPOCH);

        assert_ne!(first.client_id, second.client_id);
    }

    #[test]
    fn client_message_id_parses_its_display_form() {
        let id = ClientMessageId::generate();

        assert_eq!(ClientMessageId::parse(&id.to_string()), Some(id));
        assert_eq!(ClientMessageId::parse("not-a-uuid"), None);
    }
}
