use super::{
    chat::Chat,
    message::{ClientMessageId, Message},
    user::User,
};

/// Foreground events consumed by the shell loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Tick,
    QuitRequested,
    Input(String),
}

/// Named kinds of push events the realtime channel can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    MessageCreated,
    ChatCreated,
    UserJoined,
    UserLeft,
    Typing,
    MessageFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::MessageCreated,
        EventKind::ChatCreated,
        EventKind::UserJoined,
        EventKind::UserLeft,
        EventKind::Typing,
        EventKind::MessageFailed,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::MessageCreated => "messageCreated",
            Self::ChatCreated => "chatCreated",
            Self::UserJoined => "userJoined",
            Self::UserLeft => "userLeft",
            Self::Typing => "typing",
            Self::MessageFailed => "messageFailed",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "messageCreated" => Some(Self::MessageCreated),
            "chatCreated" => Some(Self::ChatCreated),
            "userJoined" => Some(Self::UserJoined),
            "userLeft" => Some(Self::UserLeft),
            "typing" | "userTyping" => Some(Self::Typing),
            "messageFailed" => Some(Self::MessageFailed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    MessageCreated(Message),
    ChatCreated(Chat),
    UserJoined {
        chat_id: i64,
        user: User,
    },
    UserLeft {
        chat_id: i64,
        user: User,
    },
    Typing {
        chat_id: i64,
        user_id: i64,
    },
    /// A send identified by its correlation id was not accepted.
    MessageFailed {
        chat_id: i64,
        client_id: ClientMessageId,
    },
}

impl RealtimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageCreated(_) => EventKind::MessageCreated,
            Self::ChatCreated(_) => EventKind::ChatCreated,
            Self::UserJoined { .. } => EventKind::UserJoined,
            Self::UserLeft { .. } => EventKind::UserLeft,
            Self::Typing { .. } => EventKind::Typing,
            Self::MessageFailed { .. } => EventKind::MessageFailed,
        }
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            Self::MessageCreated(message) => message.chat_id,
            Self::ChatCreated(chat) => chat.chat_id,
            Self::UserJoined { chat_id, .. }
            | Self::UserLeft { chat_id, .. }
            | Self::Typing { chat_id, .. }
            | Self::MessageFailed { chat_id, .. } => *chat_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_for_every_kind() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_wire_name(kind.wire_name()), Some(kind));
        }
    }

    #[test]
    fn legacy_typing_name_maps_to_typing_kind() {
        assert_eq!(
            EventKind::from_wire_name("userTyping"),
            Some(EventKind::Typing)
        );
        assert_eq!(EventKind::from_wire_name("error"), None);
    }
}
