//! JSON shapes exchanged with the chat backend and their domain conversions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{
    chat::Chat,
    message::{ClientMessageId, DeliveryStatus, Message, MessageKind},
    user::User,
};

/// Numeric id that some payloads send as a JSON string (`"chatId": "12"`).
fn lenient_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(raw) => raw.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            email: dto.email,
            created_at: dto.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    pub content: String,
    #[serde(deserialize_with = "lenient_id")]
    pub author_id: i64,
    #[serde(default)]
    pub author: Option<UserDto>,
    #[serde(deserialize_with = "lenient_id")]
    pub chat_id: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<MessageKind>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub client_id: Option<ClientMessageId>,
}

impl From<MessageDto> for Message {
    fn from(dto: MessageDto) -> Self {
        Self {
            server_id: Some(dto.id),
            client_id: dto.client_id,
            chat_id: dto.chat_id,
            author_id: dto.author_id,
            author_name: dto.author.map(|author| author.name),
            content: dto.content,
            kind: dto.kind.unwrap_or_default(),
            created_at: dto.created_at,
            status: DeliveryStatus::Sent,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub participants: Vec<UserDto>,
    #[serde(default)]
    pub last_message: Option<MessageDto>,
    #[serde(default)]
    pub unread_count: Option<u32>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ChatDto> for Chat {
    fn from(dto: ChatDto) -> Self {
        Self {
            chat_id: dto.id,
            name: dto.name,
            is_group: dto.is_group,
            participants: dto.participants.into_iter().map(User::from).collect(),
            last_message: dto.last_message.map(Message::from),
            unread_count: dto.unread_count.unwrap_or(0),
            created_at: dto.created_at,
            updated_at: dto.updated_at.unwrap_or(dto.created_at),
        }
    }
}

/// Payload of `userJoined` / `userLeft`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipDto {
    pub user: UserDto,
    #[serde(deserialize_with = "lenient_id")]
    pub chat_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingDto {
    #[serde(deserialize_with = "lenient_id")]
    pub chat_id: i64,
    #[serde(deserialize_with = "lenient_id")]
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFailedDto {
    #[serde(deserialize_with = "lenient_id")]
    pub chat_id: i64,
    pub client_id: ClientMessageId,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    pub participant_ids: &'a [i64],
    pub is_group: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest<'a> {
    pub content: &'a str,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientMessageId>,
}

/// Body the backend attaches to non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    /// A string, or a list of validation messages.
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}
