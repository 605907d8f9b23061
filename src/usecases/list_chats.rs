use crate::domain::chat::{sort_by_recency, Chat};

const CHAT_CONTRACT_VIOLATION: &str = "CHAT_CONTRACT_VIOLATION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChatsOutput {
    /// Most recent first.
    pub chats: Vec<Chat>,
    /// Direct chats dropped for not having exactly two participants.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatsSourceError {
    Unauthorized,
    Unavailable,
    InvalidData,
}

pub trait ChatsSource {
    fn list_chats(&self) -> Result<Vec<Chat>, ChatsSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChatsError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
}

pub fn list_chats(source: &dyn ChatsSource) -> Result<ListChatsOutput, ListChatsError> {
    let fetched = source.list_chats().map_err(map_source_error)?;
    let total = fetched.len();

    let mut chats: Vec<Chat> = fetched
        .into_iter()
        .filter(|chat| {
            let keep = chat.is_well_formed();
            if !keep {
                tracing::warn!(
                    code = CHAT_CONTRACT_VIOLATION,
                    chat_id = chat.chat_id,
                    participants = chat.participants.len(),
                    "dropping direct chat without exactly two participants"
                );
            }
            keep
        })
        .collect();
    sort_by_recency(&mut chats);

    let skipped = total - chats.len();
    Ok(ListChatsOutput { chats, skipped })
}

fn map_source_error(error: ChatsSourceError) -> ListChatsError {
    match error {
        ChatsSourceError::Unauthorized => ListChatsError::Unauthorized,
        ChatsSourceError::Unavailable => ListChatsError::TemporarilyUnavailable,
        ChatsSourceError::InvalidData => ListChatsError::DataContractViolation,
    }
}
