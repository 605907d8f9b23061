use crate::domain::message::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMessagesQuery {
    pub chat_id: i64,
}

impl LoadMessagesQuery {
    pub fn new(chat_id: i64) -> Self {
        Self { chat_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMessagesOutput {
    /// Oldest first.
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagesSourceError {
    Unauthorized,
    Unavailable,
    InvalidData,
    ChatNotFound,
}

pub trait MessagesSource {
    fn list_messages(&self, chat_id: i64) -> Result<Vec<Message>, MessagesSourceError>;
}

impl<T> MessagesSource for &T
where
    T: MessagesSource + ?Sized,
{
    fn list_messages(&self, chat_id: i64) -> Result<Vec<Message>, MessagesSourceError> {
        (*self).list_messages(chat_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadMessagesError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
    ChatNotFound,
}

pub fn load_messages(
    source: &dyn MessagesSource,
    query: LoadMessagesQuery,
) -> Result<LoadMessagesOutput, LoadMessagesError> {
    let mut messages = source
        .list_messages(query.chat_id)
        .map_err(map_source_error)?;

    if messages.iter().any(|message| message.chat_id != query.chat_id) {
        return Err(LoadMessagesError::DataContractViolation);
    }
    messages.sort_by_key(|message| message.created_at);

    Ok(LoadMessagesOutput { messages })
}

fn map_source_error(error: MessagesSourceError) -> LoadMessagesError {
    match error {
        MessagesSourceError::Unauthorized => LoadMessagesError::Unauthorized,
        MessagesSourceError::Unavailable => LoadMessagesError::TemporarilyUnavailable,
        MessagesSourceError::InvalidData => LoadMessagesError::DataContractViolation,
        MessagesSourceError::ChatNotFound => LoadMessagesError::ChatNotFound,
    }
}
