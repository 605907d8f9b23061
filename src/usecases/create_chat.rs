use crate::domain::chat::Chat;

pub const DEFAULT_GROUP_TITLE: &str = "New group";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateChatCommand {
    pub participant_ids: Vec<i64>,
    pub title: Option<String>,
    /// Dropped from `participant_ids`; the server adds the creator itself.
    pub creator_id: Option<i64>,
}

/// Normalized request body handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatRequest {
    pub participant_ids: Vec<i64>,
    pub title: Option<String>,
    pub is_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateChatSourceError {
    Unauthorized,
    Rejected(String),
    Unavailable,
    InvalidData,
}

pub trait ChatCreator {
    fn create_chat(&self, request: &NewChatRequest) -> Result<Chat, CreateChatSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateChatError {
    /// At least one other participant is required.
    NoParticipants,
    Unauthorized,
    Rejected(String),
    TemporarilyUnavailable,
    DataContractViolation,
}

/// Builds the request: one participant makes a direct chat, more make a group.
/// Groups get `title` or `DEFAULT_GROUP_TITLE`; direct chats never carry one.
pub fn build_request(command: &CreateChatCommand) -> Result<NewChatRequest, CreateChatError> {
    let mut participant_ids: Vec<i64> = Vec::with_capacity(command.participant_ids.len());
    for id in &command.participant_ids {
        if Some(*id) != command.creator_id && !participant_ids.contains(id) {
            participant_ids.push(*id);
        }
    }

    if participant_ids.is_empty() {
        return Err(CreateChatError::NoParticipants);
    }

    let is_group = participant_ids.len() > 1;
    let title = is_group.then(|| {
        command
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_GROUP_TITLE)
            .to_owned()
    });

    Ok(NewChatRequest {
        participant_ids,
        title,
        is_group,
    })
}

pub fn create_chat(
    creator: &dyn ChatCreator,
    command: CreateChatCommand,
) -> Result<Chat, CreateChatError> {
    let request = build_request(&command)?;

    creator.create_chat(&request).map_err(map_source_error)
}

fn map_source_error(error: CreateChatSourceError) -> CreateChatError {
    match error {
        CreateChatSourceError::Unauthorized => CreateChatError::Unauthorized,
        CreateChatSourceError::Rejected(message) => CreateChatError::Rejected(message),
        CreateChatSourceError::Unavailable => CreateChatError::TemporarilyUnavailable,
        CreateChatSourceError::InvalidData => CreateChatError::DataContractViolation,
    }
}
