use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::Utc;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::{
    domain::{
        chat::Chat,
        message::{ClientMessageId, Message, MessageKind},
        user::User,
    },
    infra::{
        config::{NetworkConfig, ServerConfig},
        error::AppError,
    },
    remote::dto::{
        ChatDto, CreateChatRequest, ErrorBody, LoginRequest, LoginResponse, MessageDto,
        PostMessageRequest, RegisterRequest, RegisterResponse, UserDto,
    },
    usecases::{
        create_chat::{ChatCreator, CreateChatSourceError, NewChatRequest},
        list_chats::{ChatsSource, ChatsSourceError},
        list_users::{UsersSource, UsersSourceError},
        load_messages::{MessagesSource, MessagesSourceError},
        send_message::{MessageSender, SendMessageSourceError},
        session::{AuthSource, AuthSourceError},
    },
};

const REST_REQUEST_FAILED: &str = "REST_REQUEST_FAILED";
const REST_UNAUTHORIZED: &str = "REST_UNAUTHORIZED";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    fn is_server_side(&self) -> bool {
        matches!(self, Self::Rejected { status, .. } if *status >= 500)
    }
}

/// Blocking facade over the backend's JSON API.
///
/// Requests run on the shared runtime; the bearer token is attached to every
/// call once `set_token` has been given one.
#[derive(Debug)]
pub struct RestClient {
    runtime: Arc<Runtime>,
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl RestClient {
    pub fn new(
        runtime: Arc<Runtime>,
        server: &ServerConfig,
        network: &NetworkConfig,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(network.request_timeout_ms))
            .connect_timeout(Duration::from_millis(network.connect_timeout_ms))
            .build()
            .map_err(AppError::HttpClientInit)?;

        Ok(Self {
            runtime,
            http,
            base_url: server.api_url.trim_end_matches('/').to_owned(),
            token: RwLock::new(None),
        })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let response: LoginResponse = self.execute(
            Method::POST,
            "/auth/login",
            Some(&LoginRequest { email, password }),
            "Login failed",
        )?;

        Ok(response.access_token)
    }

    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<User, ApiError> {
        let response: RegisterResponse = self.execute(
            Method::POST,
            "/auth/register",
            Some(&RegisterRequest {
                name,
                email,
                password,
            }),
            "Registration failed",
        )?;

        Ok(User {
            id: response.id,
            name: response.name,
            email: response.email,
            created_at: Utc::now(),
        })
    }

    pub fn users(&self) -> Result<Vec<User>, ApiError> {
        let users: Vec<UserDto> =
            self.execute(Method::GET, "/users", None::<&()>, "Failed to fetch users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    pub fn chats(&self) -> Result<Vec<Chat>, ApiError> {
        let chats: Vec<ChatDto> =
            self.execute(Method::GET, "/chats", None::<&()>, "Failed to fetch chats")?;

        Ok(chats.into_iter().map(Chat::from).collect())
    }

    pub fn create(&self, request: &NewChatRequest) -> Result<Chat, ApiError> {
        let body = CreateChatRequest {
            title: request.title.as_deref(),
            participant_ids: &request.participant_ids,
            is_group: request.is_group,
        };
        let chat: ChatDto =
            self.execute(Method::POST, "/chats", Some(&body), "Failed to create chat")?;

        Ok(chat.into())
    }

    pub fn messages(&self, chat_id: i64) -> Result<Vec<Message>, ApiError> {
        let messages: Vec<MessageDto> = self.execute(
            Method::GET,
            &format!("/chats/{chat_id}/messages"),
            None::<&()>,
            "Failed to fetch messages",
        )?;

        Ok(messages.into_iter().map(Message::from).collect())
    }

    pub fn post_message(
        &self,
        chat_id: i64,
        content: &str,
        client_id: Option<ClientMessageId>,
    ) -> Result<Message, ApiError> {
        let body = PostMessageRequest {
            content,
            kind: MessageKind::Text,
            client_id,
        };
        let message: MessageDto = self.execute(
            Method::POST,
            &format!("/chats/{chat_id}/messages"),
            Some(&body),
            "Failed to send message",
        )?;

        Ok(message.into())
    }

    fn store_token(&self, token: Option<&str>) {
        let mut slot = self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = token.map(ToOwned::to_owned);
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn execute<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        fallback: &'static str,
    ) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let request = self.authorize(self.http.request(method.clone(), &url));
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };

        let result = self.runtime.block_on(send_request::<T>(request, fallback));

        match &result {
            Err(ApiError::Unauthorized { .. }) => {
                tracing::warn!(code = REST_UNAUTHORIZED, %method, path, "request was not authorized");
            }
            Err(error) => {
                tracing::warn!(code = REST_REQUEST_FAILED, %method, path, error = %error, "request failed");
            }
            Ok(_) => tracing::debug!(%method, path, "request completed"),
        }

        result
    }
}

async fn send_request<T>(request: RequestBuilder, fallback: &'static str) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let response = request.send().await?;
    let status = response.status();
    let bytes = response.bytes().await?;

    if status.is_success() {
        return Ok(serde_json::from_slice(&bytes)?);
    }

    let message = error_message(&bytes).unwrap_or_else(|| fallback.to_owned());
    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message },
        StatusCode::NOT_FOUND => ApiError::NotFound { message },
        other => ApiError::Rejected {
            status: other.as_u16(),
            message,
        },
    })
}

/// Extracts `message` from an error body; list-valued messages are joined.
fn error_message(bytes: &[u8]) -> Option<String> {
    let body: ErrorBody = serde_json::from_slice(bytes).ok()?;

    match body.message? {
        Value::String(message) => Some(message),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

impl From<ApiError> for ChatsSourceError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized { .. } => Self::Unauthorized,
            ApiError::Decode(_) => Self::InvalidData,
            _ => Self::Unavailable,
        }
    }
}

impl From<ApiError> for MessagesSourceError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized { .. } => Self::Unauthorized,
            ApiError::NotFound { .. } => Self::ChatNotFound,
            ApiError::Decode(_) => Self::InvalidData,
            _ => Self::Unavailable,
        }
    }
}

impl From<ApiError> for UsersSourceError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized { .. } => Self::Unauthorized,
            ApiError::Decode(_) => Self::InvalidData,
            _ => Self::Unavailable,
        }
    }
}

impl From<ApiError> for CreateChatSourceError {
    fn from(error: ApiError) -> Self {
        if error.is_server_side() {
            return Self::Unavailable;
        }

        match error {
            ApiError::Unauthorized { .. } => Self::Unauthorized,
            ApiError::NotFound { message } | ApiError::Rejected { message, .. } => {
                Self::Rejected(message)
            }
            ApiError::Decode(_) => Self::InvalidData,
            ApiError::Network(_) => Self::Unavailable,
        }
    }
}

impl From<ApiError> for AuthSourceError {
    fn from(error: ApiError) -> Self {
        if error.is_server_side() {
            return Self::Unavailable;
        }

        match error {
            ApiError::Unauthorized { message }
            | ApiError::NotFound { message }
            | ApiError::Rejected { message, .. } => Self::Rejected(message),
            ApiError::Decode(_) => Self::InvalidData,
            ApiError::Network(_) => Self::Unavailable,
        }
    }
}

impl From<ApiError> for SendMessageSourceError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized { .. } => Self::Unauthorized,
            ApiError::NotFound { .. } => Self::ChatNotFound,
            _ => Self::Unavailable,
        }
    }
}

impl ChatsSource for RestClient {
    fn list_chats(&self) -> Result<Vec<Chat>, ChatsSourceError> {
        Ok(self.chats()?)
    }
}

impl MessagesSource for RestClient {
    fn list_messages(&self, chat_id: i64) -> Result<Vec<Message>, MessagesSourceError> {
        Ok(self.messages(chat_id)?)
    }
}

impl UsersSource for RestClient {
    fn list_users(&self) -> Result<Vec<User>, UsersSourceError> {
        Ok(self.users()?)
    }
}

impl ChatCreator for RestClient {
    fn create_chat(&self, request: &NewChatRequest) -> Result<Chat, CreateChatSourceError> {
        Ok(self.create(request)?)
    }
}

impl AuthSource for RestClient {
    fn login(&self, email: &str, password: &str) -> Result<String, AuthSourceError> {
        Ok(RestClient::login(self, email, password)?)
    }

    fn register(&self, name: &str, email: &str, password: &str) -> Result<(), AuthSourceError> {
        RestClient::register(self, name, email, password)?;
        Ok(())
    }

    fn set_token(&self, token: Option<&str>) {
        self.store_token(token);
    }
}

/// REST fallback for sends issued outside the interactive shell.
impl MessageSender for RestClient {
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        client_id: ClientMessageId,
    ) -> Result<(), SendMessageSourceError> {
        let message = self.post_message(chat_id, text, Some(client_id))?;
        tracing::debug!(
            chat_id,
            server_id = ?message.server_id,
            "message accepted over REST"
        );
        Ok(())
    }
}
