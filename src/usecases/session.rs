//! Session store: the authenticated identity and its bearer token.
//!
//! The session is persisted under two keys so a restart restores it without a
//! new login. Signing in connects the realtime channel; signing out or a 401
//! from any authenticated call drops the persisted state.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    domain::user::{Session, User},
    infra::contracts::KeyValueStore,
    usecases::contracts::RealtimeChannel,
};

pub const TOKEN_KEY: &str = "chat-token";
pub const USER_KEY: &str = "chat-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSourceError {
    /// Credentials or registration data were refused; carries the server message.
    Rejected(String),
    Unavailable,
    InvalidData,
}

pub trait AuthSource {
    /// Exchanges credentials for a bearer token.
    fn login(&self, email: &str, password: &str) -> Result<String, AuthSourceError>;
    fn register(&self, name: &str, email: &str, password: &str) -> Result<(), AuthSourceError>;
    /// Installs (or clears) the token used for authenticated requests.
    fn set_token(&self, token: Option<&str>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    InvalidEmail,
    MissingCredentials,
    Rejected(String),
    /// The token returned by the server does not carry a usable identity.
    InvalidToken,
    TemporarilyUnavailable,
    StorageUnavailable,
}

pub struct SessionStore<S: KeyValueStore> {
    storage: S,
    current: Option<Session>,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.current.as_ref().map(Session::user_id)
    }

    /// Loads the persisted session. Partial or unreadable state is wiped and
    /// the store stays logged out.
    pub fn restore(&mut self, auth: &dyn AuthSource) -> Option<&Session> {
        let token = self.read_key(TOKEN_KEY);
        let user = self.read_key(USER_KEY);

        let session = match (token, user) {
            (None, None) => None,
            (Some(token), Some(raw_user)) => match serde_json::from_str::<User>(&raw_user) {
                Ok(user) => Some(Session { user, token }),
                Err(error) => {
                    tracing::warn!(
                        code = "SESSION_RESTORE_MALFORMED",
                        error = %error,
                        "stored user is malformed; discarding session"
                    );
                    None
                }
            },
            _ => {
                tracing::warn!(
                    code = "SESSION_RESTORE_PARTIAL",
                    "stored session is incomplete; discarding"
                );
                None
            }
        };

        match session {
            Some(session) => {
                auth.set_token(Some(&session.token));
                tracing::info!(
                    code = "SESSION_RESTORED",
                    user_id = session.user.id,
                    "session restored"
                );
                self.current = Some(session);
            }
            None => {
                auth.set_token(None);
                self.wipe();
            }
        }

        self.current.as_ref()
    }

    pub fn login(
        &mut self,
        auth: &dyn AuthSource,
        channel: &dyn RealtimeChannel,
        email: &str,
        password: &str,
    ) -> Result<&Session, SessionError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }

        let token = auth.login(email, password).map_err(map_source_error)?;
        let user = decode_identity(&token).ok_or(SessionError::InvalidToken)?;

        self.persist(&token, &user)?;
        auth.set_token(Some(&token));

        if let Err(error) = channel.connect(&token) {
            tracing::warn!(
                code = "REALTIME_CONNECT_FAILED",
                error = %error,
                "signed in without a realtime connection"
            );
        }

        tracing::info!(code = "SESSION_LOGIN", user_id = user.id, "signed in");
        Ok(self.current.insert(Session { user, token }))
    }

    /// Creates the account, then signs in with the same credentials.
    pub fn register(
        &mut self,
        auth: &dyn AuthSource,
        channel: &dyn RealtimeChannel,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<&Session, SessionError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        if !is_valid_email(email) {
            return Err(SessionError::InvalidEmail);
        }

        auth.register(name, email, password)
            .map_err(map_source_error)?;
        tracing::info!(code = "SESSION_REGISTERED", "account created");

        self.login(auth, channel, email, password)
    }

    pub fn logout(&mut self, auth: &dyn AuthSource, channel: &dyn RealtimeChannel) {
        channel.disconnect();
        auth.set_token(None);
        self.discard();
        tracing::info!(code = "SESSION_LOGOUT", "signed out");
    }

    /// Forgets the session locally without touching any connection.
    pub fn discard(&mut self) {
        self.current = None;
        self.wipe();
    }

    /// Reaction to a 401: the token is no longer accepted anywhere.
    pub fn invalidate(&mut self, auth: &dyn AuthSource, channel: &dyn RealtimeChannel) {
        tracing::warn!(
            code = "SESSION_UNAUTHORIZED",
            "server rejected the session token; clearing it"
        );
        self.logout(auth, channel);
    }

    fn persist(&self, token: &str, user: &User) -> Result<(), SessionError> {
        let raw_user = serde_json::to_string(user).map_err(|error| {
            tracing::error!(code = "SESSION_ENCODE_FAILED", error = %error, "cannot encode user");
            SessionError::StorageUnavailable
        })?;

        self.storage
            .set(TOKEN_KEY, token)
            .and_then(|()| self.storage.set(USER_KEY, &raw_user))
            .map_err(|error| {
                tracing::error!(
                    code = "SESSION_PERSIST_FAILED",
                    error = %error,
                    "cannot persist session"
                );
                SessionError::StorageUnavailable
            })
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|value| !value.is_empty()),
            Err(error) => {
                tracing::warn!(
                    code = "SESSION_READ_FAILED",
                    key,
                    error = %error,
                    "cannot read session storage"
                );
                None
            }
        }
    }

    fn wipe(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(error) = self.storage.remove(key) {
                tracing::warn!(
                    code = "SESSION_CLEAR_FAILED",
                    key,
                    error = %error,
                    "cannot clear session storage"
                );
            }
        }
    }
}

/// Reads `sub`, `email` and `name` from the token payload. The signature is
/// not verified; the server remains the authority on the token.
pub fn decode_identity(token: &str) -> Option<User> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;

    let id = match claims.get("sub")? {
        Value::Number(number) => number.as_i64()?,
        Value::String(raw) => raw.parse().ok()?,
        _ => return None,
    };
    let email = claims.get("email")?.as_str()?.to_owned();
    let name = claims
        .get("name")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_owned());
    let created_at = claims
        .get("iat")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Some(User {
        id,
        name,
        email,
        created_at,
    })
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .char_indices()
        .any(|(index, ch)| ch == '.' && index > 0 && index + 1 < domain.len())
}

fn map_source_error(error: AuthSourceError) -> SessionError {
    match error {
        AuthSourceError::Rejected(message) => SessionError::Rejected(message),
        AuthSourceError::Unavailable => SessionError::TemporarilyUnavailable,
        AuthSourceError::InvalidData => SessionError::InvalidToken,
    }
}
