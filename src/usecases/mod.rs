//! Use case layer: application workflows and orchestration.

pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod create_chat;
pub mod guided_auth;
pub mod list_chats;
pub mod list_users;
pub mod load_messages;
pub mod message_sync;
pub mod send_message;
pub mod session;
pub mod shell;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
