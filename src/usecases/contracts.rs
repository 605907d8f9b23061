use anyhow::Result;

use crate::{
    domain::{events::AppEvent, shell_state::ShellState, status::ConnectivityStatus},
    remote::{event_bus::EventBus, realtime::ChannelError},
    usecases::{send_message::MessageSender, shell::ShellNotice},
};

pub trait AppEventSource {
    fn next_event(&mut self) -> Result<Option<AppEvent>>;
}

pub trait ShellOrchestrator {
    fn state(&self) -> &ShellState;
    fn handle_event(&mut self, event: AppEvent) -> Result<()>;
    /// Output produced since the last call, oldest first.
    fn take_notices(&mut self) -> Vec<ShellNotice>;
}

/// Line-oriented output surface the shell renders into.
pub trait Screen {
    fn print_line(&mut self, line: &str) -> Result<()>;
}

/// Push channel shared by everything that needs live updates in a session.
pub trait RealtimeChannel: MessageSender {
    /// Opens the connection; a no-op while one is already live.
    fn connect(&self, token: &str) -> Result<(), ChannelError>;
    /// Tears the connection down and drops every listener.
    fn disconnect(&self);
    fn status(&self) -> ConnectivityStatus;
    fn join_chat(&self, chat_id: i64);
    fn leave_chat(&self, chat_id: i64);
    fn send_typing(&self, chat_id: i64) -> Result<(), ChannelError>;
    fn events(&self) -> &EventBus;
}
