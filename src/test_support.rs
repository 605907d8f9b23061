use std::sync::{Mutex, MutexGuard};

use crate::{
    domain::{message::ClientMessageId, status::ConnectivityStatus},
    remote::{event_bus::EventBus, realtime::ChannelError},
    usecases::{
        contracts::RealtimeChannel,
        send_message::{MessageSender, SendMessageSourceError},
    },
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().expect("env lock should not be poisoned")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    Connect(String),
    Disconnect,
    Join(i64),
    Leave(i64),
    Send {
        chat_id: i64,
        text: String,
        client_id: ClientMessageId,
    },
    Typing(i64),
}

/// In-memory channel that records every call and lets tests push events
/// through its bus.
#[derive(Debug)]
pub struct StubChannel {
    bus: EventBus,
    calls: Mutex<Vec<ChannelCall>>,
    status: Mutex<ConnectivityStatus>,
    refuse_sends: Mutex<bool>,
}

impl Default for StubChannel {
    fn default() -> Self {
        Self {
            bus: EventBus::new(),
            calls: Mutex::new(Vec::new()),
            status: Mutex::new(ConnectivityStatus::Connected),
            refuse_sends: Mutex::new(false),
        }
    }
}

impl StubChannel {
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn sent(&self) -> Vec<(i64, String, ClientMessageId)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChannelCall::Send {
                    chat_id,
                    text,
                    client_id,
                } => Some((chat_id, text, client_id)),
                _ => None,
            })
            .collect()
    }

    pub fn refuse_sends(&self, refuse: bool) {
        *self.refuse_sends.lock().expect("refuse lock") = refuse;
    }

    fn record(&self, call: ChannelCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

impl MessageSender for StubChannel {
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        client_id: ClientMessageId,
    ) -> Result<(), SendMessageSourceError> {
        self.record(ChannelCall::Send {
            chat_id,
            text: text.to_owned(),
            client_id,
        });

        if *self.refuse_sends.lock().expect("refuse lock") {
            return Err(SendMessageSourceError::NotConnected);
        }
        Ok(())
    }
}

impl RealtimeChannel for StubChannel {
    fn connect(&self, token: &str) -> Result<(), ChannelError> {
        self.record(ChannelCall::Connect(token.to_owned()));
        *self.status.lock().expect("status lock") = ConnectivityStatus::Connected;
        Ok(())
    }

    fn disconnect(&self) {
        self.record(ChannelCall::Disconnect);
        *self.status.lock().expect("status lock") = ConnectivityStatus::Disconnected;
        self.bus.clear();
    }

    fn status(&self) -> ConnectivityStatus {
        *self.status.lock().expect("status lock")
    }

    fn join_chat(&self, chat_id: i64) {
        self.record(ChannelCall::Join(chat_id));
    }

    fn leave_chat(&self, chat_id: i64) {
        self.record(ChannelCall::Leave(chat_id));
    }

    fn send_typing(&self, chat_id: i64) -> Result<(), ChannelError> {
        self.record(ChannelCall::Typing(chat_id));
        Ok(())
    }

    fn events(&self) -> &EventBus {
        &self.bus
    }
}
