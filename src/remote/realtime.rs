use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    runtime::Runtime,
    sync::{mpsc, watch},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue, Request},
        Message as WsMessage,
    },
    MaybeTlsStream, WebSocketStream,
};

use crate::{
    domain::{
        events::{EventKind, RealtimeEvent},
        message::{ClientMessageId, Message, MessageKind},
        status::ConnectivityStatus,
    },
    infra::config::{NetworkConfig, RealtimeConfig, ServerConfig},
    remote::{
        dto::{ChatDto, MembershipDto, MessageDto, MessageFailedDto, TypingDto},
        event_bus::EventBus,
    },
    usecases::{
        contracts::RealtimeChannel,
        send_message::{MessageSender, SendMessageSourceError},
    },
};

const REALTIME_CONNECTED: &str = "REALTIME_CONNECTED";
const REALTIME_CONNECT_FAILED: &str = "REALTIME_CONNECT_FAILED";
const REALTIME_CONNECTION_LOST: &str = "REALTIME_CONNECTION_LOST";
const REALTIME_STOPPED: &str = "REALTIME_STOPPED";
const REALTIME_FRAME_DECODE_FAILED: &str = "REALTIME_FRAME_DECODE_FAILED";
const REALTIME_SERVER_ERROR: &str = "REALTIME_SERVER_ERROR";
const REALTIME_SEND_REFUSED: &str = "REALTIME_SEND_REFUSED";
const REALTIME_SEND_DROPPED: &str = "REALTIME_SEND_DROPPED";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("realtime channel is not connected")]
    NotConnected,
    #[error("invalid realtime endpoint `{url}`: {details}")]
    InvalidEndpoint { url: String, details: String },
    #[error("bearer token cannot be sent as a header")]
    InvalidToken,
}

/// Frames the client emits, encoded as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    JoinChat {
        chat_id: i64,
    },
    LeaveChat {
        chat_id: i64,
    },
    SendMessage {
        chat_id: i64,
        content: String,
        #[serde(rename = "type")]
        kind: MessageKind,
        client_id: ClientMessageId,
    },
    Typing {
        chat_id: i64,
    },
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decodes one inbound text frame. Unknown event types yield `Ok(None)`.
pub fn decode_frame(text: &str) -> Result<Option<RealtimeEvent>, FrameError> {
    let frame: InboundFrame = serde_json::from_str(text)?;

    let Some(kind) = EventKind::from_wire_name(&frame.kind) else {
        if frame.kind == "error" {
            tracing::warn!(
                code = REALTIME_SERVER_ERROR,
                payload = %frame.data,
                "server reported a realtime error"
            );
        } else {
            tracing::debug!(kind = %frame.kind, "ignoring unknown realtime frame");
        }
        return Ok(None);
    };

    let event = match kind {
        EventKind::MessageCreated => {
            let dto: MessageDto = serde_json::from_value(frame.data)?;
            RealtimeEvent::MessageCreated(Message::from(dto))
        }
        EventKind::ChatCreated => {
            let dto: ChatDto = serde_json::from_value(frame.data)?;
            RealtimeEvent::ChatCreated(dto.into())
        }
        EventKind::UserJoined => {
            let dto: MembershipDto = serde_json::from_value(frame.data)?;
            RealtimeEvent::UserJoined {
                chat_id: dto.chat_id,
                user: dto.user.into(),
            }
        }
        EventKind::UserLeft => {
            let dto: MembershipDto = serde_json::from_value(frame.data)?;
            RealtimeEvent::UserLeft {
                chat_id: dto.chat_id,
                user: dto.user.into(),
            }
        }
        EventKind::Typing => {
            let dto: TypingDto = serde_json::from_value(frame.data)?;
            RealtimeEvent::Typing {
                chat_id: dto.chat_id,
                user_id: dto.user_id,
            }
        }
        EventKind::MessageFailed => {
            let dto: MessageFailedDto = serde_json::from_value(frame.data)?;
            RealtimeEvent::MessageFailed {
                chat_id: dto.chat_id,
                client_id: dto.client_id,
            }
        }
    };

    Ok(Some(event))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.reconnect_initial_ms.max(1)),
            max: Duration::from_millis(config.reconnect_max_ms.max(config.reconnect_initial_ms)),
        }
    }

    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

#[derive(Debug)]
struct Connection {
    commands: mpsc::UnboundedSender<ClientCommand>,
    stop_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<ConnectivityStatus>,
}

impl Connection {
    fn is_live(&self) -> bool {
        !self.commands.is_closed()
    }
}

#[derive(Debug, Clone)]
struct ConnectionSettings {
    url: String,
    connect_timeout: Duration,
    backoff: Backoff,
}

/// The one WebSocket connection of a session.
///
/// `connect` spawns a task on the shared runtime that owns the socket,
/// re-dials with exponential backoff, re-joins every room after a reconnect
/// and publishes decoded frames to the event bus.
#[derive(Debug)]
pub struct WsRealtimeClient {
    runtime: Arc<Runtime>,
    settings: ConnectionSettings,
    bus: EventBus,
    rooms: Arc<Mutex<BTreeSet<i64>>>,
    connection: Mutex<Option<Connection>>,
}

impl WsRealtimeClient {
    pub fn new(
        runtime: Arc<Runtime>,
        server: &ServerConfig,
        network: &NetworkConfig,
        realtime: &RealtimeConfig,
    ) -> Self {
        Self {
            runtime,
            settings: ConnectionSettings {
                url: server.ws_url.clone(),
                connect_timeout: Duration::from_millis(network.connect_timeout_ms),
                backoff: Backoff::from_config(realtime),
            },
            bus: EventBus::new(),
            rooms: Arc::new(Mutex::new(BTreeSet::new())),
            connection: Mutex::new(None),
        }
    }

    pub fn joined_rooms(&self) -> Vec<i64> {
        lock(&self.rooms).iter().copied().collect()
    }

    fn connection(&self) -> MutexGuard<'_, Option<Connection>> {
        lock(&self.connection)
    }

    /// Queues a frame for the socket task; fails unless the socket is up.
    fn enqueue(&self, command: ClientCommand) -> Result<(), ChannelError> {
        let connection = self.connection();
        let Some(connection) = connection.as_ref() else {
            return Err(ChannelError::NotConnected);
        };

        if *connection.status_rx.borrow() != ConnectivityStatus::Connected {
            return Err(ChannelError::NotConnected);
        }

        connection
            .commands
            .send(command)
            .map_err(|_| ChannelError::NotConnected)
    }
}

impl Drop for WsRealtimeClient {
    fn drop(&mut self) {
        if let Some(connection) = self.connection().take() {
            let _ = connection.stop_tx.send(true);
        }
    }
}

impl RealtimeChannel for WsRealtimeClient {
    fn connect(&self, token: &str) -> Result<(), ChannelError> {
        let mut slot = self.connection();
        if slot.as_ref().is_some_and(Connection::is_live) {
            return Ok(());
        }

        build_request(&self.settings.url, token)?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(ConnectivityStatus::Connecting);

        self.runtime.spawn(run_connection(
            self.settings.clone(),
            token.to_owned(),
            self.bus.clone(),
            Arc::clone(&self.rooms),
            command_rx,
            stop_rx,
            status_tx,
        ));

        *slot = Some(Connection {
            commands,
            stop_tx,
            status_rx,
        });
        Ok(())
    }

    fn disconnect(&self) {
        if let Some(connection) = self.connection().take() {
            let _ = connection.stop_tx.send(true);
        }
        lock(&self.rooms).clear();
        self.bus.clear();
    }

    fn status(&self) -> ConnectivityStatus {
        match self.connection().as_ref() {
            Some(connection) if connection.is_live() => *connection.status_rx.borrow(),
            _ => ConnectivityStatus::Disconnected,
        }
    }

    fn join_chat(&self, chat_id: i64) {
        if lock(&self.rooms).insert(chat_id) {
            // Offline joins are replayed by the socket task once it connects.
            let _ = self.enqueue(ClientCommand::JoinChat { chat_id });
        }
    }

    fn leave_chat(&self, chat_id: i64) {
        if lock(&self.rooms).remove(&chat_id) {
            let _ = self.enqueue(ClientCommand::LeaveChat { chat_id });
        }
    }

    fn send_typing(&self, chat_id: i64) -> Result<(), ChannelError> {
        self.enqueue(ClientCommand::Typing { chat_id })
    }

    fn events(&self) -> &EventBus {
        &self.bus
    }
}

impl MessageSender for WsRealtimeClient {
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        client_id: ClientMessageId,
    ) -> Result<(), SendMessageSourceError> {
        let command = ClientCommand::SendMessage {
            chat_id,
            content: text.to_owned(),
            kind: MessageKind::Text,
            client_id,
        };

        self.enqueue(command).map_err(|_| {
            tracing::warn!(
                code = REALTIME_SEND_REFUSED,
                chat_id,
                %client_id,
                "message send refused while disconnected"
            );
            SendMessageSourceError::NotConnected
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn build_request(url: &str, token: &str) -> Result<Request<()>, ChannelError> {
    let mut request =
        url.into_client_request()
            .map_err(|error| ChannelError::InvalidEndpoint {
                url: url.to_owned(),
                details: error.to_string(),
            })?;

    let header = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| ChannelError::InvalidToken)?;
    request.headers_mut().insert(AUTHORIZATION, header);

    Ok(request)
}

/// Reports a queued send that never reached the socket.
fn fail_if_send(bus: &EventBus, command: ClientCommand) {
    if let ClientCommand::SendMessage {
        chat_id, client_id, ..
    } = command
    {
        tracing::warn!(
            code = REALTIME_SEND_DROPPED,
            chat_id,
            %client_id,
            "queued message dropped with the connection"
        );
        bus.publish(&RealtimeEvent::MessageFailed { chat_id, client_id });
    }
}

enum SessionEnd {
    Stopped,
    Dropped,
}

async fn run_connection(
    settings: ConnectionSettings,
    token: String,
    bus: EventBus,
    rooms: Arc<Mutex<BTreeSet<i64>>>,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    mut stop_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<ConnectivityStatus>,
) {
    let mut delay = settings.backoff.initial;

    loop {
        status_tx.send_replace(ConnectivityStatus::Connecting);

        let request = match build_request(&settings.url, &token) {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(code = REALTIME_CONNECT_FAILED, error = %error, "realtime request rejected");
                break;
            }
        };
        let dial = tokio::time::timeout(settings.connect_timeout, connect_async(request));
        let socket = tokio::select! {
            _ = stop_requested(&mut stop_rx) => break,
            outcome = dial => match outcome {
                Ok(Ok((socket, _))) => Some(socket),
                Ok(Err(error)) => {
                    tracing::warn!(
                        code = REALTIME_CONNECT_FAILED,
                        error = %error,
                        retry_in_ms = delay.as_millis() as u64,
                        "realtime connect failed"
                    );
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        code = REALTIME_CONNECT_FAILED,
                        retry_in_ms = delay.as_millis() as u64,
                        "realtime connect timed out"
                    );
                    None
                }
            },
        };

        if let Some(socket) = socket {
            status_tx.send_replace(ConnectivityStatus::Connected);
            tracing::info!(code = REALTIME_CONNECTED, url = %settings.url, "realtime channel connected");
            delay = settings.backoff.initial;

            match drive(socket, &bus, &rooms, &mut commands, &mut stop_rx).await {
                SessionEnd::Stopped => break,
                SessionEnd::Dropped => {
                    tracing::warn!(
                        code = REALTIME_CONNECTION_LOST,
                        retry_in_ms = delay.as_millis() as u64,
                        "realtime connection lost"
                    );
                }
            }
        }

        status_tx.send_replace(ConnectivityStatus::Disconnected);

        let pause = tokio::time::sleep(delay);
        tokio::pin!(pause);
        loop {
            tokio::select! {
                _ = stop_requested(&mut stop_rx) => {
                    tracing::info!(code = REALTIME_STOPPED, "realtime channel stopped");
                    return;
                }
                _ = &mut pause => break,
                command = commands.recv() => match command {
                    Some(command) => fail_if_send(&bus, command),
                    None => return,
                },
            }
        }

        delay = settings.backoff.next(delay);
    }

    status_tx.send_replace(ConnectivityStatus::Disconnected);
    tracing::info!(code = REALTIME_STOPPED, "realtime channel stopped");
}

/// Resolves once a stop was signalled or every stop sender is gone.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn drive(
    socket: Socket,
    bus: &EventBus,
    rooms: &Mutex<BTreeSet<i64>>,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
    stop_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();

    let rejoin: Vec<i64> = lock(rooms).iter().copied().collect();
    for chat_id in rejoin {
        if send_command(&mut sink, &ClientCommand::JoinChat { chat_id })
            .await
            .is_err()
        {
            return SessionEnd::Dropped;
        }
    }

    loop {
        tokio::select! {
            _ = stop_requested(stop_rx) => {
                let _ = sink.send(WsMessage::Close(None)).await;
                return SessionEnd::Stopped;
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    return SessionEnd::Stopped;
                };
                if send_command(&mut sink, &command).await.is_err() {
                    fail_if_send(bus, command);
                    return SessionEnd::Dropped;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match decode_frame(text.as_str()) {
                    Ok(Some(event)) => {
                        bus.publish(&event);
                    }
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(
                            code = REALTIME_FRAME_DECODE_FAILED,
                            error = %error,
                            "dropping undecodable realtime frame"
                        );
                    }
                },
                Some(Ok(WsMessage::Close(_))) | None => return SessionEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    tracing::warn!(
                        code = REALTIME_CONNECTION_LOST,
                        error = %error,
                        "realtime read failed"
                    );
                    return SessionEnd::Dropped;
                }
            },
        }
    }
}

async fn send_command<S>(sink: &mut S, command: &ClientCommand) -> Result<(), ()>
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let Ok(encoded) = serde_json::to_string(command) else {
        return Err(());
    };

    sink.send(WsMessage::text(encoded)).await.map_err(|_| ())
}
