use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::{
    domain::{
        chat::Chat,
        chat_list_state::ChatListState,
        events::{AppEvent, EventKind, RealtimeEvent},
        message::{ClientMessageId, DeliveryStatus, Message},
        shell_state::ShellState,
        status::ConnectivityStatus,
        user::{Session, User},
    },
    infra::contracts::KeyValueStore,
    remote::event_bus::Subscription,
    usecases::{
        contracts::{RealtimeChannel, ShellOrchestrator},
        create_chat::{create_chat, ChatCreator, CreateChatCommand, CreateChatError},
        list_chats::{list_chats, ChatsSource, ListChatsError},
        list_users::{list_users, ListUsersError, ListUsersQuery, UsersSource},
        load_messages::{LoadMessagesError, MessagesSource},
        message_sync::{MessageSync, RetryError},
        send_message::SendMessageError,
        session::{AuthSource, SessionStore},
    },
};

const CHAT_LIST_EVENT_KINDS: [EventKind; 4] = [
    EventKind::MessageCreated,
    EventKind::ChatCreated,
    EventKind::UserJoined,
    EventKind::UserLeft,
];

/// Backends the interactive shell talks to.
pub struct ShellServices<'a> {
    pub chats: &'a dyn ChatsSource,
    pub messages: &'a dyn MessagesSource,
    pub users: &'a dyn UsersSource,
    pub creator: &'a dyn ChatCreator,
    pub auth: &'a dyn AuthSource,
    pub channel: &'a dyn RealtimeChannel,
}

/// Something the presentation layer should show, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellNotice {
    Info(String),
    Error(String),
    Help,
    ChatList {
        chats: Vec<Chat>,
        active: Option<i64>,
        viewer_id: Option<i64>,
    },
    Thread {
        title: String,
        messages: Vec<Message>,
        viewer_id: Option<i64>,
    },
    /// A message that is new to the open thread, or whose delivery failed.
    Message {
        /// 1-based position in the thread, the index `/retry` takes.
        position: usize,
        message: Message,
        viewer_id: Option<i64>,
    },
    Users(Vec<User>),
    Typing(String),
    Connectivity(ConnectivityStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderedEntry {
    server_id: Option<i64>,
    client_id: Option<ClientMessageId>,
    status: DeliveryStatus,
}

impl RenderedEntry {
    fn of(message: &Message) -> Self {
        Self {
            server_id: message.server_id,
            client_id: message.client_id,
            status: message.status,
        }
    }

    fn same_entry(&self, message: &Message) -> bool {
        (self.server_id.is_some() && self.server_id == message.server_id)
            || (self.client_id.is_some() && self.client_id == message.client_id)
    }
}

pub struct DefaultShellOrchestrator<'a, S: KeyValueStore> {
    state: ShellState,
    services: ShellServices<'a>,
    session: &'a mut SessionStore<S>,
    chat_list: ChatListState,
    chat_events: Subscription,
    sync: MessageSync,
    rendered: Vec<RenderedEntry>,
    last_typing: Option<i64>,
    notices: Vec<ShellNotice>,
}

impl<'a, S: KeyValueStore> DefaultShellOrchestrator<'a, S> {
    pub fn new(
        services: ShellServices<'a>,
        session: &'a mut SessionStore<S>,
        sync: MessageSync,
    ) -> Self {
        let chat_events = services.channel.events().subscribe(&CHAT_LIST_EVENT_KINDS);

        Self {
            state: ShellState::default(),
            services,
            session,
            chat_list: ChatListState::default(),
            chat_events,
            sync,
            rendered: Vec::new(),
            last_typing: None,
            notices: Vec::new(),
        }
    }

    pub fn chat_list(&self) -> &ChatListState {
        &self.chat_list
    }

    pub fn sync(&self) -> &MessageSync {
        &self.sync
    }

    /// Loads the chat list for the first screen.
    pub fn start(&mut self) {
        self.sync_connectivity();
        self.refresh_chats();
    }

    fn viewer(&self) -> Option<&Session> {
        self.session.current()
    }

    fn viewer_id(&self) -> Option<i64> {
        self.session.user_id()
    }

    fn notify(&mut self, notice: ShellNotice) {
        self.notices.push(notice);
    }

    fn on_tick(&mut self, now: DateTime<Utc>) {
        self.sync_connectivity();

        let viewer_id = self.viewer_id();
        for event in self.chat_events.drain() {
            self.apply_chat_list_event(&event, viewer_id);
        }

        if self.sync.pump(viewer_id, now) {
            self.emit_thread_changes();
        }
        self.emit_typing(now);
    }

    fn sync_connectivity(&mut self) {
        let status = self.services.channel.status();
        if self.state.set_connectivity_status(status) {
            tracing::info!(status = status.as_label(), "realtime connectivity changed");
            self.notify(ShellNotice::Connectivity(status));
        }
    }

    fn apply_chat_list_event(&mut self, event: &RealtimeEvent, viewer_id: Option<i64>) {
        if !self.chat_list.apply_event(event) {
            return;
        }

        match event {
            RealtimeEvent::MessageCreated(message)
                if self.chat_list.active_chat_id() != Some(message.chat_id)
                    && Some(message.author_id) != viewer_id =>
            {
                if let Some(chat) = self.chat_list.chat(message.chat_id) {
                    let line = format!(
                        "New message in {} ({} unread)",
                        chat.display_name(viewer_id),
                        chat.unread_count
                    );
                    self.notify(ShellNotice::Info(line));
                }
            }
            RealtimeEvent::ChatCreated(chat) => {
                let line = format!(
                    "Chat #{} \"{}\" is now available",
                    chat.chat_id,
                    chat.display_name(viewer_id)
                );
                self.notify(ShellNotice::Info(line));
            }
            _ => {}
        }
    }

    fn emit_thread_changes(&mut self) {
        let viewer_id = self.viewer_id();
        let mut fresh = Vec::new();

        for (index, message) in self.sync.messages().iter().enumerate() {
            let previous = self
                .rendered
                .iter()
                .find(|entry| entry.same_entry(message))
                .map(|entry| entry.status);

            let newly_failed = message.status == DeliveryStatus::Failed
                && previous != Some(DeliveryStatus::Failed);
            if previous.is_none() || newly_failed {
                fresh.push(ShellNotice::Message {
                    position: index + 1,
                    message: message.clone(),
                    viewer_id,
                });
            }
        }

        self.remember_thread();
        self.notices.extend(fresh);
    }

    fn remember_thread(&mut self) {
        self.rendered = self.sync.messages().iter().map(RenderedEntry::of).collect();
    }

    fn emit_typing(&mut self, now: DateTime<Utc>) {
        let typing = self.sync.typing_user(now);
        if typing == self.last_typing {
            return;
        }
        self.last_typing = typing;

        let Some(user_id) = typing else {
            return;
        };
        let name = self
            .chat_list
            .active_chat()
            .and_then(|chat| chat.participant(user_id))
            .map(|user| user.name.clone())
            .unwrap_or_else(|| format!("User #{user_id}"));
        self.notify(ShellNotice::Typing(name));
    }

    fn on_input(&mut self, line: &str, now: DateTime<Utc>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match line.strip_prefix('/') {
            Some(command) => self.run_command(command),
            None => self.send(line, now),
        }
    }

    fn run_command(&mut self, command: &str) {
        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match name {
            "chats" => self.refresh_chats(),
            "open" => match args.first().and_then(|raw| raw.parse::<i64>().ok()) {
                Some(chat_id) => self.open_chat(chat_id),
                None => self.notify(ShellNotice::Error("Usage: /open <chat id>".to_owned())),
            },
            "close" => self.close_chat(),
            "retry" => match args.first().and_then(|raw| raw.parse::<usize>().ok()) {
                Some(position) => self.retry(position),
                None => self.notify(ShellNotice::Error("Usage: /retry <n>".to_owned())),
            },
            "users" => self.show_users(&args.join(" ")),
            "new" => self.new_chat(&args),
            "help" => self.notify(ShellNotice::Help),
            "quit" | "exit" => self.state.stop(),
            other => self.notify(ShellNotice::Error(format!(
                "Unknown command /{other}. Type /help for the list."
            ))),
        }
    }

    fn refresh_chats(&mut self) {
        self.chat_list.set_loading();

        match list_chats(self.services.chats) {
            Ok(output) => {
                if output.skipped > 0 {
                    tracing::warn!(skipped = output.skipped, "some chats were not shown");
                }
                self.chat_list.set_ready(output.chats);
                self.notify_chat_list();
            }
            Err(ListChatsError::Unauthorized) => self.expire_session(),
            Err(error) => {
                tracing::warn!(code = "CHAT_LIST_LOAD_FAILED", error = ?error, "chat list failed");
                self.chat_list.set_error();
                self.notify(ShellNotice::Error(
                    "Could not load chats. Try /chats again.".to_owned(),
                ));
            }
        }
    }

    fn notify_chat_list(&mut self) {
        let notice = ShellNotice::ChatList {
            chats: self.chat_list.chats().to_vec(),
            active: self.chat_list.active_chat_id(),
            viewer_id: self.viewer_id(),
        };
        self.notify(notice);
    }

    fn open_chat(&mut self, chat_id: i64) {
        let viewer_id = self.viewer_id();
        let Some(title) = self
            .chat_list
            .select(chat_id)
            .map(|chat| chat.display_name(viewer_id))
        else {
            self.notify(ShellNotice::Error(format!("No chat with id {chat_id}.")));
            return;
        };

        let result = self.sync.activate(
            self.services.channel,
            self.services.messages,
            Some(chat_id),
        );
        self.last_typing = None;

        match result {
            Ok(()) => {
                self.remember_thread();
                self.notify(ShellNotice::Thread {
                    title,
                    messages: self.sync.messages().to_vec(),
                    viewer_id,
                });
            }
            Err(LoadMessagesError::Unauthorized) => self.expire_session(),
            Err(LoadMessagesError::ChatNotFound) => {
                self.chat_list.clear_selection();
                self.notify(ShellNotice::Error(format!("Chat {chat_id} no longer exists.")));
            }
            Err(_) => self.notify(ShellNotice::Error(
                "Could not load messages. Try /open again.".to_owned(),
            )),
        }
    }

    fn close_chat(&mut self) {
        self.sync.switch_chat(self.services.channel, None);
        self.chat_list.clear_selection();
        self.rendered.clear();
        self.last_typing = None;
        self.notify_chat_list();
    }

    fn send(&mut self, text: &str, now: DateTime<Utc>) {
        let Some(author) = self.viewer().map(|session| session.user.clone()) else {
            self.expire_session();
            return;
        };

        match self.sync.send(self.services.channel, &author, text, now) {
            Ok(_) => self.emit_thread_changes(),
            Err(SendMessageError::NoActiveChat) => self.notify(ShellNotice::Error(
                "Open a chat first with /open <id>.".to_owned(),
            )),
            Err(error) => {
                tracing::debug!(error = ?error, "message not sent");
            }
        }
    }

    fn retry(&mut self, position: usize) {
        let client_id = position
            .checked_sub(1)
            .and_then(|index| self.sync.messages().get(index))
            .filter(|message| message.status == DeliveryStatus::Failed)
            .and_then(|message| message.client_id);

        let Some(client_id) = client_id else {
            self.notify(ShellNotice::Error(format!(
                "Message {position} is not a failed send."
            )));
            return;
        };

        match self.sync.retry(self.services.channel, client_id) {
            Ok(receipt) if receipt.status == DeliveryStatus::Failed => {
                self.emit_thread_changes();
            }
            Ok(_) => {
                self.remember_thread();
                self.notify(ShellNotice::Info(format!("Retrying message {position}...")));
            }
            Err(RetryError::NotFailed) => self.notify(ShellNotice::Error(format!(
                "Message {position} is not a failed send."
            ))),
        }
    }

    fn show_users(&mut self, search: &str) {
        let query = ListUsersQuery {
            exclude_user_id: self.viewer_id(),
            search: Some(search.to_owned()),
        };

        match list_users(self.services.users, query) {
            Ok(users) => self.notify(ShellNotice::Users(users)),
            Err(ListUsersError::Unauthorized) => self.expire_session(),
            Err(_) => self.notify(ShellNotice::Error("Could not load users.".to_owned())),
        }
    }

    /// `/new <id> [id..] [title words]`
    fn new_chat(&mut self, args: &[&str]) {
        let split = args
            .iter()
            .position(|arg| arg.parse::<i64>().is_err())
            .unwrap_or(args.len());
        let participant_ids: Vec<i64> = args[..split]
            .iter()
            .filter_map(|arg| arg.parse().ok())
            .collect();
        let title = (split < args.len()).then(|| args[split..].join(" "));

        let command = CreateChatCommand {
            participant_ids,
            title,
            creator_id: self.viewer_id(),
        };

        match create_chat(self.services.creator, command) {
            Ok(chat) => {
                let line = format!(
                    "Created chat #{} \"{}\"",
                    chat.chat_id,
                    chat.display_name(self.viewer_id())
                );
                self.chat_list.upsert(chat);
                self.notify(ShellNotice::Info(line));
            }
            Err(CreateChatError::NoParticipants) => self.notify(ShellNotice::Error(
                "Usage: /new <user id> [user id..] [group title]".to_owned(),
            )),
            Err(CreateChatError::Unauthorized) => self.expire_session(),
            Err(CreateChatError::Rejected(message)) => self.notify(ShellNotice::Error(message)),
            Err(_) => self.notify(ShellNotice::Error("Could not create the chat.".to_owned())),
        }
    }

    fn expire_session(&mut self) {
        self.session
            .invalidate(self.services.auth, self.services.channel);
        self.notify(ShellNotice::Error(
            "Session expired. Run `parley login` to sign in again.".to_owned(),
        ));
        self.state.stop();
    }
}

impl<'a, S: KeyValueStore> ShellOrchestrator for DefaultShellOrchestrator<'a, S> {
    fn state(&self) -> &ShellState {
        &self.state
    }

    fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Tick => self.on_tick(Utc::now()),
            AppEvent::QuitRequested => self.state.stop(),
            AppEvent::Input(line) => self.on_input(&line, Utc::now()),
        }

        Ok(())
    }

    fn take_notices(&mut self) -> Vec<ShellNotice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::TimeZone;

    use super::*;
    use crate::{
        domain::message::MessageKind,
        infra::stubs::MemoryKeyValueStore,
        test_support::{ChannelCall, StubChannel},
        usecases::{
            create_chat::{CreateChatSourceError, NewChatRequest},
            list_chats::ChatsSourceError,
            list_users::UsersSourceError,
            load_messages::MessagesSourceError,
            session::{AuthSourceError, TOKEN_KEY, USER_KEY},
        },
    };

    struct StubBackend {
        chats: RefCell<Result<Vec<Chat>, ChatsSourceError>>,
        messages: Vec<Message>,
        created: RefCell<Vec<NewChatRequest>>,
    }

    impl StubBackend {
        fn with_chats(chats: Vec<Chat>) -> Self {
            Self {
                chats: RefCell::new(Ok(chats)),
                messages: Vec::new(),
                created: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatsSource for StubBackend {
        fn list_chats(&self) -> Result<Vec<Chat>, ChatsSourceError> {
            self.chats.borrow().clone()
        }
    }

    impl MessagesSource for StubBackend {
        fn list_messages(&self, chat_id: i64) -> Result<Vec<Message>, MessagesSourceError> {
            Ok(self
                .messages
                .iter()
                .filter(|message| message.chat_id == chat_id)
                .cloned()
                .collect())
        }
    }

    impl UsersSource for StubBackend {
        fn list_users(&self) -> Result<Vec<User>, UsersSourceError> {
            Ok(vec![user(7, "Ana"), user(8, "Bruno")])
        }
    }

    impl ChatCreator for StubBackend {
        fn create_chat(&self, request: &NewChatRequest) -> Result<Chat, CreateChatSourceError> {
            self.created.borrow_mut().push(request.clone());
            Ok(chat(30, &[7, 8], None))
        }
    }

    impl AuthSource for StubBackend {
        fn login(&self, _email: &str, _password: &str) -> Result<String, AuthSourceError> {
            Err(AuthSourceError::Unavailable)
        }

        fn register(&self, _: &str, _: &str, _: &str) -> Result<(), AuthSourceError> {
            Err(AuthSourceError::Unavailable)
        }

        fn set_token(&self, _token: Option<&str>) {}
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn user(id: i64, name: &str) -> User {
        User {
            id,
            name: name.to_owned(),
            email: format!("{}@example.com", name.to_lowercase()),
            created_at: at(1),
        }
    }

    fn chat(chat_id: i64, participant_ids: &[i64], day: Option<u32>) -> Chat {
        Chat {
            chat_id,
            name: None,
            is_group: false,
            participants: participant_ids
                .iter()
                .map(|id| user(*id, if *id == 7 { "Ana" } else { "Bruno" }))
                .collect(),
            last_message: None,
            unread_count: 0,
            created_at: at(day.unwrap_or(1)),
            updated_at: at(day.unwrap_or(1)),
        }
    }

    fn message(server_id: i64, chat_id: i64, author_id: i64, content: &str) -> Message {
        Message {
            server_id: Some(server_id),
            client_id: None,
            chat_id,
            author_id,
            author_name: None,
            content: content.to_owned(),
            kind: MessageKind::Text,
            created_at: at(2),
            status: DeliveryStatus::Sent,
        }
    }

    fn signed_in_store() -> SessionStore<MemoryKeyValueStore> {
        let storage = MemoryKeyValueStore::default();
        storage.set(TOKEN_KEY, "t0k").expect("set");
        storage
            .set(
                USER_KEY,
                &serde_json::to_string(&user(7, "Ana")).expect("encode"),
            )
            .expect("set");
        let mut store = SessionStore::new(storage);
        store.restore(&StubBackend::with_chats(Vec::new()));
        store
    }

    fn services<'a>(backend: &'a StubBackend, channel: &'a StubChannel) -> ShellServices<'a> {
        ShellServices {
            chats: backend,
            messages: backend,
            users: backend,
            creator: backend,
            auth: backend,
            channel,
        }
    }

    fn sync() -> MessageSync {
        MessageSync::new(chrono::Duration::milliseconds(2_000))
    }

    fn input(line: &str) -> AppEvent {
        AppEvent::Input(line.to_owned())
    }

    #[test]
    fn stops_on_quit_event() {
        let backend = StubBackend::with_chats(Vec::new());
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());

        shell
            .handle_event(AppEvent::QuitRequested)
            .expect("event must be handled");

        assert!(!shell.state().is_running());
    }

    #[test]
    fn start_lists_chats_by_recency() {
        let backend =
            StubBackend::with_chats(vec![chat(1, &[7, 8], Some(1)), chat(2, &[7, 8], Some(3))]);
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());

        shell.start();

        let notices = shell.take_notices();
        let listed = notices.iter().find_map(|notice| match notice {
            ShellNotice::ChatList { chats, .. } => {
                Some(chats.iter().map(|chat| chat.chat_id).collect::<Vec<_>>())
            }
            _ => None,
        });
        assert_eq!(listed, Some(vec![2, 1]));
    }

    #[test]
    fn open_joins_room_and_renders_thread() {
        let mut backend = StubBackend::with_chats(vec![chat(1, &[7, 8], None)]);
        backend.messages = vec![message(1, 1, 8, "hi")];
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());
        shell.start();
        shell.take_notices();

        shell.handle_event(input("/open 1")).expect("open");

        assert_eq!(channel.calls(), vec![ChannelCall::Join(1)]);
        assert_eq!(shell.chat_list().active_chat_id(), Some(1));
        assert!(matches!(
            shell.take_notices().as_slice(),
            [ShellNotice::Thread { title, messages, .. }] if title == "Bruno" && messages.len() == 1
        ));
    }

    #[test]
    fn plain_line_is_sent_to_open_chat() {
        let backend = StubBackend::with_chats(vec![chat(1, &[7, 8], None)]);
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());
        shell.start();
        shell.handle_event(input("/open 1")).expect("open");
        shell.take_notices();

        shell.handle_event(input("hello there")).expect("send");

        assert_eq!(channel.sent().len(), 1);
        assert_eq!(channel.sent()[0].1, "hello there");
        assert!(matches!(
            shell.take_notices().as_slice(),
            [ShellNotice::Message { position: 1, message, .. }] if message.is_optimistic()
        ));
    }

    #[test]
    fn line_without_open_chat_asks_to_open_one() {
        let backend = StubBackend::with_chats(Vec::new());
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());

        shell.handle_event(input("hello")).expect("input");

        assert!(channel.sent().is_empty());
        assert!(matches!(
            shell.take_notices().as_slice(),
            [ShellNotice::Error(_)]
        ));
    }

    #[test]
    fn refused_send_can_be_retried_by_position() {
        let backend = StubBackend::with_chats(vec![chat(1, &[7, 8], None)]);
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());
        shell.start();
        shell.handle_event(input("/open 1")).expect("open");
        channel.refuse_sends(true);
        shell.handle_event(input("hello")).expect("send");
        assert_eq!(shell.sync().messages()[0].status, DeliveryStatus::Failed);

        channel.refuse_sends(false);
        shell.handle_event(input("/retry 1")).expect("retry");
        shell.handle_event(AppEvent::Tick).expect("tick");

        assert_eq!(shell.sync().messages()[0].status, DeliveryStatus::Sending);
        assert_eq!(channel.sent().len(), 2);
    }

    #[test]
    fn unread_counter_tracks_other_chats_on_tick() {
        let backend =
            StubBackend::with_chats(vec![chat(1, &[7, 8], None), chat(2, &[7, 8], None)]);
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());
        shell.start();
        shell.handle_event(input("/open 1")).expect("open");

        channel
            .events()
            .publish(&RealtimeEvent::MessageCreated(message(5, 2, 8, "ping")));
        channel
            .events()
            .publish(&RealtimeEvent::MessageCreated(message(6, 1, 8, "here")));
        shell.handle_event(AppEvent::Tick).expect("tick");

        assert_eq!(shell.chat_list().chat(2).map(|c| c.unread_count), Some(1));
        assert_eq!(shell.chat_list().chat(1).map(|c| c.unread_count), Some(0));
        assert_eq!(shell.sync().messages().len(), 1);
    }

    #[test]
    fn new_chat_splits_ids_from_title() {
        let backend = StubBackend::with_chats(Vec::new());
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());

        shell.handle_event(input("/new 8 9 Weekend plans")).expect("new");

        let created = backend.created.borrow();
        assert_eq!(created[0].participant_ids, vec![8, 9]);
        assert_eq!(created[0].title.as_deref(), Some("Weekend plans"));
        assert!(shell.chat_list().chat(30).is_some());
    }

    #[test]
    fn unauthorized_response_clears_session_and_stops() {
        let backend = StubBackend::with_chats(Vec::new());
        *backend.chats.borrow_mut() = Err(ChatsSourceError::Unauthorized);
        let channel = StubChannel::default();
        let mut store = signed_in_store();

        {
            let mut shell =
                DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());
            shell.handle_event(input("/chats")).expect("chats");
            assert!(!shell.state().is_running());
        }

        assert!(store.current().is_none());
        assert!(channel.calls().contains(&ChannelCall::Disconnect));
    }

    #[test]
    fn users_command_excludes_viewer() {
        let backend = StubBackend::with_chats(Vec::new());
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());

        shell.handle_event(input("/users")).expect("users");

        assert!(matches!(
            shell.take_notices().as_slice(),
            [ShellNotice::Users(users)] if users.len() == 1 && users[0].id == 8
        ));
    }

    #[test]
    fn unknown_command_reports_error() {
        let backend = StubBackend::with_chats(Vec::new());
        let channel = StubChannel::default();
        let mut store = signed_in_store();
        let mut shell = DefaultShellOrchestrator::new(services(&backend, &channel), &mut store, sync());

        shell.handle_event(input("/dance")).expect("input");

        assert!(shell.state().is_running());
        assert!(matches!(
            shell.take_notices().as_slice(),
            [ShellNotice::Error(message)] if message.contains("/dance")
        ));
    }
}
