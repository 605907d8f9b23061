use std::path::Path;

use anyhow::{anyhow, bail, Result};
use chrono::Local;

use crate::{
    cli::{Cli, Command},
    domain::{self, message::ClientMessageId, user::Session},
    infra::{self, kv_store::FileKeyValueStore, storage_layout::StorageLayout},
    remote,
    ui::{self, event_source::StdinEventSource, render, screen::StdoutScreen},
    usecases::{
        self, bootstrap,
        context::AppContext,
        contracts::RealtimeChannel,
        create_chat::{create_chat, CreateChatCommand, CreateChatError},
        guided_auth::{run_guided_sign_in, GuidedAuthOutcome, RetryPolicy, StdTerminal},
        list_chats::{list_chats, ListChatsError},
        list_users::{list_users, ListUsersError, ListUsersQuery},
        load_messages::{load_messages, LoadMessagesError, LoadMessagesQuery},
        message_sync::MessageSync,
        send_message::{send_message, SendMessageCommand, SendMessageError},
        session::{SessionError, SessionStore},
        shell::{DefaultShellOrchestrator, ShellNotice, ShellServices},
    },
};

const SIGNED_OUT_HINT: &str = "Not signed in. Run `parley login <email>` first.";
const SESSION_EXPIRED_HINT: &str = "Session expired. Run `parley login <email>` to sign in again.";

pub fn run(cli: Cli) -> Result<()> {
    tracing::debug!(
        ui = ui::module_name(),
        domain = domain::module_name(),
        remote = remote::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    let command = cli.command_or_default();
    if let Command::Logout = command {
        logout(cli.config.as_deref());
        println!("Signed out.");
        return Ok(());
    }

    let mut context = bootstrap::bootstrap(cli.config.as_deref())?;

    match command {
        Command::Run => run_shell(&mut context)?,
        Command::Login { email, password } => {
            let password = resolve_password(password)?;
            let session = context
                .session
                .login(&context.rest, &context.realtime, &email, &password)
                .map_err(describe_session_error)?;
            println!("Signed in as {} <{}>.", session.user.name, session.user.email);
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let password = resolve_password(password)?;
            let session = context
                .session
                .register(&context.rest, &context.realtime, &name, &email, &password)
                .map_err(describe_session_error)?;
            println!("Account created. Signed in as {}.", session.user.name);
        }
        Command::Logout => {}
        Command::Whoami => {
            let session = require_session(&context)?;
            println!(
                "{} <{}> (id {})",
                session.user.name,
                session.user.email,
                session.user_id()
            );
        }
        Command::Chats => {
            let viewer_id = require_session(&context)?.user_id();
            let output = match list_chats(&context.rest) {
                Ok(output) => output,
                Err(ListChatsError::Unauthorized) => return Err(expire_session(&mut context)),
                Err(error) => bail!("could not load chats: {error:?}"),
            };
            print_notice(&ShellNotice::ChatList {
                chats: output.chats,
                active: None,
                viewer_id: Some(viewer_id),
            });
        }
        Command::Users { search } => {
            let viewer_id = require_session(&context)?.user_id();
            let query = ListUsersQuery {
                exclude_user_id: Some(viewer_id),
                search,
            };
            let users = match list_users(&context.rest, query) {
                Ok(users) => users,
                Err(ListUsersError::Unauthorized) => return Err(expire_session(&mut context)),
                Err(error) => bail!("could not load users: {error:?}"),
            };
            print_notice(&ShellNotice::Users(users));
        }
        Command::NewChat {
            participants,
            title,
        } => {
            let viewer_id = require_session(&context)?.user_id();
            let command = CreateChatCommand {
                participant_ids: participants,
                title,
                creator_id: Some(viewer_id),
            };
            let chat = match create_chat(&context.rest, command) {
                Ok(chat) => chat,
                Err(CreateChatError::Unauthorized) => return Err(expire_session(&mut context)),
                Err(CreateChatError::Rejected(message)) => bail!("{message}"),
                Err(CreateChatError::NoParticipants) => {
                    bail!("give at least one user id other than your own")
                }
                Err(error) => bail!("could not create chat: {error:?}"),
            };
            println!(
                "Created chat #{} \"{}\".",
                chat.chat_id,
                chat.display_name(Some(viewer_id))
            );
        }
        Command::History { chat_id } => {
            let viewer_id = require_session(&context)?.user_id();
            let output = match load_messages(&context.rest, LoadMessagesQuery::new(chat_id)) {
                Ok(output) => output,
                Err(LoadMessagesError::Unauthorized) => return Err(expire_session(&mut context)),
                Err(LoadMessagesError::ChatNotFound) => bail!("chat {chat_id} not found"),
                Err(error) => bail!("could not load messages: {error:?}"),
            };
            print_notice(&ShellNotice::Thread {
                title: format!("Chat #{chat_id}"),
                messages: output.messages,
                viewer_id: Some(viewer_id),
            });
        }
        Command::Send { chat_id, text } => {
            require_session(&context)?;
            let command = SendMessageCommand {
                chat_id,
                text: text.join(" "),
                client_id: ClientMessageId::generate(),
            };
            match send_message(&context.rest, command) {
                Ok(()) => println!("Sent."),
                Err(SendMessageError::Unauthorized) => return Err(expire_session(&mut context)),
                Err(SendMessageError::EmptyMessage) => bail!("message text is empty"),
                Err(SendMessageError::ChatNotFound) => bail!("chat {chat_id} not found"),
                Err(error) => bail!("could not send message: {error:?}"),
            }
        }
    }

    Ok(())
}

fn run_shell(context: &mut AppContext) -> Result<()> {
    if context.session.current().is_some() {
        context.connect_realtime();
    } else {
        let outcome = run_guided_sign_in(
            &mut StdTerminal,
            &mut context.session,
            &context.rest,
            &context.realtime,
            &RetryPolicy::default(),
        )?;
        if outcome == GuidedAuthOutcome::ExitWithGuidance {
            return Ok(());
        }
    }

    let typing_ttl_ms = i64::try_from(context.config.chat.typing_ttl_ms).unwrap_or(i64::MAX);
    let sync = MessageSync::new(chrono::Duration::milliseconds(typing_ttl_ms));
    let services = ShellServices {
        chats: &context.rest,
        messages: &context.rest,
        users: &context.rest,
        creator: &context.rest,
        auth: &context.rest,
        channel: &context.realtime,
    };

    let mut orchestrator = DefaultShellOrchestrator::new(services, &mut context.session, sync);
    orchestrator.start();

    let mut event_source = StdinEventSource::spawn()?;
    ui::shell::start(&mut event_source, &mut orchestrator, &mut StdoutScreen)?;
    drop(orchestrator);

    context.realtime.disconnect();
    Ok(())
}

/// Signs out even when the context cannot be built, e.g. with a broken config.
fn logout(config_path: Option<&Path>) {
    match bootstrap::bootstrap(config_path) {
        Ok(mut context) => context.session.logout(&context.rest, &context.realtime),
        Err(error) => {
            tracing::warn!(
                error = ?error,
                "logout fallback: bootstrap failed, clearing stored session only"
            );
            match StorageLayout::resolve() {
                Ok(layout) => SessionStore::new(FileKeyValueStore::from_layout(&layout)).discard(),
                Err(error) => tracing::warn!(error = ?error, "no storage location to clear"),
            }
        }
    }
}

fn require_session(context: &AppContext) -> Result<&Session> {
    context
        .session
        .current()
        .ok_or_else(|| anyhow!(SIGNED_OUT_HINT))
}

fn expire_session(context: &mut AppContext) -> anyhow::Error {
    context.session.invalidate(&context.rest, &context.realtime);
    anyhow!(SESSION_EXPIRED_HINT)
}

fn resolve_password(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => Ok(rpassword::prompt_password("Password: ")?),
    }
}

fn describe_session_error(error: SessionError) -> anyhow::Error {
    match error {
        SessionError::InvalidEmail => anyhow!("that does not look like an email address"),
        SessionError::MissingCredentials => anyhow!("name, email and password are required"),
        SessionError::Rejected(message) => anyhow!("{message}"),
        SessionError::InvalidToken => anyhow!("the server returned an unusable session token"),
        SessionError::TemporarilyUnavailable => anyhow!("server unreachable, try again later"),
        SessionError::StorageUnavailable => anyhow!("could not save the session locally"),
    }
}

fn print_notice(notice: &ShellNotice) {
    for line in render::render_notice(notice, &Local::now()) {
        println!("{line}");
    }
}
