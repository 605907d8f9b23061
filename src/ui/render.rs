//! Plain-text rendering of shell output.
//!
//! Thread rendering follows a chat transcript layout:
//! - a date separator whenever the day changes
//! - the sender name only on the first of consecutive messages from one author
//! - a delivery marker on entries that are still pending or failed

use std::fmt::Display;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::{
    domain::{
        chat::Chat,
        message::{DeliveryStatus, Message},
        status::ConnectivityStatus,
        user::User,
    },
    usecases::shell::ShellNotice,
};

const PREVIEW_MAX_CHARS: usize = 40;
const EMPTY_CHAT_PREVIEW: &str = "No messages yet";

pub const HELP_LINES: [&str; 8] = [
    "/chats                 list chats, most recent first",
    "/open <id>             open a chat and show its history",
    "/close                 close the open chat",
    "/retry <n>             resend failed message number n",
    "/new <ids..> [title]   start a chat; several ids make a group",
    "/users [search]        list people you can chat with",
    "/help                  show this list",
    "/quit                  leave parley",
];

pub fn render_notice<Tz>(notice: &ShellNotice, now: &DateTime<Tz>) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match notice {
        ShellNotice::Info(line) => vec![line.clone()],
        ShellNotice::Error(line) => vec![format!("error: {line}")],
        ShellNotice::Help => HELP_LINES.iter().map(|line| (*line).to_owned()).collect(),
        ShellNotice::ChatList {
            chats,
            active,
            viewer_id,
        } => render_chat_list(chats, *active, *viewer_id, now),
        ShellNotice::Thread {
            title,
            messages,
            viewer_id,
        } => render_thread(title, messages, *viewer_id, &now.timezone()),
        ShellNotice::Message {
            position,
            message,
            viewer_id,
        } => {
            let sender = sender_name(message, *viewer_id);
            vec![message_line(*position, message, Some(&sender), &now.timezone())]
        }
        ShellNotice::Users(users) => render_users(users),
        ShellNotice::Typing(name) => vec![format!("{name} is typing...")],
        ShellNotice::Connectivity(status) => vec![connectivity_line(*status)],
    }
}

pub fn render_chat_list<Tz>(
    chats: &[Chat],
    active: Option<i64>,
    viewer_id: Option<i64>,
    now: &DateTime<Tz>,
) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if chats.is_empty() {
        return vec!["No chats yet. Start one with /new <user id>.".to_owned()];
    }

    chats
        .iter()
        .map(|chat| chat_row(chat, active == Some(chat.chat_id), viewer_id, now))
        .collect()
}

pub fn chat_row<Tz>(chat: &Chat, is_active: bool, viewer_id: Option<i64>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let marker = if is_active { '>' } else { ' ' };
    let unread = if chat.unread_count > 0 {
        format!(" ({})", chat.unread_count)
    } else {
        String::new()
    };

    format!(
        "{marker} #{:<4} {}{unread}  {}  {}",
        chat.chat_id,
        chat.display_name(viewer_id),
        format_chat_timestamp(chat.recency_key(), now),
        chat_preview(chat, viewer_id),
    )
}

/// Last message text squeezed onto one line, prefixed with its author.
pub fn chat_preview(chat: &Chat, viewer_id: Option<i64>) -> String {
    let Some(last) = &chat.last_message else {
        return EMPTY_CHAT_PREVIEW.to_owned();
    };

    let text = truncate_text(&normalize_whitespace(&last.display_content()), PREVIEW_MAX_CHARS);
    if Some(last.author_id) == viewer_id {
        return format!("You: {text}");
    }

    match &last.author_name {
        Some(name) if chat.is_group => format!("{name}: {text}"),
        _ => text,
    }
}

fn render_thread<Tz>(title: &str, messages: &[Message], viewer_id: Option<i64>, tz: &Tz) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut lines = vec![format!("=== {title} ===")];
    if messages.is_empty() {
        lines.push("No messages yet. Say hello!".to_owned());
        return lines;
    }

    let mut prev_date: Option<NaiveDate> = None;
    let mut prev_author: Option<i64> = None;

    for (index, message) in messages.iter().enumerate() {
        let local = message.created_at.with_timezone(tz);
        let date = local.date_naive();

        if prev_date != Some(date) {
            lines.push(format!("--- {} ---", date.format("%-d %b %Y")));
            prev_author = None;
        }

        let sender = (prev_author != Some(message.author_id))
            .then(|| sender_name(message, viewer_id));
        lines.push(message_line(index + 1, message, sender.as_deref(), tz));

        prev_date = Some(date);
        prev_author = Some(message.author_id);
    }

    lines
}

fn message_line<Tz>(position: usize, message: &Message, sender: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = message.created_at.with_timezone(tz).format("%H:%M");
    let content = message.display_content();
    let content = if content.is_empty() {
        "[Empty message]".to_owned()
    } else {
        content
    };
    let status = match message.status {
        DeliveryStatus::Sent => String::new(),
        DeliveryStatus::Sending => " (sending)".to_owned(),
        DeliveryStatus::Failed => format!(" (failed, /retry {position})"),
    };

    match sender {
        Some(sender) => format!("{position:>3} {time} {sender}: {content}{status}"),
        None => format!("{position:>3} {time}   {content}{status}"),
    }
}

fn sender_name(message: &Message, viewer_id: Option<i64>) -> String {
    if Some(message.author_id) == viewer_id {
        return "You".to_owned();
    }

    message
        .author_name
        .clone()
        .unwrap_or_else(|| format!("User #{}", message.author_id))
}

fn render_users(users: &[User]) -> Vec<String> {
    if users.is_empty() {
        return vec!["No other users found.".to_owned()];
    }

    users
        .iter()
        .map(|user| {
            format!(
                "  #{:<4} [{}] {} <{}>",
                user.id,
                initials(&user.name),
                user.name,
                user.email
            )
        })
        .collect()
}

pub fn connectivity_line(status: ConnectivityStatus) -> String {
    format!("[realtime: {}]", status.as_label())
}

/// Up to two uppercase initials, one per word.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

/// `HH:MM` for today, `Yesterday`, otherwise the calendar date.
pub fn format_chat_timestamp<Tz>(timestamp: DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let local = timestamp.with_timezone(&now.timezone());
    let today = now.date_naive();
    let date = local.date_naive();

    if date == today {
        local.format("%H:%M").to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_owned()
    } else if date.year() == today.year() {
        local.format("%d/%m").to_string()
    } else {
        local.format("%d/%m/%Y").to_string()
    }
}

pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }

    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
