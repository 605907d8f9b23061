use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "parley", about = "Terminal client for a REST + WebSocket chat service")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the interactive shell
    Run,
    /// Sign in and store the session
    Login {
        email: String,
        /// Read from the terminal when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account, then sign in
    Register {
        name: String,
        email: String,
        /// Read from the terminal when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List chats, most recent first
    Chats,
    /// List people you can start a chat with
    Users {
        /// Filter by name or email
        search: Option<String>,
    },
    /// Start a direct chat, or a group when several users are given
    NewChat {
        #[arg(required = true, num_args = 1..)]
        participants: Vec<i64>,
        /// Group title; ignored for direct chats
        #[arg(long)]
        title: Option<String>,
    },
    /// Print a chat's message history
    History { chat_id: i64 },
    /// Send one message without opening the shell
    Send {
        chat_id: i64,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn defaults_to_run_when_command_is_missing() {
        let cli = Cli::parse_from(["parley"]);

        assert!(matches!(cli.command_or_default(), Command::Run));
    }

    #[test]
    fn parses_explicit_run_command() {
        let cli = Cli::parse_from(["parley", "run", "--config", "custom.toml"]);

        assert!(matches!(cli.command_or_default(), Command::Run));
        assert_eq!(
            cli.config
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("custom.toml".to_owned())
        );
    }

    #[test]
    fn parses_new_chat_with_several_participants() {
        let cli = Cli::parse_from(["parley", "new-chat", "2", "3", "--title", "Team"]);

        match cli.command_or_default() {
            Command::NewChat {
                participants,
                title,
            } => {
                assert_eq!(participants, vec![2, 3]);
                assert_eq!(title.as_deref(), Some("Team"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_joins_words_into_text() {
        let cli = Cli::parse_from(["parley", "send", "4", "see", "you", "soon"]);

        assert!(matches!(
            cli.command_or_default(),
            Command::Send { chat_id: 4, text } if text.join(" ") == "see you soon"
        ));
    }

    #[test]
    fn send_requires_text() {
        assert!(Cli::try_parse_from(["parley", "send", "4"]).is_err());
    }
}
