//! Interactive sign-in used when no stored session is available.

use std::io;

use crate::{
    infra::contracts::KeyValueStore,
    usecases::{
        contracts::RealtimeChannel,
        session::{is_valid_email, AuthSource, SessionError, SessionStore},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub email_attempts: usize,
    pub password_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            email_attempts: 3,
            password_attempts: 3,
        }
    }
}

pub trait AuthTerminal {
    fn print_line(&mut self, line: &str) -> io::Result<()>;
    fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

pub struct StdTerminal;

impl AuthTerminal for StdTerminal {
    fn print_line(&mut self, line: &str) -> io::Result<()> {
        println!("{line}");
        Ok(())
    }

    fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        use std::io::Write;

        print!("{prompt}");
        io::stdout().flush()?;

        let mut line = String::new();
        let bytes = io::stdin().read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }

        Ok(Some(line.trim().to_owned()))
    }

    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match rpassword::prompt_password(prompt) {
            Ok(password) => Ok(Some(password)),
            Err(source) if source.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(source) => Err(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuidedAuthOutcome {
    Authenticated,
    ExitWithGuidance,
}

pub fn run_guided_sign_in<S: KeyValueStore>(
    terminal: &mut dyn AuthTerminal,
    store: &mut SessionStore<S>,
    auth: &dyn AuthSource,
    channel: &dyn RealtimeChannel,
    retry_policy: &RetryPolicy,
) -> io::Result<GuidedAuthOutcome> {
    terminal.print_line("Not signed in. Enter your account credentials.")?;

    let Some(email) = collect_email(terminal, retry_policy.email_attempts)? else {
        return Ok(GuidedAuthOutcome::ExitWithGuidance);
    };

    for attempt in 1..=retry_policy.password_attempts {
        let Some(password) = terminal.prompt_secret("Password: ")? else {
            terminal.print_line("Input cancelled (EOF). Run parley again to retry.")?;
            return Ok(GuidedAuthOutcome::ExitWithGuidance);
        };

        match store.login(auth, channel, &email, &password) {
            Ok(session) => {
                let line = format!("Signed in as {}.", session.user.name);
                terminal.print_line(&line)?;
                return Ok(GuidedAuthOutcome::Authenticated);
            }
            Err(error) => {
                let attempts_left = retry_policy.password_attempts - attempt;
                if !report_sign_in_error(terminal, &error, attempts_left)? {
                    break;
                }
            }
        }
    }

    terminal.print_line("Sign-in aborted. Run `parley login <email>` to try again.")?;
    Ok(GuidedAuthOutcome::ExitWithGuidance)
}

fn collect_email(terminal: &mut dyn AuthTerminal, attempts: usize) -> io::Result<Option<String>> {
    for attempt in 1..=attempts {
        let Some(email) = terminal.prompt_line("Email: ")? else {
            terminal.print_line("Input cancelled (EOF). Run parley again to retry.")?;
            return Ok(None);
        };

        if is_valid_email(&email) {
            return Ok(Some(email));
        }

        terminal.print_line(&format!(
            "That does not look like an email address. Attempts left: {}",
            attempts - attempt
        ))?;
    }

    Ok(None)
}

/// Prints the failure; returns whether another attempt makes sense.
fn report_sign_in_error(
    terminal: &mut dyn AuthTerminal,
    error: &SessionError,
    attempts_left: usize,
) -> io::Result<bool> {
    match error {
        SessionError::Rejected(message) => {
            terminal.print_line(&format!("{message}. Attempts left: {attempts_left}"))?;
            Ok(attempts_left > 0)
        }
        SessionError::MissingCredentials => {
            terminal.print_line(&format!(
                "Password must not be empty. Attempts left: {attempts_left}"
            ))?;
            Ok(attempts_left > 0)
        }
        SessionError::TemporarilyUnavailable => {
            terminal.print_line(&format!(
                "Server unreachable. Check the connection and retry. Attempts left: {attempts_left}"
            ))?;
            Ok(attempts_left > 0)
        }
        SessionError::InvalidEmail | SessionError::InvalidToken => {
            terminal.print_line("The server returned an unusable session token.")?;
            Ok(false)
        }
        SessionError::StorageUnavailable => {
            terminal.print_line("Signed in, but the session could not be saved locally.")?;
            Ok(false)
        }
    }
}
