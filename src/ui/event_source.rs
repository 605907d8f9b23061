use std::{
    io::{self, BufRead},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};

use crate::{domain::events::AppEvent, usecases::contracts::AppEventSource};

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Reads stdin on a dedicated thread so the shell keeps ticking while the
/// user is typing. End of input counts as a quit request.
pub struct StdinEventSource {
    lines: Receiver<io::Result<String>>,
    tick: Duration,
}

impl StdinEventSource {
    pub fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("parley-stdin".to_owned())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .context("failed to start stdin reader")?;

        Ok(Self::from_receiver(rx, TICK_INTERVAL))
    }

    fn from_receiver(lines: Receiver<io::Result<String>>, tick: Duration) -> Self {
        Self { lines, tick }
    }
}

impl AppEventSource for StdinEventSource {
    fn next_event(&mut self) -> Result<Option<AppEvent>> {
        match self.lines.recv_timeout(self.tick) {
            Ok(Ok(line)) => Ok(Some(AppEvent::Input(line))),
            Ok(Err(error)) => Err(error).context("failed to read from stdin"),
            Err(RecvTimeoutError::Timeout) => Ok(Some(AppEvent::Tick)),
            Err(RecvTimeoutError::Disconnected) => Ok(Some(AppEvent::QuitRequested)),
        }
    }
}

#[cfg(test)]
pub struct MockEventSource {
    queue: std::collections::VecDeque<AppEvent>,
}

#[cfg(test)]
impl MockEventSource {
    pub fn from(events: Vec<AppEvent>) -> Self {
        Self {
            queue: events.into(),
        }
    }
}

#[cfg(test)]
impl AppEventSource for MockEventSource {
    fn next_event(&mut self) -> Result<Option<AppEvent>> {
        Ok(self.queue.pop_front())
    }
}
