use anyhow::Result;
use chrono::Local;

use crate::usecases::contracts::{AppEventSource, Screen, ShellOrchestrator};

use super::render;

const WELCOME_LINE: &str = "Type /help for commands, /quit to leave.";

pub fn start(
    event_source: &mut dyn AppEventSource,
    orchestrator: &mut dyn ShellOrchestrator,
    screen: &mut dyn Screen,
) -> Result<()> {
    tracing::info!("starting interactive shell");
    screen.print_line(WELCOME_LINE)?;

    loop {
        flush_notices(orchestrator, screen)?;

        if !orchestrator.state().is_running() {
            break;
        }

        match event_source.next_event()? {
            Some(event) => orchestrator.handle_event(event)?,
            None => break,
        }
    }

    tracing::info!("interactive shell stopped");
    Ok(())
}

fn flush_notices(orchestrator: &mut dyn ShellOrchestrator, screen: &mut dyn Screen) -> Result<()> {
    let now = Local::now();
    for notice in orchestrator.take_notices() {
        for line in render::render_notice(&notice, &now) {
            screen.print_line(&line)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{events::AppEvent, shell_state::ShellState},
        ui::{event_source::MockEventSource, screen::RecordingScreen},
        usecases::shell::ShellNotice,
    };

    #[derive(Default)]
    struct EchoOrchestrator {
        state: ShellState,
        notices: Vec<ShellNotice>,
        handled: Vec<AppEvent>,
    }

    impl ShellOrchestrator for EchoOrchestrator {
        fn state(&self) -> &ShellState {
            &self.state
        }

        fn handle_event(&mut self, event: AppEvent) -> Result<()> {
            match &event {
                AppEvent::QuitRequested => self.state.stop(),
                AppEvent::Input(line) => self.notices.push(ShellNotice::Info(line.clone())),
                AppEvent::Tick => {}
            }
            self.handled.push(event);
            Ok(())
        }

        fn take_notices(&mut self) -> Vec<ShellNotice> {
            std::mem::take(&mut self.notices)
        }
    }

    #[test]
    fn mock_source_produces_quit_event() {
        let mut source = MockEventSource::from(vec![AppEvent::QuitRequested]);
        let event = source.next_event().expect("must read mock event");

        assert_eq!(event, Some(AppEvent::QuitRequested));
    }

    #[test]
    fn prints_notices_until_quit() {
        let mut source = MockEventSource::from(vec![
            AppEvent::Input("hello".to_owned()),
            AppEvent::Tick,
            AppEvent::QuitRequested,
            AppEvent::Input("never handled".to_owned()),
        ]);
        let mut orchestrator = EchoOrchestrator::default();
        let mut screen = RecordingScreen::default();

        start(&mut source, &mut orchestrator, &mut screen).expect("shell should run");

        assert_eq!(screen.lines, vec![WELCOME_LINE.to_owned(), "hello".to_owned()]);
        assert_eq!(orchestrator.handled.len(), 3);
    }

    #[test]
    fn exhausted_source_ends_the_loop() {
        let mut source = MockEventSource::from(Vec::new());
        let mut orchestrator = EchoOrchestrator::default();
        let mut screen = RecordingScreen::default();

        start(&mut source, &mut orchestrator, &mut screen).expect("shell should run");

        assert!(orchestrator.state().is_running());
    }
}
