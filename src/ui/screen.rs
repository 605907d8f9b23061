use std::io::{self, Write};

use anyhow::Result;

use crate::usecases::contracts::Screen;

/// Writes shell output to stdout, flushing after every line.
#[derive(Debug, Default)]
pub struct StdoutScreen;

impl Screen for StdoutScreen {
    fn print_line(&mut self, line: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        Ok(())
    }
}

/// Collects lines in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingScreen {
    pub lines: Vec<String>,
}

#[cfg(test)]
impl Screen for RecordingScreen {
    fn print_line(&mut self, line: &str) -> Result<()> {
        self.lines.push(line.to_owned());
        Ok(())
    }
}
