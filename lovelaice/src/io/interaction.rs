//! User-interaction surface used by the confirmation gate.

use std::io::{BufRead, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::confirm::Answer;

/// Asks the human operator to confirm tool invocations.
pub trait UserInteraction {
    /// Present `title` and `detail` and block until the user picks one of
    /// yes, no or explain.
    fn ask(&self, title: &str, detail: &str) -> Result<Answer>;

    /// Display informational text (explanations of pending actions).
    fn show(&self, text: &str);
}

/// Terminal prompt reading answers line by line.
///
/// Prompts go to stderr so the streamed reply on stdout stays clean.
/// Unrecognized answers re-prompt; end of input counts as `no`.
pub struct TerminalInteraction {
    /// `None` reads the process stdin, sharing its buffer with other readers.
    reader: Option<Mutex<Box<dyn BufRead + Send>>>,
}

impl TerminalInteraction {
    pub fn stdin() -> Self {
        Self { reader: None }
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Some(Mutex::new(Box::new(reader))),
        }
    }

    fn read_line(&self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = match &self.reader {
            None => std::io::stdin().read_line(&mut line),
            Some(reader) => reader
                .lock()
                .map_err(|_| anyhow::anyhow!("interaction input lock poisoned"))?
                .read_line(&mut line),
        }
        .context("read confirmation")?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl UserInteraction for TerminalInteraction {
    fn ask(&self, title: &str, detail: &str) -> Result<Answer> {
        let mut stderr = std::io::stderr();
        writeln!(stderr, "\n:: {title}").ok();
        for line in detail.lines() {
            writeln!(stderr, "   {line}").ok();
        }
        loop {
            write!(stderr, "Confirm? (y)es / (n)o / (e)xplain: ").ok();
            stderr.flush().ok();
            let Some(line) = self.read_line()? else {
                debug!("confirmation input closed, treating as no");
                writeln!(stderr).ok();
                return Ok(Answer::No);
            };
            if let Some(answer) = Answer::parse(&line) {
                return Ok(answer);
            }
            writeln!(stderr, "Please answer y, n or e.").ok();
        }
    }

    fn show(&self, text: &str) {
        eprintln!("\n{}\n", text.trim());
    }
}
