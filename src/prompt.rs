//! Interactive operator confirmation.
//!
//! Each question is asked at most [`MAX_ATTEMPTS`] times. Running out of
//! attempts, or reaching end of input, counts as "no".

use crate::harness::{SuiteGate, SuiteSpec};
use std::io::{BufRead, Write};
use tracing::warn;

pub const MAX_ATTEMPTS: usize = 3;

pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Ask `question` until the reply is one of `answers`.
    ///
    /// Returns the value paired with the accepted answer, or `None` when the
    /// attempts run out or input ends.
    pub fn ask(&mut self, question: &str, answers: &[(&str, bool)]) -> Option<bool> {
        for _ in 0..MAX_ATTEMPTS {
            if let Err(e) = write!(self.output, "{question} ").and_then(|()| self.output.flush()) {
                warn!("Cannot write prompt: {}", e);
                return None;
            }

            let mut reply = String::new();
            match self.input.read_line(&mut reply) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!("Cannot read reply: {}", e);
                    return None;
                }
            }

            let reply = reply.trim();
            if let Some((_, value)) = answers.iter().find(|(answer, _)| *answer == reply) {
                return Some(*value);
            }
        }
        warn!("No valid answer to {:?} after {} attempts", question, MAX_ATTEMPTS);
        None
    }

    fn note(&mut self, text: &str) {
        if let Err(e) = writeln!(self.output, "{text}") {
            warn!("Cannot write prompt: {}", e);
        }
    }
}

impl<R: BufRead, W: Write> SuiteGate for ConsolePrompt<R, W> {
    fn admit(&mut self, suite: &SuiteSpec) -> bool {
        self.note("WARNING: Disconnect the UART TX pin on each board before flashing.");
        let question = format!("Run test suite '{}'? (y/n)", suite.name);
        self.ask(&question, &[("y", true), ("n", false)])
            .unwrap_or(false)
    }

    fn ready(&mut self, _suite: &SuiteSpec) -> bool {
        self.ask("Reconnect the UART TX pin(s). (ok)", &[("ok", true)])
            .unwrap_or(false)
    }
}
