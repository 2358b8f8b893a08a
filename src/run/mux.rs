//! Line multiplexer across the boards of one suite.
//!
//! In [`MuxMode::AllBoards`] every channel is polled for readiness and lines
//! are taken round-robin, one per ready board, so a chatty board cannot starve
//! the others. Lines from one board keep their order; lines from different
//! boards are interleaved in whatever order they become ready.
//!
//! If any channel cannot report readiness, or the operator asked for it, the
//! multiplexer runs in [`MuxMode::PrimaryOnly`]: it blocks on board 0 and never
//! looks at the other boards. Secondary boards' output is then invisible,
//! which makes multi-board suites unreliable in that mode.

use crate::channel::BoardChannel;
use crate::port::PortError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Operator preference for multiplexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MultiplexPolicy {
    /// Watch every board when the backends allow it.
    #[default]
    Auto,
    /// Only ever read the primary board.
    PrimaryOnly,
}

impl std::str::FromStr for MultiplexPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "primary-only" => Ok(Self::PrimaryOnly),
            other => Err(format!("unknown multiplex mode '{other}'")),
        }
    }
}

/// How lines are actually being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxMode {
    AllBoards,
    PrimaryOnly,
}

/// A line together with the index of the board that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLine {
    pub board: usize,
    pub text: String,
}

/// A board link failed while the suite was running.
#[derive(Debug, Error)]
#[error("board {board} ({port}): {source}")]
pub struct ChannelFault {
    pub board: usize,
    pub port: String,
    #[source]
    pub source: PortError,
}

impl ChannelFault {
    pub fn new(board: usize, channel: &BoardChannel, source: PortError) -> Self {
        Self {
            board,
            port: channel.name().to_string(),
            source,
        }
    }
}

#[derive(Debug)]
pub struct Multiplexer {
    mode: MuxMode,
    cursor: usize,
    poll_interval: Duration,
}

impl Multiplexer {
    /// Pick a mode for `channels` given the operator's policy.
    pub fn select(
        channels: &[BoardChannel],
        policy: MultiplexPolicy,
        poll_interval: Duration,
    ) -> Self {
        let blind: Vec<&str> = channels
            .iter()
            .filter(|c| c.readiness().is_none())
            .map(|c| c.name())
            .collect();

        let mode = match policy {
            MultiplexPolicy::PrimaryOnly => MuxMode::PrimaryOnly,
            MultiplexPolicy::Auto if blind.is_empty() => MuxMode::AllBoards,
            MultiplexPolicy::Auto => MuxMode::PrimaryOnly,
        };

        if mode == MuxMode::PrimaryOnly && channels.len() > 1 {
            if blind.is_empty() {
                warn!(
                    "Primary-only multiplexing requested; output from the other {} board(s) is ignored",
                    channels.len() - 1
                );
            } else {
                warn!(
                    "Cannot poll readiness on {:?}; only the primary board will be read and output from the other {} board(s) is ignored",
                    blind,
                    channels.len() - 1
                );
            }
        }
        debug!("Multiplexer mode {:?} over {} board(s)", mode, channels.len());

        Self {
            mode,
            cursor: 0,
            poll_interval,
        }
    }

    pub fn mode(&self) -> MuxMode {
        self.mode
    }

    /// Wait for the next line from any watched board.
    ///
    /// With no `deadline` this waits for as long as it takes. `Ok(None)` is
    /// only returned once `deadline` has passed.
    pub fn next_line(
        &mut self,
        channels: &mut [BoardChannel],
        deadline: Option<Instant>,
    ) -> Result<Option<BoardLine>, ChannelFault> {
        if channels.is_empty() {
            return Ok(None);
        }
        match self.mode {
            MuxMode::AllBoards => self.next_ready(channels, deadline),
            MuxMode::PrimaryOnly => Self::next_primary(channels, deadline),
        }
    }

    fn next_ready(
        &mut self,
        channels: &mut [BoardChannel],
        deadline: Option<Instant>,
    ) -> Result<Option<BoardLine>, ChannelFault> {
        let count = channels.len();
        loop {
            for offset in 0..count {
                let board = (self.cursor + offset) % count;
                if channels[board].readiness() != Some(true) {
                    continue;
                }
                self.cursor = (board + 1) % count;
                match channels[board].read_line() {
                    Ok(Some(text)) => return Ok(Some(BoardLine { board, text })),
                    // Bytes were pending but the line never completed.
                    Ok(None) => continue,
                    Err(e) => return Err(ChannelFault::new(board, &channels[board], e)),
                }
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(None);
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    fn next_primary(
        channels: &mut [BoardChannel],
        deadline: Option<Instant>,
    ) -> Result<Option<BoardLine>, ChannelFault> {
        let primary = &mut channels[0];
        loop {
            match primary.read_line() {
                Ok(Some(text)) => return Ok(Some(BoardLine { board: 0, text })),
                Ok(None) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(ChannelFault::new(0, primary, e)),
            }
        }
    }
}
