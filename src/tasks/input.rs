//! Input side: turns raw commands into debounced navigation intents.

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::Intent;

/// Collapses repeated intents that arrive within `window` of the last one let through.
///
/// `CancelReturn` is never collapsed; it only snaps the display back.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn admit(&mut self, intent: Intent, now: Instant) -> bool {
        if intent == Intent::CancelReturn {
            return true;
        }
        match self.last {
            Some(prev) if now.saturating_duration_since(prev) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Forwards raw intents to the navigation task, dropping bursts.
pub async fn run(
    mut raw_rx: Receiver<Intent>,
    to_navigation: Sender<Intent>,
    window: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut debouncer = Debouncer::new(window);
    loop {
        select! {
            _ = cancel.cancelled() => break,
            maybe = raw_rx.recv() => {
                let Some(intent) = maybe else { break };
                if !debouncer.admit(intent, Instant::now()) {
                    debug!(?intent, "debounced");
                    continue;
                }
                if to_navigation.send(intent).await.is_err() {
                    warn!("navigation channel closed");
                    break;
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Navigate(Intent),
    Quit,
}

/// Parses one line of the terminal driver's command language.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let head = words.next()?.to_ascii_lowercase();
    let command = match head.as_str() {
        "n" | "next" | "j" | "down" => Command::Navigate(Intent::Advance),
        "p" | "prev" | "k" | "up" => Command::Navigate(Intent::Retreat),
        "r" | "random" => Command::Navigate(Intent::Shuffle),
        "c" | "cancel" => Command::Navigate(Intent::CancelReturn),
        "g" | "goto" => {
            let index = words.next()?.parse().ok()?;
            Command::Navigate(Intent::JumpTo(index))
        }
        "q" | "quit" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

/// Reads commands line by line and feeds intents into `to_input`.
/// `quit` or end of input cancels the whole pipeline.
pub async fn read_commands<R>(
    reader: R,
    to_input: Sender<Intent>,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            info!("input closed; initiating shutdown");
            cancel.cancel();
            break;
        };
        match parse_command(&line) {
            Some(Command::Navigate(intent)) => {
                if to_input.send(intent).await.is_err() {
                    break;
                }
            }
            Some(Command::Quit) => {
                info!("quit requested");
                cancel.cancel();
                break;
            }
            None if line.trim().is_empty() => {}
            None => warn!(line = %line.trim(), "unrecognised command"),
        }
    }
    Ok(())
}
