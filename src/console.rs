// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Terminal control: reading commands from stdin and pacing the display
//! tick.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{info, span, warn, Level};

use crate::command::{parse_command, HELP};
use crate::session::UiEvent;

const STATUS: &str = "status";
const HELP_COMMAND: &str = "help";
const QUIT: &str = "quit";
const EXIT: &str = "exit";

/// One line of console input.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Events(Vec<UiEvent>),
    /// Print the current state.
    Status,
    Help,
    Quit,
}

/// Reads one line. Returns Ok(None) at end of input, and Some(None) for
/// blank or unparseable lines.
pub fn read_input<R>(mut reader: R) -> Result<Option<Option<ConsoleInput>>, io::Error>
where
    R: io::BufRead,
{
    let mut input = String::default();
    if reader.read_line(&mut input)? == 0 {
        return Ok(None);
    }

    let input = input.trim();
    let parsed = match input.to_lowercase().as_str() {
        "" => None,
        STATUS => Some(ConsoleInput::Status),
        HELP_COMMAND => Some(ConsoleInput::Help),
        QUIT | EXIT => Some(ConsoleInput::Quit),
        _ => match parse_command(input) {
            Ok(events) => Some(ConsoleInput::Events(events)),
            Err(e) => {
                warn!(input, err = %e, "Unrecognized input");
                None
            }
        },
    };
    Ok(Some(parsed))
}

/// Forwards stdin lines to `tx` from a background thread until stdin closes
/// or the receiver goes away.
pub fn spawn_reader(tx: Sender<ConsoleInput>) -> thread::JoinHandle<Result<(), io::Error>> {
    thread::spawn(move || {
        let span = span!(Level::INFO, "console");
        let _enter = span.enter();

        info!("Console reader started.");
        loop {
            match read_input(io::stdin().lock())? {
                Some(Some(input)) => {
                    if tx.send(input).is_err() {
                        return Ok(());
                    }
                }
                Some(None) => {}
                None => return Ok(()),
            }
        }
    })
}

/// The usage text shown by `help`.
pub fn help() -> String {
    format!(
        "{}\n{:<27}print the current state\n{:<27}leave",
        HELP, STATUS, QUIT
    )
}

/// Paces a loop to a fixed interval without drifting.
pub struct DisplayTicker {
    interval: Duration,
    next: Instant,
}

impl DisplayTicker {
    pub fn new(interval: Duration) -> DisplayTicker {
        DisplayTicker {
            interval,
            next: Instant::now() + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleeps until the next tick. A loop that fell behind skips ahead
    /// instead of bursting.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            spin_sleep::sleep(self.next - now);
            self.next += self.interval;
        } else {
            self.next = now + self.interval;
        }
    }
}
