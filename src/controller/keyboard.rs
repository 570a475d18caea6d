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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const ROOT: &str = "root";
const SCALE: &str = "scale";
const VOICES: &str = "voices";
const BYPASS: &str = "bypass";
const PANIC: &str = "panic";
const SCALES: &str = "scales";
const STATUS: &str = "status";
const QUIT: &str = "quit";

/// A controller that controls the engine using typed commands.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and handles one command. Returns false once the reader is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <0-11>, {} <name>, {} <1-16>, {} on|off, {}, {}, {}, {}): ",
            ROOT, SCALE, VOICES, BYPASS, PANIC, SCALES, STATUS, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let event = match parse_command(&input) {
            Some(event) => event,
            None => {
                warn!(input = input.trim(), "Unrecognized input");
                return Ok(true);
            }
        };

        let quit = event == Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        Ok(!quit)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a command line into an event. The command word is case insensitive;
/// scale names are passed through as typed.
fn parse_command(input: &str) -> Option<Event> {
    let input = input.trim();
    let (command, argument) = match input.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (input, ""),
    };

    match (command.to_lowercase().as_str(), argument) {
        (ROOT, argument) => argument.parse().ok().map(Event::Root),
        (SCALE, argument) if !argument.is_empty() => Some(Event::Scale(argument.to_string())),
        (VOICES, argument) => argument.parse().ok().map(Event::Voices),
        (BYPASS, argument) => match argument.to_lowercase().as_str() {
            "on" => Some(Event::Bypass(true)),
            "off" => Some(Event::Bypass(false)),
            _ => None,
        },
        (PANIC, "") => Some(Event::Panic),
        (SCALES, "") => Some(Event::Scales),
        (STATUS, "") => Some(Event::Status),
        (QUIT, "") => Some(Event::Quit),
        _ => None,
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}
