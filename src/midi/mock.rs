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
use std::{error::Error, fmt, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::info;

use super::{OutputEvent, RawEvent};

/// A mock input device. Events are injected by tests instead of a port.
#[derive(Clone)]
pub struct Device {
    name: String,
    sender: Arc<Mutex<Option<Sender<RawEvent>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Sends the mock event through to the watcher, if there is one.
    #[cfg(test)]
    pub async fn mock_event(&self, timestamp: u64, event: &[u8]) -> Result<(), Box<dyn Error>> {
        let sender = self.sender.lock().clone();
        match sender {
            Some(sender) => Ok(sender
                .send(RawEvent {
                    timestamp,
                    data: event.to_vec(),
                })
                .await?),
            None => Err("not watching events".into()),
        }
    }

    /// Returns true if something is watching this device.
    #[cfg(test)]
    pub fn is_watched(&self) -> bool {
        self.sender.lock().is_some()
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn watch_events(&self, sender: Sender<RawEvent>) -> Result<(), Box<dyn Error>> {
        let mut watcher = self.sender.lock();
        if watcher.is_some() {
            return Err("Already watching events.".into());
        }

        info!(device = self.name, "Watching mock events.");
        *watcher = Some(sender);
        Ok(())
    }

    fn stop_watch_events(&self) {
        self.sender.lock().take();
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

/// A mock output that records everything sent to it.
#[derive(Clone)]
pub struct Output {
    name: String,
    events: Arc<Mutex<Vec<OutputEvent>>>,
}

impl Output {
    /// Gets the given mock output.
    pub fn get(name: &str) -> Output {
        Output {
            name: name.to_string(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the events sent so far.
    #[cfg(test)]
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().clone()
    }

    /// Returns the events sent so far and forgets them.
    #[cfg(test)]
    pub fn take_events(&self) -> Vec<OutputEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl super::Output for Output {
    fn send(&self, event: OutputEvent) {
        self.events.lock().push(event);
    }

    fn dropped(&self) -> u64 {
        0
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
