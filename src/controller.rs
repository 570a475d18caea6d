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
use std::{io, sync::Arc};

use tokio::{
    sync::mpsc::{self, Sender},
    task::{JoinError, JoinHandle},
};
use tracing::{error, info, span, Instrument, Level};

use crate::{engine::Engine, mapper::MapperError};

pub mod keyboard;

/// Controller events that change how the engine maps notes.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// Changes the root of the scale to the given pitch class. The value is
    /// passed through as typed so that the engine can reject it.
    Root(i64),

    /// Switches to the named scale.
    Scale(String),

    /// Changes the number of output channels.
    Voices(usize),

    /// Turns retuning off (true) or back on (false).
    Bypass(bool),

    /// Releases every sounding voice.
    Panic,

    /// Lists the available scales.
    Scales,

    /// Reports the current engine state.
    Status,

    /// Stops the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Controls an engine.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(engine: Arc<Engine>, driver: Arc<dyn Driver>) -> Controller {
        let span = span!(Level::INFO, "controller");
        Controller {
            handle: tokio::spawn(Controller::trigger_events(engine, driver).instrument(span)),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Applies events from the driver to the engine until the driver closes or asks to quit.
    async fn trigger_events(engine: Arc<Engine>, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!("Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = format!("{:?}", event), "Received event.");

            if let Err(e) = match event {
                Event::Root(root) => set_root(&engine, root),
                Event::Scale(name) => engine.set_scale(&name),
                Event::Voices(max_voices) => {
                    engine.set_max_voices(max_voices);
                    Ok(())
                }
                Event::Bypass(bypass) => {
                    engine.set_bypass(bypass);
                    Ok(())
                }
                Event::Panic => {
                    engine.clear_all();
                    Ok(())
                }
                Event::Scales => {
                    for (i, name) in engine.list_scale_names().iter().enumerate() {
                        info!("{}: {}", i, name);
                    }
                    Ok(())
                }
                Event::Status => {
                    info!("\n{}", engine.status());
                    Ok(())
                }
                Event::Quit => break,
            } {
                error!(err = e.to_string(), "Rejected change.");
            }
        }

        info!("Controller closing.");
        // Dropping the receiver lets a blocked driver notice that nobody is listening.
        drop(events_rx);
        match join_handle.await {
            Ok(Err(e)) => error!(err = e.to_string(), "Event monitor failed."),
            Err(e) => error!(err = e.to_string(), "Error waiting for event monitor to stop."),
            Ok(Ok(())) => {}
        }
    }
}

/// Sets the root, reporting values too large for a note number the same way
/// the mapper reports any other invalid root.
fn set_root(engine: &Engine, root: i64) -> Result<(), MapperError> {
    match u8::try_from(root) {
        Ok(root) => engine.set_root(root),
        Err(_) => Err(MapperError::InvalidArgument(format!(
            "invalid root: {} (0 <= root < 12)",
            root
        ))),
    }
}
