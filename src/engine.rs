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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use midly::live::LiveEvent;
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::{
    mapper::{Mapped, Mapper, MapperError, NoteEvent, Voice},
    midi::{Device, Output, OutputEvent, RawEvent},
};

/// The number of raw input events that can be waiting to be mapped.
const EVENT_BUFFER: usize = 64;

/// The engine connects inputs to the mapper and the mapper to the output.
pub struct Engine {
    /// The mapper. Event mapping and configuration changes share this lock.
    mapper: Mutex<Mapper>,
    /// Where retuned events are sent.
    output: Arc<dyn Output>,
    /// When set, notes are passed through without retuning.
    bypass: AtomicBool,
}

impl Engine {
    /// Creates a new engine.
    pub fn new(mapper: Mapper, output: Arc<dyn Output>, bypass: bool) -> Engine {
        Engine {
            mapper: Mutex::new(mapper),
            output,
            bypass: AtomicBool::new(bypass),
        }
    }

    /// Changes the root, releasing everything that is sounding.
    pub fn set_root(&self, root: u8) -> Result<(), MapperError> {
        let mut mapper = self.mapper.lock();
        let released = mapper.set_root(root)?;
        self.send_all(released);
        Ok(())
    }

    /// Changes the scale, releasing everything that is sounding.
    pub fn set_scale(&self, name: &str) -> Result<(), MapperError> {
        let mut mapper = self.mapper.lock();
        let released = mapper.set_scale(name)?;
        self.send_all(released);
        Ok(())
    }

    /// Changes the number of output channels, releasing everything that is sounding.
    pub fn set_max_voices(&self, max_voices: usize) {
        let mut mapper = self.mapper.lock();
        let released = mapper.set_max_voices(max_voices);
        self.send_all(released);
    }

    /// Releases everything that is sounding.
    pub fn clear_all(&self) {
        let mut mapper = self.mapper.lock();
        let released = mapper.clear_all();
        info!(released = released.len(), "Cleared all voices.");
        self.send_all(released);
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.bypass.store(bypass, Ordering::Relaxed);
        info!(bypass, "Bypass changed.");
    }

    pub fn bypass(&self) -> bool {
        self.bypass.load(Ordering::Relaxed)
    }

    /// Lists the names of the scales that can be selected.
    pub fn list_scale_names(&self) -> Vec<&'static str> {
        self.mapper.lock().list_scale_names()
    }

    /// Returns a snapshot of the engine state.
    pub fn status(&self) -> Status {
        let mapper = self.mapper.lock();
        Status {
            root: mapper.root(),
            scale: mapper.scale().name(),
            max_voices: mapper.max_voices(),
            bypass: self.bypass(),
            active_voices: mapper.active_voices(),
            dropped_output: self.output.dropped(),
        }
    }

    /// Maps a single note event and sends the result to the output.
    pub fn handle(&self, event: &NoteEvent) -> Result<Mapped, MapperError> {
        let mut mapper = self.mapper.lock();
        let mapped = mapper.map_event(event, self.bypass())?;
        self.send_all(mapped.output_events());

        if let Mapped::Event { event, stolen } = &mapped {
            if let Some(stolen) = stolen {
                debug!(
                    note = stolen.note_in(),
                    channel = stolen.channel(),
                    "Stole voice."
                );
            }
            info!("{}", event);
        }

        Ok(mapped)
    }

    /// Parses raw MIDI from an input and handles it if it's a note.
    fn handle_raw(&self, raw: &RawEvent) {
        let message = match LiveEvent::parse(&raw.data) {
            Ok(LiveEvent::Midi { message, .. }) => message,
            Ok(other) => {
                debug!(event = format!("{:?}", other), "Ignoring non-channel event.");
                return;
            }
            Err(e) => {
                error!(err = format!("{:?}", e), "Error parsing event.");
                return;
            }
        };

        let event = match NoteEvent::from_midi(&message, raw.timestamp) {
            Ok(event) => event,
            Err(e) => {
                debug!(err = e.to_string(), "Ignoring event.");
                return;
            }
        };

        if let Err(e) = self.handle(&event) {
            warn!(
                err = e.to_string(),
                note = event.note(),
                "Unable to map event."
            );
        }
    }

    fn send_all(&self, events: Vec<OutputEvent>) {
        for event in events {
            self.output.send(event);
        }
    }

    /// Starts watching the given devices. All devices feed the same queue, which is
    /// drained by a single task, so events are mapped one at a time in arrival order.
    pub fn listen(
        self: &Arc<Self>,
        devices: Vec<Arc<dyn Device>>,
    ) -> Result<Listener, Box<dyn Error>> {
        let (events_tx, mut events_rx) = mpsc::channel::<RawEvent>(EVENT_BUFFER);
        for (i, device) in devices.iter().enumerate() {
            if let Err(e) = device.watch_events(events_tx.clone()) {
                devices[..i].iter().for_each(|d| d.stop_watch_events());
                return Err(e);
            }
            info!(device = device.name(), "Listening for notes.");
        }
        // Only the devices hold senders now, so the queue closes when they stop.
        drop(events_tx);

        let engine = self.clone();
        let handle = tokio::spawn(
            async move {
                info!(output = engine.output.to_string(), "Engine started.");
                while let Some(raw) = events_rx.recv().await {
                    engine.handle_raw(&raw);
                }
                info!("Inputs closed.");
            }
            .instrument(span!(Level::INFO, "engine")),
        );

        Ok(Listener { devices, handle })
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("mapper", &*self.mapper.lock())
            .field("output", &self.output.to_string())
            .field("bypass", &self.bypass())
            .finish()
    }
}

/// A running engine task and the devices feeding it.
pub struct Listener {
    devices: Vec<Arc<dyn Device>>,
    handle: JoinHandle<()>,
}

impl Listener {
    /// Stops watching every device. The engine task finishes once queued events are handled.
    pub fn stop(&self) {
        for device in self.devices.iter() {
            device.stop_watch_events();
        }
    }

    /// Join will block until the engine task finishes.
    pub async fn join(&mut self) -> Result<(), tokio::task::JoinError> {
        (&mut self.handle).await
    }
}

/// A snapshot of the engine state.
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    pub root: u8,
    pub scale: &'static str,
    pub max_voices: u8,
    pub bypass: bool,
    pub active_voices: Vec<Voice>,
    pub dropped_output: u64,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scale: {}", self.scale)?;
        writeln!(f, "Root: {}", self.root)?;
        writeln!(f, "Voices: {}", self.max_voices)?;
        writeln!(f, "Bypass: {}", if self.bypass { "on" } else { "off" })?;
        writeln!(f, "Dropped output events: {}", self.dropped_output)?;
        write!(f, "Active:")?;
        for voice in self.active_voices.iter() {
            write!(
                f,
                "\n  in {:>3} out {:>3} bend {:>5} ch {:>2}",
                voice.note_in(),
                voice.note_out(),
                voice.bend(),
                voice.channel() + 1
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc};

    use crate::{
        mapper::{MapperError, NoteEvent, NoteKind, Voice},
        midi::{self, OutputEvent},
        scales::{ScaleCatalog, DEFAULT_SCALE},
        testutil::eventually_async,
    };

    use super::{Engine, Mapper};

    fn engine(max_voices: usize) -> Result<(Arc<Engine>, midi::test::Output), Box<dyn Error>> {
        let output = midi::test::Output::get("mock-output");
        let mapper = Mapper::new(ScaleCatalog::builtin(), DEFAULT_SCALE, 0, max_voices)?;
        Ok((
            Arc::new(Engine::new(mapper, Arc::new(output.clone()), false)),
            output,
        ))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn maps_device_events() -> Result<(), Box<dyn Error>> {
        let (engine, output) = engine(2)?;
        let first = midi::test::Device::get("mock-first");
        let second = midi::test::Device::get("mock-second");
        let mut listener = engine.listen(vec![Arc::new(first.clone()), Arc::new(second.clone())])?;
        assert!(first.is_watched());
        assert!(second.is_watched());

        first.mock_event(1, &[0x90, 64, 100]).await?;
        eventually_async(|| output.events().len() == 2, "Note on never sent").await;
        assert_eq!(
            vec![
                OutputEvent::PitchBend {
                    bend: 3535,
                    channel: 0
                },
                OutputEvent::NoteOn {
                    note: 63,
                    velocity: 100,
                    channel: 0
                },
            ],
            output.take_events()
        );

        // Non-note and malformed messages are skipped.
        second.mock_event(2, &[0xB0, 1, 64]).await?;
        second.mock_event(3, &[0x01, 0x02]).await?;
        second.mock_event(4, &[0x80, 64, 0]).await?;
        eventually_async(|| output.events().len() == 1, "Note off never sent").await;
        assert_eq!(
            vec![OutputEvent::NoteOff {
                note: 63,
                channel: 0
            }],
            output.take_events()
        );

        listener.stop();
        assert!(!first.is_watched());
        assert!(listener.join().await.is_ok());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn voice_stealing_through_device() -> Result<(), Box<dyn Error>> {
        let (engine, output) = engine(2)?;
        let device = midi::test::Device::get("mock-device");
        let mut listener = engine.listen(vec![Arc::new(device.clone())])?;

        device.mock_event(1, &[0x90, 60, 90]).await?;
        device.mock_event(2, &[0x90, 62, 90]).await?;
        device.mock_event(3, &[0x90, 67, 90]).await?;
        // Release of the stolen note is suppressed.
        device.mock_event(4, &[0x80, 60, 0]).await?;
        device.mock_event(5, &[0x90, 62, 0]).await?;
        eventually_async(|| output.events().len() == 8, "Events never sent").await;

        let events = output.take_events();
        assert_eq!(
            &[
                OutputEvent::NoteOff {
                    note: 60,
                    channel: 0
                },
                OutputEvent::PitchBend {
                    bend: 80,
                    channel: 0
                },
                OutputEvent::NoteOn {
                    note: 67,
                    velocity: 90,
                    channel: 0
                },
                OutputEvent::NoteOff {
                    note: 62,
                    channel: 1
                },
            ],
            &events[4..]
        );

        listener.stop();
        assert!(listener.join().await.is_ok());
        Ok(())
    }

    #[test]
    fn configuration_releases_voices() -> Result<(), Box<dyn Error>> {
        let (engine, output) = engine(16)?;
        engine.handle(&NoteEvent::new(NoteKind::NoteOn, 60, 100, 0)?)?;
        output.take_events();

        assert!(matches!(
            engine.set_root(12),
            Err(MapperError::InvalidArgument(_))
        ));
        assert!(output.events().is_empty());
        assert_eq!(1, engine.status().active_voices.len());

        engine.set_root(2)?;
        assert_eq!(
            vec![OutputEvent::NoteOff {
                note: 60,
                channel: 0
            }],
            output.take_events()
        );

        assert!(engine.set_scale("missing").is_err());
        engine.set_max_voices(0);
        engine.clear_all();
        assert!(output.events().is_empty());

        let status = engine.status();
        assert_eq!(2, status.root);
        assert_eq!(1, status.max_voices);
        assert_eq!(Vec::<Voice>::new(), status.active_voices);
        Ok(())
    }

    #[test]
    fn bypass() -> Result<(), Box<dyn Error>> {
        let (engine, output) = engine(16)?;
        engine.set_bypass(true);
        assert!(engine.status().bypass);

        engine.handle(&NoteEvent::new(NoteKind::NoteOn, 64, 100, 0)?)?;
        assert_eq!(
            vec![
                OutputEvent::PitchBend {
                    bend: 0,
                    channel: 0
                },
                OutputEvent::NoteOn {
                    note: 64,
                    velocity: 100,
                    channel: 0
                },
            ],
            output.take_events()
        );
        Ok(())
    }

    #[test]
    fn status_display() -> Result<(), Box<dyn Error>> {
        let (engine, _) = engine(4)?;
        engine.handle(&NoteEvent::new(NoteKind::NoteOn, 67, 100, 0)?)?;
        assert_eq!(
            "Scale: Harmonic Duodene of C (12 tone)\n\
             Root: 0\n\
             Voices: 4\n\
             Bypass: off\n\
             Dropped output events: 0\n\
             Active:\n  in  67 out  67 bend    80 ch  1",
            engine.status().to_string()
        );
        Ok(())
    }
}
