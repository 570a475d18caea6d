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
use std::{error::Error, fmt, sync::Arc, time::Duration};

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage, PitchBend,
};
use tokio::sync::mpsc::Sender;

mod midir;
mod mock;
mod queue;

pub use queue::QueuedOutput;

/// Prefix for the virtual ports this program opens, and for hiding them from listings.
pub const VIRTUAL_PORT_PREFIX: &str = "JI Mapper ";

/// A raw MIDI message as received from an input, with the port's timestamp in microseconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub timestamp: u64,
    pub data: Vec<u8>,
}

/// A MIDI device that can be listened to for inputs.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Watches MIDI input for events and sends them to the given sender.
    fn watch_events(&self, sender: Sender<RawEvent>) -> Result<(), Box<dyn Error>>;

    /// Stops watching events.
    fn stop_watch_events(&self);
}

/// A best effort destination for retuned events. Sending never blocks indefinitely;
/// events that can't be delivered in time are dropped and counted.
pub trait Output: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Sends the event to the output.
    fn send(&self, event: OutputEvent);

    /// Returns the number of events that have been dropped.
    fn dropped(&self) -> u64;
}

/// Events the mapper emits to its output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputEvent {
    NoteOn { note: u8, velocity: u8, channel: u8 },
    NoteOff { note: u8, channel: u8 },
    PitchBend { bend: i16, channel: u8 },
}

impl OutputEvent {
    /// Converts the event into a MIDI live event.
    pub fn to_midi_event(&self) -> LiveEvent<'static> {
        match *self {
            OutputEvent::NoteOn {
                note,
                velocity,
                channel,
            } => LiveEvent::Midi {
                channel: u4::from_int_lossy(channel),
                message: MidiMessage::NoteOn {
                    key: u7::from_int_lossy(note),
                    vel: u7::from_int_lossy(velocity),
                },
            },
            OutputEvent::NoteOff { note, channel } => LiveEvent::Midi {
                channel: u4::from_int_lossy(channel),
                message: MidiMessage::NoteOff {
                    key: u7::from_int_lossy(note),
                    vel: u7::from_int_lossy(0),
                },
            },
            OutputEvent::PitchBend { bend, channel } => LiveEvent::Midi {
                channel: u4::from_int_lossy(channel),
                message: MidiMessage::PitchBend {
                    bend: PitchBend::from_int(bend),
                },
            },
        }
    }

    /// Encodes the event as raw MIDI bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        // Channel messages are at most three bytes.
        let mut buf: Vec<u8> = Vec::with_capacity(8);
        self.to_midi_event().write(&mut buf)?;
        Ok(buf)
    }
}

/// Lists devices known to midir.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    midir::list()
}

/// Gets an input device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(midir::get(name)?))
}

/// Creates a virtual input port that other programs can send notes to.
pub fn virtual_input() -> Result<Arc<dyn Device>, Box<dyn Error>> {
    Ok(Arc::new(midir::virtual_input()?))
}

/// Opens the output. If no name is given, a virtual output port is created.
pub fn open_output(
    name: Option<&str>,
    capacity: usize,
    timeout: Duration,
) -> Result<Arc<dyn Output>, Box<dyn Error>> {
    if let Some(name) = name {
        if name.starts_with("mock") {
            return Ok(Arc::new(mock::Output::get(name)));
        }
    }

    Ok(Arc::new(midir::open_output(name, capacity, timeout)?))
}

/// Which side of the mapper a virtual port sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Other programs send notes to the mapper through this port.
    To,
    /// Other programs receive retuned notes from the mapper through this port.
    From,
}

/// Names a virtual port, numbering it after the mapper ports that already exist.
pub fn virtual_port_name(existing: &[String], direction: Direction) -> String {
    let count = existing
        .iter()
        .filter(|name| name.contains(VIRTUAL_PORT_PREFIX))
        .count();
    let direction = match direction {
        Direction::To => "to",
        Direction::From => "from",
    };
    format!("{}{} ({})", VIRTUAL_PORT_PREFIX, count, direction)
}

#[cfg(test)]
pub mod test {
    pub use super::mock::{Device, Output};

    use std::error::Error;

    use midly::{
        live::LiveEvent,
        num::{u4, u7},
        MidiMessage, PitchBend,
    };

    use super::{virtual_port_name, Direction, OutputEvent};

    #[test]
    fn output_event_to_midi() -> Result<(), Box<dyn Error>> {
        assert_eq!(
            LiveEvent::Midi {
                channel: u4::from_int_lossy(3),
                message: MidiMessage::NoteOn {
                    key: u7::from_int_lossy(60),
                    vel: u7::from_int_lossy(100),
                },
            },
            OutputEvent::NoteOn {
                note: 60,
                velocity: 100,
                channel: 3
            }
            .to_midi_event()
        );
        assert_eq!(
            vec![0x83, 60, 0],
            OutputEvent::NoteOff {
                note: 60,
                channel: 3
            }
            .to_bytes()?
        );
        assert_eq!(
            LiveEvent::Midi {
                channel: u4::from_int_lossy(1),
                message: MidiMessage::PitchBend {
                    bend: PitchBend::from_int(-3060),
                },
            },
            OutputEvent::PitchBend {
                bend: -3060,
                channel: 1
            }
            .to_midi_event()
        );
        Ok(())
    }

    #[test]
    fn pitch_bend_bytes() -> Result<(), Box<dyn Error>> {
        // Centered bend is 0x2000, split into 7-bit LSB then MSB.
        assert_eq!(
            vec![0xE0, 0x00, 0x40],
            OutputEvent::PitchBend {
                bend: 0,
                channel: 0
            }
            .to_bytes()?
        );
        assert_eq!(
            vec![0xE2, 0x7F, 0x7F],
            OutputEvent::PitchBend {
                bend: 8191,
                channel: 2
            }
            .to_bytes()?
        );
        Ok(())
    }

    #[test]
    fn virtual_port_names() {
        assert_eq!("JI Mapper 0 (to)", virtual_port_name(&[], Direction::To));

        let existing = vec![
            "Midi Through:Midi Through Port-0 14:0".to_string(),
            "JI Mapper 0 (to):JI Mapper 0 (to) 128:0".to_string(),
        ];
        assert_eq!(
            "JI Mapper 1 (from)",
            virtual_port_name(&existing, Direction::From)
        );
    }
}
