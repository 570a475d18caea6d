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

//! Retunes note events and assigns them to output channels.

use std::fmt;

use midly::MidiMessage;
use tracing::{debug, info};

use crate::{
    midi::OutputEvent,
    scales::{Scale, ScaleCatalog},
};

mod allocator;
mod error;
mod note;

pub use allocator::{clamp_voices, Assignment, ChannelAllocator, Voice, MAX_VOICES};
pub use error::MapperError;
pub use note::NoteMapper;

/// The kind of an incoming note event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteKind {
    NoteOn,
    NoteOff,
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            NoteKind::NoteOn => "note_on",
            NoteKind::NoteOff => "note_off",
        })
    }
}

/// An incoming note event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    kind: NoteKind,
    note: u8,
    velocity: u8,
    timestamp: u64,
}

impl NoteEvent {
    /// Creates a new note event. Note and velocity must fit in 7 bits.
    pub fn new(
        kind: NoteKind,
        note: u8,
        velocity: u8,
        timestamp: u64,
    ) -> Result<NoteEvent, MapperError> {
        if note > 127 {
            return Err(MapperError::InvalidArgument(format!(
                "note must be in [0, 127], got {}",
                note
            )));
        }
        if velocity > 127 {
            return Err(MapperError::InvalidArgument(format!(
                "velocity must be in [0, 127], got {}",
                velocity
            )));
        }

        Ok(NoteEvent {
            kind,
            note,
            velocity,
            timestamp,
        })
    }

    /// Converts a MIDI message into a note event. Anything other than note on
    /// and note off is rejected.
    pub fn from_midi(message: &MidiMessage, timestamp: u64) -> Result<NoteEvent, MapperError> {
        match *message {
            MidiMessage::NoteOn { key, vel } => Ok(NoteEvent {
                kind: NoteKind::NoteOn,
                note: key.as_int(),
                velocity: vel.as_int(),
                timestamp,
            }),
            MidiMessage::NoteOff { key, vel } => Ok(NoteEvent {
                kind: NoteKind::NoteOff,
                note: key.as_int(),
                velocity: vel.as_int(),
                timestamp,
            }),
            other => Err(MapperError::InvalidMessage(format!("{:?}", other))),
        }
    }

    pub fn kind(&self) -> NoteKind {
        self.kind
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Returns true if this event starts a note. Note on with zero velocity is a release.
    pub fn is_attack(&self) -> bool {
        self.kind == NoteKind::NoteOn && self.velocity > 0
    }
}

/// A retuned event, ready to be emitted on its channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappedEvent {
    pub timestamp: u64,
    pub kind: NoteKind,
    pub note_in: u8,
    pub note_out: u8,
    pub bend: i16,
    pub velocity: u8,
    pub channel: u8,
}

impl MappedEvent {
    /// Returns true if this event starts a note.
    pub fn is_attack(&self) -> bool {
        self.kind == NoteKind::NoteOn && self.velocity > 0
    }
}

impl fmt::Display for MappedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Channels are displayed 1-indexed.
        write!(
            f,
            "{:>10} {:<8} in {:>3} out {:>3} bend {:>5} vel {:>3} ch {:>2}",
            self.timestamp,
            self.kind,
            self.note_in,
            self.note_out,
            self.bend,
            self.velocity,
            self.channel + 1
        )
    }
}

/// The result of mapping an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mapped {
    /// The event was retuned. If a voice had to be stolen to make room, it
    /// must be released before the event is emitted.
    Event {
        event: MappedEvent,
        stolen: Option<Voice>,
    },

    /// Nothing should be emitted.
    Suppressed,
}

impl Mapped {
    /// Returns the events to send to the output, in order.
    ///
    /// The pitch bend goes out before the note on so that the note starts in tune.
    pub fn output_events(&self) -> Vec<OutputEvent> {
        let (event, stolen) = match self {
            Mapped::Event { event, stolen } => (event, stolen),
            Mapped::Suppressed => return Vec::new(),
        };

        let mut events = Vec::with_capacity(3);
        if let Some(stolen) = stolen {
            events.push(release(stolen));
        }
        if event.is_attack() {
            events.push(OutputEvent::PitchBend {
                bend: event.bend,
                channel: event.channel,
            });
            events.push(OutputEvent::NoteOn {
                note: event.note_out,
                velocity: event.velocity,
                channel: event.channel,
            });
        } else {
            events.push(OutputEvent::NoteOff {
                note: event.note_out,
                channel: event.channel,
            });
        }
        events
    }
}

/// The note off that silences a voice.
fn release(voice: &Voice) -> OutputEvent {
    OutputEvent::NoteOff {
        note: voice.note_out(),
        channel: voice.channel(),
    }
}

/// Mapper retunes note events and spreads them across output channels.
pub struct Mapper {
    catalog: &'static ScaleCatalog,
    note_mapper: NoteMapper,
    allocator: ChannelAllocator,
}

impl Mapper {
    /// Creates a new mapper with the given scale, root and voice count.
    pub fn new(
        catalog: &'static ScaleCatalog,
        scale: &str,
        root: u8,
        max_voices: usize,
    ) -> Result<Mapper, MapperError> {
        let scale = catalog.get(scale)?;
        Ok(Mapper {
            catalog,
            note_mapper: NoteMapper::new(root, scale)?,
            allocator: ChannelAllocator::new(max_voices),
        })
    }

    pub fn root(&self) -> u8 {
        self.note_mapper.root()
    }

    pub fn scale(&self) -> &'static Scale {
        self.note_mapper.scale()
    }

    pub fn max_voices(&self) -> u8 {
        self.allocator.max_voices()
    }

    /// Lists the names of the scales that can be selected.
    pub fn list_scale_names(&self) -> Vec<&'static str> {
        self.catalog.names()
    }

    /// Returns the active voices, oldest first.
    pub fn active_voices(&self) -> Vec<Voice> {
        self.allocator.active_voices().copied().collect()
    }

    /// Changes the root. Sounding voices are released first. An invalid root
    /// leaves everything untouched.
    pub fn set_root(&mut self, root: u8) -> Result<Vec<OutputEvent>, MapperError> {
        let note_mapper = NoteMapper::new(root, self.note_mapper.scale())?;
        let released = self.clear_all();
        self.note_mapper = note_mapper;
        info!(root, "Root changed.");
        Ok(released)
    }

    /// Changes the scale. Sounding voices are released first. An unknown scale
    /// leaves everything untouched.
    pub fn set_scale(&mut self, name: &str) -> Result<Vec<OutputEvent>, MapperError> {
        let scale = self.catalog.get(name)?;
        let note_mapper = NoteMapper::new(self.note_mapper.root(), scale)?;
        let released = self.clear_all();
        self.note_mapper = note_mapper;
        info!(scale = scale.name(), "Scale changed.");
        Ok(released)
    }

    /// Changes the number of output channels, clamped to [1, 16]. Sounding
    /// voices are released first.
    pub fn set_max_voices(&mut self, max_voices: usize) -> Vec<OutputEvent> {
        let released = self
            .allocator
            .set_max_voices(max_voices)
            .iter()
            .map(release)
            .collect();
        info!(max_voices = self.allocator.max_voices(), "Voice count changed.");
        released
    }

    /// Releases every sounding voice.
    pub fn clear_all(&mut self) -> Vec<OutputEvent> {
        self.allocator.clear_all().iter().map(release).collect()
    }

    /// Retunes the event and assigns it a channel. With bypass set, the note
    /// is passed through untuned but still gets a channel of its own.
    pub fn map_event(&mut self, event: &NoteEvent, bypass: bool) -> Result<Mapped, MapperError> {
        let (note_out, bend) = if !event.is_attack() {
            // Releases use the note and bend stored with the voice.
            (event.note(), 0)
        } else if bypass {
            (event.note(), 0)
        } else {
            self.note_mapper.map_note(event.note())?
        };

        let mapped = match self.allocator.assign(event, note_out, bend) {
            Assignment::Attack { channel, stolen } => Mapped::Event {
                event: MappedEvent {
                    timestamp: event.timestamp(),
                    kind: event.kind(),
                    note_in: event.note(),
                    note_out,
                    bend,
                    velocity: event.velocity(),
                    channel,
                },
                stolen,
            },
            Assignment::Release(voice) => Mapped::Event {
                event: MappedEvent {
                    timestamp: event.timestamp(),
                    kind: event.kind(),
                    note_in: event.note(),
                    note_out: voice.note_out(),
                    bend: voice.bend(),
                    velocity: event.velocity(),
                    channel: voice.channel(),
                },
                stolen: None,
            },
            Assignment::Suppressed => Mapped::Suppressed,
        };

        debug!(
            event = format!("{:?}", event),
            mapped = format!("{:?}", mapped),
            allocator = format!("{:?}", self.allocator),
            "Mapped event."
        );

        Ok(mapped)
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("root", &self.root())
            .field("scale", &self.scale().name())
            .field("allocator", &self.allocator)
            .finish()
    }
}
