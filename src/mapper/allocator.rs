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

//! Output channel allocation for retuned voices.
//!
//! Pitch bend applies to a whole MIDI channel, so every sounding voice gets a
//! channel of its own. When the pool is exhausted the oldest voice is stolen,
//! and the release that eventually arrives for the stolen note is suppressed so
//! that it doesn't silence the channel's new occupant.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::debug;

use super::{NoteEvent, NoteKind};

/// The number of MIDI channels available for voices.
pub const MAX_VOICES: u8 = 16;

/// Clamps a requested voice count into [1, MAX_VOICES].
pub fn clamp_voices(max_voices: usize) -> u8 {
    max_voices.clamp(1, usize::from(MAX_VOICES)) as u8
}

/// A voice that currently owns an output channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Voice {
    /// The note number received from the input.
    note_in: u8,
    /// The note number that was sent to the output.
    note_out: u8,
    /// The pitch bend the voice was started with.
    bend: i16,
    /// The output channel.
    channel: u8,
}

impl Voice {
    pub fn new(note_in: u8, note_out: u8, bend: i16, channel: u8) -> Voice {
        Voice {
            note_in,
            note_out,
            bend,
            channel,
        }
    }

    pub fn note_in(&self) -> u8 {
        self.note_in
    }

    pub fn note_out(&self) -> u8 {
        self.note_out
    }

    pub fn bend(&self) -> i16 {
        self.bend
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }
}

/// The outcome of assigning an event to a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assignment {
    /// A new voice was started on the channel. If the pool was exhausted, the
    /// voice that was stolen to make room is included and must be released.
    Attack { channel: u8, stolen: Option<Voice> },

    /// The given voice was released and its channel is free again.
    Release(Voice),

    /// Nothing should be emitted for this event.
    Suppressed,
}

/// ChannelAllocator assigns voices to a bounded pool of output channels.
pub struct ChannelAllocator {
    /// The number of channels in the pool.
    max_voices: u8,
    /// Sequence number for the next admitted voice.
    next_sequence: u64,
    /// Active voices keyed by admission sequence, so the first entry is the oldest.
    active: BTreeMap<u64, Voice>,
    /// Sequence numbers of active voices by input note, oldest first.
    by_note: HashMap<u8, VecDeque<u64>>,
    /// Channels in the pool that no voice owns.
    free_channels: BTreeSet<u8>,
    /// Input notes whose next release must be ignored, with a count per note.
    dropped: HashMap<u8, usize>,
}

impl ChannelAllocator {
    /// Creates a new allocator. The voice count is clamped to [1, 16].
    pub fn new(max_voices: usize) -> ChannelAllocator {
        let max_voices = clamp_voices(max_voices);
        ChannelAllocator {
            max_voices,
            next_sequence: 0,
            active: BTreeMap::new(),
            by_note: HashMap::new(),
            free_channels: (0..max_voices).collect(),
            dropped: HashMap::new(),
        }
    }

    pub fn max_voices(&self) -> u8 {
        self.max_voices
    }

    /// Assigns a channel for the event. Attacks carry the retuned note and bend
    /// that the new voice will sound with.
    pub fn assign(&mut self, event: &NoteEvent, note_out: u8, bend: i16) -> Assignment {
        match event.kind() {
            NoteKind::NoteOn if event.velocity() > 0 => self.attack(event.note(), note_out, bend),
            NoteKind::NoteOn | NoteKind::NoteOff => self.release(event.note()),
        }
    }

    fn attack(&mut self, note_in: u8, note_out: u8, bend: i16) -> Assignment {
        let (channel, stolen) = match self.free_channels.pop_first() {
            Some(channel) => (channel, None),
            None => match self.steal_oldest() {
                Some(stolen) => (stolen.channel, Some(stolen)),
                None => return Assignment::Suppressed,
            },
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.active
            .insert(sequence, Voice::new(note_in, note_out, bend, channel));
        self.by_note.entry(note_in).or_default().push_back(sequence);

        Assignment::Attack { channel, stolen }
    }

    /// Removes the oldest voice and marks its note as dropped.
    fn steal_oldest(&mut self) -> Option<Voice> {
        let (sequence, voice) = self.active.pop_first()?;
        self.unindex(voice.note_in, sequence);
        *self.dropped.entry(voice.note_in).or_default() += 1;

        debug!(
            note = voice.note_in,
            channel = voice.channel,
            max_voices = self.max_voices,
            "Voice limit reached, stealing oldest"
        );

        Some(voice)
    }

    fn release(&mut self, note_in: u8) -> Assignment {
        if let Some(count) = self.dropped.get_mut(&note_in) {
            *count -= 1;
            if *count == 0 {
                self.dropped.remove(&note_in);
            }
            return Assignment::Suppressed;
        }

        let sequence = match self.by_note.get_mut(&note_in).and_then(|s| s.pop_front()) {
            Some(sequence) => sequence,
            None => return Assignment::Suppressed,
        };
        if self.by_note.get(&note_in).is_some_and(|s| s.is_empty()) {
            self.by_note.remove(&note_in);
        }

        match self.active.remove(&sequence) {
            Some(voice) => {
                self.free_channels.insert(voice.channel);
                Assignment::Release(voice)
            }
            None => Assignment::Suppressed,
        }
    }

    fn unindex(&mut self, note_in: u8, sequence: u64) {
        if let Some(sequences) = self.by_note.get_mut(&note_in) {
            sequences.retain(|s| *s != sequence);
            if sequences.is_empty() {
                self.by_note.remove(&note_in);
            }
        }
    }

    /// Removes every voice and forgets all dropped notes. Returns the voices
    /// that were active, oldest first, so that they can be released.
    pub fn clear_all(&mut self) -> Vec<Voice> {
        let voices = std::mem::take(&mut self.active).into_values().collect();
        self.by_note.clear();
        self.dropped.clear();
        self.free_channels = (0..self.max_voices).collect();
        voices
    }

    /// Clears all voices and then changes the size of the channel pool.
    pub fn set_max_voices(&mut self, max_voices: usize) -> Vec<Voice> {
        let voices = self.clear_all();
        self.max_voices = clamp_voices(max_voices);
        self.free_channels = (0..self.max_voices).collect();
        voices
    }

    /// Returns the active voices, oldest first.
    pub fn active_voices(&self) -> impl Iterator<Item = &Voice> {
        self.active.values()
    }

    /// Returns true if the next release of this note will be suppressed.
    pub fn is_dropped(&self, note_in: u8) -> bool {
        self.dropped.contains_key(&note_in)
    }
}

impl std::fmt::Debug for ChannelAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelAllocator")
            .field("active", &self.active.values().collect::<Vec<_>>())
            .field("dropped", &self.dropped)
            .field("max_voices", &self.max_voices)
            .finish()
    }
}
