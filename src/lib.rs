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
//! A just intonation MIDI mapper. Incoming notes are retuned to a scale of
//! frequency ratios using pitch bend, with each sounding note given an output
//! channel of its own so that its bend doesn't disturb any other note.

pub mod config;
pub mod controller;
pub mod engine;
pub mod mapper;
pub mod midi;
pub mod pitch;
pub mod scales;
#[cfg(test)]
mod testutil;
