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
use crate::{pitch::PitchError, scales::ScaleError};

/// Typed errors for the mapper so that callers can tell a rejected
/// configuration change apart from a broken event source.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MapperError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    NotFound(#[from] ScaleError),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error(transparent)]
    Pitch(#[from] PitchError),
}
