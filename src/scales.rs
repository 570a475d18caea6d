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

//! The built in catalog of just intonation scales.

use std::fmt;

/// The name of the scale used when nothing else is configured.
pub const DEFAULT_SCALE: &str = "Harmonic Duodene of C (12 tone)";

/// Errors produced when looking up scales.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScaleError {
    #[error("no scale named \"{0}\"")]
    NotFound(String),

    #[error("invalid interval {0}: the denominator must not be zero")]
    InvalidInterval(String),
}

/// A frequency ratio relative to the tonic of a scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    numerator: u32,
    denominator: u32,
}

impl Interval {
    /// Creates a new interval. The denominator must not be zero; this is only
    /// used for the built in tables, where a zero fails at compile time.
    pub(crate) const fn new(numerator: u32, denominator: u32) -> Interval {
        assert!(denominator != 0, "interval denominator must not be zero");
        Interval {
            numerator,
            denominator,
        }
    }

    /// Creates a new interval, rejecting a zero denominator.
    pub fn try_new(numerator: u32, denominator: u32) -> Result<Interval, ScaleError> {
        if denominator == 0 {
            return Err(ScaleError::InvalidInterval(format!(
                "{}/{}",
                numerator, denominator
            )));
        }
        Ok(Interval {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    /// The frequency multiplier of this interval.
    pub fn ratio(&self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }

    /// The size of this interval in cents.
    pub fn cents(&self) -> f64 {
        1200.0 * self.ratio().log2()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// An octave of intervals. Index 0 is the unison and the last index is the octave.
#[derive(Debug, PartialEq)]
pub struct Scale {
    name: &'static str,
    intervals: &'static [Interval],
    /// A fixed correction, in cents, subtracted from every mapped note.
    calibration_cents: Option<f64>,
}

impl Scale {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn intervals(&self) -> &'static [Interval] {
        self.intervals
    }

    /// The interval for the given scale degree, if the scale has one.
    pub fn degree(&self, index: usize) -> Option<Interval> {
        self.intervals.get(index).copied()
    }

    pub fn calibration_cents(&self) -> Option<f64> {
        self.calibration_cents
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

macro_rules! ratios {
    ($(($numerator:expr, $denominator:expr)),* $(,)?) => {
        [$(Interval::new($numerator, $denominator)),*]
    };
}

const HARMONIC_DUODENE: [Interval; 13] = ratios![
    (1, 1),
    (16, 15),
    (9, 8),
    (6, 5),
    (5, 4),
    (4, 3),
    (45, 32),
    (3, 2),
    (8, 5),
    (5, 3),
    (9, 5),
    (15, 8),
    (2, 1),
];

const YOUNG_WELL_TUNED: [Interval; 13] = ratios![
    (1, 1),
    (567, 512),
    (9, 8),
    (147, 128),
    (21, 16),
    (1323, 1024),
    (189, 128),
    (3, 2),
    (49, 32),
    (7, 4),
    (441, 256),
    (63, 32),
    (2, 1),
];

// Seven tones spread over twelve keys; repeated ratios stand in for enharmonics.
const ARCHYTAS_ENHARMONIC: [Interval; 13] = ratios![
    (1, 1),
    (1, 1),
    (28, 27),
    (28, 27),
    (16, 15),
    (4, 3),
    (4, 3),
    (3, 2),
    (3, 2),
    (14, 9),
    (14, 9),
    (8, 5),
    (2, 1),
];

static SCALES: [Scale; 3] = [
    Scale {
        name: DEFAULT_SCALE,
        intervals: &HARMONIC_DUODENE,
        calibration_cents: None,
    },
    Scale {
        name: "Young's Well-tuned piano (12 tone)",
        intervals: &YOUNG_WELL_TUNED,
        // The tonic of this tuning does not line up with A440.
        calibration_cents: Some(74.7),
    },
    Scale {
        name: "Archytas' Enharmonic (7 tone)",
        intervals: &ARCHYTAS_ENHARMONIC,
        calibration_cents: None,
    },
];

static CATALOG: ScaleCatalog = ScaleCatalog { scales: &SCALES };

/// A read only registry of named scales.
#[derive(Debug)]
pub struct ScaleCatalog {
    scales: &'static [Scale],
}

impl ScaleCatalog {
    /// Returns the built in catalog.
    pub fn builtin() -> &'static ScaleCatalog {
        &CATALOG
    }

    /// Lists the scale names in catalog order.
    pub fn names(&self) -> Vec<&'static str> {
        self.scales.iter().map(|scale| scale.name).collect()
    }

    /// Gets the scale with the given name.
    pub fn get(&self, name: &str) -> Result<&'static Scale, ScaleError> {
        self.scales
            .iter()
            .find(|scale| scale.name == name)
            .ok_or_else(|| ScaleError::NotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Scale> {
        self.scales.iter()
    }
}
