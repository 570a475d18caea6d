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

//! Conversions between frequencies, MIDI note numbers, cents and pitch bend units.
//!
//! Everything here is relative to twelve tone equal temperament with A4 as the
//! reference pitch. Pitch bend units assume a bend range of two semitones in
//! either direction, so 100 cents is a quarter of the full 14-bit wheel.

/// The default reference frequency for A4.
pub const A4_HERTZ: f64 = 440.0;

/// The MIDI note number of A4.
pub const A4_MIDI: i32 = 69;

/// Equal temperament divides the octave into this many semitones.
pub const OCTAVE_DIVISIONS: i32 = 12;

/// The lowest valid pitch bend value, centered on zero.
pub const BEND_MIN: i32 = -8192;

/// The highest valid pitch bend value, centered on zero.
pub const BEND_MAX: i32 = 8191;

/// Pitch bend units per cent. The full +/-8192 range spans 200 cents.
const BEND_PER_CENT: f64 = 8192.0 / 200.0;

/// Continuous MIDI pitches this close to an integer are treated as that integer.
const PITCH_EPSILON: f64 = 1e-9;

/// Errors produced by the pitch conversions.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PitchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Converts a frequency to a MIDI note number and the pitch bend needed to
/// reach the frequency from that note.
///
/// The note is the floor of the continuous MIDI pitch, so the bend is always
/// upward and lies in `[0, 4096]`.
pub fn hertz_to_midi(hertz: f64, a4_hertz: f64) -> Result<(i32, i32), PitchError> {
    if !hertz.is_finite() || hertz <= 0.0 {
        return Err(PitchError::InvalidArgument(format!(
            "hertz must be > 0, got {}",
            hertz
        )));
    }
    if !a4_hertz.is_finite() || a4_hertz <= 0.0 {
        return Err(PitchError::InvalidArgument(format!(
            "a4 hertz must be > 0, got {}",
            a4_hertz
        )));
    }

    let mut midi = f64::from(OCTAVE_DIVISIONS) * (hertz / a4_hertz).log2() + f64::from(A4_MIDI);
    if (midi - midi.round()).abs() < PITCH_EPSILON {
        midi = midi.round();
    }

    let note = midi.floor();
    let bend = cents_to_bend((midi - note) * 100.0);

    Ok((note as i32, bend))
}

/// Converts cents to pitch bend units, 4096 units per semitone.
pub fn cents_to_bend(cents: f64) -> i32 {
    (cents * BEND_PER_CENT).round() as i32
}

/// Converts a MIDI note number to its equal tempered frequency.
pub fn midi_to_hertz(midi: i32, a4_hertz: f64) -> Result<f64, PitchError> {
    if !(0..=127).contains(&midi) {
        return Err(PitchError::InvalidArgument(format!(
            "midi note must be in [0, 127], got {}",
            midi
        )));
    }
    if !a4_hertz.is_finite() || a4_hertz <= 0.0 {
        return Err(PitchError::InvalidArgument(format!(
            "a4 hertz must be > 0, got {}",
            a4_hertz
        )));
    }

    Ok(equal_tempered_hertz(midi, a4_hertz))
}

/// The equal tempered frequency of any (possibly out of range) note number.
pub(crate) fn equal_tempered_hertz(midi: i32, a4_hertz: f64) -> f64 {
    2f64.powf(f64::from(midi - A4_MIDI) / f64::from(OCTAVE_DIVISIONS)) * a4_hertz
}

/// Returns the distance in cents from frequency `f` to frequency `g`.
///
/// Both frequencies must be positive whole numbers of hertz.
pub fn hertz_cents(f: i64, g: i64) -> Result<f64, PitchError> {
    if f <= 0 || g <= 0 {
        return Err(PitchError::InvalidArgument(format!(
            "invalid frequency values: {}, {}",
            f, g
        )));
    }

    Ok(1200.0 * (g as f64 / f as f64).log2())
}

/// Clamps a bend value into the valid 14-bit signed range.
pub fn clamp_bend(bend: i32) -> i16 {
    bend.clamp(BEND_MIN, BEND_MAX) as i16
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;

    #[test]
    fn hertz_to_midi_reference() -> Result<(), Box<dyn Error>> {
        assert_eq!((69, 0), hertz_to_midi(440.0, A4_HERTZ)?);
        assert_eq!((69, 1594), hertz_to_midi(450.0, A4_HERTZ)?);
        assert_eq!((69, 0), hertz_to_midi(432.0, 432.0)?);
        assert_eq!((81, 0), hertz_to_midi(880.0, A4_HERTZ)?);
        Ok(())
    }

    #[test]
    fn hertz_to_midi_invalid() {
        assert!(hertz_to_midi(0.0, A4_HERTZ).is_err());
        assert!(hertz_to_midi(-1.0, A4_HERTZ).is_err());
        assert!(hertz_to_midi(f64::NAN, A4_HERTZ).is_err());
        assert!(hertz_to_midi(440.0, 0.0).is_err());
        assert!(hertz_to_midi(440.0, -440.0).is_err());
        assert!(hertz_to_midi(f64::INFINITY, A4_HERTZ).is_err());
        assert!(hertz_to_midi(440.0, f64::INFINITY).is_err());
        assert!(hertz_to_midi(440.0, f64::NAN).is_err());
    }

    #[test]
    fn cents_to_bend_values() {
        assert_eq!(0, cents_to_bend(0.0));
        assert_eq!(4096, cents_to_bend(100.0));
        assert_eq!(-4096, cents_to_bend(-100.0));
        assert_eq!(8192, cents_to_bend(200.0));
        assert_eq!(80, cents_to_bend(1.96));
        assert_eq!(1942, cents_to_bend(47.41));
        assert_eq!(-641, cents_to_bend(-15.64));
        assert_eq!(3060, cents_to_bend(74.7));
    }

    #[test]
    fn cents_to_bend_monotonic() {
        let mut last = cents_to_bend(-300.0);
        let mut cents = -300.0;
        while cents <= 300.0 {
            let bend = cents_to_bend(cents);
            assert!(bend >= last, "bend decreased at {} cents", cents);
            last = bend;
            cents += 0.37;
        }
    }

    #[test]
    fn midi_to_hertz_values() -> Result<(), Box<dyn Error>> {
        assert_eq!(440.0, midi_to_hertz(69, A4_HERTZ)?);
        assert!((midi_to_hertz(0, A4_HERTZ)? - 8.175798915643707).abs() < 1e-12);
        assert!((midi_to_hertz(60, A4_HERTZ)? - 261.6255653005986).abs() < 1e-9);
        assert_eq!(880.0, midi_to_hertz(81, A4_HERTZ)?);
        Ok(())
    }

    #[test]
    fn midi_to_hertz_invalid() {
        assert!(midi_to_hertz(-1, A4_HERTZ).is_err());
        assert!(midi_to_hertz(128, A4_HERTZ).is_err());
        assert!(midi_to_hertz(60, 0.0).is_err());
        assert!(midi_to_hertz(60, f64::INFINITY).is_err());
        assert!(midi_to_hertz(60, f64::NAN).is_err());
    }

    #[test]
    fn hertz_cents_values() -> Result<(), Box<dyn Error>> {
        assert_eq!(1200.0, hertz_cents(440, 880)?);
        assert_eq!(701.955, (hertz_cents(440, 660)? * 1000.0).round() / 1000.0);
        assert_eq!(-1200.0, hertz_cents(880, 440)?);
        assert_eq!(0.0, hertz_cents(440, 440)?);
        Ok(())
    }

    #[test]
    fn hertz_cents_invalid() {
        assert!(hertz_cents(0, 440).is_err());
        assert!(hertz_cents(440, -880).is_err());
    }

    #[test]
    fn midi_round_trip() -> Result<(), Box<dyn Error>> {
        for midi in 0..=127 {
            let (note, bend) = hertz_to_midi(midi_to_hertz(midi, A4_HERTZ)?, A4_HERTZ)?;
            assert_eq!(midi, note, "note mismatch for {}", midi);
            assert_eq!(0, bend, "bend mismatch for {}", midi);
        }
        Ok(())
    }

    #[test]
    fn clamp_bend_range() {
        assert_eq!(-8192, clamp_bend(-10000));
        assert_eq!(8191, clamp_bend(8192));
        assert_eq!(1594, clamp_bend(1594));
    }
}
