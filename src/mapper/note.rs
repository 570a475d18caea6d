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
use crate::{
    pitch::{self, A4_HERTZ, OCTAVE_DIVISIONS},
    scales::Scale,
};

use super::error::MapperError;

/// NoteMapper retunes equal tempered note numbers into a just intonation scale
/// built on a root pitch class.
#[derive(Clone, Debug)]
pub struct NoteMapper {
    root: u8,
    scale: &'static Scale,
}

impl NoteMapper {
    /// Creates a new note mapper. The root must be a pitch class in [0, 11].
    pub fn new(root: u8, scale: &'static Scale) -> Result<NoteMapper, MapperError> {
        validate_root(root)?;
        Ok(NoteMapper { root, scale })
    }

    pub fn root(&self) -> u8 {
        self.root
    }

    pub fn scale(&self) -> &'static Scale {
        self.scale
    }

    /// Maps an input note to an output note and the pitch bend that tunes it.
    ///
    /// The note is placed relative to the root in its octave, the root's equal
    /// tempered frequency is multiplied by the scale ratio for that degree and
    /// the result is converted back into a note and bend.
    pub fn map_note(&self, note_in: u8) -> Result<(u8, i16), MapperError> {
        let offset = i32::from(note_in) - i32::from(self.root);
        let octave = offset.div_euclid(OCTAVE_DIVISIONS);
        let pitch_class = offset.rem_euclid(OCTAVE_DIVISIONS);

        // The root can sit above the input note, so this may be below note 0.
        let fundamental =
            pitch::equal_tempered_hertz(octave * OCTAVE_DIVISIONS + i32::from(self.root), A4_HERTZ);
        let interval = self.scale.degree(pitch_class as usize).ok_or_else(|| {
            MapperError::InvalidArgument(format!(
                "scale {} has no degree {}",
                self.scale, pitch_class
            ))
        })?;

        let (note_out, mut bend) = pitch::hertz_to_midi(fundamental * interval.ratio(), A4_HERTZ)?;
        if let Some(calibration_cents) = self.scale.calibration_cents() {
            bend -= pitch::cents_to_bend(calibration_cents);
        }

        let note_out = u8::try_from(note_out)
            .ok()
            .filter(|note| *note <= 127)
            .ok_or_else(|| {
                MapperError::InvalidArgument(format!(
                    "note {} maps to {}, which is outside of the MIDI range",
                    note_in, note_out
                ))
            })?;

        Ok((note_out, pitch::clamp_bend(bend)))
    }
}

/// Verifies that the root is a pitch class.
pub(super) fn validate_root(root: u8) -> Result<(), MapperError> {
    if root >= OCTAVE_DIVISIONS as u8 {
        return Err(MapperError::InvalidArgument(format!(
            "invalid root: {} (0 <= root < 12)",
            root
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::scales::ScaleCatalog;

    use super::*;

    const DUODENE: &str = "Harmonic Duodene of C (12 tone)";
    const YOUNG: &str = "Young's Well-tuned piano (12 tone)";
    const ARCHYTAS: &str = "Archytas' Enharmonic (7 tone)";

    fn note_mapper(root: u8, scale: &str) -> Result<NoteMapper, Box<dyn Error>> {
        Ok(NoteMapper::new(root, ScaleCatalog::builtin().get(scale)?)?)
    }

    #[test]
    fn duodene_on_c() -> Result<(), Box<dyn Error>> {
        let mapper = note_mapper(0, DUODENE)?;

        assert_eq!((60, 0), mapper.map_note(60)?);
        assert_eq!((61, 481), mapper.map_note(61)?);
        assert_eq!((63, 3535), mapper.map_note(64)?);
        assert_eq!((67, 80), mapper.map_note(67)?);
        assert_eq!((68, 3455), mapper.map_note(69)?);
        assert_eq!((70, 3615), mapper.map_note(71)?);
        assert_eq!((72, 0), mapper.map_note(72)?);
        assert_eq!((0, 0), mapper.map_note(0)?);
        assert_eq!((127, 80), mapper.map_note(127)?);
        Ok(())
    }

    #[test]
    fn unison_and_octave_are_untouched() -> Result<(), Box<dyn Error>> {
        for root in 0..12 {
            let mapper = note_mapper(root, DUODENE)?;
            for octave in 1..9 {
                let note = octave * 12 + root;
                assert_eq!((note, 0), mapper.map_note(note)?);
            }
        }
        Ok(())
    }

    #[test]
    fn root_shifts_the_scale() -> Result<(), Box<dyn Error>> {
        let mapper = note_mapper(9, DUODENE)?;
        assert_eq!((69, 0), mapper.map_note(69)?);
        assert_eq!((76, 80), mapper.map_note(76)?);
        assert_eq!((81, 0), mapper.map_note(81)?);

        let mapper = note_mapper(2, DUODENE)?;
        assert_eq!((60, 3615), mapper.map_note(61)?);
        assert_eq!((65, 3535), mapper.map_note(66)?);
        Ok(())
    }

    #[test]
    fn notes_below_the_root() -> Result<(), Box<dyn Error>> {
        let mapper = note_mapper(11, DUODENE)?;
        assert_eq!((0, 481), mapper.map_note(0)?);
        Ok(())
    }

    #[test]
    fn young_calibration() -> Result<(), Box<dyn Error>> {
        let mapper = note_mapper(0, YOUNG)?;
        assert_eq!((60, -3060), mapper.map_note(60)?);
        assert_eq!((67, -2980), mapper.map_note(67)?);
        Ok(())
    }

    #[test]
    fn archytas_repeats_degrees() -> Result<(), Box<dyn Error>> {
        let mapper = note_mapper(0, ARCHYTAS)?;
        assert_eq!((60, 0), mapper.map_note(60)?);
        assert_eq!((60, 0), mapper.map_note(61)?);
        assert_eq!((60, 2579), mapper.map_note(62)?);
        assert_eq!((60, 2579), mapper.map_note(63)?);
        assert_eq!((61, 481), mapper.map_note(64)?);
        Ok(())
    }

    #[test]
    fn out_of_range_output() -> Result<(), Box<dyn Error>> {
        let mapper = note_mapper(11, ARCHYTAS)?;
        assert!(matches!(
            mapper.map_note(0),
            Err(MapperError::InvalidArgument(_))
        ));
        Ok(())
    }

    #[test]
    fn invalid_root() {
        let scale = ScaleCatalog::builtin().iter().next().expect("empty catalog");
        assert!(matches!(
            NoteMapper::new(12, scale),
            Err(MapperError::InvalidArgument(_))
        ));
    }
}
