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
use std::{path::Path, time::Duration};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use crate::{mapper, midi::QueuedOutput, scales::DEFAULT_SCALE};

use super::error::ConfigError;

const DEFAULT_ROOT: u8 = 0;
const DEFAULT_OUTPUT_TIMEOUT: Duration = Duration::from_millis(50);

/// The configuration for the mapper.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Mapper {
    /// Input devices to listen to. A virtual input is opened if there are none.
    inputs: Option<Vec<String>>,

    /// The output device. A virtual output is opened if this is not set.
    output: Option<String>,

    /// The pitch class of the scale's tonic, 0 (C) through 11 (B).
    root: Option<u8>,

    /// The name of the scale to map to.
    scale: Option<String>,

    /// How many output channels to spread notes across.
    max_voices: Option<usize>,

    /// Start with retuning turned off.
    bypass: Option<bool>,

    /// Read commands from the keyboard.
    keyboard: Option<bool>,

    /// How long to wait for room in the output queue before dropping an event.
    output_timeout: Option<String>,

    /// How many events can wait to be written to the output.
    output_queue: Option<usize>,
}

/// Values given on the command line. These take precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub inputs: Vec<String>,
    pub output: Option<String>,
    pub root: Option<u8>,
    pub scale: Option<String>,
    pub max_voices: Option<usize>,
    pub bypass: bool,
}

impl Mapper {
    /// Loads the configuration from an optional YAML file and applies the overrides.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Mapper, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        if !overrides.inputs.is_empty() {
            builder = builder.set_override("inputs", overrides.inputs.clone())?;
        }
        if let Some(output) = &overrides.output {
            builder = builder.set_override("output", output.as_str())?;
        }
        if let Some(root) = overrides.root {
            builder = builder.set_override("root", i64::from(root))?;
        }
        if let Some(scale) = &overrides.scale {
            builder = builder.set_override("scale", scale.as_str())?;
        }
        if let Some(max_voices) = overrides.max_voices {
            builder = builder.set_override("max_voices", max_voices as u64)?;
        }
        if overrides.bypass {
            builder = builder.set_override("bypass", true)?;
        }

        let mapper = builder.build()?.try_deserialize::<Mapper>()?;
        mapper.validate()?;
        Ok(mapper)
    }

    /// Checks values that can be rejected before any device is opened.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.root() > 11 {
            return Err(ConfigError::Invalid(format!(
                "root must be in [0, 11], got {}",
                self.root()
            )));
        }
        if self.output_queue() == 0 {
            return Err(ConfigError::Invalid(
                "output_queue must be at least 1".to_string(),
            ));
        }
        self.output_timeout()?;
        Ok(())
    }

    /// The input devices to listen to.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.clone().unwrap_or_default()
    }

    /// The output device, if one is configured.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn root(&self) -> u8 {
        self.root.unwrap_or(DEFAULT_ROOT)
    }

    pub fn scale(&self) -> &str {
        self.scale.as_deref().unwrap_or(DEFAULT_SCALE)
    }

    /// The number of voices. Out of range values are clamped by the mapper.
    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(usize::from(mapper::MAX_VOICES))
    }

    pub fn bypass(&self) -> bool {
        self.bypass.unwrap_or(false)
    }

    pub fn keyboard(&self) -> bool {
        self.keyboard.unwrap_or(true)
    }

    /// Returns the output timeout from the configuration.
    pub fn output_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.output_timeout {
            Some(output_timeout) => Ok(DurationString::from_string(output_timeout.clone())
                .map_err(|e| ConfigError::Duration {
                    value: output_timeout.clone(),
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_OUTPUT_TIMEOUT),
        }
    }

    pub fn output_queue(&self) -> usize {
        self.output_queue.unwrap_or(QueuedOutput::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, time::Duration};

    use crate::scales::DEFAULT_SCALE;

    use super::{ConfigError, Mapper, Overrides};

    #[test]
    fn defaults() -> Result<(), Box<dyn Error>> {
        let mapper = Mapper::load(None, &Overrides::default())?;
        assert!(mapper.inputs().is_empty());
        assert_eq!(None, mapper.output());
        assert_eq!(0, mapper.root());
        assert_eq!(DEFAULT_SCALE, mapper.scale());
        assert_eq!(16, mapper.max_voices());
        assert!(!mapper.bypass());
        assert!(mapper.keyboard());
        assert_eq!(Duration::from_millis(50), mapper.output_timeout()?);
        Ok(())
    }

    #[test]
    fn from_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("jimm.yaml");
        fs::write(
            &path,
            r#"
inputs:
  - "Keystation"
  - "mock-pads"
output: "Synth"
root: 9
scale: "Archytas' Enharmonic (7 tone)"
max_voices: 6
bypass: true
keyboard: false
output_timeout: 10ms
output_queue: 32
"#,
        )?;

        let mapper = Mapper::load(Some(&path), &Overrides::default())?;
        assert_eq!(vec!["Keystation", "mock-pads"], mapper.inputs());
        assert_eq!(Some("Synth"), mapper.output());
        assert_eq!(9, mapper.root());
        assert_eq!("Archytas' Enharmonic (7 tone)", mapper.scale());
        assert_eq!(6, mapper.max_voices());
        assert!(mapper.bypass());
        assert!(!mapper.keyboard());
        assert_eq!(Duration::from_millis(10), mapper.output_timeout()?);
        assert_eq!(32, mapper.output_queue());

        let mapper = Mapper::load(
            Some(&path),
            &Overrides {
                inputs: vec!["Other".to_string()],
                output: Some("mock-output".to_string()),
                root: Some(2),
                scale: Some("Young's Well-tuned piano (12 tone)".to_string()),
                max_voices: Some(3),
                bypass: false,
            },
        )?;
        assert_eq!(vec!["Other"], mapper.inputs());
        assert_eq!(Some("mock-output"), mapper.output());
        assert_eq!(2, mapper.root());
        assert_eq!("Young's Well-tuned piano (12 tone)", mapper.scale());
        assert_eq!(3, mapper.max_voices());
        // Overrides can only turn bypass on.
        assert!(mapper.bypass());
        Ok(())
    }

    #[test]
    fn invalid_values() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;

        let path = dir.path().join("root.yaml");
        fs::write(&path, "root: 12\n")?;
        assert!(matches!(
            Mapper::load(Some(&path), &Overrides::default()),
            Err(ConfigError::Invalid(_))
        ));

        let path = dir.path().join("timeout.yaml");
        fs::write(&path, "output_timeout: soon\n")?;
        assert!(matches!(
            Mapper::load(Some(&path), &Overrides::default()),
            Err(ConfigError::Duration { .. })
        ));

        let path = dir.path().join("queue.yaml");
        fs::write(&path, "output_queue: 0\n")?;
        assert!(matches!(
            Mapper::load(Some(&path), &Overrides::default()),
            Err(ConfigError::Invalid(_))
        ));

        let path = dir.path().join("voices.yaml");
        fs::write(&path, "max_voices: many\n")?;
        assert!(matches!(
            Mapper::load(Some(&path), &Overrides::default()),
            Err(ConfigError::Load(_))
        ));

        assert!(matches!(
            Mapper::load(Some(&dir.path().join("missing.yaml")), &Overrides::default()),
            Err(ConfigError::Load(_))
        ));
        Ok(())
    }
}
