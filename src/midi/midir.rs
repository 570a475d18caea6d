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
use std::{collections::HashMap, error::Error, fmt, mem, time::Duration};

use midir::{MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputPort};
use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, span, Level};

use super::{virtual_port_name, Direction, QueuedOutput, RawEvent, VIRTUAL_PORT_PREFIX};

/// Where a device receives its input from.
enum Source {
    /// A port that already exists on the system.
    Port(MidiInputPort),
    /// A virtual port created by this program.
    Virtual,
    /// The device has no input.
    Unavailable,
}

pub struct Device {
    name: String,
    source: Source,
    output_port: Option<MidiOutputPort>,
    event_connection: Mutex<Option<MidiInputConnection<()>>>,
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn watch_events(&self, sender: Sender<RawEvent>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "watch events (midir)");
        let _enter = span.enter();

        let mut event_connection = self.event_connection.lock();
        if event_connection.is_some() {
            return Err("Already watching events.".into());
        }

        info!(device = self.name, "Watching MIDI events.");

        let input = MidiInput::new("jimm input")?;
        let device = self.name.clone();
        let callback = move |timestamp: u64, raw_event: &[u8], _: &mut ()| {
            debug!(
                device = device.as_str(),
                timestamp,
                event = format!("{:02X?}", raw_event),
                "Received MIDI event."
            );
            if let Err(e) = sender.blocking_send(RawEvent {
                timestamp,
                data: Vec::from(raw_event),
            }) {
                error!(
                    err = format!("{:?}", e),
                    "Error sending MIDI event to receiver."
                );
            }
        };

        *event_connection = Some(match &self.source {
            Source::Port(port) => input.connect(port, "jimm input watcher", callback, ())?,
            Source::Virtual => connect_virtual(input, &self.name, callback)?,
            Source::Unavailable => {
                return Err(format!("device {} has no MIDI input", self.name).into());
            }
        });

        Ok(())
    }

    fn stop_watch_events(&self) {
        // Explicitly drop the connection.
        let event_connection = self.event_connection.lock().take();

        mem::drop(event_connection);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut capabilities: Vec<String> = Vec::new();
        match self.source {
            Source::Port(_) => capabilities.push(String::from("Input")),
            Source::Virtual => capabilities.push(String::from("Virtual Input")),
            Source::Unavailable => {}
        }
        if self.output_port.is_some() {
            capabilities.push(String::from("Output"));
        }

        write!(f, "{} ({})", self.name, capabilities.join("/"))
    }
}

#[cfg(unix)]
fn connect_virtual<F>(
    input: MidiInput,
    name: &str,
    callback: F,
) -> Result<MidiInputConnection<()>, Box<dyn Error>>
where
    F: FnMut(u64, &[u8], &mut ()) + std::marker::Send + 'static,
{
    use midir::os::unix::VirtualInput;

    Ok(input.create_virtual(name, callback, ())?)
}

#[cfg(not(unix))]
fn connect_virtual<F>(
    _input: MidiInput,
    name: &str,
    _callback: F,
) -> Result<MidiInputConnection<()>, Box<dyn Error>>
where
    F: FnMut(u64, &[u8], &mut ()) + std::marker::Send + 'static,
{
    Err(format!("virtual port {} is not supported on this platform", name).into())
}

/// Lists midir devices and produces the Device trait.
pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
    Ok(list_midir_devices()?
        .into_iter()
        .map(|device| {
            let device: Box<dyn super::Device> = Box::new(device);
            device
        })
        .collect())
}

/// Lists midir devices, leaving out the mapper's own virtual ports.
fn list_midir_devices() -> Result<Vec<Device>, Box<dyn Error>> {
    let input = MidiInput::new("jimm input listing")?;
    let output = MidiOutput::new("jimm output listing")?;
    let input_ports = input.ports();
    let output_ports = output.ports();

    let mut devices: HashMap<String, Device> = HashMap::new();

    for port in input_ports {
        let name = input.port_name(&port)?;
        if name.contains(VIRTUAL_PORT_PREFIX) {
            continue;
        }
        if !devices.contains_key(&name) {
            devices.insert(
                name.clone(),
                Device {
                    name: name.clone(),
                    source: Source::Port(port),
                    output_port: None,
                    event_connection: Mutex::new(None),
                },
            );
        }
    }

    for port in output_ports {
        let name = output.port_name(&port)?;
        if name.contains(VIRTUAL_PORT_PREFIX) {
            continue;
        }
        match devices.get_mut(&name) {
            Some(device) => {
                device.output_port = Some(port);
            }
            None => {
                devices.insert(
                    name.clone(),
                    Device {
                        name: name.clone(),
                        source: Source::Unavailable,
                        output_port: Some(port),
                        event_connection: Mutex::new(None),
                    },
                );
            }
        }
    }

    let mut sorted_devices = devices
        .into_iter()
        .map(|entry| entry.1)
        .collect::<Vec<Device>>();
    sorted_devices.sort_by_key(|device| device.name.clone());
    Ok(sorted_devices)
}

/// Finds the single name in `names` that contains `name`.
fn find_unique<'a>(names: &'a [String], name: &str) -> Result<&'a String, Box<dyn Error>> {
    let matches = names
        .iter()
        .filter(|candidate| candidate.contains(name))
        .collect::<Vec<&String>>();

    match matches.as_slice() {
        [] => Err(format!("no device found with name {}", name).into()),
        [found] => Ok(found),
        _ => Err(format!(
            "found too many devices that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|device| device.as_str())
                .collect::<Vec<&str>>()
                .join(", ")
        )
        .into()),
    }
}

/// Gets the given midir input device.
pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
    let mut devices = list_midir_devices()?
        .into_iter()
        .filter(|device| matches!(device.source, Source::Port(_)))
        .collect::<Vec<Device>>();
    let names = devices
        .iter()
        .map(|device| device.name.clone())
        .collect::<Vec<String>>();
    let found = find_unique(&names, name)?.clone();

    // find_unique verified that exactly one device has this name.
    let index = names
        .iter()
        .position(|candidate| *candidate == found)
        .ok_or("device disappeared while listing")?;
    Ok(devices.swap_remove(index))
}

/// Creates a virtual input device that other programs can send notes to.
pub fn virtual_input() -> Result<Device, Box<dyn Error>> {
    let output = MidiOutput::new("jimm output listing")?;
    let existing = output
        .ports()
        .iter()
        .map(|port| output.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;

    Ok(Device {
        name: virtual_port_name(&existing, Direction::To),
        source: Source::Virtual,
        output_port: None,
        event_connection: Mutex::new(None),
    })
}

/// Opens a queued output. With a name, the matching output port is used,
/// otherwise a virtual output port is created.
pub fn open_output(
    name: Option<&str>,
    capacity: usize,
    timeout: Duration,
) -> Result<QueuedOutput, Box<dyn Error>> {
    let output_name = match name {
        Some(name) => {
            let output = MidiOutput::new("jimm output listing")?;
            let names = output
                .ports()
                .iter()
                .map(|port| output.port_name(port))
                .collect::<Result<Vec<String>, _>>()?;
            find_unique(&names, name)?.clone()
        }
        None => {
            let input = MidiInput::new("jimm input listing")?;
            let existing = input
                .ports()
                .iter()
                .map(|port| input.port_name(port))
                .collect::<Result<Vec<String>, _>>()?;
            virtual_port_name(&existing, Direction::From)
        }
    };
    let is_virtual = name.is_none();

    let port_name = output_name.clone();
    QueuedOutput::spawn(&output_name, capacity, timeout, move || {
        let output = MidiOutput::new("jimm output").map_err(|e| e.to_string())?;
        let mut connection = if is_virtual {
            connect_virtual_output(output, &port_name)?
        } else {
            let port = output
                .ports()
                .into_iter()
                .find(|port| output.port_name(port).is_ok_and(|name| name == port_name))
                .ok_or_else(|| format!("output {} disappeared", port_name))?;
            output
                .connect(&port, "jimm output")
                .map_err(|e| e.to_string())?
        };

        Ok(move |bytes: &[u8]| connection.send(bytes).map_err(|e| e.to_string()))
    })
}

#[cfg(unix)]
fn connect_virtual_output(
    output: MidiOutput,
    name: &str,
) -> Result<midir::MidiOutputConnection, String> {
    use midir::os::unix::VirtualOutput;

    output.create_virtual(name).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn connect_virtual_output(
    _output: MidiOutput,
    name: &str,
) -> Result<midir::MidiOutputConnection, String> {
    Err(format!(
        "virtual port {} is not supported on this platform",
        name
    ))
}
