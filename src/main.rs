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
use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use jimm::config::{self, Overrides};
use jimm::controller::{keyboard, Controller};
use jimm::engine::Engine;
use jimm::mapper::{Mapper, NoteMapper};
use jimm::midi::{self, Device};
use jimm::scales::{ScaleCatalog, DEFAULT_SCALE};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=just intonation MIDI mapper

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/jimm
ExecStart=/usr/local/bin/jimm start "$JIMM_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=jimm.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A just intonation MIDI mapper."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI input devices.
    Devices {},
    /// Lists the built in scales.
    Scales {
        /// Print the ratio and size in cents of every scale degree.
        #[arg(short, long)]
        ratios: bool,
    },
    /// Prints the output note and pitch bend for the given notes without opening any devices.
    Retune {
        /// The pitch class of the scale's tonic, 0 (C) through 11 (B).
        #[arg(short, long, default_value_t = 0)]
        root: u8,
        /// The name of the scale.
        #[arg(short, long, default_value = DEFAULT_SCALE)]
        scale: String,
        /// The MIDI note numbers to retune.
        #[arg(required = true)]
        notes: Vec<u8>,
    },
    /// Start will start the mapper.
    Start {
        /// The path to the mapper config.
        config_path: Option<String>,
        /// An input device to listen to. May be given more than once.
        #[arg(short, long)]
        input: Vec<String>,
        /// The output device.
        #[arg(short, long)]
        output: Option<String>,
        /// The pitch class of the scale's tonic, 0 (C) through 11 (B).
        #[arg(short, long)]
        root: Option<u8>,
        /// The name of the scale.
        #[arg(short, long)]
        scale: Option<String>,
        /// The number of output channels to use.
        #[arg(short, long)]
        voices: Option<usize>,
        /// Start with retuning turned off.
        #[arg(short, long)]
        bypass: bool,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Scales { ratios } => {
            for scale in ScaleCatalog::builtin().iter() {
                println!("- {}", scale);
                if !ratios {
                    continue;
                }
                for (degree, interval) in scale.intervals().iter().enumerate() {
                    println!(
                        "    {:>2}: {:>9} {:>8.2} cents",
                        degree,
                        interval.to_string(),
                        interval.cents()
                    );
                }
                if let Some(calibration) = scale.calibration_cents() {
                    println!("    calibrated by -{} cents", calibration);
                }
            }
        }
        Commands::Retune { root, scale, notes } => {
            let note_mapper = NoteMapper::new(root, ScaleCatalog::builtin().get(&scale)?)?;
            println!("{} (root {}):", note_mapper.scale(), note_mapper.root());
            for note in notes {
                match note_mapper.map_note(note) {
                    Ok((note_out, bend)) => {
                        println!("{:>3} -> {:>3} bend {:>5}", note, note_out, bend)
                    }
                    Err(e) => println!("{:>3} -> {}", note, e),
                }
            }
        }
        Commands::Start {
            config_path,
            input,
            output,
            root,
            scale,
            voices,
            bypass,
        } => {
            let config = config::Mapper::load(
                config_path.as_deref().map(Path::new),
                &Overrides {
                    inputs: input,
                    output,
                    root,
                    scale,
                    max_voices: voices,
                    bypass,
                },
            )?;
            start(config).await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}

/// Opens the devices, starts the engine and runs until asked to quit.
async fn start(config: config::Mapper) -> Result<(), Box<dyn Error>> {
    let mapper = Mapper::new(
        ScaleCatalog::builtin(),
        config.scale(),
        config.root(),
        config.max_voices(),
    )?;
    let output = midi::open_output(
        config.output(),
        config.output_queue(),
        config.output_timeout()?,
    )?;
    let devices: Vec<Arc<dyn Device>> = if config.inputs().is_empty() {
        vec![midi::virtual_input()?]
    } else {
        config
            .inputs()
            .iter()
            .map(|name| midi::get_device(name))
            .collect::<Result<_, Box<dyn Error>>>()?
    };

    let engine = Arc::new(Engine::new(mapper, output, config.bypass()));
    let mut listener = engine.listen(devices)?;

    if config.keyboard() {
        Controller::new(engine.clone(), Arc::new(keyboard::Driver::new()))
            .join()
            .await?;
        engine.clear_all();
        listener.stop();
    }

    listener.join().await?;
    Ok(())
}
