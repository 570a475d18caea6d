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
use std::{
    error::Error,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::Duration,
};

use crossbeam_channel::{SendTimeoutError, Sender};
use tracing::{debug, error, info, span, warn, Level};

use super::OutputEvent;

/// An output that hands events to a dedicated sender thread through a bounded
/// queue. A slow or stuck transport fills the queue, after which events are
/// dropped once the timeout expires instead of stalling the mapper.
pub struct QueuedOutput {
    name: String,
    sender: Sender<OutputEvent>,
    timeout: Duration,
    dropped: AtomicU64,
}

impl QueuedOutput {
    /// The queue size used when none is configured.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Spawns the sender thread. `open` runs on that thread and produces the
    /// function that writes encoded events to the transport.
    pub fn spawn<F, W>(
        name: &str,
        capacity: usize,
        timeout: Duration,
        open: F,
    ) -> Result<QueuedOutput, Box<dyn Error>>
    where
        F: FnOnce() -> Result<W, String> + std::marker::Send + 'static,
        W: FnMut(&[u8]) -> Result<(), String>,
    {
        let (sender, receiver) = crossbeam_channel::bounded::<OutputEvent>(capacity.max(1));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        let thread_name = name.to_string();
        thread::Builder::new()
            .name(format!("output {}", name))
            .spawn(move || {
                let span = span!(Level::INFO, "output sender", output = thread_name);
                let _enter = span.enter();

                // The spawning thread is blocked on ready_rx until one of these arrives,
                // so the sends can't fail.
                let mut write = match open() {
                    Ok(write) => {
                        let _ = ready_tx.send(Ok(()));
                        write
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                info!("Output opened.");
                for event in receiver.iter() {
                    let bytes = match event.to_bytes() {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            error!(err = e.to_string(), "Error encoding event.");
                            continue;
                        }
                    };
                    debug!(event = format!("{:?}", event), "Emitting event.");
                    if let Err(e) = write(&bytes) {
                        error!(err = e, "Error sending event to output.");
                    }
                }
                info!("Output closed.");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(QueuedOutput {
                name: name.to_string(),
                sender,
                timeout,
                dropped: AtomicU64::new(0),
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err("output thread exited before opening".into()),
        }
    }
}

impl super::Output for QueuedOutput {
    fn send(&self, event: OutputEvent) {
        match self.sender.send_timeout(event, self.timeout) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    output = self.name,
                    event = format!("{:?}", event),
                    dropped,
                    "Output is backed up, dropping event."
                );
            }
            Err(SendTimeoutError::Disconnected(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                error!(
                    output = self.name,
                    event = format!("{:?}", event),
                    dropped,
                    "Output is closed, dropping event."
                );
            }
        }
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl fmt::Display for QueuedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Output)", self.name)
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc, time::Duration};

    use parking_lot::Mutex;

    use crate::{midi::Output, testutil::eventually};

    use super::{OutputEvent, QueuedOutput};

    #[test]
    fn delivers_in_order() -> Result<(), Box<dyn Error>> {
        let written = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
        let sink = written.clone();
        let output = QueuedOutput::spawn("test", 8, Duration::from_millis(100), move || {
            Ok(move |bytes: &[u8]| {
                sink.lock().push(bytes.to_vec());
                Ok(())
            })
        })?;

        output.send(OutputEvent::PitchBend {
            bend: 0,
            channel: 0,
        });
        output.send(OutputEvent::NoteOn {
            note: 60,
            velocity: 100,
            channel: 0,
        });

        eventually(|| written.lock().len() == 2, "events were never written");
        assert_eq!(
            vec![vec![0xE0, 0x00, 0x40], vec![0x90, 60, 100]],
            *written.lock()
        );
        assert_eq!(0, output.dropped());
        Ok(())
    }

    #[test]
    fn drops_when_backed_up() -> Result<(), Box<dyn Error>> {
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let output = QueuedOutput::spawn("stuck", 1, Duration::from_millis(10), move || {
            Ok(move |_: &[u8]| {
                // Hold the writer until the test is done.
                let _ = release_rx.recv();
                Ok(())
            })
        })?;

        let event = OutputEvent::NoteOff {
            note: 60,
            channel: 0,
        };
        // One event is held by the writer, one sits in the queue, the rest drop.
        for _ in 0..5 {
            output.send(event);
        }

        assert!(output.dropped() >= 3);
        drop(release_tx);
        Ok(())
    }

    #[test]
    fn open_failure() {
        let result = QueuedOutput::spawn("broken", 1, Duration::from_millis(10), || {
            Err::<fn(&[u8]) -> Result<(), String>, String>("no such port".to_string())
        });
        assert!(result.is_err());
    }
}
