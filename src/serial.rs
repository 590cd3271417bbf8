//! Serial reader: owns the port's lifecycle (open/close/retry) and
//! the [`crate::cobs::Framer`], decoding inline on this thread — one
//! of the two wirings this system's concurrency model allows, and
//! the one the simpler of the two originals actually uses.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use crossbeam_channel::Sender;

use crate::cobs::Framer;
use crate::event::{Event, StatusKind};
use crate::reassemble::Reassembler;
use crate::watcher::Published;

/// Fixed retry interval between failed port-open attempts.
const RETRY_INTERVAL: Duration = Duration::from_secs(2);
/// Attempts exhausted after which the worker reports `PortError` and
/// gives up entirely, rather than retrying forever.
const MAX_RETRY_ATTEMPTS: u32 = 5;
/// Read timeout per cycle; a zero-byte read is a no-op, not an error.
const READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Matches this system's historical read chunk size.
const READ_CHUNK: usize = 11520;

pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
}

/// Run the port-open/read/retry loop until `stop` is set. Intended to
/// be spawned on its own thread.
pub fn run(
    config: SerialConfig,
    published: Arc<ArcSwap<Published>>,
    sender: Sender<Event>,
    stop: Arc<AtomicBool>,
) {
    let mut reassembler = Reassembler::new(published);

    'outer: while !stop.load(Ordering::Relaxed) {
        let mut attempt = 0u32;
        let port = loop {
            if stop.load(Ordering::Relaxed) {
                break 'outer;
            }
            match open_port(&config) {
                Ok(port) => {
                    let _ = sender.send(Event::StatusChange(StatusKind::PortOpened {
                        port: config.port_name.clone(),
                    }));
                    break port;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > MAX_RETRY_ATTEMPTS {
                        let _ = sender.send(Event::StatusChange(StatusKind::PortError {
                            reason: e.to_string(),
                        }));
                        return;
                    }
                    let _ = sender.send(Event::StatusChange(StatusKind::PortRetry {
                        attempt,
                        max_attempts: MAX_RETRY_ATTEMPTS,
                        reason: e.to_string(),
                    }));
                    std::thread::sleep(RETRY_INTERVAL);
                }
            }
        };

        read_loop(port, &mut reassembler, &sender, &stop);
        // read_loop only returns on a port-level I/O error or shutdown;
        // on error, the outer loop reopens (with its own fresh retry
        // budget) unless `stop` is now set.
    }
}

fn open_port(config: &SerialConfig) -> Result<Box<dyn serialport::SerialPort>, serialport::Error> {
    serialport::new(config.port_name.as_str(), config.baud_rate)
        .timeout(READ_TIMEOUT)
        .open()
}

fn read_loop(
    mut port: Box<dyn serialport::SerialPort>,
    reassembler: &mut Reassembler,
    sender: &Sender<Event>,
    stop: &Arc<AtomicBool>,
) {
    let mut framer = Framer::new();
    let mut bad_data = false;
    // Resets on every successful port (re)open, guaranteeing strictly
    // increasing timestamps even across a reopen, per this system's
    // monotonic-timestamp convention.
    let epoch = Instant::now();
    let mut last_timestamp: Option<Duration> = None;
    let mut buf = [0u8; READ_CHUNK];

    while !stop.load(Ordering::Relaxed) {
        let n = match port.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(_) => return,
        };
        if n == 0 {
            continue;
        }

        for result in framer.push(&buf[..n]) {
            let frame = match result {
                Ok(frame) => frame,
                Err(_) => {
                    note_bad_data(sender, &mut bad_data);
                    continue;
                }
            };

            let timestamp = monotonic_timestamp(epoch, &mut last_timestamp);
            match reassembler.ingest_frame(&frame, timestamp) {
                Ok(()) => bad_data = false,
                Err(_) => note_bad_data(sender, &mut bad_data),
            }
            while let Some(entry) = reassembler.pull_event() {
                let _ = sender.send(Event::Entry(entry));
            }
        }
    }
}

fn note_bad_data(sender: &Sender<Event>, bad_data: &mut bool) {
    if !*bad_data {
        let _ = sender.send(Event::StatusChange(StatusKind::BadData));
        *bad_data = true;
    }
}

/// Strictly-increasing timestamp relative to `epoch`, even across
/// clock-resolution ties — if this call would otherwise produce the
/// same value as the last one, it is nudged forward by one tick.
fn monotonic_timestamp(epoch: Instant, last: &mut Option<Duration>) -> Duration {
    let mut elapsed = epoch.elapsed();
    if let Some(prev) = *last {
        if elapsed <= prev {
            elapsed = prev + Duration::from_nanos(1);
        }
    }
    *last = Some(elapsed);
    elapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_timestamp_never_goes_backwards_or_ties() {
        let epoch = Instant::now();
        let mut last = None;
        let a = monotonic_timestamp(epoch, &mut last);
        let b = monotonic_timestamp(epoch, &mut last);
        assert!(b > a);
    }
}
