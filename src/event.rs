//! Dispatch channel: the single ordered conduit carrying status
//! changes and decoded log entries from the background workers to
//! the UI. Event flavors share one channel via an explicit tagged
//! variant rather than the source's dynamic type checks.

use crossbeam_channel::{Receiver, Sender};

use crate::reassemble::LogEntry;

/// Status transitions and out-of-band notes travelling alongside
/// [`LogEntry`] values on the same channel.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusKind {
    /// The artifact path does not exist (yet, or anymore).
    WaitForArtifact,
    /// The artifact was loaded (or reloaded) successfully.
    ArtifactOk { sha256: [u8; 32] },
    /// The artifact path appeared but failed to load.
    ArtifactFailed { reason: String },
    /// The artifact changed on disk and was reloaded successfully.
    ArtifactReloaded { sha256: [u8; 32] },
    /// One or more frames failed to decode; coalesced so that a run
    /// of faults produces exactly one of these.
    BadData,
    /// The serial port was opened.
    PortOpened { port: String },
    /// The serial port failed to open and retries are exhausted.
    PortError { reason: String },
    /// A bounded retry attempt at opening the serial port.
    PortRetry {
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    /// The pipeline is shutting down.
    Quit,
}

/// A single item on the dispatch channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StatusChange(StatusKind),
    Entry(LogEntry),
    Note(String),
}

/// Threshold above which the consumer should drain the channel
/// rather than keep pace item-by-item. Matches this system's
/// historical overrun threshold; see [`drain_overflow`].
pub const HIGH_WATER: usize = 5000;

/// Bounded capacity of the underlying channel. Kept comfortably above
/// [`HIGH_WATER`] so producers never block waiting for the consumer —
/// the overflow policy below is what sheds load, not channel backpressure.
const CHANNEL_CAPACITY: usize = HIGH_WATER * 2;

/// Construct the sender/receiver pair used for the lifetime of one
/// pipeline run.
pub fn channel() -> (Sender<Event>, Receiver<Event>) {
    crossbeam_channel::bounded(CHANNEL_CAPACITY)
}

/// Drain backlog once the channel has crossed [`HIGH_WATER`], per the
/// policy this system settles on: discard only `Entry`/`Note`
/// payloads, retain every `StatusChange` (the UI cannot reconstruct a
/// lost artifact-reload or port-error notification later), and
/// announce the loss with a single synthetic [`Event::Note`].
///
/// Returns the retained `StatusChange` events (in order) followed by
/// the announcing note, or an empty vec if the channel wasn't over
/// the threshold.
pub fn drain_overflow(receiver: &Receiver<Event>) -> Vec<Event> {
    if receiver.len() <= HIGH_WATER {
        return Vec::new();
    }

    let mut retained = Vec::new();
    let mut discarded = 0usize;
    while let Ok(event) = receiver.try_recv() {
        match event {
            Event::StatusChange(_) => retained.push(event),
            Event::Entry(_) | Event::Note(_) => discarded += 1,
        }
    }
    retained.push(Event::Note(format!(
        "buffer overrun — flushed {discarded} items"
    )));
    retained
}
