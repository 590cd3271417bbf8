//! Artifact watcher: polls the symbol artifact's path on disk, and on
//! a change to its modification time, reloads and republishes the
//! symbol table. Publishes an immutable, atomically-swappable
//! snapshot rather than handing the reassembler a mutable reference —
//! this removes the lifetime tangle between the decoder, the
//! watcher, and the UI that the source's shared-object-identity
//! scheme has.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;

use crate::event::{Event, StatusKind};
use crate::symbol::{self, SymbolTable};
use crate::types::ByteOrder;

/// How often the watcher stats the artifact path.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The currently-published symbol table, along with the byte order
/// and hash it was loaded with. `table` is `None` until the first
/// successful load; the reassembler reports `NotReady` against that
/// state. `generation` increments on every successful (re)load so
/// the reassembler can detect a swap it hasn't yet observed.
pub struct Published {
    pub table: Option<SymbolTable>,
    pub byte_order: ByteOrder,
    pub generation: u64,
    pub sha256: [u8; 32],
}

impl Default for Published {
    fn default() -> Self {
        Published {
            table: None,
            byte_order: ByteOrder::Little,
            generation: 0,
            sha256: [0; 32],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    Waiting,
    Ready,
    Failed,
}

/// Run the poll loop until `stop` is set. Intended to be spawned on
/// its own thread; blocks between polls on `stop`'s condition rather
/// than a raw sleep so shutdown is prompt.
pub fn run(
    path: PathBuf,
    published: Arc<ArcSwap<Published>>,
    sender: crossbeam_channel::Sender<Event>,
    stop: Arc<AtomicBool>,
) {
    let mut state = State::Initial;
    let mut last_mtime: Option<SystemTime> = None;

    while !stop.load(Ordering::Relaxed) {
        poll_once(&path, &published, &sender, &mut state, &mut last_mtime);
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn poll_once(
    path: &Path,
    published: &Arc<ArcSwap<Published>>,
    sender: &crossbeam_channel::Sender<Event>,
    state: &mut State,
    last_mtime: &mut Option<SystemTime>,
) {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => {
            if *state != State::Waiting {
                tracing::debug!(?path, "artifact path absent");
                let _ = sender.send(Event::StatusChange(StatusKind::WaitForArtifact));
            }
            *state = State::Waiting;
            *last_mtime = None;
            return;
        }
    };

    let mtime = metadata.modified().ok();
    let changed = mtime != *last_mtime;
    let first_load = last_mtime.is_none();

    // Only (re)attempt a load on the first poll ever, or when the
    // mtime has moved since the last attempt — matches the reference
    // behavior of retrying neither a settled `Ready` nor a settled
    // `Failed` state until the file actually changes.
    if !changed && !matches!(state, State::Initial | State::Waiting) {
        return;
    }

    match symbol::load(path) {
        Ok((table, sha256, byte_order)) => {
            let generation = published.load().generation + 1;
            publish(published, Some(table), byte_order, sha256, generation);
            *state = State::Ready;
            *last_mtime = mtime;
            let event = if first_load {
                StatusKind::ArtifactOk { sha256 }
            } else {
                StatusKind::ArtifactReloaded { sha256 }
            };
            tracing::debug!(?path, reloaded = !first_load, "artifact loaded");
            let _ = sender.send(Event::StatusChange(event));
        }
        Err(e) => {
            *state = State::Failed;
            *last_mtime = mtime;
            tracing::warn!(?path, error = %e, "failed to load artifact");
            let _ = sender.send(Event::StatusChange(StatusKind::ArtifactFailed {
                reason: e.to_string(),
            }));
        }
    }
}

fn publish(
    published: &Arc<ArcSwap<Published>>,
    table: Option<SymbolTable>,
    byte_order: ByteOrder,
    sha256: [u8; 32],
    generation: u64,
) {
    published.store(Arc::new(Published {
        table,
        byte_order,
        generation,
        sha256,
    }));
}
