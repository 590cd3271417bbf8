//! Worker wiring: spawns the artifact watcher and serial reader
//! threads, and owns the shared stop flag and published symbol-table
//! snapshot threaded through both.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use arc_swap::ArcSwap;
use crossbeam_channel::Receiver;

use crate::event::{self, Event};
use crate::serial::{self, SerialConfig};
use crate::watcher::{self, Published};

/// Handle to a running pipeline. Dropping this does not stop the
/// workers; call [`Pipeline::shutdown`] explicitly (matching this
/// system's shared-stop-flag cancellation model, not Rust's own
/// drop-based cleanup, since the workers must also observe a closed
/// serial port and a cancelled timer before they exit).
pub struct Pipeline {
    stop: Arc<AtomicBool>,
    watcher_handle: Option<JoinHandle<()>>,
    serial_handle: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Set the shared stop flag and wait for both workers to exit.
    /// The serial worker notices on its next read timeout; the
    /// watcher notices on its next poll tick.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.watcher_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.serial_handle.take() {
            let _ = h.join();
        }
    }
}

/// Spawn the watcher and (if configured) serial workers. Returns the
/// running [`Pipeline`] handle, the dispatch channel's receiver half,
/// and the published symbol-table snapshot so the caller can inspect
/// it directly if needed.
pub fn spawn(
    artifact_path: PathBuf,
    serial_config: Option<SerialConfig>,
) -> (Pipeline, Receiver<Event>, Arc<ArcSwap<Published>>) {
    let (sender, receiver) = event::channel();
    let published = Arc::new(ArcSwap::from_pointee(Published::default()));
    let stop = Arc::new(AtomicBool::new(false));

    let watcher_handle = {
        let published = published.clone();
        let sender = sender.clone();
        let stop = stop.clone();
        std::thread::spawn(move || watcher::run(artifact_path, published, sender, stop))
    };

    let serial_handle = serial_config.map(|config| {
        let published = published.clone();
        let sender = sender.clone();
        let stop = stop.clone();
        std::thread::spawn(move || serial::run(config, published, sender, stop))
    });

    let pipeline = Pipeline {
        stop,
        watcher_handle: Some(watcher_handle),
        serial_handle,
    };

    (pipeline, receiver, published)
}
