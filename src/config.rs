//! Configuration surface: the startup options this system exposes,
//! collected into one struct that does double duty as a `clap`
//! derive target for the CLI and a `serde` derive target for a future
//! config file, the way `achieve-dream1221-yap`'s settings module
//! does for its own startup options.

#![cfg(feature = "bin")]

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(
    name = "tracewire-view",
    about = "Live decode pipeline for compact, pre-tokenized firmware log packets"
)]
pub struct Config {
    /// Path to the linked firmware artifact containing the `.logs`
    /// metadata section.
    pub artifact_path: PathBuf,

    /// Serial device to read frames from. When absent, the serial
    /// worker stays idle and only the artifact watcher runs.
    #[arg(long)]
    pub serial_port: Option<String>,

    /// Baud rate for the serial device.
    #[arg(long, default_value_t = 115_200)]
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Ring-buffer capacity.
    #[arg(long, default_value_t = 100_000)]
    #[serde(default = "default_buffer_depth")]
    pub buffer_depth: usize,

    /// Initial display filter; log sites with a level numerically
    /// above this are hidden. 0..=8, lower is more severe.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=8))]
    #[serde(default = "default_display_level_threshold")]
    pub display_level_threshold: u8,

    /// Drop the ring buffer's contents whenever the artifact reloads.
    #[arg(long)]
    #[serde(default)]
    pub clear_on_reload: bool,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_buffer_depth() -> usize {
    100_000
}

fn default_display_level_threshold() -> u8 {
    4
}
