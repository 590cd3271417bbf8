use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracewire::config::Config;
use tracewire::event::drain_overflow;
use tracewire::pipeline;
use tracewire::ring::SharedRingBuffer;
use tracewire::serial::SerialConfig;
use tracewire::{Event, StatusKind};

/// The minimal line-oriented consumer of the dispatch channel: not a
/// terminal UI, just enough of a boundary to prove the channel's
/// ordering and overflow behavior end to end. Prints `LogEntry` and
/// status lines, honors `--level` and `--clear-on-reload`.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = Config::parse();

    if !config.artifact_path.exists() {
        tracing::warn!(path = ?config.artifact_path, "artifact path does not exist yet; waiting");
    }

    let serial_config = config.serial_port.clone().map(|port_name| SerialConfig {
        port_name,
        baud_rate: config.baud_rate,
    });

    let (pipeline, receiver, _published) = pipeline::spawn(config.artifact_path.clone(), serial_config);

    let ring = SharedRingBuffer::new(config.buffer_depth);
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("failed to install Ctrl-C handler")?;
    }

    while !stop.load(Ordering::Relaxed) {
        for event in drain_overflow(&receiver) {
            handle_event(event, &ring, &config);
        }
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => handle_event(event, &ring, &config),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    pipeline.shutdown();
    Ok(())
}

fn handle_event(event: Event, ring: &SharedRingBuffer<String>, config: &Config) {
    match event {
        Event::StatusChange(StatusKind::WaitForArtifact) => {
            println!("{} [waiting for artifact {:?}]", wall_clock(), config.artifact_path);
        }
        Event::StatusChange(StatusKind::ArtifactOk { sha256 }) => {
            println!("{} [artifact ok sha256={}]", wall_clock(), hex(&sha256));
        }
        Event::StatusChange(StatusKind::ArtifactFailed { reason }) => {
            println!("{} [artifact failed: {reason}]", wall_clock());
        }
        Event::StatusChange(StatusKind::ArtifactReloaded { sha256 }) => {
            println!("{} [artifact reloaded sha256={}]", wall_clock(), hex(&sha256));
            if config.clear_on_reload {
                ring.clear();
            }
        }
        Event::StatusChange(StatusKind::BadData) => {
            println!("{} [bad data]", wall_clock());
        }
        Event::StatusChange(StatusKind::PortOpened { port }) => {
            println!("{} [port opened: {port}]", wall_clock());
        }
        Event::StatusChange(StatusKind::PortError { reason }) => {
            println!("{} [port error: {reason}]", wall_clock());
        }
        Event::StatusChange(StatusKind::PortRetry {
            attempt,
            max_attempts,
            reason,
        }) => {
            println!("{} [port retry {attempt}/{max_attempts}: {reason}]", wall_clock());
        }
        Event::StatusChange(StatusKind::Quit) => {}
        Event::Note(text) => {
            println!("[note: {text}]");
            ring.append(format!("note: {text}"));
        }
        Event::Entry(entry) => {
            if let tracewire::EntrySite::Real(site) = &entry.site {
                if site.level > config.display_level_threshold {
                    return;
                }
            }
            let line = format_entry(&entry);
            println!("{line}");
            ring.append(line);
        }
    }
}

fn format_entry(entry: &tracewire::LogEntry) -> String {
    let rendered = render_format(entry.site.format(), &entry.args);
    match &entry.site {
        tracewire::EntrySite::Real(site) => {
            format!("{:>8.3} {}:{} {}", entry.timestamp.as_secs_f64(), site.filename, site.line, rendered)
        }
        tracewire::EntrySite::Synthetic { .. } => {
            format!("{:>8.3} {}", entry.timestamp.as_secs_f64(), rendered)
        }
    }
}

/// Minimal `{}` placeholder substitution; firmware format templates
/// in this system use only the plain `{}` form plus a `{:NNx}` hex
/// variant, neither of which requires a full format-string engine.
fn render_format(format: &str, args: &[tracewire::Value]) -> String {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'}') {
            chars.next();
            if let Some(arg) = args.next() {
                out.push_str(&render_value(arg));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn render_value(value: &tracewire::Value) -> String {
    use tracewire::Value::*;
    match value {
        U8(v) => v.to_string(),
        S8(v) => v.to_string(),
        Bool(v) => v.to_string(),
        U16(v) => v.to_string(),
        S16(v) => v.to_string(),
        Ptr16(v) => format!("{v:#06x}"),
        U32(v) => v.to_string(),
        S32(v) => v.to_string(),
        F32(v) => v.to_string(),
        Str(v) => v.clone(),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Wall-clock stamp for status lines; log entries themselves use the
/// pipeline's monotonic per-port timestamp instead, via `format_entry`.
fn wall_clock() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f_UTC").to_string()
}
