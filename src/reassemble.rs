//! Reassembler / decoder: turns a sequence of raw frames plus the
//! current symbol table into completed log entries, one argument per
//! frame. Detects and reports protocol faults without ever treating
//! them as fatal — the framer's sentinel resynchronization and this
//! module's own "no pending log" reset keep the stream self-healing.

use std::collections::VecDeque;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::ReassemblyError;
use crate::symbol::{LogSite, SymbolTable, OVERRUN_ID, START_ID};
use crate::types::{ByteOrder, Value};
use crate::watcher::Published;

/// A decoded event delivered to the UI: either an ordinary completed
/// log entry, or one of the two synthetic kinds this module
/// generates on its own (`OVERRUN`/`START` reserved ids, and
/// `INCOMPLETE` truncation markers).
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub site: EntrySite,
    /// Monotonic timestamp captured when the completing frame
    /// arrived.
    pub timestamp: std::time::Duration,
    pub args: Vec<Value>,
}

/// Either a real log site from the symbol table, or a small synthetic
/// stand-in for one of the reserved/INCOMPLETE cases — these don't
/// have a position in the table to point at.
#[derive(Debug, Clone, PartialEq)]
pub enum EntrySite {
    Real(Arc<LogSite>),
    Synthetic { format: String },
}

impl EntrySite {
    pub fn format(&self) -> &str {
        match self {
            EntrySite::Real(site) => &site.format,
            EntrySite::Synthetic { format } => format,
        }
    }
}

/// Reassembles raw frames into [`LogEntry`] values, against whatever
/// [`SymbolTable`] is currently published. Owns all in-flight
/// reassembly state; accessed only by the decoder thread.
pub struct Reassembler {
    published: Arc<ArcSwap<Published>>,
    seen_generation: u64,

    pending_log_id: Option<u16>,
    pending_args: Vec<Value>,
    pending_string_bytes: Vec<u8>,

    /// Completed events not yet handed to the caller, in emission
    /// order. A frame can produce zero, one (the frame's own
    /// completion), or two (a queued `INCOMPLETE` ahead of the
    /// frame's own completion) entries; queuing both here and
    /// draining front-to-back is what keeps that ordering intact
    /// without requiring two separate calls per frame.
    output: VecDeque<LogEntry>,
}

impl Reassembler {
    pub fn new(published: Arc<ArcSwap<Published>>) -> Self {
        Reassembler {
            published,
            seen_generation: 0,
            pending_log_id: None,
            pending_args: Vec::new(),
            pending_string_bytes: Vec::new(),
            output: VecDeque::new(),
        }
    }

    /// Pop the next queued completed entry, if any.
    pub fn pull_event(&mut self) -> Option<LogEntry> {
        self.output.pop_front()
    }

    /// Feed one raw frame (sentinel already stripped). Resets
    /// in-flight state if the published table has changed since the
    /// last call, guaranteeing the table swap is observed before the
    /// next frame is decoded against it. An empty frame is silently
    /// dropped.
    pub fn ingest_frame(
        &mut self,
        frame: &[u8],
        timestamp: std::time::Duration,
    ) -> Result<(), ReassemblyError> {
        if frame.is_empty() {
            return Ok(());
        }

        let snapshot = self.published.load_full();
        if snapshot.generation != self.seen_generation {
            self.reset_pending();
            self.seen_generation = snapshot.generation;
        }

        let table: &SymbolTable = match &snapshot.table {
            Some(table) => table,
            None => return Err(ReassemblyError::NotReady),
        };

        if frame.len() < 2 {
            return Err(ReassemblyError::ShortFrame);
        }

        let raw = read_u16(&frame[0..2], snapshot.byte_order);
        let is_continuation = raw & 0x8000 != 0;
        let log_id = raw & 0x7FFF;
        let payload = &frame[2..];

        if log_id == OVERRUN_ID {
            let count = payload.first().copied().unwrap_or(0);
            self.output.push_back(LogEntry {
                site: EntrySite::Synthetic {
                    format: format!("< {count} Log(s) lost >"),
                },
                timestamp,
                args: vec![Value::U8(count)],
            });
            return Ok(());
        }
        if log_id == START_ID {
            self.output.push_back(LogEntry {
                site: EntrySite::Synthetic {
                    format: "#".repeat(79),
                },
                timestamp,
                args: Vec::new(),
            });
            return Ok(());
        }

        let site = table.get(log_id).ok_or(ReassemblyError::BadId(log_id))?;

        if !is_continuation {
            if let Some(prev_id) = self.pending_log_id.take() {
                self.output.push_back(self.build_incomplete(table, prev_id));
            }
            self.pending_log_id = Some(log_id);
            self.pending_args.clear();
            self.pending_string_bytes.clear();
        } else {
            match self.pending_log_id {
                None => {
                    return Err(ReassemblyError::UnexpectedContinuation {
                        in_progress: None,
                        got: log_id,
                    })
                }
                Some(pid) if pid != log_id => {
                    self.pending_log_id = None;
                    return Err(ReassemblyError::UnexpectedContinuation {
                        in_progress: Some(pid),
                        got: log_id,
                    });
                }
                _ => {}
            }
        }

        let idx = self.pending_args.len();
        let Some(expected) = site.types.get(idx) else {
            // All arguments already satisfied — notably a zero-argument
            // site, whose first (and only) frame never contributes to
            // `pending_args` at all. Complete now with whatever has been
            // collected (`[]` in the zero-argument case) rather than
            // treating this as a desynchronized continuation.
            let args = std::mem::take(&mut self.pending_args);
            self.pending_log_id = None;
            self.output.push_back(LogEntry {
                site: EntrySite::Real(site),
                timestamp,
                args,
            });
            return Ok(());
        };

        match expected.fixed_len() {
            Some(len) => {
                if payload.len() < len {
                    return Err(ReassemblyError::ShortFrame);
                }
                self.pending_args
                    .push(expected.decode_fixed(&payload[..len], snapshot.byte_order));
            }
            None => {
                self.pending_string_bytes.extend_from_slice(payload);
                if let Some(null_pos) = self.pending_string_bytes.iter().position(|&b| b == 0) {
                    let s = String::from_utf8_lossy(&self.pending_string_bytes[..null_pos])
                        .into_owned();
                    self.pending_args.push(Value::Str(s));
                    self.pending_string_bytes.clear();
                } else {
                    return Ok(());
                }
            }
        }

        if self.pending_args.len() == site.types.len() {
            let args = std::mem::take(&mut self.pending_args);
            self.pending_log_id = None;
            self.output.push_back(LogEntry {
                site: EntrySite::Real(site),
                timestamp,
                args,
            });
        }

        Ok(())
    }

    fn build_incomplete(&mut self, table: &SymbolTable, prev_id: u16) -> LogEntry {
        let collected = self.pending_args.len();
        let args = std::mem::take(&mut self.pending_args);
        self.pending_string_bytes.clear();
        let format = match table.get(prev_id) {
            Some(site) => format!(
                "Log ID {prev_id} ({}:{}): expected {} args, got {collected}",
                site.filename,
                site.line,
                site.types.len()
            ),
            None => format!("Log ID {prev_id}: truncated after {collected} args"),
        };
        LogEntry {
            site: EntrySite::Synthetic { format },
            timestamp: std::time::Duration::ZERO,
            args,
        }
    }

    fn reset_pending(&mut self) {
        self.pending_log_id = None;
        self.pending_args.clear();
        self.pending_string_bytes.clear();
    }
}

fn read_u16(bytes: &[u8], order: ByteOrder) -> u16 {
    let raw = [bytes[0], bytes[1]];
    match order {
        ByteOrder::Little => u16::from_le_bytes(raw),
        ByteOrder::Big => u16::from_be_bytes(raw),
    }
}
