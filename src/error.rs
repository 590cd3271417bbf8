//! Error taxonomy for the decode pipeline. One enum per component
//! family, matching the three fault domains a caller can act on
//! differently: the artifact it read, the bytes it framed, and the
//! frames it reassembled.

use thiserror::Error;

/// Failures while loading the symbol table out of an artifact.
/// Recovered by the watcher: it stays in `Waiting` or `Failed` and
/// reports the reason upward rather than treating any of these as
/// fatal to the process.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact has no section named `.logs`.
    #[error("artifact has no .logs section")]
    NoSection,

    /// The `.logs` section's length is not a multiple of its record
    /// stride.
    #[error("`.logs` section length {len} is not a multiple of stride {stride}")]
    TruncatedSection { len: usize, stride: usize },

    /// A type word contained a nibble with no registered meaning.
    #[error("unrecognized type code {0:#x}")]
    UnknownTypeCode(u8),

    /// The artifact could not be read from disk.
    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    /// The artifact's container format could not be parsed.
    #[error("failed to parse artifact: {0}")]
    Object(#[from] object::Error),
}

/// Failures while recovering COBS frames from the raw byte stream.
/// Non-fatal: the framer resynchronizes on the next sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The frame's COBS encoding is invalid: a zero code byte, or a
    /// code byte whose run would overshoot the frame.
    #[error("malformed COBS frame")]
    MalformedFrame,
}

/// Failures while reassembling completed log entries from raw
/// frames. Coalesced into a single `BadData` status event rather than
/// surfaced individually; see [`crate::event::Event`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    /// A frame arrived before the symbol table was ready.
    #[error("symbol table not ready")]
    NotReady,

    /// A frame was shorter than the 16-bit header it must carry.
    #[error("frame shorter than header")]
    ShortFrame,

    /// A frame's log id has no corresponding site in the symbol table.
    #[error("log id {0:#x} out of range")]
    BadId(u16),

    /// A continuation frame arrived that didn't match the log entry
    /// currently in progress.
    #[error("unexpected continuation (in progress: {in_progress:?}, got: {got:#x})")]
    UnexpectedContinuation {
        in_progress: Option<u16>,
        got: u16,
    },
}
