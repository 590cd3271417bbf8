//! Symbol table loader: parses the `.logs` metadata section out of a
//! linked firmware artifact and builds an indexable table of log
//! sites. The firmware transmits only a log site's position in this
//! table; everything human-readable (level, file, line, format,
//! argument types) lives here instead of on the wire.

use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use object::{Object, ObjectSection};
use sha2::{Digest, Sha256};

use crate::error::ArtifactError;
use crate::types::{ByteOrder, TypeVector};

/// Section in the artifact that carries the packed log-site records.
const LOGS_SECTION: &str = ".logs";

/// Reserved id for the firmware's dropped-frame notification. Carries
/// a single `u8` count of lost frames.
pub const OVERRUN_ID: u16 = 0x7FFF;

/// Reserved id for the firmware's "session started" marker. Carries
/// no arguments.
pub const START_ID: u16 = 0x7FFE;

/// Static record associated with one log statement in firmware
/// source. Immutable once loaded; identified by its position in the
/// [`SymbolTable`], which the firmware uses as the wire `log_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSite {
    /// 0..=8, lower is more severe.
    pub level: u8,
    pub line: u32,
    /// Basename of the source file; the artifact stores the full
    /// path but only the final component is of any use to a viewer.
    pub filename: String,
    /// A format template using `{}` / `{:NNx}`-style placeholders.
    pub format: String,
    pub types: TypeVector,
    /// Sum of fixed argument lengths; strings contribute 0.
    pub payload_length_fixed: usize,
}

/// An ordered sequence of log sites, indexable `0..len()`, published
/// as an immutable snapshot by the artifact watcher.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    sites: Vec<Arc<LogSite>>,
}

impl SymbolTable {
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Ordinary lookup; `None` for an out-of-range id (the caller
    /// reports this as [`crate::error::ReassemblyError::BadId`]) and
    /// for either reserved id, which callers must check for first.
    pub fn get(&self, log_id: u16) -> Option<Arc<LogSite>> {
        self.sites.get(log_id as usize).cloned()
    }

    /// Build a table directly from already-constructed sites, without
    /// going through [`load`]. Useful for firmware simulators and
    /// tests that want a symbol table without a real artifact on disk.
    pub fn from_sites(sites: Vec<Arc<LogSite>>) -> Self {
        SymbolTable { sites }
    }
}

/// Read an artifact, hash it, and build its [`SymbolTable`].
pub fn load(path: &Path) -> Result<(SymbolTable, [u8; 32], ByteOrder), ArtifactError> {
    let data = std::fs::read(path)?;

    let mut hasher = Sha256::new();
    hasher.update(&data);
    let sha256: [u8; 32] = hasher.finalize().into();

    let file = object::File::parse(&*data)?;
    let byte_order = if file.is_little_endian() {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    };

    let section = file
        .section_by_name(LOGS_SECTION)
        .ok_or(ArtifactError::NoSection)?;
    let stride = section.align().max(1) as usize;
    let bytes = section.data()?;

    if bytes.len() % stride != 0 {
        return Err(ArtifactError::TruncatedSection {
            len: bytes.len(),
            stride,
        });
    }

    let mut sites = Vec::with_capacity(bytes.len() / stride);
    for record in bytes.chunks(stride) {
        sites.push(Arc::new(parse_record(record, byte_order)?));
    }

    Ok((SymbolTable { sites }, sha256, byte_order))
}

fn parse_record(record: &[u8], byte_order: ByteOrder) -> Result<LogSite, ArtifactError> {
    let read_u32 = |bytes: &[u8]| -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match byte_order {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        }
    };

    let level = read_u32(&record[0..4]);
    let line = read_u32(&record[4..8]);
    let type_word = read_u32(&record[8..12]);
    let types = TypeVector::decode_word(type_word)?;

    let strings = &record[12..];
    let (filename_bytes, rest) = split_cstr(strings);
    let (format_bytes, _rest) = split_cstr(rest);

    let filename_raw = String::from_utf8_lossy(filename_bytes).into_owned();
    let filename = PathBuf::from(&filename_raw)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(filename_raw);
    let format = String::from_utf8_lossy(format_bytes).into_owned();

    Ok(LogSite {
        level: level as u8,
        line,
        filename,
        format,
        payload_length_fixed: types.fixed_payload_len(),
        types,
    })
}

/// Split off one null-terminated C string, returning its bytes
/// (without the terminator) and the remainder of `bytes` past it.
/// Tolerates a missing terminator at the end of the record (padding
/// may have truncated it) by treating the rest of the slice as the
/// string.
fn split_cstr(bytes: &[u8]) -> (&[u8], &[u8]) {
    match CStr::from_bytes_until_nul(bytes) {
        Ok(cstr) => {
            let s = cstr.to_bytes();
            (s, &bytes[s.len() + 1..])
        }
        Err(_) => (bytes, &[]),
    }
}
