//! COBS framer: recovers sentinel-delimited frames from an infinite
//! byte stream. Holds no cross-frame state beyond "bytes buffered up
//! to the next sentinel" — corruption resynchronizes itself as soon
//! as the next sentinel appears, by design.

use crate::error::FrameError;

/// Frame delimiter used by this protocol. Not the standard COBS
/// sentinel (`0x00`); this system's wire format reserves `0xA6`
/// instead, so the generic `cobs` crate's codec doesn't apply here.
pub const SENTINEL: u8 = 0xA6;

/// Byte-at-a-time COBS frame recoverer.
#[derive(Debug, Default)]
pub struct Framer {
    buf: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Framer { buf: Vec::new() }
    }

    /// Feed one byte of the serial stream. Returns a decoded frame
    /// (sentinel stripped) the moment `byte` is itself the sentinel;
    /// otherwise buffers and returns `None`.
    pub fn push_byte(&mut self, byte: u8) -> Option<Result<Vec<u8>, FrameError>> {
        self.buf.push(byte);
        if byte == SENTINEL {
            let frame = std::mem::take(&mut self.buf);
            Some(decode(&frame))
        } else {
            None
        }
    }

    /// Feed a chunk of bytes, returning every frame (or frame error)
    /// produced along the way, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<Vec<u8>, FrameError>> {
        bytes.iter().filter_map(|&b| self.push_byte(b)).collect()
    }
}

/// Decode one raw frame, trailing sentinel included, per this
/// system's COBS variant. `frame` must end with [`SENTINEL`].
fn decode(frame: &[u8]) -> Result<Vec<u8>, FrameError> {
    if frame.last() != Some(&SENTINEL) {
        return Err(FrameError::MalformedFrame);
    }

    let mut decoded = Vec::with_capacity(frame.len());
    let mut index = 0usize;
    // `end` excludes the trailing sentinel, matching how this
    // system's reference decoder bounds its walk.
    let end = frame.len() - 1;

    while index < end {
        let code = frame[index] as usize;
        if code == 0 || index + code > end + 1 {
            return Err(FrameError::MalformedFrame);
        }

        index += 1;
        decoded.extend_from_slice(&frame[index..index + code - 1]);

        if code != 0xFF && index + code - 1 < end {
            decoded.push(SENTINEL);
        }

        index += code - 1;
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(payload: &[u8]) -> Vec<u8> {
        // Minimal encoder, used only to build fixtures for the decode
        // tests below: splits `payload` on the sentinel, prefixing
        // each run with its length + 1 (capped at 0xFF), and appends
        // the sentinel as a terminator.
        let mut out = Vec::new();
        let mut rest = payload;
        loop {
            let run_end = rest.iter().position(|&b| b == SENTINEL).unwrap_or(rest.len());
            let run_end = run_end.min(0xFE);
            out.push((run_end + 1) as u8);
            out.extend_from_slice(&rest[..run_end]);
            if run_end == rest.len() {
                break;
            }
            let consumed_sentinel = rest[run_end] == SENTINEL;
            rest = &rest[run_end + if consumed_sentinel { 1 } else { 0 }..];
            if rest.is_empty() && consumed_sentinel {
                break;
            }
        }
        out.push(SENTINEL);
        out
    }

    #[test]
    fn round_trips_payload_without_sentinel_bytes() {
        let payload = [0x03, 0x00, 0x2A];
        let frame = encode(&payload);
        assert_eq!(decode(&frame).unwrap(), payload);
    }

    #[test]
    fn round_trips_payload_containing_sentinel_byte() {
        let payload = [0x01, SENTINEL, 0x02];
        let frame = encode(&payload);
        assert_eq!(decode(&frame).unwrap(), payload);
    }

    #[test]
    fn empty_frame_decodes_to_empty_payload() {
        assert_eq!(decode(&[SENTINEL]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_frame_missing_trailing_sentinel() {
        assert_eq!(decode(&[0x01, 0x02]), Err(FrameError::MalformedFrame));
    }

    #[test]
    fn rejects_zero_code_byte() {
        assert_eq!(decode(&[0x00, SENTINEL]), Err(FrameError::MalformedFrame));
    }

    #[test]
    fn rejects_overshooting_code_byte() {
        assert_eq!(decode(&[0xFF, 0x01, SENTINEL]), Err(FrameError::MalformedFrame));
    }

    #[test]
    fn framer_yields_one_frame_per_sentinel() {
        let mut framer = Framer::new();
        let mut frame = encode(&[1, 2, 3]);
        frame.extend(encode(&[4, 5]));
        let results = framer.push(&frame);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &[1, 2, 3]);
        assert_eq!(results[1].as_ref().unwrap(), &[4, 5]);
    }
}
