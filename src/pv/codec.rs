//! Variable-length integer codec shared by every PV segment (§4.2).
//!
//! The first byte carries two flag bits — `is_more` (continuation) and
//! `is_di` (this integer is a document-id delta rather than a position-id
//! delta) — plus 6 payload bits. Continuation bytes carry 1 continuation
//! flag and 7 payload bits.

const FIRST_BYTE_MORE: u8 = 0x80;
const FIRST_BYTE_IS_DI: u8 = 0x40;
const FIRST_BYTE_PAYLOAD_MASK: u8 = 0x3f;
const FIRST_BYTE_PAYLOAD_BITS: u32 = 6;

const CONT_BYTE_MORE: u8 = 0x80;
const CONT_BYTE_PAYLOAD_MASK: u8 = 0x7f;
const CONT_BYTE_PAYLOAD_BITS: u32 = 7;

/// Appends the varint encoding of `value` (tagged `is_di`) to `out`.
pub fn encode_varint(out: &mut Vec<u8>, value: u64, is_di: bool) {
    let mut remaining = value;
    let first_payload = (remaining & u64::from(FIRST_BYTE_PAYLOAD_MASK)) as u8;
    remaining >>= FIRST_BYTE_PAYLOAD_BITS;
    let mut first = first_payload;
    if is_di {
        first |= FIRST_BYTE_IS_DI;
    }
    if remaining > 0 {
        first |= FIRST_BYTE_MORE;
    }
    out.push(first);
    while remaining > 0 {
        let payload = (remaining & u64::from(CONT_BYTE_PAYLOAD_MASK)) as u8;
        remaining >>= CONT_BYTE_PAYLOAD_BITS;
        let mut byte = payload;
        if remaining > 0 {
            byte |= CONT_BYTE_MORE;
        }
        out.push(byte);
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct DecodeError;

/// Decodes one varint starting at `buf[pos]`, returning the value, the
/// `is_di` flag, and the number of bytes consumed.
pub fn decode_varint(buf: &[u8], pos: usize) -> Result<(u64, bool, usize), DecodeError> {
    if pos >= buf.len() {
        return Err(DecodeError);
    }
    let first = buf[pos];
    let is_di = first & FIRST_BYTE_IS_DI != 0;
    let mut value = u64::from(first & FIRST_BYTE_PAYLOAD_MASK);
    let mut shift = FIRST_BYTE_PAYLOAD_BITS;
    let mut consumed = 1;
    let mut more = first & FIRST_BYTE_MORE != 0;
    while more {
        let idx = pos + consumed;
        if idx >= buf.len() {
            return Err(DecodeError);
        }
        let byte = buf[idx];
        value |= u64::from(byte & CONT_BYTE_PAYLOAD_MASK) << shift;
        shift += CONT_BYTE_PAYLOAD_BITS;
        more = byte & CONT_BYTE_MORE != 0;
        consumed += 1;
        if shift > 64 {
            return Err(DecodeError);
        }
    }
    Ok((value, is_di, consumed))
}

/// Encodes one `(di, pi)` pair as deltas against `(last_di, last_pi)`,
/// following §4.2: if `di` advances, emit the di-delta first (resetting
/// `last_pi` to `-1` conceptually), then always emit the pi-delta.
pub fn encode_pair(out: &mut Vec<u8>, last_di: &mut i64, last_pi: &mut i64, di: u32, pi: u32) {
    if (di as i64) > *last_di {
        encode_varint(out, (di as i64 - *last_di) as u64, true);
        *last_di = di as i64;
        *last_pi = -1;
    }
    encode_varint(out, (pi as i64 - *last_pi) as u64, false);
    *last_pi = pi as i64;
}

/// Decodes the next `(di, pi)` pair starting at `buf[pos]`, mirroring
/// `encode_pair`: an `is_di=true` integer implicitly starts a new `di` and
/// is always followed by the `is_di=false` position delta.
pub fn decode_pair(
    buf: &[u8],
    pos: usize,
    last_di: &mut i64,
    last_pi: &mut i64,
) -> Result<(u32, u32, usize), DecodeError> {
    let (v1, is_di, mut consumed) = decode_varint(buf, pos)?;
    if is_di {
        *last_di += v1 as i64;
        *last_pi = -1;
        let (v2, is_di2, c2) = decode_varint(buf, pos + consumed)?;
        if is_di2 {
            return Err(DecodeError);
        }
        *last_pi += v2 as i64;
        consumed += c2;
    } else {
        *last_pi += v1 as i64;
    }
    Ok((*last_di as u32, *last_pi as u32, consumed))
}
