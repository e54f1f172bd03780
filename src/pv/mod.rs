//! Position-vector codec (C2): per-term compressed, segmented, append-only
//! stream of `(document-id, position-id)` pairs.
//!
//! A [`PvStore`] is the shared backing byte arena for every term's PV in one
//! session — in the original this is one file descriptor shared for read
//! and append; here it's an in-memory arena that `persist` can flush to (or
//! load from) a real file. Each [`PositionVector`] owns an in-memory write
//! buffer plus a singly-linked chain of on-disk segments inside that arena.

pub mod codec;

use std::io::{self};

use crate::contracts;

const SIXTY_FOUR_KIB: usize = 64 * 1024;

/// Shared append-only byte arena backing every PV's flushed segments.
#[derive(Debug, Clone, Default)]
pub struct PvStore {
    bytes: Vec<u8>,
}

impl PvStore {
    pub fn new() -> Self {
        PvStore { bytes: Vec::new() }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        PvStore { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Appends `[size:i32][payload][next:i64=0]` at end-of-file and returns
    /// the offset of the segment's size header.
    fn append_segment(&mut self, payload: &[u8]) -> io::Result<u64> {
        let offset = self.bytes.len() as u64;
        let size = i32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "PV segment too large"))?;
        self.bytes.extend_from_slice(&size.to_be_bytes());
        self.bytes.extend_from_slice(payload);
        self.bytes.extend_from_slice(&0i64.to_be_bytes());
        Ok(offset)
    }

    /// Reads the payload and next-offset tailer of the segment at `offset`.
    fn read_segment(&self, offset: u64) -> io::Result<(&[u8], u64)> {
        let offset = offset as usize;
        if offset + 4 > self.bytes.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "PV segment header out of range"));
        }
        let size = i32::from_be_bytes(self.bytes[offset..offset + 4].try_into().unwrap());
        if size <= 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "PV segment has non-positive size"));
        }
        let size = size as usize;
        let payload_start = offset + 4;
        let payload_end = payload_start + size;
        let tailer_end = payload_end + 8;
        if tailer_end > self.bytes.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "PV segment truncated"));
        }
        let next = i64::from_be_bytes(self.bytes[payload_end..tailer_end].try_into().unwrap());
        if next < 0 || next as u64 > self.bytes.len() as u64 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "PV next-offset out of range"));
        }
        Ok((&self.bytes[payload_start..payload_end], next as u64))
    }

    /// Back-patches the `next-offset` tailer of the segment starting at
    /// `segment_offset` to point at `next_offset`.
    fn patch_next(&mut self, segment_offset: u64, next_offset: u64) -> io::Result<()> {
        let offset = segment_offset as usize;
        let size = i32::from_be_bytes(self.bytes[offset..offset + 4].try_into().unwrap()) as usize;
        let tailer_pos = offset + 4 + size;
        self.bytes[tailer_pos..tailer_pos + 8].copy_from_slice(&next_offset.to_be_bytes());
        Ok(())
    }
}

fn grow_capacity(buf: &mut Vec<u8>, additional: usize) {
    let needed = buf.len() + additional;
    if buf.capacity() >= needed {
        return;
    }
    let mut cap = buf.capacity().max(8);
    while cap < needed {
        if cap < SIXTY_FOUR_KIB {
            cap *= 2;
        } else {
            cap += SIXTY_FOUR_KIB;
        }
    }
    buf.reserve(cap - buf.len());
}

/// Per-term position-vector: an in-memory write buffer plus zero or more
/// flushed on-disk segments, and an independent read cursor.
#[derive(Debug, Clone, Default)]
pub struct PositionVector {
    write_buf: Vec<u8>,
    write_last_di: i64,
    write_last_pi: i64,
    first_segment: Option<u64>,
    last_segment: Option<u64>,

    read_seg: Option<u64>,
    read_pos_in_seg: usize,
    read_in_buffer: bool,
    read_buf_pos: usize,
    read_last_di: i64,
    read_last_pi: i64,
    last_returned: Option<(u32, u32)>,
    peek: Option<(u32, u32)>,
}

impl PositionVector {
    pub fn new() -> Self {
        let mut pv = PositionVector {
            write_last_di: -1,
            write_last_pi: -1,
            ..Default::default()
        };
        pv.rewind();
        pv
    }

    /// Number of bytes currently held in the unflushed write buffer — what
    /// the session's PV memory watermark tracks.
    pub fn buffered_bytes(&self) -> usize {
        self.write_buf.len()
    }

    pub fn has_segments(&self) -> bool {
        self.first_segment.is_some()
    }

    pub fn first_segment_offset(&self) -> Option<u64> {
        self.first_segment
    }

    /// Reconstructs a read-only position vector for a term whose segment
    /// chain already lives in `store`, anchored at `first_segment` (`None`
    /// for a term that was never flushed before persisting).
    pub fn from_persisted(first_segment: Option<u64>) -> Self {
        let mut pv = PositionVector { first_segment, last_segment: first_segment, ..Default::default() };
        pv.write_last_di = -1;
        pv.write_last_pi = -1;
        pv.rewind();
        pv
    }

    /// Appends `(di, pi)`. `di` must be non-decreasing across calls; when it
    /// advances, the position delta resets (§4.2).
    pub fn add_pair(&mut self, di: u32, pi: u32) {
        contracts::check_pv_order(self.write_last_di, self.write_last_pi, di, pi);
        grow_capacity(&mut self.write_buf, 10);
        codec::encode_pair(&mut self.write_buf, &mut self.write_last_di, &mut self.write_last_pi, di, pi);
    }

    /// Flushes the write buffer as a new segment in `store`, back-patching
    /// the previous segment's tailer. A no-op if the buffer is empty.
    pub fn flush(&mut self, store: &mut PvStore) -> io::Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        let new_offset = store.append_segment(&self.write_buf)?;
        if let Some(prev) = self.last_segment {
            store.patch_next(prev, new_offset)?;
        } else {
            self.first_segment = Some(new_offset);
        }
        self.last_segment = Some(new_offset);
        self.write_buf.clear();
        Ok(())
    }

    /// Resets the read cursor to the start of the first segment (or the
    /// start of the write buffer if this PV was never flushed).
    pub fn rewind(&mut self) {
        self.read_last_di = -1;
        self.read_last_pi = -1;
        self.peek = None;
        self.last_returned = None;
        self.read_pos_in_seg = 0;
        self.read_buf_pos = 0;
        if self.first_segment.is_some() {
            self.read_seg = self.first_segment;
            self.read_in_buffer = false;
        } else {
            self.read_seg = None;
            self.read_in_buffer = true;
        }
    }

    /// Reads the next `(di, pi)` pair, or `None` at end-of-stream.
    pub fn next(&mut self, store: &PvStore) -> io::Result<Option<(u32, u32)>> {
        if let Some(p) = self.peek.take() {
            self.last_returned = Some(p);
            return Ok(Some(p));
        }
        loop {
            if !self.read_in_buffer {
                match self.read_seg {
                    None => {
                        self.read_in_buffer = true;
                        self.read_buf_pos = 0;
                        continue;
                    }
                    Some(seg_off) => {
                        let (payload, next_off) = store.read_segment(seg_off)?;
                        if self.read_pos_in_seg >= payload.len() {
                            self.read_seg = if next_off == 0 { None } else { Some(next_off) };
                            self.read_pos_in_seg = 0;
                            continue;
                        }
                        let (di, pi, consumed) = codec::decode_pair(
                            payload,
                            self.read_pos_in_seg,
                            &mut self.read_last_di,
                            &mut self.read_last_pi,
                        )
                        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "corrupt PV segment payload"))?;
                        self.read_pos_in_seg += consumed;
                        self.last_returned = Some((di, pi));
                        return Ok(Some((di, pi)));
                    }
                }
            } else {
                if self.read_buf_pos >= self.write_buf.len() {
                    return Ok(None);
                }
                let (di, pi, consumed) = codec::decode_pair(
                    &self.write_buf,
                    self.read_buf_pos,
                    &mut self.read_last_di,
                    &mut self.read_last_pi,
                )
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "corrupt PV write buffer"))?;
                self.read_buf_pos += consumed;
                self.last_returned = Some((di, pi));
                return Ok(Some((di, pi)));
            }
        }
    }

    /// Pushes the last value returned by `next` back onto the cursor so the
    /// next `next` call returns it again. May not be called twice in a row
    /// without an intervening `next`.
    pub fn unnext(&mut self) {
        contracts::check_single_unnext(self.peek.is_some());
        if let Some(v) = self.last_returned {
            self.peek = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn read_all(pv: &mut PositionVector, store: &PvStore) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        while let Some(p) = pv.next(store).unwrap() {
            out.push(p);
        }
        out
    }

    #[test]
    fn scenario_d_single_flush_boundary() {
        let mut store = PvStore::new();
        let mut pv = PositionVector::new();
        let pairs = [(0u32, 0u32), (0, 1), (3, 0), (3, 2), (127, 0)];
        for (i, &(di, pi)) in pairs.iter().enumerate() {
            pv.add_pair(di, pi);
            if i == 2 {
                pv.flush(&mut store).unwrap();
            }
        }
        pv.rewind();
        let out = read_all(&mut pv, &store);
        assert_eq!(&out, &pairs);
    }

    #[test]
    fn rewind_is_idempotent() {
        let mut store = PvStore::new();
        let mut pv = PositionVector::new();
        for &(di, pi) in &[(0u32, 0u32), (1, 0), (2, 5)] {
            pv.add_pair(di, pi);
        }
        pv.flush(&mut store).unwrap();
        pv.rewind();
        let first = read_all(&mut pv, &store);
        pv.rewind();
        let second = read_all(&mut pv, &store);
        assert_eq!(first, second);
    }

    #[test]
    fn unnext_replays_the_same_pair() {
        let mut store = PvStore::new();
        let mut pv = PositionVector::new();
        pv.add_pair(0, 0);
        pv.add_pair(1, 0);
        pv.rewind();
        let a = pv.next(&store).unwrap().unwrap();
        pv.unnext();
        let a_again = pv.next(&store).unwrap().unwrap();
        let b = pv.next(&store).unwrap().unwrap();
        assert_eq!(a, a_again);
        assert_ne!(a, b);
    }

    #[test]
    fn unflushed_pv_reads_straight_from_buffer() {
        let store = PvStore::new();
        let mut pv = PositionVector::new();
        pv.add_pair(0, 0);
        pv.add_pair(0, 1);
        pv.rewind();
        assert_eq!(read_all(&mut pv, &store), vec![(0, 0), (0, 1)]);
    }

    proptest! {
        #[test]
        fn round_trip_across_arbitrary_flush_points(
            deltas in proptest::collection::vec((0u32..4, 0u32..10), 1..40),
            flush_after in proptest::collection::vec(any::<bool>(), 1..40),
        ) {
            let mut pairs = Vec::new();
            let mut di = 0u32;
            let mut pi = 0u32;
            for (ddi, dpi) in &deltas {
                if *ddi > 0 {
                    di += ddi;
                    pi = 0;
                }
                pi += dpi;
                pairs.push((di, pi));
            }
            let mut store = PvStore::new();
            let mut pv = PositionVector::new();
            for (i, &(d, p)) in pairs.iter().enumerate() {
                pv.add_pair(d, p);
                if flush_after.get(i).copied().unwrap_or(false) {
                    pv.flush(&mut store).unwrap();
                }
            }
            pv.flush(&mut store).unwrap();
            pv.rewind();
            let out = read_all(&mut pv, &store);
            prop_assert_eq!(out, pairs);
        }
    }
}
