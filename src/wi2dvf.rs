//! Inverted index WI2DVF (C3): term id → document-vector, with lazy load,
//! hide/unhide, and bulk serialization.
//!
//! The original hides a term by sign-flipping its seek offset. Here the
//! offset table is an explicit [`Slot`] sum type — `Offset`/`Hidden`/
//! `NotPresent` — so hiding can't be confused with "never seen this term".
//! The *wire* format (§6) still writes hidden entries as a negated offset,
//! so an on-disk WI2DVF file stays byte-compatible with the original tool.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Read, Write};

use crate::contracts;
use crate::dictionary::TermId;

/// Logical state of one term's slot in the offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Offset(u64),
    Hidden(u64),
    NotPresent,
}

/// One `(document, count, weight)` entry in a document-vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DvEntry {
    pub doc: u32,
    pub count: u32,
    pub weight: f64,
}

/// A term's posting list: entries with strictly increasing document ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentVector {
    pub entries: Vec<DvEntry>,
}

impl DocumentVector {
    pub fn entry(&self, doc: u32) -> Option<&DvEntry> {
        self.entries
            .binary_search_by_key(&doc, |e| e.doc)
            .ok()
            .map(|i| &self.entries[i])
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.entries.len() * 16 + 4);
        buf.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for e in &self.entries {
            buf.extend_from_slice(&e.doc.to_be_bytes());
            buf.extend_from_slice(&e.count.to_be_bytes());
            buf.extend_from_slice(&e.weight.to_be_bytes());
        }
        buf
    }

    fn decode(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < 4 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated document vector"));
        }
        let n = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let mut entries = Vec::with_capacity(n);
        let mut pos = 4;
        for _ in 0..n {
            if pos + 16 > bytes.len() {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated document vector entry"));
            }
            let doc = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap());
            let count = u32::from_be_bytes(bytes[pos + 4..pos + 8].try_into().unwrap());
            let weight = f64::from_be_bytes(bytes[pos + 8..pos + 16].try_into().unwrap());
            entries.push(DvEntry { doc, count, weight });
            pos += 16;
        }
        Ok(DocumentVector { entries })
    }
}

enum State {
    Building { vectors: Vec<DocumentVector> },
    Loaded { raw: Vec<u8>, cache: RefCell<HashMap<u32, DocumentVector>> },
}

/// Term id → document-vector mapping built incrementally during indexing,
/// or loaded lazily from a persisted WI2DVF payload blob.
pub struct InvertedIndex {
    slots: Vec<Slot>,
    num_visible_terms: usize,
    state: State,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex {
            slots: Vec::new(),
            num_visible_terms: 0,
            state: State::Building { vectors: Vec::new() },
        }
    }

    fn ensure_slot(&mut self, term: TermId) {
        let idx = term.0 as usize;
        if self.slots.len() <= idx {
            self.slots.resize(idx + 1, Slot::NotPresent);
        }
        if let State::Building { vectors } = &mut self.state {
            if vectors.len() <= idx {
                vectors.resize(idx + 1, DocumentVector::default());
            }
        }
    }

    /// Appends or updates the document-vector entry for `(term, doc)`. If
    /// `doc` equals the current last entry's document id, increments its
    /// count and adds `weight`; otherwise appends a new strictly-increasing
    /// entry. Only valid while the index is in its building state.
    pub fn add(&mut self, term: TermId, doc: u32, count: u32, weight: f64) {
        self.ensure_slot(term);
        let idx = term.0 as usize;
        let first_time = self.slots[idx] == Slot::NotPresent;
        if first_time {
            self.slots[idx] = Slot::Offset(term.0 as u64);
            self.num_visible_terms += 1;
        }
        let State::Building { vectors } = &mut self.state else {
            panic!("InvertedIndex::add called on a loaded (read-only) index");
        };
        let dv = &mut vectors[idx];
        match dv.entries.last_mut() {
            Some(last) if last.doc == doc => {
                last.count += count;
                last.weight += weight;
            }
            Some(last) => {
                debug_assert!(doc > last.doc, "WI2DVF append out of di order for term {term}");
                dv.entries.push(DvEntry { doc, count, weight });
            }
            None => dv.entries.push(DvEntry { doc, count, weight }),
        }
        contracts::check_dv_sorted(&dv.entries.iter().map(|e| (e.doc, e.count, e.weight)).collect::<Vec<_>>());
    }

    /// Binary-searches the term's document-vector for `doc`.
    pub fn entry(&self, term: TermId, doc: u32) -> Option<DvEntry> {
        self.document_vector(term).and_then(|dv| dv.entry(doc).copied())
    }

    /// Returns the (possibly lazily-decoded) document-vector for `term`, if
    /// visible or hidden. `None` for a term that was never added.
    pub fn document_vector(&self, term: TermId) -> Option<DocumentVector> {
        let idx = term.0 as usize;
        let slot = *self.slots.get(idx)?;
        let offset = match slot {
            Slot::NotPresent => return None,
            Slot::Offset(o) | Slot::Hidden(o) => o,
        };
        match &self.state {
            State::Building { vectors } => vectors.get(idx).cloned(),
            State::Loaded { raw, cache } => {
                if let Some(dv) = cache.borrow().get(&(offset as u32)) {
                    return Some(dv.clone());
                }
                let payload = self.loaded_payload_at(raw, offset).ok()?;
                let dv = DocumentVector::decode(payload).ok()?;
                cache.borrow_mut().insert(offset as u32, dv.clone());
                Some(dv)
            }
        }
    }

    fn loaded_payload_at<'a>(&self, raw: &'a [u8], offset: u64) -> io::Result<&'a [u8]> {
        let offset = offset as usize;
        if offset + 4 > raw.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "WI2DVF payload offset out of range"));
        }
        let len = u32::from_be_bytes(raw[offset..offset + 4].try_into().unwrap()) as usize;
        let end = offset + 4 + len * 16;
        if end > raw.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "WI2DVF payload truncated"));
        }
        Ok(&raw[offset..end])
    }

    pub fn num_visible_terms(&self) -> usize {
        self.num_visible_terms
    }

    pub fn hide(&mut self, term: TermId) {
        let idx = term.0 as usize;
        if let Some(Slot::Offset(o)) = self.slots.get(idx).copied() {
            self.slots[idx] = Slot::Hidden(o);
            self.num_visible_terms -= 1;
        }
    }

    pub fn unhide(&mut self, term: TermId) {
        let idx = term.0 as usize;
        if let Some(Slot::Hidden(o)) = self.slots.get(idx).copied() {
            self.slots[idx] = Slot::Offset(o);
            self.num_visible_terms += 1;
        }
    }

    pub fn unhide_all(&mut self) {
        for slot in &mut self.slots {
            if let Slot::Hidden(o) = *slot {
                *slot = Slot::Offset(o);
                self.num_visible_terms += 1;
            }
        }
    }

    pub fn is_hidden(&self, term: TermId) -> bool {
        matches!(self.slots.get(term.0 as usize), Some(Slot::Hidden(_)))
    }

    pub fn is_visible(&self, term: TermId) -> bool {
        matches!(self.slots.get(term.0 as usize), Some(Slot::Offset(_)))
    }

    /// Hides every term whose document-vector length exceeds `max_doc_count`.
    pub fn hide_by_doc_count(&mut self, max_doc_count: usize) {
        let ids: Vec<TermId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Slot::Offset(_)))
            .map(|(i, _)| TermId(i as u32))
            .collect();
        for id in ids {
            if let Some(dv) = self.document_vector(id) {
                if dv.entries.len() > max_doc_count {
                    self.hide(id);
                }
            }
        }
    }

    /// Hides every visible term for which `keep` returns `false`.
    pub fn hide_unless(&mut self, mut keep: impl FnMut(TermId) -> bool) {
        let ids: Vec<TermId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Slot::Offset(_)))
            .map(|(i, _)| TermId(i as u32))
            .collect();
        for id in ids {
            if !keep(id) {
                self.hide(id);
            }
        }
    }

    /// Serializes: count `V`, then `V` seek offsets (negative/hidden encoded
    /// per the original wire format), then payloads in term-id order.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        let State::Building { vectors } = &self.state else {
            return Err(io::Error::new(io::ErrorKind::Other, "can only serialize a building index"));
        };
        let v = self.slots.len();
        w.write_all(&(v as u32).to_be_bytes())?;

        let mut payloads = Vec::with_capacity(v);
        let mut running = 0u64;
        let mut offsets = Vec::with_capacity(v);
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::NotPresent => offsets.push(None),
                Slot::Offset(_) | Slot::Hidden(_) => {
                    let encoded = vectors[i].encode();
                    let off = running;
                    running += encoded.len() as u64;
                    payloads.push(encoded);
                    offsets.push(Some((off, matches!(slot, Slot::Hidden(_)))));
                }
            }
        }
        for off in &offsets {
            let wire: i64 = match off {
                None => i64::MIN,
                Some((o, hidden)) => {
                    let signed = *o as i64 + 1; // avoid colliding offset 0 with "hidden 0"
                    if *hidden { -signed } else { signed }
                }
            };
            w.write_all(&wire.to_be_bytes())?;
        }
        for p in &payloads {
            w.write_all(p)?;
        }
        Ok(())
    }

    /// Reads a serialized WI2DVF: populates the offset table eagerly but
    /// defers document-vector decoding to the first `entry()`/
    /// `document_vector()` call for that term.
    pub fn read_from<R: Read>(mut r: R) -> io::Result<Self> {
        let mut header = [0u8; 4];
        r.read_exact(&mut header)?;
        let v = u32::from_be_bytes(header) as usize;
        let mut wire_offsets = Vec::with_capacity(v);
        for _ in 0..v {
            let mut b = [0u8; 8];
            r.read_exact(&mut b)?;
            wire_offsets.push(i64::from_be_bytes(b));
        }
        let mut raw = Vec::new();
        r.read_to_end(&mut raw)?;

        let mut slots = Vec::with_capacity(v);
        let mut num_visible = 0;
        for wire in wire_offsets {
            let slot = if wire == i64::MIN {
                Slot::NotPresent
            } else if wire < 0 {
                Slot::Hidden((-wire - 1) as u64)
            } else {
                num_visible += 1;
                Slot::Offset((wire - 1) as u64)
            };
            slots.push(slot);
        }
        Ok(InvertedIndex {
            slots,
            num_visible_terms: num_visible,
            state: State::Loaded { raw, cache: RefCell::new(HashMap::new()) },
        })
    }

    pub fn iter_visible(&self) -> impl Iterator<Item = TermId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Slot::Offset(_)))
            .map(|(i, _)| TermId(i as u32))
    }
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_merges_repeated_doc_and_appends_new() {
        let mut idx = InvertedIndex::new();
        idx.add(TermId(0), 1, 1, 1.0);
        idx.add(TermId(0), 1, 1, 1.0);
        idx.add(TermId(0), 2, 1, 1.0);
        let dv = idx.document_vector(TermId(0)).unwrap();
        assert_eq!(dv.entries, vec![
            DvEntry { doc: 1, count: 2, weight: 2.0 },
            DvEntry { doc: 2, count: 1, weight: 1.0 },
        ]);
    }

    #[test]
    fn hide_unhide_is_involution() {
        let mut idx = InvertedIndex::new();
        idx.add(TermId(0), 1, 1, 1.0);
        let before = idx.entry(TermId(0), 1);
        idx.hide(TermId(0));
        assert!(idx.is_hidden(TermId(0)));
        assert_eq!(idx.num_visible_terms(), 0);
        idx.unhide(TermId(0));
        let after = idx.entry(TermId(0), 1);
        assert_eq!(before, after);
        assert_eq!(idx.num_visible_terms(), 1);
    }

    #[test]
    fn round_trips_through_persisted_bytes_with_hidden_term() {
        let mut idx = InvertedIndex::new();
        idx.add(TermId(0), 1, 2, 0.5);
        idx.add(TermId(1), 3, 1, 1.5);
        idx.hide(TermId(1));
        let mut buf = Vec::new();
        idx.write_to(&mut buf).unwrap();
        let loaded = InvertedIndex::read_from(&buf[..]).unwrap();
        assert!(loaded.is_hidden(TermId(1)));
        assert!(loaded.is_visible(TermId(0)));
        assert_eq!(loaded.entry(TermId(0), 1).unwrap().count, 2);
        assert_eq!(loaded.document_vector(TermId(1)).unwrap().entries[0].doc, 3);
    }
}
