//! Explicit session (C12): replaces the original's process-wide globals
//! (term dictionary, default lexer pointer, PV memory watermark) with one
//! value threaded through every operation (§9 design notes).

use std::collections::HashMap;

use crate::config::SessionConfig;
use crate::dictionary::{Dictionary, TermId};
use crate::lexer::{Lexer, SimpleLexer};
use crate::pv::{PositionVector, PvStore};

/// Owns the term dictionary, the shared PV backing store, one
/// [`PositionVector`] per term that has been written to, and the
/// configuration governing admission/smoothing/splitting for this session.
pub struct Session {
    pub dictionary: Dictionary,
    pub pv_store: PvStore,
    pvs: HashMap<u32, PositionVector>,
    pub config: SessionConfig,
    lexer: Box<dyn Lexer + Send + Sync>,
    buffered_bytes: u64,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let dictionary = Dictionary::new(config.reserve_unknown_bucket);
        Session {
            dictionary,
            pv_store: PvStore::new(),
            pvs: HashMap::new(),
            config,
            lexer: Box::new(SimpleLexer::new()),
            buffered_bytes: 0,
        }
    }

    pub fn with_lexer(mut self, lexer: Box<dyn Lexer + Send + Sync>) -> Self {
        self.lexer = lexer;
        self
    }

    /// Lexes `text`, interning and recording occurrence of each term.
    /// Returns the term ids in document order (duplicates included,
    /// `TermId::UNKNOWN` included for out-of-vocabulary tokens under a
    /// frozen dictionary with no unknown bucket).
    pub fn lex_and_intern(&mut self, text: &str) -> Vec<TermId> {
        let tokens = self.lexer.lex(text);
        let mut ids = Vec::with_capacity(tokens.len());
        for (term, _pos) in tokens {
            let id = self.dictionary.intern(&term);
            if !id.is_unknown() {
                self.dictionary.record_occurrence(id);
            }
            ids.push(id);
        }
        ids
    }

    /// Appends `(doc, pos)` to `term`'s position-vector, flushing it (and
    /// dropping its contribution from the watermark) immediately if doing
    /// so would push total buffered PV bytes over the configured watermark.
    pub fn pv_add_pair(&mut self, term: TermId, doc: u32, pos: u32) -> std::io::Result<()> {
        let pv = self.pvs.entry(term.0).or_insert_with(PositionVector::new);
        let before = pv.buffered_bytes() as u64;
        pv.add_pair(doc, pos);
        let after = pv.buffered_bytes() as u64;
        self.buffered_bytes += after - before;
        if self.buffered_bytes > self.config.pv_watermark_bytes {
            self.flush_pv(term)?;
        }
        Ok(())
    }

    fn flush_pv(&mut self, term: TermId) -> std::io::Result<()> {
        if let Some(pv) = self.pvs.get_mut(&term.0) {
            let before = pv.buffered_bytes() as u64;
            pv.flush(&mut self.pv_store)?;
            self.buffered_bytes -= before;
        }
        Ok(())
    }

    /// Flushes every PV with a non-empty write buffer. Called at the end of
    /// an indexing session before serializing the inverted index.
    pub fn flush_all(&mut self) -> std::io::Result<()> {
        let ids: Vec<u32> = self.pvs.keys().copied().collect();
        for id in ids {
            self.flush_pv(TermId(id))?;
        }
        Ok(())
    }

    pub fn pv(&self, term: TermId) -> Option<&PositionVector> {
        self.pvs.get(&term.0)
    }

    pub fn pv_mut(&mut self, term: TermId) -> &mut PositionVector {
        self.pvs.entry(term.0).or_insert_with(PositionVector::new)
    }

    pub fn buffered_bytes(&self) -> u64 {
        self.buffered_bytes
    }

    /// Every term with a position vector, and its segment-chain head
    /// offset — the handle `persist` needs to reconstruct read-only
    /// cursors after a reload (call `flush_all` first).
    pub fn pv_first_segments(&self) -> impl Iterator<Item = (TermId, Option<u64>)> + '_ {
        self.pvs.iter().map(|(&id, pv)| (TermId(id), pv.first_segment_offset()))
    }

    /// Rebuilds a session's PV cursors from a loaded store and a
    /// `term → first-segment-offset` table (as written by `persist`).
    pub fn restore_pvs(&mut self, offsets: impl IntoIterator<Item = (TermId, Option<u64>)>) {
        for (term, offset) in offsets {
            self.pvs.insert(term.0, PositionVector::from_persisted(offset));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_and_intern_assigns_stable_ids() {
        let mut session = Session::new(SessionConfig::default());
        let ids = session.lex_and_intern("alpha beta alpha");
        assert_eq!(ids[0], ids[2]);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(session.dictionary.occurrence(ids[0]), 2);
    }

    #[test]
    fn small_watermark_forces_immediate_flush() {
        let mut config = SessionConfig::default();
        config.pv_watermark_bytes = 1;
        let mut session = Session::new(config);
        let term = session.dictionary.intern("alpha");
        session.pv_add_pair(term, 0, 0).unwrap();
        session.pv_add_pair(term, 1, 0).unwrap();
        assert!(session.pv(term).unwrap().has_segments());
    }
}
