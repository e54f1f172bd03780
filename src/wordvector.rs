//! Query vector (WV): a sparse `(term, count, weight)` representation of one
//! query or document, with strictly increasing term ids and a normalizer.

use std::collections::BTreeMap;

use crate::dictionary::TermId;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WvEntry {
    pub term: TermId,
    pub count: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordVector {
    pub entries: Vec<WvEntry>,
    pub normalizer: f64,
}

impl WordVector {
    pub fn from_term_ids(term_ids: impl IntoIterator<Item = TermId>) -> Self {
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for id in term_ids {
            if id.is_unknown() {
                continue;
            }
            *counts.entry(id.0).or_insert(0) += 1;
        }
        let entries = counts
            .into_iter()
            .map(|(id, count)| WvEntry { term: TermId(id), count, weight: count as f64 })
            .collect();
        WordVector { entries, normalizer: 1.0 }
    }

    /// Lexes `text` with `session`'s lexer and interns each term, building a
    /// word vector. Unknown-vocabulary terms (frozen dictionary, no bucket)
    /// are dropped rather than counted.
    pub fn from_text(session: &mut Session, text: &str) -> Self {
        let ids: Vec<TermId> = session.lex_and_intern(text);
        Self::from_term_ids(ids)
    }

    pub fn get(&self, term: TermId) -> Option<&WvEntry> {
        self.entries.binary_search_by_key(&term.0, |e| e.term.0).ok().map(|i| &self.entries[i])
    }

    pub fn l2_normalize(&mut self) {
        let norm: f64 = self.entries.iter().map(|e| e.weight * e.weight).sum::<f64>().sqrt();
        if norm > 0.0 {
            for e in &mut self.entries {
                e.weight /= norm;
            }
        }
        self.normalizer = norm;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_repeated_terms_in_id_order() {
        let wv = WordVector::from_term_ids([TermId(3), TermId(1), TermId(3), TermId(2)]);
        assert_eq!(
            wv.entries.iter().map(|e| (e.term.0, e.count)).collect::<Vec<_>>(),
            vec![(1, 1), (2, 1), (3, 2)]
        );
    }

    #[test]
    fn unknown_terms_are_dropped() {
        let wv = WordVector::from_term_ids([TermId(1), TermId::UNKNOWN]);
        assert_eq!(wv.entries.len(), 1);
    }

    #[test]
    fn l2_normalize_scales_to_unit_length() {
        let mut wv = WordVector {
            entries: vec![
                WvEntry { term: TermId(0), count: 1, weight: 3.0 },
                WvEntry { term: TermId(1), count: 1, weight: 4.0 },
            ],
            normalizer: 1.0,
        };
        wv.l2_normalize();
        let norm: f64 = wv.entries.iter().map(|e| e.weight * e.weight).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }
}
