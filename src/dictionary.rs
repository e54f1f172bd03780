//! Term dictionary (C1): a bijection between term strings and dense ids.
//!
//! Lookup and insertion go through a plain [`std::collections::HashMap`]
//! rather than a hand-rolled open-addressed table — id assignment is by
//! insertion order and doesn't depend on hash bucket placement. The
//! original's `131*h+byte` hash and prime-capacity linear-probe sequence is
//! preserved separately as [`term_hash`]/[`probe_sequence`] purely for
//! on-disk compatibility: anything that needs to replay the exact collision
//! order a foreign-written dictionary file would have produced (diagnostic
//! tools, cross-checking an old index) can still do so.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

use crate::contracts;

/// A dense term id. `u32::MAX` is reserved as the "unknown term" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(pub u32);

impl TermId {
    pub const UNKNOWN: TermId = TermId(u32::MAX);

    pub fn is_unknown(self) -> bool {
        self == TermId::UNKNOWN
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const MAGIC: &[u8] = b"CVDICT1\n";

#[derive(Debug, Clone)]
pub struct Dictionary {
    terms: Vec<String>,
    by_term: HashMap<String, TermId>,
    occurrences: Vec<u64>,
    unk_bucket: bool,
    frozen: bool,
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Dictionary {
    pub fn new(reserve_unknown_bucket: bool) -> Self {
        let mut dict = Dictionary {
            terms: Vec::new(),
            by_term: HashMap::new(),
            occurrences: Vec::new(),
            unk_bucket: reserve_unknown_bucket,
            frozen: false,
        };
        if reserve_unknown_bucket {
            dict.force_insert("<unk>");
        }
        dict
    }

    fn force_insert(&mut self, term: &str) -> TermId {
        let id = TermId(self.terms.len() as u32);
        self.terms.push(term.to_string());
        self.by_term.insert(term.to_string(), id);
        self.occurrences.push(0);
        id
    }

    /// Look up a term without mutating the dictionary.
    pub fn lookup(&self, term: &str) -> Option<TermId> {
        self.by_term.get(term).copied()
    }

    /// Intern a term, allocating a new id if absent and admission is
    /// enabled. If frozen and absent, returns the unknown-word bucket id
    /// (id 0) when reserved, otherwise [`TermId::UNKNOWN`].
    pub fn intern(&mut self, term: &str) -> TermId {
        if let Some(id) = self.by_term.get(term) {
            return *id;
        }
        if self.frozen {
            return if self.unk_bucket {
                TermId(0)
            } else {
                TermId::UNKNOWN
            };
        }
        self.force_insert(term)
    }

    /// Increment a term's corpus occurrence counter. Kept separate from
    /// `intern` so repeated lookups of an already-seen term don't inflate
    /// its count.
    pub fn record_occurrence(&mut self, id: TermId) {
        if let Some(slot) = self.occurrences.get_mut(id.0 as usize) {
            *slot += 1;
        }
    }

    pub fn occurrence(&self, id: TermId) -> u64 {
        self.occurrences.get(id.0 as usize).copied().unwrap_or(0)
    }

    pub fn name(&self, id: TermId) -> Option<&str> {
        self.terms.get(id.0 as usize).map(String::as_str)
    }

    pub fn size(&self) -> usize {
        self.terms.len()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Disable admission of new terms (queries against a frozen vocabulary).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn iter(&self) -> impl Iterator<Item = (TermId, &str, u64)> {
        self.terms
            .iter()
            .enumerate()
            .map(move |(i, t)| (TermId(i as u32), t.as_str(), self.occurrences[i]))
    }

    /// Produce a new dictionary containing only terms with occurrence count
    /// `>= min_count`, plus a remap table from old ids to new ids (`None`
    /// for dropped terms). Downstream components (PV, WI2DVF, barrel) must
    /// rebuild using this remap since ids change.
    pub fn prune_below(&self, min_count: u64) -> (Dictionary, Vec<Option<TermId>>) {
        let mut new_dict = Dictionary::new(self.unk_bucket);
        let mut remap = vec![None; self.terms.len()];
        let start = if self.unk_bucket { 1 } else { 0 };
        if self.unk_bucket {
            remap[0] = Some(TermId(0));
        }
        for i in start..self.terms.len() {
            if self.occurrences[i] >= min_count {
                let new_id = new_dict.force_insert(&self.terms[i]);
                new_dict.occurrences[new_id.0 as usize] = self.occurrences[i];
                remap[i] = Some(new_id);
            }
        }
        (new_dict, remap)
    }

    /// Write the persisted format: magic header, `V`, `V` newline-separated
    /// terms, then `V` occurrence counts as fixed-width 32-bit big-endian
    /// integers (§6).
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(format!("{}\n", self.terms.len()).as_bytes())?;
        for term in &self.terms {
            w.write_all(term.as_bytes())?;
            w.write_all(b"\n")?;
        }
        for &count in &self.occurrences {
            let capped = u32::try_from(count).unwrap_or(u32::MAX);
            w.write_all(&capped.to_be_bytes())?;
        }
        Ok(())
    }

    pub fn read_from<R: io::Read>(mut r: R) -> io::Result<Self> {
        let mut all = Vec::new();
        r.read_to_end(&mut all)?;
        if !all.starts_with(MAGIC) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad dictionary magic"));
        }
        let mut pos = MAGIC.len();
        let nl = all[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing term count"))?;
        let count_str = std::str::from_utf8(&all[pos..pos + nl])
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad term count"))?;
        let count: usize = count_str
            .trim()
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad term count"))?;
        pos += nl + 1;

        let mut dict = Dictionary {
            terms: Vec::with_capacity(count),
            by_term: HashMap::with_capacity(count),
            occurrences: Vec::with_capacity(count),
            unk_bucket: false,
            frozen: false,
        };
        for _ in 0..count {
            let nl = all[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated terms"))?;
            let term = std::str::from_utf8(&all[pos..pos + nl])
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-utf8 term"))?
                .to_string();
            pos += nl + 1;
            let id = TermId(dict.terms.len() as u32);
            dict.by_term.insert(term.clone(), id);
            dict.terms.push(term);
            dict.occurrences.push(0);
        }
        for i in 0..count {
            if pos + 4 > all.len() {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated counts"));
            }
            let bytes: [u8; 4] = all[pos..pos + 4].try_into().unwrap();
            dict.occurrences[i] = u32::from_be_bytes(bytes) as u64;
            pos += 4;
        }
        dict.unk_bucket = dict.terms.first().map(|s| s == "<unk>").unwrap_or(false);
        Ok(dict)
    }
}

/// The original's `131*h+byte` hash over term bytes.
pub fn term_hash(term: &str) -> u64 {
    let mut h: u64 = 0;
    for &b in term.as_bytes() {
        h = h.wrapping_mul(131).wrapping_add(u64::from(b));
    }
    h
}

/// Smallest prime strictly greater than `n`.
pub fn next_prime_above(n: u64) -> u64 {
    let mut candidate = n + 1 + (n % 2 == 0) as u64;
    if candidate < 3 {
        candidate = 3;
    }
    loop {
        if is_prime(candidate) {
            return candidate;
        }
        candidate += 2;
    }
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Table capacity for a dictionary of `v` live terms: next prime above
/// `2*v`, growing from a doubling regime to flat 64 KiB-slot increments once
/// the table passes that size (mirrors the original's growth invariant; the
/// capacity value itself is informational here since we store terms in a
/// `HashMap`, not this table).
pub fn table_capacity_for(v: usize) -> u64 {
    let min = 2 * v as u64;
    const SIXTY_FOUR_KIB_SLOTS: u64 = 64 * 1024;
    let mut cap = 8u64;
    while cap < min {
        if cap < SIXTY_FOUR_KIB_SLOTS {
            cap *= 2;
        } else {
            cap += SIXTY_FOUR_KIB_SLOTS;
        }
    }
    next_prime_above(cap)
}

/// Replays the exact linear-probe sequence the original table would walk
/// for `term` against a table of capacity `cap`: first the hash-derived
/// starting slot, then each subsequent slot stepping by `1 + (h mod (cap-1))`.
pub fn probe_sequence(term: &str, cap: u64) -> impl Iterator<Item = u64> {
    let h = term_hash(term);
    let start = h % cap;
    let step = 1 + (h % (cap - 1));
    (0..cap).map(move |i| (start + i * step) % cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bijection_holds() {
        let mut dict = Dictionary::default();
        let words = ["alpha", "beta", "gamma", "alpha", "delta"];
        let mut ids = Vec::new();
        for w in words {
            ids.push(dict.intern(w));
        }
        assert_eq!(ids[0], ids[3]);
        for (w, id) in words.iter().zip(&ids) {
            assert_eq!(dict.name(*id).unwrap(), *w);
        }
        for i in 0..dict.size() as u32 {
            let name = dict.name(TermId(i)).unwrap().to_string();
            assert_eq!(dict.intern(&name), TermId(i));
        }
    }

    #[test]
    fn frozen_dictionary_returns_unknown() {
        let mut dict = Dictionary::default();
        dict.intern("alpha");
        dict.freeze();
        assert_eq!(dict.intern("never-seen"), TermId::UNKNOWN);
        assert_eq!(dict.intern("alpha"), TermId(0));
    }

    #[test]
    fn frozen_with_unk_bucket_routes_to_bucket() {
        let mut dict = Dictionary::new(true);
        dict.intern("alpha");
        dict.freeze();
        assert_eq!(dict.intern("never-seen"), TermId(0));
    }

    #[test]
    fn occurrence_counts_are_separate_from_lookups() {
        let mut dict = Dictionary::default();
        let id = dict.intern("alpha");
        dict.record_occurrence(id);
        dict.record_occurrence(id);
        let _ = dict.lookup("alpha");
        let _ = dict.lookup("alpha");
        assert_eq!(dict.occurrence(id), 2);
    }

    #[test]
    fn prune_below_remaps_surviving_ids() {
        let mut dict = Dictionary::default();
        let a = dict.intern("alpha");
        let b = dict.intern("beta");
        dict.record_occurrence(a);
        dict.record_occurrence(a);
        dict.record_occurrence(b);
        let (pruned, remap) = dict.prune_below(2);
        assert_eq!(remap[b.0 as usize], None);
        let new_a = remap[a.0 as usize].unwrap();
        assert_eq!(pruned.name(new_a).unwrap(), "alpha");
        assert_eq!(pruned.size(), 1);
    }

    #[test]
    fn round_trips_through_persisted_bytes() {
        let mut dict = Dictionary::default();
        let a = dict.intern("alpha");
        let b = dict.intern("beta");
        dict.record_occurrence(a);
        dict.record_occurrence(b);
        dict.record_occurrence(b);
        let mut buf = Vec::new();
        dict.write_to(&mut buf).unwrap();
        let back = Dictionary::read_from(&buf[..]).unwrap();
        assert_eq!(back.size(), 2);
        assert_eq!(back.occurrence(a), 1);
        assert_eq!(back.occurrence(b), 2);
    }

    #[test]
    fn probe_sequence_visits_every_slot_once() {
        let cap = next_prime_above(16);
        let seq: Vec<u64> = probe_sequence("hello", cap).collect();
        let mut sorted = seq.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), cap as usize);
    }
}
