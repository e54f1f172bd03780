//! Phrase / boolean query engine (C10): tokenizes a query string into
//! atoms, matches each against the PV store, and sweeps required/
//! preferred/forbidden streams into a ranked document list (§4.10).

use std::collections::HashMap;

use crate::barrel::Barrel;
use crate::dictionary::TermId;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomModifier {
    Required,
    Preferred,
    Forbidden,
}

/// One parsed query atom: a single term (`words.len() == 1`) or an ordered
/// phrase (`words.len() > 1`). Field scoping (`field:atom`) has already
/// been folded into each word as a `wordxxxfield` suffix, matching how a
/// field-aware indexer is expected to have interned the same terms.
#[derive(Debug, Clone)]
pub struct ParsedAtom {
    pub modifier: AtomModifier,
    pub words: Vec<String>,
}

/// Tokenizes `text` into atoms, honoring `+`/`-` prefixes, quoted phrases,
/// and `field:` prefixes. Stops (and reports `truncated = true`) once
/// `max_atoms` atoms have been collected, per the configured hard cap on
/// query atoms (§9).
pub fn parse_query(text: &str, max_atoms: usize) -> (Vec<ParsedAtom>, bool) {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    let mut atoms = Vec::new();
    let mut truncated = false;

    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        if atoms.len() >= max_atoms {
            truncated = true;
            break;
        }

        let modifier = match chars[i] {
            '+' => {
                i += 1;
                AtomModifier::Required
            }
            '-' => {
                i += 1;
                AtomModifier::Forbidden
            }
            _ => AtomModifier::Preferred,
        };

        let field_start = i;
        let mut j = i;
        while j < chars.len() && chars[j] != ':' && chars[j] != '"' && !chars[j].is_whitespace() {
            j += 1;
        }
        let field: Option<String> = if j < chars.len() && chars[j] == ':' {
            let f: String = chars[field_start..j].iter().collect();
            i = j + 1;
            Some(f)
        } else {
            None
        };

        let words: Vec<String> = if i < chars.len() && chars[i] == '"' {
            i += 1;
            let phrase_start = i;
            while i < chars.len() && chars[i] != '"' {
                i += 1;
            }
            let phrase: String = chars[phrase_start..i].iter().collect();
            if i < chars.len() {
                i += 1;
            }
            phrase.split_whitespace().map(str::to_string).collect()
        } else {
            let word_start = i;
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            vec![chars[word_start..i].iter().collect()]
        };
        if words.is_empty() || words.iter().all(String::is_empty) {
            continue;
        }

        let words = match &field {
            Some(f) => words.into_iter().map(|w| format!("{w}xxx{f}")).collect(),
            None => words,
        };
        atoms.push(ParsedAtom { modifier, words });
    }
    (atoms, truncated)
}

/// Resolves an atom's words to term ids via `lookup` (no interning — a
/// query never admits new vocabulary). An atom containing an
/// out-of-vocabulary word can never match and is dropped.
fn resolve_atom(session: &Session, atom: &ParsedAtom) -> Option<Vec<TermId>> {
    atom.words.iter().map(|w| session.dictionary.lookup(w)).collect()
}

/// `(doc → match count)` for a single term: walk its PV, grouping
/// consecutive identical `di`s (the PV only guarantees non-decreasing
/// `di`) into a per-document occurrence count.
fn term_doc_counts(session: &Session, term: TermId) -> HashMap<u32, u32> {
    let mut counts = HashMap::new();
    let Some(pv) = session.pv(term) else { return counts };
    let mut cursor = pv.clone();
    cursor.rewind();
    while let Ok(Some((di, _pi))) = cursor.next(&session.pv_store) {
        *counts.entry(di).or_insert(0) += 1;
    }
    counts
}

/// Ordered-phrase match via the streaming-max algorithm (§4.10): one read
/// cursor per query word, realigned against the furthest-advanced cursor's
/// `(di, pi − i)` key until every cursor agrees, at which point a phrase
/// occurrence is emitted and all cursors step.
fn phrase_doc_counts(session: &Session, terms: &[TermId]) -> HashMap<u32, u32> {
    let mut counts = HashMap::new();
    if terms.is_empty() {
        return counts;
    }
    let mut cursors: Vec<_> = terms
        .iter()
        .map(|&t| {
            let mut pv = session.pv(t).cloned().unwrap_or_default();
            pv.rewind();
            pv
        })
        .collect();
    let mut current: Vec<Option<(u32, u32)>> = cursors.iter_mut().map(|c| c.next(&session.pv_store).ok().flatten()).collect();
    if current.iter().any(Option::is_none) {
        return counts;
    }

    loop {
        let keyed: Vec<(u32, i64)> = current
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let (di, pi) = c.expect("checked non-empty above");
                (di, pi as i64 - i as i64)
            })
            .collect();
        let (max_di, max_key) = *keyed.iter().max().expect("at least one cursor");

        let mut all_aligned = true;
        for i in 0..terms.len() {
            loop {
                let (di, pi) = current[i].expect("checked non-empty above");
                let key = pi as i64 - i as i64;
                if (di, key) < (max_di, max_key) {
                    match cursors[i].next(&session.pv_store).unwrap_or(None) {
                        Some(p) => current[i] = Some(p),
                        None => return counts,
                    }
                } else {
                    break;
                }
            }
            let (di, pi) = current[i].expect("checked non-empty above");
            if (di, pi as i64 - i as i64) != (max_di, max_key) {
                all_aligned = false;
            }
        }

        if all_aligned {
            *counts.entry(max_di).or_insert(0) += 1;
            for i in 0..terms.len() {
                match cursors[i].next(&session.pv_store).unwrap_or(None) {
                    Some(p) => current[i] = Some(p),
                    None => return counts,
                }
            }
        }
    }
}

fn atom_doc_counts(session: &Session, terms: &[TermId]) -> HashMap<u32, u32> {
    if terms.len() == 1 {
        term_doc_counts(session, terms[0])
    } else {
        phrase_doc_counts(session, terms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    Raw,
    Log,
}

#[derive(Debug, Clone)]
pub struct QueryHit {
    pub doc: u32,
    pub score: f64,
    pub matching_words: Vec<String>,
}

/// Parses and executes `query_text` against `session`'s PV store, filtering
/// deleted documents (`word_count < 0` in `barrel`) and ranking by the
/// chosen scoring mode. Returns the ranked hits and whether the atom count
/// was truncated to `max_atoms`.
pub fn run_query(session: &Session, barrel: &Barrel, query_text: &str, max_atoms: usize, mode: ScoringMode) -> (Vec<QueryHit>, bool) {
    let (parsed, truncated) = parse_query(query_text, max_atoms);

    struct Resolved<'a> {
        atom: &'a ParsedAtom,
        counts: HashMap<u32, u32>,
    }
    let resolved: Vec<Resolved> = parsed
        .iter()
        .filter_map(|atom| resolve_atom(session, atom).map(|terms| Resolved { atom, counts: atom_doc_counts(session, &terms) }))
        .collect();

    let required: Vec<&Resolved> = resolved.iter().filter(|r| r.atom.modifier == AtomModifier::Required).collect();
    let preferred: Vec<&Resolved> = resolved.iter().filter(|r| r.atom.modifier == AtomModifier::Preferred).collect();
    let forbidden: Vec<&Resolved> = resolved.iter().filter(|r| r.atom.modifier == AtomModifier::Forbidden).collect();

    // An atom that failed to resolve (OOV word) and was Required makes the
    // whole query unsatisfiable — nothing can match a term that doesn't exist.
    if parsed.iter().any(|a| a.modifier == AtomModifier::Required) && required.len() < parsed.iter().filter(|a| a.modifier == AtomModifier::Required).count() {
        return (Vec::new(), truncated);
    }

    let mut candidates: std::collections::BTreeSet<u32> = std::collections::BTreeSet::new();
    for r in required.iter().chain(preferred.iter()) {
        candidates.extend(r.counts.keys().copied());
    }

    let total_candidates = candidates.len() as f64;
    let mut hits = Vec::new();
    for doc in candidates {
        if barrel.cdocs.get(doc as usize).map(|c| c.is_deleted()).unwrap_or(true) {
            continue;
        }
        if forbidden.iter().any(|r| r.counts.contains_key(&doc)) {
            continue;
        }
        if !required.iter().all(|r| r.counts.contains_key(&doc)) {
            continue;
        }

        let mut raw_count = 0u32;
        let mut matching_words = Vec::new();
        for r in required.iter().chain(preferred.iter()) {
            if let Some(&c) = r.counts.get(&doc) {
                raw_count += c;
                matching_words.extend(r.atom.words.iter().cloned());
            }
        }

        let score = match mode {
            ScoringMode::Raw => raw_count as f64,
            ScoringMode::Log => (1.0 + raw_count as f64).ln() / (5.0 + total_candidates).ln(),
        };
        hits.push(QueryHit { doc, score, matching_words });
    }

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    (hits, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::{Barrel, CDoc, ClassNames};
    use crate::config::SessionConfig;

    fn index_docs(session: &mut Session, docs: &[&str]) -> Barrel {
        let mut barrel = Barrel::new_document_barrel(ClassNames::default());
        for (i, text) in docs.iter().enumerate() {
            let doc_id = i as u32;
            let ids = session.lex_and_intern(text);
            for (pos, id) in ids.iter().enumerate() {
                session.pv_add_pair(*id, doc_id, pos as u32).unwrap();
            }
            let mut cdoc = CDoc::new(format!("doc{i}"), 0);
            cdoc.word_count = ids.len() as i64;
            barrel.push_document(cdoc);
        }
        session.flush_all().unwrap();
        barrel
    }

    #[test]
    fn parses_required_preferred_forbidden_and_phrase() {
        let (atoms, truncated) = parse_query(r#"+required -forbidden preferred "a phrase""#, 50);
        assert!(!truncated);
        assert_eq!(atoms.len(), 4);
        assert_eq!(atoms[0].modifier, AtomModifier::Required);
        assert_eq!(atoms[1].modifier, AtomModifier::Forbidden);
        assert_eq!(atoms[2].modifier, AtomModifier::Preferred);
        assert_eq!(atoms[3].words, vec!["a", "phrase"]);
    }

    #[test]
    fn atom_cap_truncates_and_signals() {
        let (atoms, truncated) = parse_query("a b c d e", 3);
        assert_eq!(atoms.len(), 3);
        assert!(truncated);
    }

    #[test]
    fn single_term_query_matches_containing_documents() {
        let mut session = Session::new(SessionConfig::default());
        let barrel = index_docs(&mut session, &["alpha beta", "gamma delta", "alpha gamma"]);
        let (hits, truncated) = run_query(&session, &barrel, "alpha", 50, ScoringMode::Raw);
        assert!(!truncated);
        let docs: Vec<u32> = hits.iter().map(|h| h.doc).collect();
        assert!(docs.contains(&0));
        assert!(docs.contains(&2));
        assert!(!docs.contains(&1));
    }

    #[test]
    fn phrase_query_requires_adjacency() {
        let mut session = Session::new(SessionConfig::default());
        let barrel = index_docs(&mut session, &["the quick brown fox", "quick the brown fox"]);
        let (hits, _) = run_query(&session, &barrel, r#""quick brown""#, 50, ScoringMode::Raw);
        let docs: Vec<u32> = hits.iter().map(|h| h.doc).collect();
        assert_eq!(docs, vec![0]);
    }

    #[test]
    fn required_atom_excludes_non_matching_documents() {
        let mut session = Session::new(SessionConfig::default());
        let barrel = index_docs(&mut session, &["alpha beta", "beta gamma"]);
        let (hits, _) = run_query(&session, &barrel, "+alpha beta", 50, ScoringMode::Raw);
        let docs: Vec<u32> = hits.iter().map(|h| h.doc).collect();
        assert_eq!(docs, vec![0]);
    }

    #[test]
    fn forbidden_atom_excludes_matching_documents() {
        let mut session = Session::new(SessionConfig::default());
        let barrel = index_docs(&mut session, &["alpha beta", "alpha gamma"]);
        let (hits, _) = run_query(&session, &barrel, "alpha -gamma", 50, ScoringMode::Raw);
        let docs: Vec<u32> = hits.iter().map(|h| h.doc).collect();
        assert_eq!(docs, vec![0]);
    }

    #[test]
    fn deleted_documents_are_filtered_out() {
        let mut session = Session::new(SessionConfig::default());
        let mut barrel = index_docs(&mut session, &["alpha beta"]);
        barrel.cdocs[0].word_count = -1;
        let (hits, _) = run_query(&session, &barrel, "alpha", 50, ScoringMode::Raw);
        assert!(hits.is_empty());
    }
}
