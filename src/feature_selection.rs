//! Feature selection (C9): information gain, foil gain, and odds ratio over
//! contingency tables built from a document barrel, plus top-N selection
//! by dictionary rewrite or WI2DVF hiding (§4.9).

use std::collections::HashMap;

use crate::barrel::{Barrel, Tag};
use crate::config::EventModel;
use crate::dictionary::{Dictionary, TermId};
use crate::wi2dvf::InvertedIndex;

fn entropy(probs: impl Iterator<Item = f64>) -> f64 {
    -probs.filter(|&p| p > 0.0).map(|p| p * p.log2()).sum::<f64>()
}

/// Per-term, per-class event counts under a chosen event model: `n_wc[c]` is
/// either a document count (how many class-`c` documents contain the term)
/// or a raw token count, and `n_c[c]` is the matching class total.
struct ContingencyTables {
    num_classes: usize,
    n_c: Vec<f64>,
    n_total: f64,
}

impl ContingencyTables {
    fn build(barrel: &Barrel, model: EventModel) -> Self {
        let num_classes = barrel.num_classes();
        let mut n_c = vec![0.0; num_classes];
        for (_, cdoc) in barrel.docs_with_tag(Tag::Train) {
            match model {
                EventModel::Document | EventModel::DocumentThenWord => n_c[cdoc.class as usize] += 1.0,
                EventModel::Word => n_c[cdoc.class as usize] += cdoc.word_count.max(0) as f64,
            }
        }
        let n_total = n_c.iter().sum();
        ContingencyTables { num_classes, n_c, n_total }
    }

    /// `n_wc[c]` for `term`: document-count-containing-term under the
    /// document event model, raw token count under the word event model.
    fn n_wc(&self, barrel: &Barrel, term: TermId, model: EventModel) -> Vec<f64> {
        let mut out = vec![0.0; self.num_classes];
        let dv = match barrel.index.document_vector(term) {
            Some(dv) => dv,
            None => return out,
        };
        for entry in &dv.entries {
            let cdoc = match barrel.cdocs.get(entry.doc as usize) {
                Some(c) if c.tag == Tag::Train => c,
                _ => continue,
            };
            match model {
                EventModel::Document | EventModel::DocumentThenWord => out[cdoc.class as usize] += 1.0,
                EventModel::Word => out[cdoc.class as usize] += entry.count as f64,
            }
        }
        out
    }
}

/// `IG(w) = H(C) − P(w)·H(C|w) − P(¬w)·H(C|¬w)` (§4.9). One score per
/// visible term in `barrel`'s document index.
pub fn information_gain(barrel: &Barrel, model: EventModel) -> HashMap<u32, f64> {
    let tables = ContingencyTables::build(barrel, model);
    if tables.n_total <= 0.0 {
        return HashMap::new();
    }
    let h_c = entropy(tables.n_c.iter().map(|&n| n / tables.n_total));

    let mut scores = HashMap::new();
    for term in barrel.index.iter_visible() {
        let n_wc = tables.n_wc(barrel, term, model);
        let n_w: f64 = n_wc.iter().sum();
        let n_not_w = tables.n_total - n_w;
        let p_w = n_w / tables.n_total;
        let p_not_w = 1.0 - p_w;

        let h_c_given_w = if n_w > 0.0 {
            entropy(n_wc.iter().map(|&c| c / n_w))
        } else {
            0.0
        };
        let h_c_given_not_w = if n_not_w > 0.0 {
            entropy(tables.n_c.iter().zip(&n_wc).map(|(&nc, &nwc)| (nc - nwc) / n_not_w))
        } else {
            0.0
        };

        let ig = h_c - p_w * h_c_given_w - p_not_w * h_c_given_not_w;
        scores.insert(term.0, ig);
    }
    scores
}

/// One-vs-rest FOIL gain per term, taking the best (maximum) gain across
/// classes: `t·(log2(p1/(p1+n1)) − log2(p0/(p0+n0)))` where `p`/`n` count
/// positive-class/negative-class events with and without the term.
pub fn foil_gain(barrel: &Barrel, model: EventModel) -> HashMap<u32, f64> {
    let tables = ContingencyTables::build(barrel, model);
    if tables.num_classes == 0 {
        return HashMap::new();
    }
    let mut scores = HashMap::new();
    for term in barrel.index.iter_visible() {
        let n_wc = tables.n_wc(barrel, term, model);
        let mut best = f64::NEG_INFINITY;
        for c in 0..tables.num_classes {
            let p0 = tables.n_c[c];
            let n0: f64 = tables.n_total - p0;
            let p1 = n_wc[c];
            let n1: f64 = n_wc.iter().sum::<f64>() - p1;
            if p0 <= 0.0 || n0 <= 0.0 || p1 + n1 <= 0.0 {
                continue;
            }
            let before = (p0 / (p0 + n0)).log2();
            let after = (p1 / (p1 + n1)).log2();
            let gain = p1 * (after - before);
            if gain > best {
                best = gain;
            }
        }
        scores.insert(term.0, if best.is_finite() { best } else { 0.0 });
    }
    scores
}

/// One-vs-rest odds ratio per term, `ln((a·d)/(b·c))` over the 2×2
/// present/absent × class/not-class table, maximized across classes.
pub fn odds_ratio(barrel: &Barrel, model: EventModel) -> HashMap<u32, f64> {
    let tables = ContingencyTables::build(barrel, model);
    let mut scores = HashMap::new();
    for term in barrel.index.iter_visible() {
        let n_wc = tables.n_wc(barrel, term, model);
        let n_w: f64 = n_wc.iter().sum();
        let mut best = f64::NEG_INFINITY;
        for c in 0..tables.num_classes {
            let a = n_wc[c].max(0.5);
            let b = (n_w - n_wc[c]).max(0.5);
            let d = (tables.n_c[c] - n_wc[c]).max(0.5);
            let e = (tables.n_total - tables.n_c[c] - (n_w - n_wc[c])).max(0.5);
            let ratio = ((a * e) / (b * d)).ln();
            if ratio > best {
                best = ratio;
            }
        }
        scores.insert(term.0, if best.is_finite() { best } else { 0.0 });
    }
    scores
}

/// (a) Rewrites the dictionary to contain only the top-`n` scored terms
/// (by descending score, ties broken by original term id), preserving
/// their relative order, and returns the old→new id remap. Callers must
/// rebuild PV/WI2DVF/barrels against the new ids (§4.9).
pub fn select_top_n_rewrite(dictionary: &Dictionary, scores: &HashMap<u32, f64>, n: usize) -> (Dictionary, Vec<Option<TermId>>) {
    let mut ranked: Vec<(u32, f64)> = scores.iter().map(|(&id, &s)| (id, s)).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    ranked.truncate(n);
    let keep: std::collections::HashSet<u32> = ranked.iter().map(|&(id, _)| id).collect();

    let mut new_dict = Dictionary::new(false);
    let mut remap = vec![None; dictionary.size()];
    for (id, name, occurrence) in dictionary.iter() {
        if !keep.contains(&id.0) {
            continue;
        }
        let new_id = new_dict.intern(name);
        for _ in 0..occurrence {
            new_dict.record_occurrence(new_id);
        }
        remap[id.0 as usize] = Some(new_id);
    }
    new_dict.freeze();
    (new_dict, remap)
}

/// (b) Hides every term not in the top-`n` by score, leaving the
/// dictionary and ids untouched.
pub fn select_top_n_hide(index: &mut InvertedIndex, scores: &HashMap<u32, f64>, n: usize) {
    let mut ranked: Vec<(u32, f64)> = scores.iter().map(|(&id, &s)| (id, s)).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    let keep: std::collections::HashSet<u32> = ranked.into_iter().take(n).map(|(id, _)| id).collect();
    index.hide_unless(|term| keep.contains(&term.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::{CDoc, ClassNames};

    fn two_class_barrel() -> Barrel {
        let mut classes = ClassNames::default();
        classes.intern("spam");
        classes.intern("ham");
        let mut barrel = Barrel::new_document_barrel(classes);

        for i in 0..5 {
            let mut cdoc = CDoc::new(format!("spam{i}"), 0);
            cdoc.tag = Tag::Train;
            cdoc.word_count = 2;
            let doc = barrel.push_document(cdoc);
            barrel.index.add(TermId(0), doc, 2, 2.0); // "viagra" only in spam
        }
        for i in 0..5 {
            let mut cdoc = CDoc::new(format!("ham{i}"), 1);
            cdoc.tag = Tag::Train;
            cdoc.word_count = 2;
            let doc = barrel.push_document(cdoc);
            barrel.index.add(TermId(1), doc, 2, 2.0); // "meeting" only in ham
        }
        barrel
    }

    #[test]
    fn perfectly_discriminating_term_has_maximal_information_gain() {
        let barrel = two_class_barrel();
        let ig = information_gain(&barrel, EventModel::Document);
        // H(C) = 1 bit, and both terms perfectly split the classes.
        assert!((ig[&0] - 1.0).abs() < 1e-6);
        assert!((ig[&1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn odds_ratio_favors_the_class_a_term_is_exclusive_to() {
        let barrel = two_class_barrel();
        let or = odds_ratio(&barrel, EventModel::Document);
        assert!(or[&0] > 0.0);
        assert!(or[&1] > 0.0);
    }

    #[test]
    fn top_n_rewrite_keeps_only_the_highest_scoring_terms() {
        let barrel = two_class_barrel();
        let mut scores = HashMap::new();
        scores.insert(0u32, 2.0);
        scores.insert(1u32, 1.0);
        let mut dict = Dictionary::default();
        dict.intern("viagra");
        dict.intern("meeting");
        let (new_dict, remap) = select_top_n_rewrite(&dict, &scores, 1);
        assert_eq!(new_dict.size(), 1);
        assert!(remap[0].is_some());
        assert!(remap[1].is_none());
    }

    #[test]
    fn top_n_hide_leaves_exactly_n_visible() {
        let mut barrel = two_class_barrel();
        let mut scores = HashMap::new();
        scores.insert(0u32, 2.0);
        scores.insert(1u32, 1.0);
        select_top_n_hide(&mut barrel.index, &scores, 1);
        assert_eq!(barrel.index.num_visible_terms(), 1);
        assert!(barrel.index.is_visible(TermId(0)));
        assert!(barrel.index.is_hidden(TermId(1)));
    }
}
