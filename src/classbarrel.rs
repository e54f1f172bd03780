//! Class barrel builder (C6): merges a document barrel into a
//! vector-per-class barrel under a chosen event model, setting class priors
//! (§4.6).

use std::collections::HashMap;

use crate::barrel::{Barrel, BarrelKind, CDoc, Tag};
use crate::config::EventModel;
use crate::wi2dvf::InvertedIndex;

/// A document's contribution weight toward its class(es) — `1.0` for a
/// hard-labeled training document, a fractional posterior for EM's
/// soft-labeled M-step (§4.11).
pub struct Contribution {
    pub doc: u32,
    pub class: u32,
    pub weight: f64,
}

/// Builds a class barrel from `doc_barrel`'s `train`-tagged documents (or,
/// when `contributions` is supplied, from exactly those weighted
/// `(doc, class, weight)` triples — EM's M-step).
pub fn build_class_barrel(
    doc_barrel: &Barrel,
    model: EventModel,
    pseudo_length: f64,
    uniform_priors: bool,
    contributions: Option<&[Contribution]>,
) -> Barrel {
    let num_classes = doc_barrel.num_classes();
    let owned_contribs: Vec<Contribution>;
    let contribs: &[Contribution] = match contributions {
        Some(c) => c,
        None => {
            owned_contribs = doc_barrel
                .docs_with_tag(Tag::Train)
                .map(|(doc, cdoc)| Contribution { doc, class: cdoc.class, weight: 1.0 })
                .collect();
            &owned_contribs
        }
    };

    let mut cdocs: Vec<CDoc> = (0..num_classes as u32)
        .map(|c| {
            let mut cdoc = CDoc::new(
                doc_barrel.classes.as_ref().and_then(|cn| cn.name(c)).unwrap_or("").to_string(),
                c,
            );
            cdoc.word_count = 0;
            cdoc
        })
        .collect();

    let mut class_mass = vec![0.0f64; num_classes];
    let mut doc_to_contribs: HashMap<u32, Vec<&Contribution>> = HashMap::new();
    for c in contribs {
        class_mass[c.class as usize] += c.weight;
        doc_to_contribs.entry(c.doc).or_default().push(c);
    }
    let total_mass: f64 = class_mass.iter().sum();

    let mut index = InvertedIndex::new();
    let mut class_word_totals = vec![0.0f64; num_classes];

    for term in doc_barrel.index.iter_visible() {
        let dv = match doc_barrel.index.document_vector(term) {
            Some(dv) => dv,
            None => continue,
        };
        let mut per_class_count: HashMap<u32, f64> = HashMap::new();
        for entry in &dv.entries {
            let Some(contributors) = doc_to_contribs.get(&entry.doc) else { continue };
            for c in contributors {
                let event_weight = match model {
                    EventModel::Word => c.weight * entry.count as f64,
                    EventModel::Document => c.weight,
                    EventModel::DocumentThenWord => {
                        let doc_len = doc_barrel
                            .cdocs
                            .get(entry.doc as usize)
                            .map(|cdoc| cdoc.word_count as f64)
                            .unwrap_or(1.0)
                            .max(1e-9);
                        c.weight * entry.count as f64 * (pseudo_length / doc_len)
                    }
                };
                *per_class_count.entry(c.class).or_insert(0.0) += event_weight;
            }
        }
        for (&class, &count) in &per_class_count {
            class_word_totals[class as usize] += count;
            index.add(term, class, count.round().max(0.0) as u32, count);
        }
    }

    for (c, cdoc) in cdocs.iter_mut().enumerate() {
        cdoc.word_count = class_word_totals[c].round() as i64;
        cdoc.prior = if uniform_priors {
            1.0 / num_classes.max(1) as f64
        } else if total_mass > 0.0 {
            class_mass[c] / total_mass
        } else {
            0.0
        };
    }

    Barrel { kind: BarrelKind::Class, cdocs, index, classes: doc_barrel.classes.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::ClassNames;
    use crate::dictionary::TermId;

    fn doc_barrel_scenario_b() -> Barrel {
        let mut classes = ClassNames::default();
        classes.intern("A");
        classes.intern("B");
        let mut barrel = Barrel::new_document_barrel(classes);
        for i in 0..10 {
            let mut cdoc = CDoc::new(format!("a{i}"), 0);
            cdoc.tag = Tag::Train;
            cdoc.word_count = 1;
            let doc = barrel.push_document(cdoc);
            barrel.index.add(TermId(0), doc, 1, 1.0);
        }
        let mut cdoc = CDoc::new("b0", 1);
        cdoc.tag = Tag::Train;
        cdoc.word_count = 1;
        let doc = barrel.push_document(cdoc);
        barrel.index.add(TermId(1), doc, 1, 1.0);
        barrel
    }

    #[test]
    fn scenario_b_priors_match_class_multiplicity() {
        let doc_barrel = doc_barrel_scenario_b();
        let class_barrel = build_class_barrel(&doc_barrel, EventModel::Word, 1000.0, false, None);
        assert!((class_barrel.cdocs[0].prior - 10.0 / 11.0).abs() < 1e-9);
        assert!((class_barrel.cdocs[1].prior - 1.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn uniform_priors_ignore_class_multiplicity() {
        let doc_barrel = doc_barrel_scenario_b();
        let class_barrel = build_class_barrel(&doc_barrel, EventModel::Word, 1000.0, true, None);
        assert!((class_barrel.cdocs[0].prior - 0.5).abs() < 1e-9);
        assert!((class_barrel.cdocs[1].prior - 0.5).abs() < 1e-9);
    }

    /// Two same-class train docs with identical term profiles but
    /// different raw lengths (one padded with filler words) must
    /// contribute equally once scaled to the pseudo-length `L` — the
    /// defining property of the document-then-word event model (§4.6).
    #[test]
    fn document_then_word_normalizes_by_true_document_length() {
        let mut classes = ClassNames::default();
        classes.intern("A");
        let mut barrel = Barrel::new_document_barrel(classes);

        let mut short_doc = CDoc::new("short", 0);
        short_doc.tag = Tag::Train;
        short_doc.word_count = 2;
        let short = barrel.push_document(short_doc);
        barrel.index.add(TermId(0), short, 1, 1.0);

        let mut long_doc = CDoc::new("long", 0);
        long_doc.tag = Tag::Train;
        long_doc.word_count = 20;
        let long = barrel.push_document(long_doc);
        barrel.index.add(TermId(0), long, 10, 10.0);

        let class_barrel = build_class_barrel(&barrel, EventModel::DocumentThenWord, 1000.0, false, None);
        let dv = class_barrel.index.document_vector(TermId(0)).unwrap();
        let contributions: Vec<f64> = dv.entries.iter().map(|e| e.weight).collect();

        // short: count=1, len=2  -> 1 * 1000/2  = 500
        // long:  count=10, len=20 -> 10 * 1000/20 = 500
        // Aggregated into one class-0 entry, so the total is both summed.
        assert_eq!(contributions.len(), 1);
        assert!((contributions[0] - 1000.0).abs() < 1e-6);
    }
}
