//! EM semi-supervised loop (C11): alternates rebuilding a class barrel from
//! soft posteriors (M-step) and rescoring unlabeled documents against it
//! (E-step) until a configured iteration budget or log-likelihood
//! convergence (§4.11).

use crate::barrel::{Barrel, Tag};
use crate::classbarrel::{build_class_barrel, Contribution};
use crate::config::EventModel;
use crate::scoring::{ClassBarrelScorer, Scorer};
use crate::smoothing::SmoothingMethod;
use crate::wordvector::{WordVector, WvEntry};

pub struct EmConfig {
    pub max_iterations: usize,
    pub pseudo_length: f64,
    pub vocab_size: usize,
    pub model: EventModel,
    pub smoothing: SmoothingMethod,
    /// Stop early once the total unlabeled log-likelihood improves by less
    /// than this between iterations.
    pub convergence_epsilon: f64,
}

/// Seeds `class_probs`: a one-hot vector over the true class for every
/// `train`-tagged document, a uniform distribution for every `unlabeled`
/// document, and `None` (not participating) for everything else.
pub fn initialize_class_probs(barrel: &mut Barrel) {
    let num_classes = barrel.num_classes().max(1);
    for cdoc in &mut barrel.cdocs {
        match cdoc.tag {
            Tag::Train => {
                let mut probs = vec![0.0; num_classes];
                probs[cdoc.class as usize] = 1.0;
                cdoc.class_probs = Some(probs);
            }
            Tag::Unlabeled => {
                cdoc.class_probs = Some(vec![1.0 / num_classes as f64; num_classes]);
            }
            _ => {}
        }
    }
}

fn word_vector_for_doc(barrel: &Barrel, doc: u32) -> WordVector {
    let mut entries = Vec::new();
    for term in barrel.index.iter_visible() {
        if let Some(e) = barrel.index.entry(term, doc) {
            entries.push(WvEntry { term, count: e.count, weight: e.count as f64 });
        }
    }
    entries.sort_by_key(|e| e.term.0);
    WordVector { entries, normalizer: 1.0 }
}

fn build_contributions(barrel: &Barrel) -> Vec<Contribution> {
    let mut contribs = Vec::new();
    for (doc, cdoc) in barrel.cdocs.iter().enumerate() {
        if let Some(probs) = &cdoc.class_probs {
            for (class, &p) in probs.iter().enumerate() {
                if p > 0.0 {
                    contribs.push(Contribution { doc: doc as u32, class: class as u32, weight: p });
                }
            }
        }
    }
    contribs
}

fn unlabeled_log_likelihood(barrel: &Barrel, class_barrel: &Barrel, cfg: &EmConfig) -> f64 {
    let scorer = Scorer::NaiveBayesMultinomial { smoothing: cfg.smoothing.clone() };
    let mut total = 0.0;
    for (doc, _) in barrel.docs_with_tag(Tag::Unlabeled) {
        let wv = word_vector_for_doc(barrel, doc);
        let ranked = scorer.score(class_barrel, cfg.vocab_size, &wv, class_barrel.cdocs.len());
        if let Some(&(_, best)) = ranked.first() {
            total += best.max(1e-12).ln();
        }
    }
    total
}

/// Runs the EM loop in place, updating `barrel.cdocs[*].class_probs`.
/// Returns the number of iterations actually performed (may be less than
/// `cfg.max_iterations` on early convergence) and the final class barrel.
pub fn run_em(barrel: &mut Barrel, cfg: &EmConfig) -> (usize, Barrel) {
    if barrel.cdocs.iter().all(|c| c.class_probs.is_none()) {
        initialize_class_probs(barrel);
    }

    let mut class_barrel = build_class_barrel(barrel, cfg.model, cfg.pseudo_length, false, Some(&build_contributions(barrel)));
    let mut prev_ll = unlabeled_log_likelihood(barrel, &class_barrel, cfg);
    let mut iterations_run = 0;

    for _ in 0..cfg.max_iterations {
        let scorer = Scorer::NaiveBayesMultinomial { smoothing: cfg.smoothing.clone() };
        let unlabeled_docs: Vec<u32> = barrel.docs_with_tag(Tag::Unlabeled).map(|(d, _)| d).collect();
        for doc in unlabeled_docs {
            let wv = word_vector_for_doc(barrel, doc);
            let ranked = scorer.score(&class_barrel, cfg.vocab_size, &wv, class_barrel.cdocs.len());
            let mut probs = vec![0.0; class_barrel.cdocs.len()];
            for (class, score) in ranked {
                probs[class as usize] = score;
            }
            if probs.iter().all(|&p| p == 0.0) {
                probs = vec![1.0 / class_barrel.cdocs.len().max(1) as f64; class_barrel.cdocs.len()];
            }
            barrel.cdocs[doc as usize].class_probs = Some(probs);
        }

        class_barrel = build_class_barrel(barrel, cfg.model, cfg.pseudo_length, false, Some(&build_contributions(barrel)));
        iterations_run += 1;

        let ll = unlabeled_log_likelihood(barrel, &class_barrel, cfg);
        if (ll - prev_ll).abs() < cfg.convergence_epsilon {
            prev_ll = ll;
            break;
        }
        prev_ll = ll;
    }
    (iterations_run, class_barrel)
}

/// Fraction of `validation`-tagged documents whose `argmax(class_probs)`
/// matches their true class, for diagnostic reporting between iterations.
pub fn validation_accuracy(barrel: &Barrel) -> Option<f64> {
    let mut correct = 0usize;
    let mut total = 0usize;
    for (_, cdoc) in barrel.docs_with_tag(Tag::Validation) {
        let Some(probs) = &cdoc.class_probs else { continue };
        total += 1;
        let argmax = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(c, _)| c as u32);
        if argmax == Some(cdoc.class) {
            correct += 1;
        }
    }
    if total == 0 {
        None
    } else {
        Some(correct as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::{CDoc, ClassNames};
    use crate::dictionary::TermId as Tid;

    fn two_class_doc_barrel() -> Barrel {
        let mut classes = ClassNames::default();
        classes.intern("sports");
        classes.intern("finance");
        let mut barrel = Barrel::new_document_barrel(classes);

        for i in 0..4 {
            let mut cdoc = CDoc::new(format!("sports{i}"), 0);
            cdoc.tag = Tag::Train;
            cdoc.word_count = 2;
            let doc = barrel.push_document(cdoc);
            barrel.index.add(Tid(0), doc, 2, 2.0); // "goal"
        }
        for i in 0..4 {
            let mut cdoc = CDoc::new(format!("finance{i}"), 1);
            cdoc.tag = Tag::Train;
            cdoc.word_count = 2;
            let doc = barrel.push_document(cdoc);
            barrel.index.add(Tid(1), doc, 2, 2.0); // "stock"
        }
        // Unlabeled document that looks exactly like the sports class.
        let mut cdoc = CDoc::new("mystery", 0);
        cdoc.tag = Tag::Unlabeled;
        cdoc.word_count = 2;
        let doc = barrel.push_document(cdoc);
        barrel.index.add(Tid(0), doc, 2, 2.0);

        barrel
    }

    #[test]
    fn unlabeled_document_converges_toward_its_lexical_class() {
        let mut barrel = two_class_doc_barrel();
        let cfg = EmConfig {
            max_iterations: 5,
            pseudo_length: 100.0,
            vocab_size: 2,
            model: EventModel::Word,
            smoothing: SmoothingMethod::Laplace,
            convergence_epsilon: 1e-6,
        };
        run_em(&mut barrel, &cfg);
        let probs = barrel.cdocs[8].class_probs.as_ref().unwrap();
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn labeled_documents_stay_clamped_to_their_true_class() {
        let mut barrel = two_class_doc_barrel();
        initialize_class_probs(&mut barrel);
        for (_, cdoc) in barrel.docs_with_tag(Tag::Train) {
            let probs = cdoc.class_probs.as_ref().unwrap();
            assert_eq!(probs[cdoc.class as usize], 1.0);
        }
    }
}
