//! Scorers (C8): Naive Bayes, TF-IDF cosine, k-NN, PrInd, KL divergence,
//! Evidence. Each consumes a query vector and a barrel and returns a
//! ranked class list.
//!
//! The uniform capability set from the original's function-pointer table
//! becomes a single trait, [`ClassBarrelScorer`], implemented by the
//! [`Scorer`] sum type. Most scorers read a *class* barrel (one row per
//! class); k-NN instead reads the *document* barrel directly, since its
//! distances are between individual documents — it aggregates per-class
//! afterward by walking each neighbor's `class` field.

pub mod smart;

use std::collections::HashMap;

use crate::barrel::Barrel;
use crate::dictionary::TermId;
use crate::smoothing::{SmoothingContext, SmoothingMethod};
use crate::wordvector::WordVector;

use smart::SmartConfig;

/// A class-id/score pair, ranked descending by score.
pub type Ranked = Vec<(u32, f64)>;

/// Implemented by every scorer variant. `barrel` is a class barrel for
/// every variant except [`Scorer::Knn`], which expects the document barrel.
pub trait ClassBarrelScorer {
    fn score(&self, barrel: &Barrel, vocab_size: usize, query: &WordVector, k: usize) -> Ranked;
}

#[derive(Debug, Clone)]
pub enum Scorer {
    NaiveBayesMultinomial { smoothing: SmoothingMethod },
    NaiveBayesBernoulli { smoothing: SmoothingMethod },
    TfIdfCosine,
    Knn { neighbors: usize, smart: SmartConfig },
    PrInd { smoothing: SmoothingMethod, normalize: bool },
    Kl { smoothing: SmoothingMethod },
    Evidence { smoothing: SmoothingMethod },
}

/// Shifts the finite entries of `log_scores` so the maximum is `-2`, then
/// exponentiates and L1-normalizes. Classes whose log-score stayed
/// `-inf` (zero prior, or no training data) are excluded entirely — the
/// original's `999.99`/impossible-score sentinel, made explicit by simply
/// not appearing in the result (§4.8, §9).
fn rescale_and_normalize(log_scores: Vec<f64>) -> Ranked {
    let max = log_scores.iter().cloned().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    let mut shifted = log_scores;
    if max.is_finite() {
        for s in &mut shifted {
            if s.is_finite() {
                *s += -2.0 - max;
            }
        }
    }
    let mut exps: Vec<(u32, f64)> = shifted
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .map(|(c, s)| (c as u32, s.exp()))
        .collect();
    let total: f64 = exps.iter().map(|(_, v)| v).sum();
    if total > 0.0 {
        for e in &mut exps {
            e.1 /= total;
        }
    }
    exps.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    exps
}

fn initial_log_priors(barrel: &Barrel) -> Vec<f64> {
    barrel
        .cdocs
        .iter()
        .map(|c| if c.prior > 0.0 { c.prior.ln() } else { f64::NEG_INFINITY })
        .collect()
}

fn score_nb_multinomial(barrel: &Barrel, vocab_size: usize, query: &WordVector, k: usize, smoothing: &SmoothingMethod) -> Ranked {
    let ctx = SmoothingContext::build(barrel, vocab_size, smoothing.clone());
    let mut log_scores = initial_log_priors(barrel);
    for c in 0..log_scores.len() {
        if !log_scores[c].is_finite() {
            continue;
        }
        for e in &query.entries {
            log_scores[c] += e.count as f64 * ctx.p(e.term, c as u32, None).ln();
        }
    }
    let mut ranked = rescale_and_normalize(log_scores);
    ranked.truncate(k);
    ranked
}

fn score_nb_bernoulli(barrel: &Barrel, vocab_size: usize, query: &WordVector, k: usize, smoothing: &SmoothingMethod) -> Ranked {
    let ctx = SmoothingContext::build(barrel, vocab_size, smoothing.clone());
    let in_query: std::collections::HashSet<u32> = query.entries.iter().map(|e| e.term.0).collect();
    let mut log_scores = initial_log_priors(barrel);
    for c in 0..log_scores.len() {
        if !log_scores[c].is_finite() {
            continue;
        }
        for w in 0..vocab_size as u32 {
            let term = TermId(w);
            let p = ctx.p(term, c as u32, None).clamp(1e-9, 1.0 - 1e-9);
            log_scores[c] += if in_query.contains(&w) { p.ln() } else { (1.0 - p).ln() };
        }
    }
    let mut ranked = rescale_and_normalize(log_scores);
    ranked.truncate(k);
    ranked
}

/// Shared by TF-IDF cosine and k-NN: treats each row of `barrel` (a class
/// or a document) as a pseudo-document and computes TF-IDF cosine
/// similarity against `query`, where `tf` is optionally replaced by a
/// SMART weighting scheme.
fn cosine_scores(barrel: &Barrel, query: &WordVector, smart: Option<&SmartConfig>) -> Ranked {
    let num_rows = barrel.cdocs.len();
    let mut row_norms = vec![0.0f64; num_rows];
    let mut scores = vec![0.0f64; num_rows];

    let df = |term: TermId| -> usize { barrel.index.document_vector(term).map(|dv| dv.entries.len()).unwrap_or(0) };
    let idf = |term: TermId, use_idf: bool| -> f64 {
        if !use_idf {
            return 1.0;
        }
        let d = df(term);
        if d > 0 {
            (num_rows as f64 / d as f64).ln().max(0.0)
        } else {
            0.0
        }
    };

    // Augmented TF needs the largest raw count anywhere in the same
    // document/query, so that pass runs before any weight is computed.
    let mut row_max_count = vec![0u32; num_rows];
    for term in barrel.index.iter_visible() {
        if let Some(dv) = barrel.index.document_vector(term) {
            for e in &dv.entries {
                let slot = &mut row_max_count[e.doc as usize];
                if e.count > *slot {
                    *slot = e.count;
                }
            }
        }
    }
    let query_max_count = query.entries.iter().map(|e| e.count).max().unwrap_or(0);

    let doc_tf = |count: u32, doc: u32| -> f64 {
        smart
            .map(|s| s.doc.tf.weight(count, row_max_count[doc as usize]))
            .unwrap_or_else(|| 1.0 + (count as f64).ln().max(0.0))
    };
    let use_idf = smart.map(|s| s.doc.idf.uses_idf()).unwrap_or(true);

    for term in barrel.index.iter_visible() {
        let dv = match barrel.index.document_vector(term) {
            Some(dv) => dv,
            None => continue,
        };
        let term_idf = idf(term, use_idf);
        for e in &dv.entries {
            let w = doc_tf(e.count, e.doc) * term_idf;
            row_norms[e.doc as usize] += w * w;
        }
    }

    let query_tf = |count: u32| -> f64 {
        smart.map(|s| s.query.tf.weight(count, query_max_count)).unwrap_or_else(|| 1.0 + (count as f64).ln().max(0.0))
    };
    let mut q_norm = 0.0f64;
    for e in &query.entries {
        let w = query_tf(e.count) * idf(e.term, use_idf);
        q_norm += w * w;
        if let Some(dv) = barrel.index.document_vector(e.term) {
            for de in &dv.entries {
                let dw = doc_tf(de.count, de.doc) * idf(e.term, use_idf);
                scores[de.doc as usize] += w * dw;
            }
        }
    }
    let q_norm = q_norm.sqrt().max(1e-12);

    (0..num_rows)
        .map(|r| {
            let norm = row_norms[r].sqrt().max(1e-12);
            (r as u32, scores[r] / (q_norm * norm))
        })
        .collect()
}

fn score_tfidf(barrel: &Barrel, query: &WordVector, k: usize) -> Ranked {
    let mut ranked = cosine_scores(barrel, query, None);
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k);
    ranked
}

fn score_knn(doc_barrel: &Barrel, query: &WordVector, neighbors: usize, smart: &SmartConfig, k: usize) -> Ranked {
    let mut sims = cosine_scores(doc_barrel, query, Some(smart));
    sims.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    sims.truncate(neighbors);
    let mut class_scores: HashMap<u32, f64> = HashMap::new();
    for (doc, sim) in sims {
        if let Some(cdoc) = doc_barrel.cdocs.get(doc as usize) {
            *class_scores.entry(cdoc.class).or_insert(0.0) += sim;
        }
    }
    let mut ranked: Ranked = class_scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k);
    ranked
}

fn score_prind(barrel: &Barrel, vocab_size: usize, query: &WordVector, k: usize, smoothing: &SmoothingMethod, normalize: bool) -> Ranked {
    let ctx = SmoothingContext::build(barrel, vocab_size, smoothing.clone());
    let num_classes = barrel.cdocs.len();
    let mut scores = vec![0.0f64; num_classes];
    for c in 0..num_classes {
        let prior = barrel.cdocs[c].prior;
        if prior <= 0.0 {
            continue;
        }
        for e in &query.entries {
            let pw_c = ctx.p(e.term, c as u32, None);
            let pw = ctx.global_p(e.term);
            if pw > 0.0 {
                scores[c] += (pw_c / pw) * prior * e.weight;
            }
        }
    }
    let mut ranked: Ranked = (0..num_classes).map(|c| (c as u32, scores[c])).filter(|&(c, _)| barrel.cdocs[c as usize].prior > 0.0).collect();
    if normalize {
        let total: f64 = ranked.iter().map(|(_, s)| s).sum();
        if total > 0.0 {
            for e in &mut ranked {
                e.1 /= total;
            }
        }
    }
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k);
    ranked
}

fn score_kl(barrel: &Barrel, vocab_size: usize, query: &WordVector, k: usize, smoothing: &SmoothingMethod) -> Ranked {
    let ctx = SmoothingContext::build(barrel, vocab_size, smoothing.clone());
    let total_query: f64 = query.entries.iter().map(|e| e.count as f64).sum::<f64>().max(1.0);
    let num_classes = barrel.cdocs.len();
    let mut ranked: Ranked = (0..num_classes)
        .filter(|&c| barrel.cdocs[c].prior > 0.0)
        .map(|c| {
            let mut neg_kl = 0.0;
            for e in &query.entries {
                let q_w = e.count as f64 / total_query;
                let p_w = ctx.p(e.term, c as u32, None);
                neg_kl -= q_w * (q_w / p_w).ln();
            }
            (c as u32, neg_kl)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k);
    ranked
}

fn score_evidence(barrel: &Barrel, vocab_size: usize, query: &WordVector, k: usize, smoothing: &SmoothingMethod) -> Ranked {
    let ctx = SmoothingContext::build(barrel, vocab_size, smoothing.clone());
    let num_classes = barrel.cdocs.len();
    let mut ranked: Ranked = (0..num_classes)
        .filter(|&c| barrel.cdocs[c].prior > 0.0)
        .map(|c| {
            let log_prior_odds = (barrel.cdocs[c].prior / (1.0 - barrel.cdocs[c].prior).max(1e-9)).ln();
            let mut evidence = log_prior_odds;
            for e in &query.entries {
                let p = ctx.p(e.term, c as u32, None).clamp(1e-9, 1.0 - 1e-9);
                evidence += e.count as f64 * (p / (1.0 - p)).ln();
            }
            (c as u32, evidence)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k);
    ranked
}

impl ClassBarrelScorer for Scorer {
    fn score(&self, barrel: &Barrel, vocab_size: usize, query: &WordVector, k: usize) -> Ranked {
        if query.is_empty() {
            return Vec::new();
        }
        match self {
            Scorer::NaiveBayesMultinomial { smoothing } => score_nb_multinomial(barrel, vocab_size, query, k, smoothing),
            Scorer::NaiveBayesBernoulli { smoothing } => score_nb_bernoulli(barrel, vocab_size, query, k, smoothing),
            Scorer::TfIdfCosine => score_tfidf(barrel, query, k),
            Scorer::Knn { neighbors, smart } => score_knn(barrel, query, *neighbors, smart, k),
            Scorer::PrInd { smoothing, normalize } => score_prind(barrel, vocab_size, query, k, smoothing, *normalize),
            Scorer::Kl { smoothing } => score_kl(barrel, vocab_size, query, k, smoothing),
            Scorer::Evidence { smoothing } => score_evidence(barrel, vocab_size, query, k, smoothing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::{BarrelKind, CDoc, ClassNames};
    use crate::wi2dvf::InvertedIndex;
    use crate::wordvector::WvEntry;

    fn scenario_b_class_barrel() -> Barrel {
        let mut classes = ClassNames::default();
        classes.intern("A");
        classes.intern("B");
        let mut index = InvertedIndex::new();
        index.add(TermId(0), 0, 10, 10.0); // "alpha" in A
        index.add(TermId(1), 1, 1, 1.0); // some other word in B
        let cdocs = vec![
            { let mut c = CDoc::new("A", 0); c.word_count = 10; c.prior = 10.0 / 11.0; c },
            { let mut c = CDoc::new("B", 1); c.word_count = 1; c.prior = 1.0 / 11.0; c },
        ];
        Barrel { kind: BarrelKind::Class, cdocs, index, classes: Some(classes) }
    }

    #[test]
    fn scenario_b_multinomial_nb_ranks_a_above_b() {
        let barrel = scenario_b_class_barrel();
        let query = WordVector { entries: vec![WvEntry { term: TermId(0), count: 1, weight: 1.0 }], normalizer: 1.0 };
        let scorer = Scorer::NaiveBayesMultinomial { smoothing: SmoothingMethod::Laplace };
        let ranked = scorer.score(&barrel, 2, &query, 2);
        assert_eq!(ranked[0].0, 0);
    }

    #[test]
    fn empty_query_returns_empty_ranking() {
        let barrel = scenario_b_class_barrel();
        let query = WordVector::default();
        let scorer = Scorer::NaiveBayesMultinomial { smoothing: SmoothingMethod::Laplace };
        assert!(scorer.score(&barrel, 2, &query, 2).is_empty());
    }

    #[test]
    fn zero_prior_class_is_excluded() {
        let mut barrel = scenario_b_class_barrel();
        barrel.cdocs[1].prior = 0.0;
        let query = WordVector { entries: vec![WvEntry { term: TermId(1), count: 1, weight: 1.0 }], normalizer: 1.0 };
        let scorer = Scorer::NaiveBayesMultinomial { smoothing: SmoothingMethod::Laplace };
        let ranked = scorer.score(&barrel, 2, &query, 2);
        assert!(ranked.iter().all(|(c, _)| *c != 1));
    }

    #[test]
    fn nb_score_monotonicity_holds() {
        let barrel = scenario_b_class_barrel();
        let scorer = Scorer::NaiveBayesMultinomial { smoothing: SmoothingMethod::Laplace };
        let low = WordVector { entries: vec![WvEntry { term: TermId(0), count: 1, weight: 1.0 }], normalizer: 1.0 };
        let high = WordVector { entries: vec![WvEntry { term: TermId(0), count: 5, weight: 5.0 }], normalizer: 1.0 };
        let low_ranked = scorer.score(&barrel, 2, &low, 2);
        let high_ranked = scorer.score(&barrel, 2, &high, 2);
        let diff = |r: &Ranked| {
            let a = r.iter().find(|(c, _)| *c == 0).map(|(_, s)| *s).unwrap_or(0.0);
            let b = r.iter().find(|(c, _)| *c == 1).map(|(_, s)| *s).unwrap_or(0.0);
            a - b
        };
        assert!(diff(&high_ranked) >= diff(&low_ranked) - 1e-9);
    }
}
