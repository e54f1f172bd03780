//! Smoothed probability core (C7): `P(w|c)` under Laplace, m-estimate,
//! Witten-Bell, Good-Turing, Dirichlet, or hierarchical shrinkage, with
//! leave-one-out correction (§4.7).
//!
//! Per-class statistics (`T_c`, Good-Turing fits, shrinkage lambdas) are
//! expensive to recompute per `(term, class)` call, so [`SmoothingContext`]
//! precomputes them once from a class barrel and [`SmoothingContext::p`]
//! answers individual queries cheaply.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::barrel::Barrel;
use crate::dictionary::TermId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SmoothingMethod {
    Laplace,
    MEstimate { m: f64, p_w: f64 },
    WittenBell,
    GoodTuring { k: u32 },
    /// Keyed by raw term id (`TermId.0`) so the method stays `Serialize`.
    Dirichlet { alpha: HashMap<u32, f64> },
    Shrinkage,
}

/// Leave-one-out correction: subtract a document's own counts from its own
/// class's sufficient statistics before smoothing.
pub struct LeaveOneOut {
    pub loo_class: u32,
    pub loo_count_w: f64,
    pub loo_count_total: f64,
}

/// Loads a Dirichlet `alpha` file: `<alpha> <term>` per line, whitespace
/// separated. Terms not in `term_id_of` are ignored; duplicate terms let
/// the last line win (§9 open question, resolved).
pub fn load_dirichlet_alpha_file(
    path: &Path,
    term_id_of: impl Fn(&str) -> Option<TermId>,
) -> Result<HashMap<u32, f64>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    let mut alpha = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let a: f64 = parts
            .next()
            .ok_or_else(|| format!("malformed dirichlet line: {line}"))?
            .parse()
            .map_err(|_| format!("bad alpha value in: {line}"))?;
        let term = parts.next().ok_or_else(|| format!("malformed dirichlet line: {line}"))?;
        if let Some(id) = term_id_of(term) {
            alpha.insert(id.0, a);
        }
    }
    Ok(alpha)
}

struct GoodTuringFit {
    /// `log(N_r) = intercept + slope * log(r)`, fit by least squares over
    /// the class's frequency-of-frequency table.
    intercept: f64,
    slope: f64,
    k: u32,
    class_total: f64,
    n1: f64,
    /// Rescales raw discounted counts so the seen-term probability mass
    /// plus the reserved unseen mass (`n1 / class_total`) sums to exactly 1.
    renorm: f64,
}

impl GoodTuringFit {
    fn smoothed_nr(&self, r: u32) -> f64 {
        (self.intercept + self.slope * (r as f64).ln()).exp()
    }

    fn raw_discount(&self, r: u32) -> f64 {
        let s_r = self.smoothed_nr(r).max(1e-9);
        let s_r1 = self.smoothed_nr(r + 1).max(1e-9);
        (r as f64 + 1.0) * s_r1 / s_r
    }

    /// Discounted count for an observed count `r` (`r <= k` only; counts
    /// above `k` are returned unsmoothed by the caller).
    fn discount(&self, r: u32) -> f64 {
        if r == 0 || r > self.k {
            return r as f64;
        }
        self.raw_discount(r) * self.renorm
    }
}

fn fit_good_turing(freq_of_freq: &HashMap<u32, u64>, k: u32, class_total: f64) -> GoodTuringFit {
    let points: Vec<(f64, f64)> = freq_of_freq
        .iter()
        .filter(|&(&r, &nr)| r > 0 && nr > 0)
        .map(|(&r, &nr)| ((r as f64).ln(), (nr as f64).ln()))
        .collect();
    let (intercept, slope) = if points.len() < 2 {
        (0.0, -1.0)
    } else {
        let n = points.len() as f64;
        let sx: f64 = points.iter().map(|p| p.0).sum();
        let sy: f64 = points.iter().map(|p| p.1).sum();
        let sxx: f64 = points.iter().map(|p| p.0 * p.0).sum();
        let sxy: f64 = points.iter().map(|p| p.0 * p.1).sum();
        let denom = n * sxx - sx * sx;
        if denom.abs() < 1e-12 {
            (sy / n, -1.0)
        } else {
            let slope = (n * sxy - sx * sy) / denom;
            let intercept = (sy - slope * sx) / n;
            (intercept, slope)
        }
    };
    let n1 = freq_of_freq.get(&1).copied().unwrap_or(0) as f64;

    let mut fit = GoodTuringFit { intercept, slope, k, class_total, n1, renorm: 1.0 };
    let raw_seen_mass: f64 = freq_of_freq
        .iter()
        .filter(|&(&r, _)| r > 0 && r <= k)
        .map(|(&r, &nr)| nr as f64 * fit.raw_discount(r))
        .sum();
    let target_seen_mass = (class_total - n1).max(0.0);
    fit.renorm = if raw_seen_mass > 1e-9 { target_seen_mass / raw_seen_mass } else { 1.0 };
    fit
}

struct ClassStats {
    n_c: f64,
    t_c: u64,
}

/// Precomputed per-class statistics for cheap repeated `P(w|c)` queries.
pub struct SmoothingContext<'a> {
    barrel: &'a Barrel,
    vocab_size: usize,
    method: SmoothingMethod,
    class_stats: Vec<ClassStats>,
    good_turing: Vec<Option<GoodTuringFit>>,
    shrinkage_lambdas: Vec<(f64, f64, f64)>,
    global_term_counts: HashMap<u32, f64>,
    global_total: f64,
}

impl<'a> SmoothingContext<'a> {
    pub fn build(barrel: &'a Barrel, vocab_size: usize, method: SmoothingMethod) -> Self {
        let num_classes = barrel.cdocs.len();
        let mut class_stats = Vec::with_capacity(num_classes);
        let mut freq_of_freq_per_class: Vec<HashMap<u32, u64>> = vec![HashMap::new(); num_classes];
        let mut global_term_counts: HashMap<u32, f64> = HashMap::new();
        let mut global_total = 0.0;

        for ci in 0..num_classes {
            class_stats.push(ClassStats { n_c: barrel.cdocs[ci].word_count.max(0) as f64, t_c: 0 });
        }

        for term in barrel.index.iter_visible() {
            let dv = match barrel.index.document_vector(term) {
                Some(dv) => dv,
                None => continue,
            };
            for entry in &dv.entries {
                let ci = entry.doc as usize;
                if ci >= num_classes {
                    continue;
                }
                class_stats[ci].t_c += 1;
                let r = entry.count.min(10_000);
                *freq_of_freq_per_class[ci].entry(r).or_insert(0) += 1;
                *global_term_counts.entry(term.0).or_insert(0.0) += entry.count as f64;
                global_total += entry.count as f64;
            }
        }

        let good_turing = match &method {
            SmoothingMethod::GoodTuring { k } => freq_of_freq_per_class
                .iter()
                .zip(&class_stats)
                .map(|(ff, stats)| Some(fit_good_turing(ff, *k, stats.n_c)))
                .collect(),
            _ => (0..num_classes).map(|_| None).collect(),
        };

        let mut shrinkage_lambdas = Vec::with_capacity(num_classes);
        if matches!(method, SmoothingMethod::Shrinkage) {
            for stats in &class_stats {
                let rare_fraction = if vocab_size > 0 {
                    1.0 - (stats.t_c as f64 / vocab_size as f64)
                } else {
                    0.0
                };
                let lambda_local = (1.0 - rare_fraction).max(0.05);
                let remainder = 1.0 - lambda_local;
                let lambda_root = remainder * 0.5;
                let lambda_uniform = remainder * 0.5;
                shrinkage_lambdas.push((lambda_local, lambda_root, lambda_uniform));
            }
        } else {
            shrinkage_lambdas = vec![(0.0, 0.0, 0.0); num_classes];
        }

        SmoothingContext {
            barrel,
            vocab_size,
            method,
            class_stats,
            good_turing,
            shrinkage_lambdas,
            global_term_counts,
            global_total,
        }
    }

    /// Corpus-wide `P(w)`, used by the PrInd scorer's independence
    /// weighting (§4.8). Not class-conditional, so smoothing method is
    /// irrelevant here — plain maximum likelihood over the whole barrel.
    pub fn global_p(&self, term: TermId) -> f64 {
        if self.global_total <= 0.0 {
            return 0.0;
        }
        self.global_term_counts.get(&term.0).copied().unwrap_or(0.0) / self.global_total
    }

    fn n_wc(&self, term: TermId, class: u32) -> f64 {
        self.barrel
            .index
            .entry(term, class)
            .map(|e| e.count as f64)
            .unwrap_or(0.0)
    }

    /// Returns `P(w|c)`, guaranteed in `(0, 1]` for `vocab_size > 0`.
    pub fn p(&self, term: TermId, class: u32, loo: Option<&LeaveOneOut>) -> f64 {
        let ci = class as usize;
        if ci >= self.class_stats.len() || self.vocab_size == 0 {
            return 0.0;
        }
        let mut n_wc = self.n_wc(term, class);
        let mut n_c = self.class_stats[ci].n_c;
        if let Some(loo) = loo {
            if loo.loo_class == class {
                n_wc = (n_wc - loo.loo_count_w).max(0.0);
                n_c = (n_c - loo.loo_count_total).max(0.0);
            }
        }
        let t_c = self.class_stats[ci].t_c as f64;
        let v = self.vocab_size as f64;

        match &self.method {
            SmoothingMethod::Laplace => (n_wc + 1.0) / (n_c + v),
            SmoothingMethod::MEstimate { m, p_w } => (n_wc + m * p_w) / (n_c + m),
            SmoothingMethod::WittenBell => {
                if n_wc > 0.0 {
                    n_wc / (n_c + t_c)
                } else {
                    let unseen = (v - t_c).max(1.0);
                    t_c / ((n_c + t_c) * unseen)
                }
            }
            SmoothingMethod::GoodTuring { .. } => {
                let fit = self.good_turing[ci].as_ref();
                match fit {
                    Some(fit) if n_wc > 0.0 => {
                        let r = n_wc.round() as u32;
                        let discounted = fit.discount(r);
                        discounted / n_c.max(1.0)
                    }
                    Some(fit) => {
                        let p0 = fit.n1 / fit.class_total.max(1.0);
                        let unseen = (v - t_c).max(1.0);
                        p0 / unseen
                    }
                    None => (n_wc + 1.0) / (n_c + v),
                }
            }
            SmoothingMethod::Dirichlet { alpha } => {
                let a_w = alpha.get(&term.0).copied().unwrap_or(0.0);
                let sum_a: f64 = alpha.values().sum();
                (n_wc + a_w) / (n_c + sum_a.max(1.0))
            }
            SmoothingMethod::Shrinkage => {
                let (lambda_local, lambda_root, lambda_uniform) = self.shrinkage_lambdas[ci];
                let n_w = self.global_term_counts.get(&term.0).copied().unwrap_or(0.0);
                let local = if n_c > 0.0 { n_wc / n_c } else { 0.0 };
                let root = if self.global_total > 0.0 { n_w / self.global_total } else { 0.0 };
                let uniform = 1.0 / v;
                (lambda_local * local + lambda_root * root + lambda_uniform * uniform).clamp(1e-12, 1.0)
            }
        }
        .clamp(1e-12, 1.0)
    }
}
