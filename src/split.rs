//! Split/tag engine (C5): assigns each document exactly one [`Tag`] by
//! randomized, class-proportional, file-list-driven, or per-class-count
//! rules, applied in a fixed order so later rules only see documents still
//! `Untagged` (§4.5).

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::barrel::{Barrel, Tag};

/// One rule in a tag-assignment plan. Applied in the order listed here
/// regardless of the order given to [`assign_tags`] within the same
/// numbered step (file lists, then counts, then fancy counts, then
/// proportions, then `remaining`, then post-hoc train-subset rebalancing).
pub enum TagSpec {
    /// Tag every document whose filename is in `files`.
    FileList { tag: Tag, files: HashSet<String> },
    /// `count` documents per class, drawn uniformly at random from the
    /// untagged pool.
    PerClassCount { tag: Tag, count: usize },
    /// Per-named-class integer targets (class id → count).
    FancyCount { tag: Tag, per_class: HashMap<u32, usize> },
    /// A fraction of the non-ignore pool, split across classes in
    /// proportion to their size. `from_untagged` selects the `r`-suffixed
    /// variant: proportions are taken from the currently-untagged pool
    /// rather than the whole non-ignore pool.
    ClassProportional { tag: Tag, fraction: f64, from_untagged: bool },
    /// The tag that absorbs everything still untagged after the rules above.
    Remaining { tag: Tag },
    /// After `Remaining` is applied, take a random subset of the `train`
    /// pool and re-tag it (the `t`-suffixed specs).
    TrainSubset { tag: Tag, fraction: f64 },
}

fn untagged(barrel: &Barrel) -> Vec<u32> {
    barrel
        .cdocs
        .iter()
        .enumerate()
        .filter(|(_, d)| d.tag == Tag::Untagged)
        .map(|(i, _)| i as u32)
        .collect()
}

fn by_class(barrel: &Barrel, docs: &[u32]) -> HashMap<u32, Vec<u32>> {
    let mut out: HashMap<u32, Vec<u32>> = HashMap::new();
    for &d in docs {
        out.entry(barrel.cdocs[d as usize].class).or_default().push(d);
    }
    out
}

/// Assigns tags to every document in `barrel` per `specs`, seeded for
/// reproducibility (testable property 9: same seed + same specs ⇒ identical
/// assignment).
pub fn assign_tags(barrel: &mut Barrel, specs: &[TagSpec], seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for spec in specs {
        if let TagSpec::FileList { tag, files } = spec {
            for cdoc in &mut barrel.cdocs {
                if cdoc.tag == Tag::Untagged && files.contains(&cdoc.filename) {
                    cdoc.tag = *tag;
                }
            }
        }
    }

    for spec in specs {
        if let TagSpec::PerClassCount { tag, count } = spec {
            let pool = untagged(barrel);
            let classes = by_class(barrel, &pool);
            for (_, mut docs) in classes {
                docs.shuffle(&mut rng);
                let take = (*count).min(docs.len());
                for &d in &docs[..take] {
                    barrel.cdocs[d as usize].tag = *tag;
                }
            }
        }
    }

    for spec in specs {
        if let TagSpec::FancyCount { tag, per_class } = spec {
            let pool = untagged(barrel);
            let classes = by_class(barrel, &pool);
            for (class, &want) in per_class {
                if let Some(mut docs) = classes.get(class).cloned() {
                    docs.shuffle(&mut rng);
                    let take = want.min(docs.len());
                    for &d in &docs[..take] {
                        barrel.cdocs[d as usize].tag = *tag;
                    }
                }
            }
        }
    }

    for spec in specs {
        if let TagSpec::ClassProportional { tag, fraction, from_untagged } = spec {
            let base_pool: Vec<u32> = if *from_untagged {
                untagged(barrel)
            } else {
                barrel
                    .cdocs
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| d.tag != Tag::Ignore)
                    .map(|(i, _)| i as u32)
                    .collect()
            };
            let classes = by_class(barrel, &base_pool);
            let total = base_pool.len();
            let target_total = (total as f64 * fraction).round() as usize;

            // Integer-floor allocation per class, with round-off
            // distributed greedily to classes that still have untagged
            // capacity (§4.5).
            let untagged_pool = untagged(barrel);
            let untagged_by_class = by_class(barrel, &untagged_pool);
            let mut allocations: Vec<(u32, usize, f64)> = classes
                .iter()
                .map(|(&class, docs)| {
                    let exact = docs.len() as f64 * fraction;
                    (class, exact.floor() as usize, exact.fract())
                })
                .collect();
            let allocated: usize = allocations.iter().map(|(_, n, _)| n).sum();
            let mut remainder = target_total.saturating_sub(allocated);
            allocations.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap());
            for (class, n, _) in &mut allocations {
                if remainder == 0 {
                    break;
                }
                let cap = untagged_by_class.get(class).map(Vec::len).unwrap_or(0);
                if *n < cap {
                    *n += 1;
                    remainder -= 1;
                }
            }

            for (class, want, _) in allocations {
                if let Some(mut docs) = untagged_by_class.get(&class).cloned() {
                    docs.shuffle(&mut rng);
                    let take = want.min(docs.len());
                    for &d in &docs[..take] {
                        barrel.cdocs[d as usize].tag = tag;
                    }
                }
            }
        }
    }

    for spec in specs {
        if let TagSpec::Remaining { tag } = spec {
            for cdoc in &mut barrel.cdocs {
                if cdoc.tag == Tag::Untagged {
                    cdoc.tag = *tag;
                }
            }
        }
    }

    for spec in specs {
        if let TagSpec::TrainSubset { tag, fraction } = spec {
            let mut train_docs: Vec<u32> = barrel
                .cdocs
                .iter()
                .enumerate()
                .filter(|(_, d)| d.tag == Tag::Train)
                .map(|(i, _)| i as u32)
                .collect();
            train_docs.shuffle(&mut rng);
            let take = (train_docs.len() as f64 * fraction).round() as usize;
            for &d in &train_docs[..take.min(train_docs.len())] {
                barrel.cdocs[d as usize].tag = *tag;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::{CDoc, ClassNames};

    fn barrel_with(n_per_class: usize, n_classes: u32) -> Barrel {
        let mut classes = ClassNames::default();
        for c in 0..n_classes {
            classes.intern(&format!("class{c}"));
        }
        let mut barrel = Barrel::new_document_barrel(classes);
        for c in 0..n_classes {
            for i in 0..n_per_class {
                barrel.push_document(CDoc::new(format!("c{c}d{i}"), c));
            }
        }
        barrel
    }

    #[test]
    fn scenario_e_class_proportional_test_set() {
        let mut barrel = barrel_with(10, 10);
        let specs = vec![
            TagSpec::ClassProportional { tag: Tag::Test, fraction: 0.3, from_untagged: false },
            TagSpec::Remaining { tag: Tag::Train },
        ];
        assign_tags(&mut barrel, &specs, 42);
        let test_count = barrel.docs_with_tag(Tag::Test).count();
        assert_eq!(test_count, 30);
        for c in 0..10 {
            let per_class = barrel
                .cdocs
                .iter()
                .filter(|d| d.class == c && d.tag == Tag::Test)
                .count();
            assert!((2..=4).contains(&per_class), "class {c} got {per_class} test docs");
        }
    }

    #[test]
    fn split_is_deterministic_for_a_fixed_seed() {
        let specs = vec![
            TagSpec::ClassProportional { tag: Tag::Test, fraction: 0.3, from_untagged: false },
            TagSpec::Remaining { tag: Tag::Train },
        ];
        let mut b1 = barrel_with(10, 10);
        assign_tags(&mut b1, &specs, 7);
        let mut b2 = barrel_with(10, 10);
        assign_tags(&mut b2, &specs, 7);
        let tags1: Vec<Tag> = b1.cdocs.iter().map(|d| d.tag).collect();
        let tags2: Vec<Tag> = b2.cdocs.iter().map(|d| d.tag).collect();
        assert_eq!(tags1, tags2);
    }

    #[test]
    fn every_document_receives_exactly_one_tag() {
        let mut barrel = barrel_with(5, 4);
        let specs = vec![TagSpec::Remaining { tag: Tag::Train }];
        assign_tags(&mut barrel, &specs, 1);
        assert!(barrel.cdocs.iter().all(|d| d.tag == Tag::Train));
    }
}
