//! Naive Bayes and TF-IDF scorer throughput against a synthetic class
//! barrel of varying vocabulary size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use corpusvec::barrel::{Barrel, CDoc, ClassNames};
use corpusvec::classbarrel::build_class_barrel;
use corpusvec::config::EventModel;
use corpusvec::scoring::{ClassBarrelScorer, Scorer};
use corpusvec::smoothing::SmoothingMethod;
use corpusvec::wordvector::{WordVector, WvEntry};
use corpusvec::TermId;

fn synthetic_doc_barrel(num_classes: u32, docs_per_class: u32, vocab_size: u32) -> Barrel {
    let mut names = ClassNames::default();
    for c in 0..num_classes {
        names.intern(&format!("class{c}"));
    }
    let mut barrel = Barrel::new_document_barrel(names);
    for class in 0..num_classes {
        for d in 0..docs_per_class {
            let mut cdoc = CDoc::new(format!("class{class}_doc{d}"), class);
            cdoc.tag = corpusvec::barrel::Tag::Train;
            cdoc.word_count = vocab_size as i64;
            let doc = barrel.push_document(cdoc);
            for t in 0..vocab_size {
                // Each class favors a disjoint slice of the vocabulary so
                // the scorers have genuine per-class signal to separate.
                if t % num_classes == class {
                    barrel.index.add(TermId(t), doc, 3, 3.0);
                }
            }
        }
    }
    barrel
}

fn sample_query(vocab_size: u32) -> WordVector {
    let entries = (0..vocab_size.min(20)).map(|t| WvEntry { term: TermId(t), count: 2, weight: 2.0 }).collect();
    WordVector { entries, normalizer: 1.0 }
}

fn bench_nb_multinomial(c: &mut Criterion) {
    let mut group = c.benchmark_group("nb_multinomial");
    for &(classes, vocab) in &[(5u32, 200u32), (20, 2000), (50, 20000)] {
        let doc_barrel = synthetic_doc_barrel(classes, 10, vocab);
        let class_barrel = build_class_barrel(&doc_barrel, EventModel::Word, 1000.0, false, None);
        let scorer = Scorer::NaiveBayesMultinomial { smoothing: SmoothingMethod::Laplace };
        let query = sample_query(vocab);
        group.bench_with_input(BenchmarkId::new("score", format!("{classes}c_{vocab}v")), &vocab, |b, _| {
            b.iter(|| black_box(scorer.score(&class_barrel, vocab as usize, &query, classes as usize)));
        });
    }
    group.finish();
}

fn bench_tfidf_cosine(c: &mut Criterion) {
    let mut group = c.benchmark_group("tfidf_cosine");
    for &(classes, vocab) in &[(5u32, 200u32), (20, 2000)] {
        let doc_barrel = synthetic_doc_barrel(classes, 10, vocab);
        let class_barrel = build_class_barrel(&doc_barrel, EventModel::Word, 1000.0, false, None);
        let scorer = Scorer::TfIdfCosine;
        let query = sample_query(vocab);
        group.bench_with_input(BenchmarkId::new("score", format!("{classes}c_{vocab}v")), &vocab, |b, _| {
            b.iter(|| black_box(scorer.score(&class_barrel, vocab as usize, &query, classes as usize)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_nb_multinomial, bench_tfidf_cosine);
criterion_main!(benches);
