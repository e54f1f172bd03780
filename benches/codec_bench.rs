//! Throughput of the varint/delta-pair codec and the position-vector write
//! path at a few representative posting-list lengths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use corpusvec::pv::codec::{decode_pair, encode_pair};
use corpusvec::pv::{PositionVector, PvStore};

fn bench_pair_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_codec");
    for &(di, pi) in &[(0u32, 5u32), (3, 1200), (1, 1_000_000)] {
        group.bench_with_input(BenchmarkId::new("encode", format!("{di}-{pi}")), &(di, pi), |b, &(di, pi)| {
            b.iter(|| {
                let mut buf = Vec::new();
                let mut last_di = -1i64;
                let mut last_pi = -1i64;
                encode_pair(&mut buf, &mut last_di, &mut last_pi, di, pi);
                black_box(buf);
            });
        });

        let mut encoded = Vec::new();
        let mut last_di = -1i64;
        let mut last_pi = -1i64;
        encode_pair(&mut encoded, &mut last_di, &mut last_pi, di, pi);
        group.bench_with_input(BenchmarkId::new("decode", format!("{di}-{pi}")), &encoded, |b, encoded| {
            b.iter(|| {
                let mut last_di = -1i64;
                let mut last_pi = -1i64;
                black_box(decode_pair(encoded, 0, &mut last_di, &mut last_pi).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_position_vector_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("position_vector_append");
    for &n in &[100usize, 10_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::new("add_pair", n), &n, |b, &n| {
            b.iter(|| {
                let mut store = PvStore::new();
                let mut pv = PositionVector::new();
                for i in 0..n {
                    pv.add_pair(0, i as u32);
                }
                pv.flush(&mut store).unwrap();
                black_box(store.as_bytes().len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pair_codec, bench_position_vector_append);
criterion_main!(benches);
