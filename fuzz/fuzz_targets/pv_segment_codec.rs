//! Fuzz target for position-vector segments (§4.2, §5): arbitrary sequences
//! of non-decreasing `(di, pi)` pairs must survive an add/flush/read cycle
//! through a real `PvStore`, and raw garbage must never panic the decoder.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use corpusvec::pv::codec::decode_pair;
use corpusvec::pv::{PositionVector, PvStore};

#[derive(Debug, Arbitrary)]
struct RawStep {
    di_advance: u8,
    pi: u16,
}

fuzz_target!(|input: (Vec<u8>, Vec<RawStep>)| {
    let (garbage, steps) = input;

    // Raw decoder must never panic on arbitrary bytes.
    let mut last_di = -1i64;
    let mut last_pi = -1i64;
    let _ = decode_pair(&garbage, 0, &mut last_di, &mut last_pi);

    if steps.is_empty() {
        return;
    }

    let mut store = PvStore::new();
    let mut pv = PositionVector::new();
    let mut expected = Vec::new();
    let mut di = 0u32;
    for step in steps.iter().take(500) {
        di += step.di_advance as u32;
        let pi = if expected.last().map(|&(d, _)| d) == Some(di) {
            expected.last().unwrap().1 + 1 + step.pi as u32
        } else {
            step.pi as u32
        };
        pv.add_pair(di, pi);
        expected.push((di, pi));
    }
    pv.flush(&mut store).unwrap();

    pv.rewind();
    let mut seen = Vec::new();
    while let Some(pair) = pv.next(&store).unwrap() {
        seen.push(pair);
    }
    assert_eq!(seen, expected, "position vector roundtrip mismatch");
});
