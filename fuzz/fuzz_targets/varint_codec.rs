//! Fuzz target for the PV codec's varint encoding (§4.2): the continuation
//! format every segment is built from. If this breaks, every downstream
//! format built on it breaks.

#![no_main]

use libfuzzer_sys::fuzz_target;

use corpusvec::pv::codec::{decode_varint, encode_varint};

fuzz_target!(|data: &[u8]| {
    if let Ok((value, is_di, consumed)) = decode_varint(data, 0) {
        let mut reencoded = Vec::new();
        encode_varint(&mut reencoded, value, is_di);

        let (redecoded, redecoded_di, reconsumed) =
            decode_varint(&reencoded, 0).expect("re-encoding a valid value must always decode");

        assert_eq!(value, redecoded, "roundtrip failed: {value} != {redecoded}");
        assert_eq!(is_di, redecoded_di, "is_di flag not preserved across roundtrip");
        assert_eq!(reconsumed, reencoded.len(), "re-encoded varint should be fully consumed");
        assert!(consumed <= data.len(), "consumed {consumed} bytes but input only had {}", data.len());
    }
});
