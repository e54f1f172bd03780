//! Fuzz target for the dictionary's on-disk format (§5): `read_from` must
//! never panic on arbitrary bytes, and a dictionary built from arbitrary
//! term lists must survive a `write_to`/`read_from` cycle unchanged.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use corpusvec::Dictionary;

#[derive(Debug, Arbitrary)]
struct Input {
    garbage: Vec<u8>,
    terms: Vec<String>,
}

fuzz_target!(|input: Input| {
    // read_from must return Err, never panic, on arbitrary bytes.
    let _ = Dictionary::read_from(std::io::Cursor::new(&input.garbage));

    let mut dict = Dictionary::new(false);
    for term in input.terms.iter().take(200) {
        if term.is_empty() || term.contains('\n') {
            continue;
        }
        dict.intern(term);
    }

    let mut buf = Vec::new();
    dict.write_to(&mut buf).expect("writing an in-memory dictionary cannot fail");
    let reloaded = Dictionary::read_from(std::io::Cursor::new(&buf)).expect("a dictionary's own serialization must deserialize");

    assert_eq!(dict.size(), reloaded.size());
    for (_, term, _) in dict.iter() {
        assert_eq!(dict.lookup(term), reloaded.lookup(term));
    }
});
