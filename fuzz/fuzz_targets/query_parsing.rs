//! Fuzz target for the boolean/phrase query parser (§4.10): arbitrary query
//! text must never panic, and the atom cap must always be honored.

#![no_main]

use libfuzzer_sys::fuzz_target;

use corpusvec::query::parse_query;

fuzz_target!(|input: (String, u8)| {
    let (text, raw_max) = input;
    let max_atoms = (raw_max as usize).max(1);

    let (atoms, truncated) = parse_query(&text, max_atoms);

    assert!(atoms.len() <= max_atoms, "parser returned more atoms than the configured cap");
    if atoms.len() == max_atoms && !text.trim().is_empty() {
        let _ = truncated;
    }
    for atom in &atoms {
        assert!(!atom.words.is_empty(), "an atom must carry at least one word");
    }
});
