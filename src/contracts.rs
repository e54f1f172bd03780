//! Runtime invariant checks for true programmer errors.
//!
//! These mirror the original's `abort()`-on-invariant discipline: a
//! violation here means a caller broke a documented precondition, not that
//! bad input was seen. Debug builds panic; release builds no-op (callers on
//! the hot path, e.g. `InvertedIndex::add`, must not pay for this twice).

/// A document-vector's entries must have strictly increasing document ids.
pub fn check_dv_sorted(entries: &[(u32, u32, f64)]) {
    if cfg!(debug_assertions) {
        for w in entries.windows(2) {
            debug_assert!(
                w[0].0 < w[1].0,
                "document-vector entries out of order: {} then {}",
                w[0].0,
                w[1].0
            );
        }
    }
}

/// `PositionVector::add_pair` requires non-decreasing `(di, pi)`.
pub fn check_pv_order(last_di: i64, last_pi: i64, di: u32, pi: u32) {
    debug_assert!(
        (di as i64) > last_di || ((di as i64) == last_di && (pi as i64) >= last_pi),
        "PV append out of order: last=({last_di},{last_pi}) new=({di},{pi})"
    );
}

/// `unnext` may not be called twice without an intervening `next`.
pub fn check_single_unnext(already_peeked: bool) {
    debug_assert!(!already_peeked, "unnext called twice without an intervening next");
}

/// A document barrel's per-document class id must index into its class table.
pub fn check_class_in_range(class: u32, num_classes: usize) {
    debug_assert!(
        (class as usize) < num_classes || num_classes == 0,
        "class id {class} out of range for {num_classes} classes"
    );
}
