//! Model-checks the phase-A idempotent-store race of spec.md §4.5: two
//! workers proposing moves whose destinations share a scratch cell both do
//! a plain `store(true, Relaxed)`, never a compare-exchange, because the
//! write is idempotent (spec §4.5, "Atomicity note"). `loom` exhaustively
//! explores thread interleavings and asserts the cell ends up set no
//! matter which worker "wins."
//!
//! Only compiled under `#[cfg(loom)]`; run with:
//! `RUSTFLAGS="--cfg loom" cargo test --test loom_scratch --release`

#![cfg(loom)]

use loom::sync::Arc;
use std::sync::atomic::Ordering;

use bfm_engine::concurrency::atomic::GhostAtomicBool;

#[test]
fn concurrent_idempotent_marks_always_leave_cell_set() {
    loom::model(|| {
        let cell = Arc::new(GhostAtomicBool::new(false));

        let writer = {
            let cell = Arc::clone(&cell);
            loom::thread::spawn(move || {
                cell.store(true, Ordering::Relaxed);
            })
        };

        // The "other worker" racing to mark the same destination cell.
        cell.store(true, Ordering::Relaxed);

        writer.join().unwrap();

        assert!(cell.load(Ordering::Relaxed));
    });
}

#[test]
fn scratch_mark_then_clear_is_never_observed_as_both_unset_and_set() {
    // Models phase A (mark) racing with... nothing yet, since phase C's
    // clear only ever runs after phase B's barrier. This test exists to
    // pin down that a *single* writer's mark is visible to a same-thread
    // reader immediately after, which the settle phase (phase C) relies on
    // when it unconditionally clears the destination cell it just read as
    // its own.
    loom::model(|| {
        let cell = GhostAtomicBool::new(false);
        cell.store(true, Ordering::Relaxed);
        assert!(cell.load(Ordering::Relaxed));
        cell.store(false, Ordering::Relaxed);
        assert!(!cell.load(Ordering::Relaxed));
    });
}
