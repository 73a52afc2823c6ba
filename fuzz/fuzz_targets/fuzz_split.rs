//! Fuzz target for separator splitting and trimming.
//!
//! Both must handle arbitrary input without panicking; the trailing-empty
//! rule must never drop more than one segment.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pw_core::{AuditLog, Heap};

fuzz_target!(|input: (&str, char)| {
    let (s, sep) = input;
    let heap = Heap::new(AuditLog::with_writer(Box::new(std::io::sink())));

    let parts = heap.split(s, sep);
    let naive = s.split(sep).count();
    assert!(parts.len() == naive || parts.len() + 1 == naive);

    let _ = heap.trim(s);
});
