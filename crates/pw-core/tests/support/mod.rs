//! Shared helpers for integration tests.
#![allow(dead_code)]

use pw_core::{AuditLog, Heap};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// In-memory audit sink the test can read back.
#[derive(Clone, Default)]
pub struct SharedSink(pub Rc<RefCell<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A heap whose audit stream lands in the returned sink.
pub fn heap_with_sink() -> (Heap, SharedSink) {
    let sink = SharedSink::default();
    let heap = Heap::new(AuditLog::with_writer(Box::new(sink.clone())));
    (heap, sink)
}

/// The audit stream contents as lines.
pub fn audit_lines(sink: &SharedSink) -> Vec<String> {
    String::from_utf8(sink.0.borrow().clone())
        .expect("audit stream is utf-8")
        .lines()
        .map(str::to_owned)
        .collect()
}

/// Count the audit lines containing `needle`.
pub fn count_lines_with(sink: &SharedSink, needle: &str) -> usize {
    audit_lines(sink)
        .iter()
        .filter(|l| l.contains(needle))
        .count()
}
