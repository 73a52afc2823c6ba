//! Fail-fast, audit-logged heap facade.
//!
//! Every allocation the rest of the tool makes goes through [`Heap`]. The
//! facade hands out owned [`TrackedBuf`]/[`TrackedString`] values whose
//! creation, growth and scope-exit release each emit one record to the
//! diagnostic stream. Sizes are validated before any arithmetic: zero
//! sizes are programmer errors and `count * size` overflow is caught with
//! a division guard before the multiply happens.
//!
//! Allocation failure is unrecoverable here; see the `fatal` module for the
//! termination policy. A failed growth still emits the release record for
//! the original buffer, so the trail stays consistent on the fatal path.
//!
//! The facade and its tracked values share the stream through `Rc` and are
//! deliberately not `Send`; callers wanting cross-thread use must serialize
//! externally.

use crate::audit::{AuditEntry, AuditLog, AuditVerb};
use crate::fatal;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::rc::Rc;

/// Heap-allocating formatted-string construction through a [`Heap`].
///
/// ```ignore
/// let label = tracked_format!(heap, "cpu{}", 3);
/// ```
#[macro_export]
macro_rules! tracked_format {
    ($heap:expr, $($arg:tt)*) => {
        $heap.formatted(format_args!($($arg)*))
    };
}

/// The allocation facade. Cheap to clone; clones share the audit stream.
#[derive(Clone)]
pub struct Heap {
    log: Rc<AuditLog>,
}

impl Heap {
    /// Bind the facade to its diagnostic stream.
    pub fn new(log: AuditLog) -> Self {
        Heap { log: Rc::new(log) }
    }

    /// The underlying stream, for flushing and inspection.
    pub fn audit(&self) -> &AuditLog {
        &self.log
    }

    /// Allocate `size` bytes. Zero is fatal.
    #[track_caller]
    pub fn alloc(&self, size: usize) -> TrackedBuf {
        if size == 0 {
            fatal::guard_violation("zero-size allocation");
        }
        self.raw_buf(size, AuditVerb::Allocated, Location::caller())
    }

    /// Allocate `count` elements of `size` bytes. Overflow and zeros are
    /// fatal.
    #[track_caller]
    pub fn alloc_array(&self, count: usize, size: usize) -> TrackedBuf {
        let total = checked_total(count, size);
        self.raw_buf(total, AuditVerb::Allocated, Location::caller())
    }

    /// Allocate `count` elements of `size` bytes, zero-filled by contract.
    #[track_caller]
    pub fn alloc_zeroed(&self, count: usize, size: usize) -> TrackedBuf {
        let total = checked_total(count, size);
        self.raw_buf(total, AuditVerb::AllocatedZeroed, Location::caller())
    }

    /// Duplicate a string into a fresh tracked allocation.
    #[track_caller]
    pub fn dup(&self, s: &str) -> TrackedString {
        let value = self.copy_exact(s);
        self.raw_string(value, AuditVerb::Duplicated, Location::caller())
    }

    /// Duplicate at most `len` bytes of `s`, never splitting a UTF-8 scalar.
    #[track_caller]
    pub fn dup_bounded(&self, s: &str, len: usize) -> TrackedString {
        let mut end = len.min(s.len());
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let value = self.copy_exact(&s[..end]);
        self.raw_string(value, AuditVerb::Duplicated, Location::caller())
    }

    /// Concatenate two strings into an allocation of exactly
    /// `a.len() + b.len()` bytes.
    #[track_caller]
    pub fn concat(&self, a: &str, b: &str) -> TrackedString {
        let mut value = String::new();
        if value.try_reserve_exact(a.len() + b.len()).is_err() {
            fatal::out_of_memory(a.len() + b.len());
        }
        value.push_str(a);
        value.push_str(b);
        self.raw_string(value, AuditVerb::Allocated, Location::caller())
    }

    /// Heap-allocating formatted construction; see [`tracked_format!`].
    #[track_caller]
    pub fn formatted(&self, args: fmt::Arguments<'_>) -> TrackedString {
        let value = fmt::format(args);
        self.raw_string(value, AuditVerb::Allocated, Location::caller())
    }

    fn copy_exact(&self, s: &str) -> String {
        let mut value = String::new();
        if value.try_reserve_exact(s.len()).is_err() {
            fatal::out_of_memory(s.len());
        }
        value.push_str(s);
        value
    }

    fn raw_buf(
        &self,
        size: usize,
        verb: AuditVerb,
        site: &'static Location<'static>,
    ) -> TrackedBuf {
        let mut bytes = Vec::new();
        if bytes.try_reserve_exact(size).is_err() {
            fatal::out_of_memory(size);
        }
        bytes.resize(size, 0);
        let buf = TrackedBuf {
            bytes,
            log: Rc::clone(&self.log),
        };
        self.log
            .record(&AuditEntry::new(buf.identity(), verb, Some(size), site));
        buf
    }

    fn raw_string(
        &self,
        value: String,
        verb: AuditVerb,
        site: &'static Location<'static>,
    ) -> TrackedString {
        let s = TrackedString {
            value,
            log: Rc::clone(&self.log),
        };
        self.log
            .record(&AuditEntry::new(s.identity(), verb, Some(s.value.len()), site));
        s
    }
}

/// Overflow-guarded `count * size`, checked before the multiply.
#[track_caller]
fn checked_total(count: usize, size: usize) -> usize {
    if count == 0 || size == 0 {
        fatal::guard_violation("zero-count or zero-size array allocation");
    }
    if usize::MAX / count < size {
        fatal::guard_violation("array allocation size overflows");
    }
    count * size
}

/// An owned byte buffer whose lifecycle is recorded on the diagnostic
/// stream. Released (and logged) automatically at scope exit.
pub struct TrackedBuf {
    bytes: Vec<u8>,
    log: Rc<AuditLog>,
}

impl TrackedBuf {
    /// Pointer identity as recorded on the stream.
    pub fn identity(&self) -> usize {
        self.bytes.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Resize to `size` bytes. Zero is fatal. Growth zero-fills the tail;
    /// shrinking keeps the leading contents, like the platform realloc.
    #[track_caller]
    pub fn resize(&mut self, size: usize) {
        if size == 0 {
            fatal::guard_violation("zero-size reallocation");
        }
        self.resize_inner(size, Location::caller());
    }

    /// Resize to `count` elements of `size` bytes, overflow-guarded.
    #[track_caller]
    pub fn resize_array(&mut self, count: usize, size: usize) {
        let total = checked_total(count, size);
        self.resize_inner(total, Location::caller());
    }

    /// Resize from `prev_count` to `new_count` elements of `size` bytes.
    /// Equal counts are a no-op (and emit no record); growth zero-fills
    /// exactly the added tail and leaves the original bytes unchanged.
    #[track_caller]
    pub fn resize_array_zeroed(&mut self, prev_count: usize, new_count: usize, size: usize) {
        debug_assert_eq!(self.bytes.len(), prev_count.saturating_mul(size));
        if prev_count == new_count {
            return;
        }
        let total = checked_total(new_count, size);
        self.resize_inner(total, Location::caller());
    }

    fn resize_inner(&mut self, size: usize, site: &'static Location<'static>) {
        if size > self.bytes.len() {
            let additional = size - self.bytes.len();
            if self.bytes.try_reserve_exact(additional).is_err() {
                // The original buffer is gone either way; keep the trail
                // consistent before terminating.
                self.log.record(&AuditEntry::new(
                    self.identity(),
                    AuditVerb::Deallocated,
                    None,
                    site,
                ));
                fatal::out_of_memory(size);
            }
            self.bytes.resize(size, 0);
        } else {
            self.bytes.truncate(size);
            self.bytes.shrink_to_fit();
        }
        self.log.record(&AuditEntry::new(
            self.identity(),
            AuditVerb::Reallocated,
            Some(size),
            site,
        ));
    }
}

impl Deref for TrackedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for TrackedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl fmt::Debug for TrackedBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedBuf")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Drop for TrackedBuf {
    fn drop(&mut self) {
        self.log.record(&AuditEntry::new(
            self.identity(),
            AuditVerb::Deallocated,
            None,
            Location::caller(),
        ));
    }
}

/// An owned string whose lifecycle is recorded on the diagnostic stream.
pub struct TrackedString {
    value: String,
    log: Rc<AuditLog>,
}

impl TrackedString {
    /// Pointer identity as recorded on the stream.
    pub fn identity(&self) -> usize {
        self.value.as_ptr() as usize
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl Deref for TrackedString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.value
    }
}

impl AsRef<str> for TrackedString {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl PartialEq<&str> for TrackedString {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

impl PartialEq for TrackedString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for TrackedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for TrackedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

impl Drop for TrackedString {
    fn drop(&mut self) {
        self.log.record(&AuditEntry::new(
            self.identity(),
            AuditVerb::Deallocated,
            None,
            Location::caller(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Write;

    // Shared in-memory sink so tests can read the stream back.
    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn heap_with_sink() -> (Heap, SharedSink) {
        let sink = SharedSink::default();
        let heap = Heap::new(AuditLog::with_writer(Box::new(sink.clone())));
        (heap, sink)
    }

    fn lines(sink: &SharedSink) -> Vec<String> {
        String::from_utf8(sink.0.borrow().clone())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_alloc_is_exactly_sized_and_logged() {
        let (heap, sink) = heap_with_sink();
        let buf = heap.alloc(64);
        assert_eq!(buf.len(), 64);
        let lines = lines(&sink);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" allocated 64 bytes "));
        assert!(lines[0].contains(file!()));
    }

    #[test]
    fn test_drop_logs_release() {
        let (heap, sink) = heap_with_sink();
        drop(heap.alloc(8));
        let lines = lines(&sink);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains(" deallocated "));
        assert_eq!(heap.audit().entry_count(), 2);
    }

    #[test]
    fn test_alloc_zeroed_verb_and_contents() {
        let (heap, sink) = heap_with_sink();
        let buf = heap.alloc_zeroed(3, 4);
        assert_eq!(buf.len(), 12);
        assert!(buf.iter().all(|&b| b == 0));
        assert!(lines(&sink)[0].contains(" allocated and zeroised 12 bytes "));
    }

    #[test]
    #[should_panic(expected = "zero-size allocation")]
    fn test_zero_alloc_is_fatal() {
        let (heap, _sink) = heap_with_sink();
        let _ = heap.alloc(0);
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn test_overflow_is_caught_before_multiplying() {
        let (heap, _sink) = heap_with_sink();
        let _ = heap.alloc_zeroed(usize::MAX / 2, 3);
    }

    #[test]
    #[should_panic(expected = "zero-count or zero-size")]
    fn test_zero_count_array_is_fatal() {
        let (heap, _sink) = heap_with_sink();
        let _ = heap.alloc_array(0, 8);
    }

    #[test]
    fn test_resize_array_zeroed_grows_and_preserves() {
        let (heap, sink) = heap_with_sink();
        let mut buf = heap.alloc_zeroed(3, 4);
        buf.as_mut_slice().copy_from_slice(&[0xAB; 12]);
        buf.resize_array_zeroed(3, 6, 4);
        assert_eq!(buf.len(), 24);
        assert_eq!(&buf[..12], &[0xAB; 12]);
        assert_eq!(&buf[12..], &[0u8; 12]);
        assert!(lines(&sink)[1].contains(" reallocated 24 bytes "));
    }

    #[test]
    fn test_resize_array_zeroed_equal_counts_is_a_no_op() {
        let (heap, sink) = heap_with_sink();
        let mut buf = heap.alloc_zeroed(4, 2);
        let before = lines(&sink).len();
        buf.resize_array_zeroed(4, 4, 2);
        assert_eq!(lines(&sink).len(), before);
    }

    #[test]
    fn test_shrink_keeps_leading_contents() {
        let (heap, _sink) = heap_with_sink();
        let mut buf = heap.alloc(8);
        buf.as_mut_slice().copy_from_slice(b"abcdefgh");
        buf.resize(3);
        assert_eq!(buf.as_slice(), b"abc");
    }

    #[test]
    fn test_dup_and_concat_verbs() {
        let (heap, sink) = heap_with_sink();
        let a = heap.dup("proc");
        let b = heap.concat(&a, "watch");
        assert_eq!(b, "procwatch");
        let lines = lines(&sink);
        assert!(lines[0].contains(" duplicated 4 bytes "));
        assert!(lines[1].contains(" allocated 9 bytes "));
    }

    #[test]
    fn test_dup_bounded_respects_char_boundaries() {
        let (heap, _sink) = heap_with_sink();
        assert_eq!(heap.dup_bounded("hello", 3), "hel");
        // "é" is two bytes; cutting inside it falls back to the boundary
        assert_eq!(heap.dup_bounded("é", 1), "");
    }

    #[test]
    fn test_tracked_format() {
        let (heap, sink) = heap_with_sink();
        let s = tracked_format!(heap, "cpu{}", 3);
        assert_eq!(s, "cpu3");
        assert!(lines(&sink)[0].contains(" allocated 4 bytes "));
    }
}
