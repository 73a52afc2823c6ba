//! String and buffer utilities on top of the audited heap.
//!
//! Two families live here. The allocating family (`concat`, `trim`,
//! `split`, `token`, `read_line`, `replace_if_changed`) hangs off [`Heap`]
//! so every produced string is tracked on the diagnostic stream. The
//! buffer family (`bounded_copy`, `write_bounded`, `read_file`,
//! `read_file_at`) fills caller-owned scratch buffers, always
//! null-terminated so fixed-size parsing buffers stay readable as C-style
//! strings via [`buf_str`].

use crate::fatal;
use crate::heap::{Heap, TrackedString};
use std::ffi::CString;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, Read};
use std::os::fd::{AsRawFd, FromRawFd};
use std::path::Path;

impl Heap {
    /// New string with leading/trailing space, tab and newline stripped.
    #[track_caller]
    pub fn trim(&self, s: &str) -> TrackedString {
        self.dup(s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n')))
    }

    /// Split `s` on `sep` into newly allocated substrings.
    ///
    /// A trailing empty segment after the final separator is dropped;
    /// interior empty segments are kept. Dropping the returned vector
    /// releases every element, then the array.
    #[track_caller]
    pub fn split(&self, s: &str, sep: char) -> Vec<TrackedString> {
        let mut pieces: Vec<&str> = s.split(sep).collect();
        if pieces.last() == Some(&"") {
            pieces.pop();
        }
        let mut out = Vec::with_capacity(10);
        for piece in pieces {
            out.push(self.dup(piece));
        }
        out
    }

    /// The n-th (1-indexed) whitespace-delimited token of `line`, of
    /// unbounded length. `None` when the line has fewer tokens.
    #[track_caller]
    pub fn token(&self, line: &str, n: usize) -> Option<TrackedString> {
        if n == 0 {
            return None;
        }
        line.split_ascii_whitespace()
            .nth(n - 1)
            .map(|t| self.dup(t))
    }

    /// Read one line of unbounded length from `reader`.
    ///
    /// Strips a trailing newline. Returns `None` only when nothing was
    /// read before end-of-stream; a final unterminated line is returned
    /// as-is. Interrupted reads are retried transparently.
    #[track_caller]
    pub fn read_line<R: BufRead>(&self, reader: &mut R) -> io::Result<Option<TrackedString>> {
        let mut raw = Vec::new();
        let n = reader.read_until(b'\n', &mut raw)?;
        if n == 0 {
            return Ok(None);
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        let line = String::from_utf8_lossy(&raw);
        Ok(Some(self.dup(&line)))
    }

    /// Replace the string held in `slot` with `value`, allocating only on
    /// change. Identical contents are a no-op; on change the old value is
    /// released and `value` duplicated.
    #[track_caller]
    pub fn replace_if_changed(&self, slot: &mut Option<TrackedString>, value: &str) {
        if let Some(current) = slot {
            if current.as_str() == value {
                return;
            }
        }
        *slot = Some(self.dup(value));
    }
}

/// Copy `src` into `dest`, writing at most `dest.len() - 1` bytes plus a
/// null terminator. Returns the number of bytes copied. An empty `dest`
/// is fatal. Never splits a UTF-8 scalar.
#[track_caller]
pub fn bounded_copy(dest: &mut [u8], src: &str) -> usize {
    if dest.is_empty() {
        fatal::guard_violation("bounded copy into zero-capacity buffer");
    }
    let mut end = (dest.len() - 1).min(src.len());
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    dest[..end].copy_from_slice(&src.as_bytes()[..end]);
    dest[end] = 0;
    end
}

/// Formatted write into a fixed buffer, null-terminated. Truncation is a
/// programmer error and fatal, as is an empty `dest`. Returns the number
/// of bytes written.
#[track_caller]
pub fn write_bounded(dest: &mut [u8], args: fmt::Arguments<'_>) -> usize {
    if dest.is_empty() {
        fatal::guard_violation("bounded write into zero-capacity buffer");
    }
    let cap = dest.len() - 1;
    let mut writer = SliceWriter {
        buf: &mut dest[..cap],
        written: 0,
    };
    let truncated = fmt::write(&mut writer, args).is_err();
    let written = writer.written;
    if truncated {
        fatal::guard_violation("bounded formatted write truncated");
    }
    dest[written] = 0;
    written
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let room = self.buf.len() - self.written;
        if bytes.len() > room {
            return Err(fmt::Error);
        }
        self.buf[self.written..self.written + bytes.len()].copy_from_slice(bytes);
        self.written += bytes.len();
        Ok(())
    }
}

/// Read a null-terminated scratch buffer back as a string slice. Stops at
/// the first null byte or the first invalid UTF-8 sequence.
pub fn buf_str(buf: &[u8]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let prefix = &buf[..end];
    match std::str::from_utf8(prefix) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&prefix[..e.valid_up_to()]).unwrap_or_default(),
    }
}

/// Case-insensitive (ASCII) substring search, allocation-free.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Read up to `buf.len() - 1` bytes from the file at `path` into `buf`,
/// null-terminating the result. Returns the byte count read, or the OS
/// error. The descriptor is released on every exit path.
pub fn read_file(path: &Path, buf: &mut [u8]) -> io::Result<usize> {
    let file = File::open(path)?;
    read_into(file, buf)
}

/// `read_file` relative to an open directory, via `openat(2)`. Avoids
/// re-resolving the directory prefix on hot /proc scans.
pub fn read_file_at(dir: &File, name: &str, buf: &mut [u8]) -> io::Result<usize> {
    let cname = CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a null byte"))?;
    let fd = unsafe {
        libc::openat(
            dir.as_raw_fd(),
            cname.as_ptr(),
            libc::O_RDONLY | libc::O_CLOEXEC,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let file = unsafe { File::from_raw_fd(fd) };
    read_into(file, buf)
}

fn read_into(mut file: File, buf: &mut [u8]) -> io::Result<usize> {
    if buf.is_empty() {
        return Err(io::Error::from_raw_os_error(libc::EINVAL));
    }
    let cap = buf.len() - 1;
    let mut total = 0;
    while total < cap {
        match file.read(&mut buf[total..cap]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf[total] = 0;
    Ok(total)
}
