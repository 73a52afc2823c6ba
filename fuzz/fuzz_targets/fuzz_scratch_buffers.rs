//! Fuzz target for the bounded scratch-buffer helpers.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pw_core::strings::{bounded_copy, buf_str, contains_ignore_case};

fuzz_target!(|input: (String, String, u8)| {
    let (src, needle, cap) = input;

    if cap > 0 {
        let mut dest = vec![0xFFu8; cap as usize];
        let n = bounded_copy(&mut dest, &src);
        assert!(n < dest.len());
        assert_eq!(dest[n], 0);
        let _ = buf_str(&dest);
    }

    let _ = contains_ignore_case(&src, &needle);
});
