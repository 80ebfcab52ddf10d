//! Fuzz target for the binary profile reader.
//!
//! Arbitrary bytes must never panic: every record is either decoded or
//! reported as an error, after which the reader stops.

#![no_main]

use std::io::Cursor;

use kmercov::profile::ProfileReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = ProfileReader::new(Cursor::new(data), "fuzz");
    let mut consumed = 0usize;
    for record in reader.by_ref() {
        match record {
            Ok(counts) => consumed += 4 + 4 * counts.len(),
            Err(_) => break,
        }
    }
    assert!(consumed <= data.len());
    assert!(reader.next().is_none(), "reader yielded after the end");
});
