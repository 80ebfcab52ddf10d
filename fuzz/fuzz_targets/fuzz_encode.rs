//! Fuzz target for `Kmer::encode`.
//!
//! Arbitrary bytes are either rejected at the first invalid base or encoded
//! into a key that unpacks to the upper-cased input.

#![no_main]

use kmercov::kmer::{Kmer, KmerLength};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 32 {
        return;
    }
    let k = KmerLength::new(data.len()).unwrap();

    match Kmer::encode(data) {
        Ok(kmer) => {
            assert_eq!(kmer.to_bytes(k), data.to_ascii_uppercase());
            assert_eq!(kmer.bits() & !k.mask(), 0, "bits above 2k are set");
        }
        Err(err) => {
            let first_invalid = data
                .iter()
                .position(|b| !matches!(b, b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't'));
            assert_eq!(Some(err.position), first_invalid);
            assert_eq!(err.base, data[err.position]);
        }
    }
});
