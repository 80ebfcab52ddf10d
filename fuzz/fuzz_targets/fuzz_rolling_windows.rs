//! Fuzz target for the rolling encoder.
//!
//! `Kmers` must yield exactly the valid windows of the input, in order, with
//! the same keys as encoding every window from scratch.

#![no_main]

use kmercov::{
    kmer::{Kmer, KmerLength},
    window::{windows, Kmers},
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&first, seq)) = data.split_first() else {
        return;
    };
    let k = KmerLength::new(usize::from(first % 32) + 1).unwrap();
    let canonical = first >= 128;

    let rolled: Vec<Kmer> = Kmers::new(seq, k, canonical).collect();
    let expected: Vec<Kmer> = windows(seq, k)
        .filter_map(|w| Kmer::encode(w).ok())
        .map(|kmer| if canonical { kmer.canonical(k) } else { kmer })
        .collect();

    assert_eq!(rolled, expected);
});
