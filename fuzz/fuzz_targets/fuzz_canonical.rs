//! Fuzz target for canonical keys.
//!
//! The canonical key is idempotent, shared with the reverse complement and
//! no greater than either strand as a string.

#![no_main]

use kmercov::kmer::{Kmer, KmerLength};
use libfuzzer_sys::fuzz_target;

fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'T' => b'A',
            b'C' => b'G',
            b'G' => b'C',
            _ => unreachable!(),
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 32 {
        return;
    }
    if !data.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')) {
        return;
    }

    let k = KmerLength::new(data.len()).unwrap();
    let kmer = Kmer::encode(data).unwrap();
    let canonical = kmer.canonical(k);

    assert_eq!(canonical.canonical(k), canonical, "not idempotent");

    let rc = reverse_complement(data);
    let rc_kmer = Kmer::encode(&rc).unwrap();
    assert_eq!(kmer.reverse_complement(k), rc_kmer);
    assert_eq!(rc_kmer.canonical(k), canonical, "strands disagree");

    let text = canonical.to_bytes(k);
    assert!(text.as_slice() <= data);
    assert!(text <= rc);
});
