//! Binary per-position coverage profiles.
//!
//! A profile holds one record per gene, in gene order. Each record is a
//! little-endian `u32` window count followed by that many little-endian `u32`
//! per-position counts. Counts above `u32::MAX` saturate. A gene shorter than
//! the k-mer length is written as an empty record.

use std::{
    fs::File,
    io::{self, BufReader, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use crate::error::KmerCovError;

/// Writes one record.
pub fn write_record<W: Write>(out: &mut W, counts: &[u64]) -> io::Result<()> {
    let len = u32::try_from(counts.len())
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "gene has more than u32::MAX windows"))?;
    out.write_all(&len.to_le_bytes())?;
    for &count in counts {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        out.write_all(&count.to_le_bytes())?;
    }
    Ok(())
}

/// Streams the records of a profile.
#[derive(Debug)]
pub struct ProfileReader<R> {
    inner: R,
    path: PathBuf,
    record: usize,
    failed: bool,
}

impl ProfileReader<BufReader<File>> {
    /// Opens a profile file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KmerCovError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| KmerCovError::SequenceRead {
            source,
            path: path.to_path_buf(),
        })?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: Read> ProfileReader<R> {
    /// Reads records from `inner`; `path` labels errors.
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            record: 0,
            failed: false,
        }
    }

    fn invalid(&self, details: String) -> KmerCovError {
        KmerCovError::InvalidProfile {
            details,
            path: self.path.clone(),
        }
    }

    /// Reads the leading window count, or `None` at a clean end of file.
    fn read_len(&mut self) -> Result<Option<u32>, KmerCovError> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(self.invalid(format!(
                        "record {} ends inside its length prefix",
                        self.record
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(self.invalid(e.to_string())),
            }
        }
        Ok(Some(u32::from_le_bytes(buf)))
    }

    fn read_record(&mut self) -> Result<Option<Vec<u32>>, KmerCovError> {
        let Some(len) = self.read_len()? else {
            return Ok(None);
        };
        // Never trust the prefix for an allocation size.
        let expected = len as usize * 4;
        let mut bytes = Vec::new();
        let read = (&mut self.inner)
            .take(expected as u64)
            .read_to_end(&mut bytes);
        if let Err(e) = read {
            return Err(self.invalid(e.to_string()));
        }
        if bytes.len() < expected {
            return Err(self.invalid(format!(
                "record {} is truncated: expected {len} counts",
                self.record
            )));
        }
        self.record += 1;
        Ok(Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        ))
    }
}

impl<R: Read> Iterator for ProfileReader<R> {
    type Item = Result<Vec<u32>, KmerCovError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let record = self.read_record().transpose();
        self.failed = matches!(record, Some(Err(_)));
        record
    }
}

/// Reads every record of a profile file.
pub fn read_profile<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<u32>>, KmerCovError> {
    ProfileReader::open(path)?.collect()
}

/// Writes a profile as text: one tab-separated line of counts per gene.
pub fn dump<R: Read, W: Write>(records: ProfileReader<R>, out: &mut W) -> Result<(), KmerCovError> {
    for record in records {
        let record = record?;
        let mut first = true;
        for count in record {
            if !first {
                out.write_all(b"\t")?;
            }
            write!(out, "{count}")?;
            first = false;
        }
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(records: &[&[u64]]) -> Vec<u8> {
        let mut out = Vec::new();
        for record in records {
            write_record(&mut out, record).unwrap();
        }
        out
    }

    #[test]
    fn layout_is_little_endian() {
        let bytes = encode(&[&[1, 258]]);
        assert_eq!(bytes, [2, 0, 0, 0, 1, 0, 0, 0, 2, 1, 0, 0]);
    }

    #[test]
    fn counts_saturate() {
        let bytes = encode(&[&[u64::from(u32::MAX) + 5]]);
        let records: Vec<_> = ProfileReader::new(Cursor::new(bytes), "p.bin")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records, [vec![u32::MAX]]);
    }

    #[test]
    fn empty_record_survives() {
        let bytes = encode(&[&[3, 4], &[], &[7]]);
        let records: Vec<_> = ProfileReader::new(Cursor::new(bytes), "p.bin")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records, [vec![3, 4], vec![], vec![7]]);
    }

    #[test]
    fn truncated_record_is_an_error() {
        let mut bytes = encode(&[&[3, 4]]);
        bytes.pop();
        let mut reader = ProfileReader::new(Cursor::new(bytes), "p.bin");
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, KmerCovError::InvalidProfile { .. }));
        assert!(reader.next().is_none());
    }

    #[test]
    fn truncated_prefix_is_an_error() {
        let reader = ProfileReader::new(Cursor::new(vec![1, 0]), "p.bin");
        let result: Result<Vec<_>, _> = reader.collect();
        assert!(matches!(result, Err(KmerCovError::InvalidProfile { .. })));
    }

    #[test]
    fn dump_writes_one_line_per_gene() {
        let bytes = encode(&[&[2, 1, 1], &[], &[0]]);
        let mut out = Vec::new();
        dump(ProfileReader::new(Cursor::new(bytes), "p.bin"), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2\t1\t1\n\n0\n");
    }
}
