//! On-disk run files holding one split's deduplicated hits.
//!
//! A run file is a flat array of fixed-width records grouped by
//! representative: a header record (the representative itself, score 0),
//! the member hits, and a terminator with `seq_id == u32::MAX`. Records of
//! one `(representative, target, diagonal)` triple are already reduced to a
//! single record whose score counts the collapsed k-mer hits.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use seqclust_seq::PackedKmer;

use crate::errors::KmerError;
use crate::token::{KmerToken, SeqLenType};

/// One run file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRecord<L> {
    pub seq_id: u32,
    pub diag: L,
    pub score: u16,
    pub rev: bool,
}

impl<L: SeqLenType> RunRecord<L> {
    /// Serialized width: `seq_id:u32, score:u16, diag:i16|i32, rev:u8`.
    pub const WIDTH: usize = if L::WIDE { 11 } else { 9 };

    fn terminator() -> RunRecord<L> {
        RunRecord { seq_id: u32::MAX, diag: L::zero(), score: 0, rev: false }
    }

    pub fn is_terminator(&self) -> bool { self.seq_id == u32::MAX }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.seq_id.to_le_bytes());
        out.extend_from_slice(&self.score.to_le_bytes());
        if L::WIDE {
            out.extend_from_slice(&(self.diag.to_i64() as i32).to_le_bytes());
        } else {
            out.extend_from_slice(&(self.diag.to_i64() as i16).to_le_bytes());
        }
        out.push(self.rev as u8);
    }

    pub fn decode(bytes: &[u8]) -> RunRecord<L> {
        let seq_id = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let score = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        let (diag, rest) = if L::WIDE {
            (i32::from_le_bytes(bytes[6..10].try_into().unwrap()) as i64, 10)
        } else {
            (i16::from_le_bytes(bytes[6..8].try_into().unwrap()) as i64, 8)
        };
        RunRecord {
            seq_id,
            diag: L::from_i64(diag),
            score,
            rev: bytes[rest] != 0,
        }
    }
}

/// The `.done` marker of a completed split.
pub fn done_path(run_path: &Path) -> PathBuf {
    let mut os = run_path.as_os_str().to_owned();
    os.push(".done");
    PathBuf::from(os)
}

/// Serializes grouped hit tokens (sort-2 order) into a run file, collapsing
/// duplicate `(target, diagonal)` tokens into one record each, and drops
/// the `.done` marker so a restarted job can skip the split.
pub fn write_run_file<L: SeqLenType>(
    path: &Path,
    tokens: &[KmerToken<L>],
    nucleotide: bool,
) -> Result<(), KmerError> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut buf: Vec<u8> = Vec::with_capacity(1 << 16);

    let mut current_rep: Option<u32> = None;
    let mut i = 0usize;
    while i < tokens.len() && !tokens[i].is_sentinel() {
        let raw = tokens[i].kmer;
        let rep = PackedKmer::index_of(raw) as u32;
        if current_rep != Some(rep) {
            if current_rep.is_some() {
                RunRecord::<L>::terminator().encode(&mut buf);
            }
            let header = RunRecord {
                seq_id: rep,
                diag: L::zero(),
                score: 0,
                rev: nucleotide && !PackedKmer::unpack(raw).forward,
            };
            header.encode(&mut buf);
            current_rep = Some(rep);
        }

        let target = tokens[i].id;
        let diag = tokens[i].pos;
        let mut count = 0u32;
        let mut forward = 0u32;
        let mut reverse = 0u32;
        while i < tokens.len()
            && !tokens[i].is_sentinel()
            && tokens[i].id == target
            && tokens[i].pos == diag
            && PackedKmer::index_of(tokens[i].kmer) as u32 == rep
        {
            count += 1;
            if nucleotide {
                if PackedKmer::unpack(tokens[i].kmer).forward {
                    forward += 1;
                } else {
                    reverse += 1;
                }
            }
            i += 1;
        }

        let record = RunRecord {
            seq_id: target,
            diag,
            score: count.min(u16::MAX as u32) as u16,
            rev: reverse > forward,
        };
        record.encode(&mut buf);
        if buf.len() >= (1 << 16) - RunRecord::<L>::WIDTH * 2 {
            out.write_all(&buf)?;
            buf.clear();
        }
    }
    if current_rep.is_some() {
        RunRecord::<L>::terminator().encode(&mut buf);
    }
    out.write_all(&buf)?;
    out.flush()?;

    File::create(done_path(path))?;
    Ok(())
}

/// Streams the member records of a run file, resolving each to its group's
/// representative; headers and terminators are consumed internally.
pub struct RunCursor<'a, L> {
    data: &'a [u8],
    offset: usize,
    current_rep: u32,
    at_group_start: bool,
    _marker: std::marker::PhantomData<L>,
}

impl<'a, L: SeqLenType> RunCursor<'a, L> {
    pub fn new(data: &'a [u8]) -> RunCursor<'a, L> {
        RunCursor {
            data,
            offset: 0,
            current_rep: u32::MAX,
            at_group_start: true,
            _marker: std::marker::PhantomData,
        }
    }

    /// The next member record and its representative.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(u32, RunRecord<L>)> {
        loop {
            if self.offset + RunRecord::<L>::WIDTH > self.data.len() {
                return None;
            }
            let record = RunRecord::<L>::decode(&self.data[self.offset..]);
            self.offset += RunRecord::<L>::WIDTH;
            if self.at_group_start {
                self.current_rep = record.seq_id;
                self.at_group_start = false;
                continue;
            }
            if record.is_terminator() {
                self.at_group_start = true;
                continue;
            }
            return Some((self.current_rep, record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_file_round_trips_and_reduces_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out_split_0");

        // rep 4: target 6 hit twice on diagonal 3, once on diagonal 5
        let tokens = vec![
            KmerToken::<i16> { kmer: 4, id: 4, pos: 0, seq_len: 40 },
            KmerToken::<i16> { kmer: 4, id: 6, pos: 3, seq_len: 30 },
            KmerToken::<i16> { kmer: 4, id: 6, pos: 3, seq_len: 30 },
            KmerToken::<i16> { kmer: 4, id: 6, pos: 5, seq_len: 30 },
            KmerToken::<i16> { kmer: 9, id: 9, pos: 0, seq_len: 20 },
            KmerToken::<i16> { kmer: 9, id: 2, pos: -7, seq_len: 10 },
            KmerToken::<i16>::sentinel(),
        ];
        write_run_file(&path, &tokens, false).unwrap();
        assert!(done_path(&path).exists());

        let data = std::fs::read(&path).unwrap();
        let mut cursor: RunCursor<'_, i16> = RunCursor::new(&data);

        let (rep, rec) = cursor.next().unwrap();
        assert_eq!((rep, rec.seq_id, rec.score, rec.diag), (4, 4, 1, 0));
        let (_, rec) = cursor.next().unwrap();
        assert_eq!((rec.seq_id, rec.score, rec.diag), (6, 2, 3));
        let (_, rec) = cursor.next().unwrap();
        assert_eq!((rec.seq_id, rec.score, rec.diag), (6, 1, 5));
        let (rep, rec) = cursor.next().unwrap();
        assert_eq!((rep, rec.seq_id, rec.diag), (9, 9, 0));
        let (rep, rec) = cursor.next().unwrap();
        assert_eq!((rep, rec.seq_id, rec.diag), (9, 2, -7));
        assert!(cursor.next().is_none());
    }
}
