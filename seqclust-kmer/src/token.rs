//! The k-mer token record and its sort orders.

use std::cmp::Ordering;

use seqclust_seq::PackedKmer;

/// Position / length type of a token, chosen once per job: the narrow
/// variant when every sequence fits `i16`, the wide one otherwise.
pub trait SeqLenType:
    Copy + Clone + Ord + Eq + Send + Sync + std::fmt::Debug + 'static
{
    const WIDE: bool;

    fn from_usize(v: usize) -> Self;
    fn from_i64(v: i64) -> Self;
    fn to_i64(self) -> i64;
    fn zero() -> Self;
}

impl SeqLenType for i16 {
    const WIDE: bool = false;

    fn from_usize(v: usize) -> Self { v as i16 }
    fn from_i64(v: i64) -> Self { v as i16 }
    fn to_i64(self) -> i64 { self as i64 }
    fn zero() -> Self { 0 }
}

impl SeqLenType for i32 {
    const WIDE: bool = true;

    fn from_usize(v: usize) -> Self { v as i32 }
    fn from_i64(v: i64) -> Self { v as i32 }
    fn to_i64(self) -> i64 { self as i64 }
    fn zero() -> Self { 0 }
}

/// One k-mer token. The same record passes through three phases:
///
/// 1. *extraction*: `kmer` is the packed canonical k-mer, `pos` the window
///    position, `seq_len` the sequence length;
/// 2. *hit*: after group assignment `kmer` holds the packed representative
///    id, `pos` the diagonal;
/// 3. *emit*: unchanged fields, consumed by the result writer.
///
/// Phase transitions happen in place through
/// [`into_hit`](KmerToken::into_hit); the record is never reinterpreted as
/// raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerToken<L> {
    pub kmer: u64,
    pub id: u32,
    pub pos: L,
    pub seq_len: L,
}

impl<L: SeqLenType> KmerToken<L> {
    /// The all-ones sentinel marking unused buffer capacity.
    pub fn sentinel() -> KmerToken<L> {
        KmerToken {
            kmer: u64::MAX,
            id: u32::MAX,
            pos: L::from_i64(-1),
            seq_len: L::from_i64(-1),
        }
    }

    pub fn is_sentinel(&self) -> bool { self.kmer == u64::MAX }

    /// Phase 1 -> 2: rewrites the token as a candidate hit of `rep`.
    pub fn into_hit(self, packed_rep: u64, diagonal: i64) -> KmerToken<L> {
        KmerToken {
            kmer: packed_rep,
            id: self.id,
            pos: L::from_i64(diagonal),
            seq_len: self.seq_len,
        }
    }
}

/// Extraction sort: canonical k-mer, longest sequence first, then id and
/// position. Nucleotide tokens compare the strand-blind k-mer word so both
/// strands of one canonical k-mer land in the same run.
pub fn cmp_kmer_len_id_pos<L: SeqLenType>(
    a: &KmerToken<L>,
    b: &KmerToken<L>,
    nucleotide: bool,
) -> Ordering {
    let (ka, kb) = if nucleotide {
        (PackedKmer::strand_blind(a.kmer), PackedKmer::strand_blind(b.kmer))
    } else {
        (a.kmer, b.kmer)
    };
    ka.cmp(&kb)
        .then_with(|| b.seq_len.cmp(&a.seq_len))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.pos.cmp(&b.pos))
        .then_with(|| a.kmer.cmp(&b.kmer))
}

/// Hit sort: representative, target id, diagonal. The raw k-mer word breaks
/// the final tie so equal keys cannot reorder between runs.
pub fn cmp_rep_id_diag<L: SeqLenType>(
    a: &KmerToken<L>,
    b: &KmerToken<L>,
    nucleotide: bool,
) -> Ordering {
    let (ka, kb) = if nucleotide {
        (PackedKmer::strand_blind(a.kmer), PackedKmer::strand_blind(b.kmer))
    } else {
        (a.kmer, b.kmer)
    };
    ka.cmp(&kb)
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.pos.cmp(&b.pos))
        .then_with(|| a.kmer.cmp(&b.kmer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_sort_puts_the_longest_sequence_first() {
        let mut tokens = vec![
            KmerToken::<i16> { kmer: 5, id: 9, pos: 3, seq_len: 40 },
            KmerToken::<i16> { kmer: 5, id: 2, pos: 1, seq_len: 90 },
            KmerToken::<i16> { kmer: 3, id: 7, pos: 0, seq_len: 10 },
        ];
        tokens.sort_unstable_by(|a, b| cmp_kmer_len_id_pos(a, b, false));
        assert_eq!(tokens[0].kmer, 3);
        assert_eq!(tokens[1].id, 2);
        assert_eq!(tokens[2].id, 9);
    }

    #[test]
    fn strand_blind_compare_merges_both_strands() {
        let fwd = KmerToken::<i16> { kmer: 77 | (1 << 63), id: 1, pos: 0, seq_len: 20 };
        let rev = KmerToken::<i16> { kmer: 77, id: 2, pos: 0, seq_len: 30 };
        assert_eq!(
            cmp_kmer_len_id_pos(&fwd, &rev, true),
            std::cmp::Ordering::Greater,
            "longer sequence wins within the shared canonical run"
        );
    }
}
