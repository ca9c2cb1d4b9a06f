//! Canonical k-mer indices and the bit-63 strand packing.

/// The strand flag shares the 64-bit k-mer word: bit 63 set means the k-mer
/// was taken from the forward strand.
const STRAND_BIT: u64 = 1 << 63;

/// A k-mer index paired with its strand, the in-memory form of the packed
/// 64-bit word stored on disk.
///
/// Canonical indices never reach bit 63 (the radix bounds below stay under
/// `2^63` for every supported alphabet and k), which
/// [`pack`](PackedKmer::pack) enforces.
///
/// # Example
/// ```rust
/// use seqclust_seq::PackedKmer;
///
/// let kmer = PackedKmer { index: 0x00ff, forward: false };
/// assert_eq!(PackedKmer::unpack(kmer.pack()), kmer);
/// assert_eq!(PackedKmer::unpack(kmer.pack()).forward, false);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedKmer {
    /// canonical k-mer index, 63 usable bits
    pub index: u64,
    /// true when the k-mer was read on the forward strand
    pub forward: bool,
}

impl PackedKmer {
    /// Packs index and strand into the on-disk word.
    #[inline(always)]
    pub fn pack(self) -> u64 {
        debug_assert!(self.index < STRAND_BIT, "canonical k-mer index sets the strand bit");
        if self.forward { self.index | STRAND_BIT } else { self.index }
    }

    /// Splits an on-disk word back into index and strand.
    #[inline(always)]
    pub fn unpack(raw: u64) -> PackedKmer {
        PackedKmer { index: raw & !STRAND_BIT, forward: raw & STRAND_BIT != 0 }
    }

    /// Clears the strand bit of a raw word.
    #[inline(always)]
    pub fn index_of(raw: u64) -> u64 { raw & !STRAND_BIT }

    /// Sets the strand bit of a raw word, the form both strands of a
    /// canonical k-mer compare equal under.
    #[inline(always)]
    pub fn strand_blind(raw: u64) -> u64 { raw | STRAND_BIT }
}

/// Maps k-mer windows (slices of residue codes) to integer indices.
///
/// Amino acid k-mers use a radix encoding with the first window position as
/// the least significant digit; nucleotide k-mers use 2-bit packing with the
/// first position in the highest bits, which makes the reverse complement a
/// pure bit transform.
///
/// # Example
/// ```rust
/// use seqclust_seq::KmerIndexer;
///
/// let idx = KmerIndexer::new(5, 3);
/// // ACG -> 0b00_01_10
/// let acg = idx.nucleotide_index(&[0, 1, 2]);
/// assert_eq!(acg, 0b00_01_10);
/// // reverse complement of ACG is CGT
/// assert_eq!(idx.rev_complement(acg), idx.nucleotide_index(&[1, 2, 3]));
/// ```
#[derive(Debug, Clone)]
pub struct KmerIndexer {
    base: u64,
    powers: Vec<u64>,
    k: usize,
}

impl KmerIndexer {
    /// `alphabet_size` counts the unknown code; the radix excludes it
    /// because k-mers containing unknowns are never indexed.
    pub fn new(alphabet_size: usize, k: usize) -> KmerIndexer {
        let base = (alphabet_size - 1) as u64;
        let mut powers = Vec::with_capacity(k);
        let mut p = 1u64;
        for _ in 0..k {
            powers.push(p);
            p = p.saturating_mul(base);
        }
        KmerIndexer { base, powers, k }
    }

    pub fn k(&self) -> usize { self.k }

    /// Radix index of an amino acid (or reduced alphabet) k-mer window.
    #[inline(always)]
    pub fn index(&self, window: &[u8]) -> u64 {
        let mut idx = 0u64;
        for (i, &code) in window.iter().enumerate().take(self.k) {
            idx += code as u64 * self.powers[i];
        }
        idx
    }

    /// Decodes a radix index back into residue codes.
    pub fn decode(&self, mut idx: u64) -> Vec<u8> {
        let mut window = Vec::with_capacity(self.k);
        for _ in 0..self.k {
            window.push((idx % self.base) as u8);
            idx /= self.base;
        }
        window
    }

    /// 2-bit index of a nucleotide k-mer window, first position on top.
    #[inline(always)]
    pub fn nucleotide_index(&self, window: &[u8]) -> u64 {
        let mut idx = 0u64;
        for &code in window.iter().take(self.k) {
            idx = (idx << 2) | code as u64;
        }
        idx
    }

    /// 2-bit index over the first `k` positions only, for per-k-mer length
    /// adjustment.
    #[inline(always)]
    pub fn nucleotide_index_prefix(&self, window: &[u8], k: usize) -> u64 {
        let mut idx = 0u64;
        for &code in window.iter().take(k) {
            idx = (idx << 2) | code as u64;
        }
        idx
    }

    /// Decodes a 2-bit index back into nucleotide codes.
    pub fn decode_nucleotide(&self, idx: u64) -> Vec<u8> {
        (0..self.k)
            .map(|i| ((idx >> (2 * (self.k - 1 - i))) & 3) as u8)
            .collect()
    }

    /// Index of the reverse complement of a 2-bit packed k-mer.
    #[inline(always)]
    pub fn rev_complement(&self, idx: u64) -> u64 {
        self.rev_complement_len(idx, self.k)
    }

    /// Reverse complement for an explicit k, used with adjusted lengths.
    #[inline(always)]
    pub fn rev_complement_len(&self, idx: u64, k: usize) -> u64 {
        let mut out = 0u64;
        for i in 0..k {
            let code = (idx >> (2 * i)) & 3;
            out = (out << 2) | (3 - code);
        }
        out
    }

    /// The index just above every real k-mer, the base of the identity
    /// token range.
    pub fn highest_index(&self) -> u64 {
        let mut idx = 0u64;
        for i in 0..self.k {
            idx += self.base * self.powers[i];
        }
        idx
    }

    /// Number of distinct k-mer indices, the size of a full count table.
    pub fn table_size(&self) -> u64 {
        self.base.pow(self.k as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rev_complement_is_involutive() {
        let idx = KmerIndexer::new(5, 8);
        for raw in [0u64, 1, 0xabcd, 0xffff] {
            assert_eq!(idx.rev_complement(idx.rev_complement(raw)), raw & 0xffff);
        }
    }

    #[test]
    fn canonical_form_is_strand_invariant() {
        let idx = KmerIndexer::new(5, 6);
        let fwd = idx.nucleotide_index(&[0, 1, 2, 3, 0, 2]);
        let rev = idx.rev_complement(fwd);
        assert_eq!(fwd.min(rev), idx.rev_complement(rev).min(idx.rev_complement(fwd)));
    }

    #[test]
    fn amino_index_round_trip() {
        let idx = KmerIndexer::new(21, 5);
        let window = [3u8, 19, 0, 7, 12];
        assert_eq!(idx.decode(idx.index(&window)), window.to_vec());
    }

    #[test]
    fn strand_bit_never_collides_with_indices() {
        // the widest supported case: 21-letter alphabet at k = 14
        let idx = KmerIndexer::new(21, 14);
        assert!(idx.highest_index() + (u32::MAX as u64) < (1u64 << 63));
    }
}
