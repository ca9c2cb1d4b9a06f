//! Profile sequences: per-position score rows and similar k-mer generation.

use crate::errors::SeqError;

/// Number of scored residues per profile column.
pub const PROFILE_AA_SIZE: usize = 20;

/// A parsed profile entry.
///
/// The serialized form is one fixed-width row per position: 20 signed score
/// bytes in alphabet order, the query residue code and the consensus residue
/// code.
///
/// # Example
/// ```rust
/// use seqclust_seq::profile::ProfileData;
///
/// let mut rows = Vec::new();
/// let scores = [[1i8; 20], [2i8; 20]];
/// let payload = ProfileData::serialize(&scores, &[0, 1], &[0, 1]);
/// rows.extend_from_slice(&payload);
/// let profile = ProfileData::parse(&rows).unwrap();
/// assert_eq!(profile.len(), 2);
/// assert_eq!(profile.score(1, 7), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ProfileData {
    scores: Vec<i8>,
    query: Vec<u8>,
    consensus: Vec<u8>,
}

impl ProfileData {
    /// Serialized bytes per profile position.
    pub const ROW_WIDTH: usize = PROFILE_AA_SIZE + 2;

    /// Parses a profile payload.
    pub fn parse(payload: &[u8]) -> Result<ProfileData, SeqError> {
        if payload.len() % Self::ROW_WIDTH != 0 {
            return Err(SeqError::TruncatedProfile { bytes: payload.len(), row: Self::ROW_WIDTH });
        }
        let positions = payload.len() / Self::ROW_WIDTH;
        let mut scores = Vec::with_capacity(positions * PROFILE_AA_SIZE);
        let mut query = Vec::with_capacity(positions);
        let mut consensus = Vec::with_capacity(positions);
        for row in payload.chunks_exact(Self::ROW_WIDTH) {
            scores.extend(row[..PROFILE_AA_SIZE].iter().map(|&b| b as i8));
            query.push(row[PROFILE_AA_SIZE]);
            consensus.push(row[PROFILE_AA_SIZE + 1]);
        }
        Ok(ProfileData { scores, query, consensus })
    }

    /// Serializes rows into the on-disk payload.
    pub fn serialize(scores: &[[i8; PROFILE_AA_SIZE]], query: &[u8], consensus: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(scores.len() * Self::ROW_WIDTH);
        for (pos, row) in scores.iter().enumerate() {
            out.extend(row.iter().map(|&s| s as u8));
            out.push(query[pos]);
            out.push(consensus[pos]);
        }
        out
    }

    /// Number of profile positions.
    pub fn len(&self) -> usize { self.consensus.len() }

    pub fn is_empty(&self) -> bool { self.consensus.is_empty() }

    /// Consensus residue codes, the sequence the k-mer cursor iterates.
    pub fn consensus(&self) -> &[u8] { &self.consensus }

    /// Query residue codes.
    pub fn query(&self) -> &[u8] { &self.query }

    /// The substitution row of one position.
    pub fn row(&self, pos: usize) -> &[i8] {
        &self.scores[pos * PROFILE_AA_SIZE..(pos + 1) * PROFILE_AA_SIZE]
    }

    /// Score of placing `code` at `pos`.
    #[inline(always)]
    pub fn score(&self, pos: usize, code: u8) -> i32 {
        self.scores[pos * PROFILE_AA_SIZE + code as usize] as i32
    }
}

/// Enumerates the best-scoring k-mers a profile window can emit.
///
/// Candidates are grown two positions at a time through the cross of the
/// per-position score rows, pruning to the `top_n` best after every step, so
/// the work per window is bounded by `top_n * 400` regardless of k.
pub struct ProfileKmerGenerator {
    top_n: usize,
    k: usize,
}

impl ProfileKmerGenerator {
    pub fn new(k: usize, top_n: usize) -> ProfileKmerGenerator {
        ProfileKmerGenerator { top_n, k }
    }

    /// Generates up to `top_n` `(kmer_index, score)` pairs for the window at
    /// the given absolute positions, best first; ties break on the smaller
    /// index so the output is deterministic.
    pub fn generate(&self, profile: &ProfileData, positions: &[usize]) -> Vec<(u64, i32)> {
        let k = self.k;
        debug_assert_eq!(positions.len(), k);
        let mut beam: Vec<(i32, u64)> = vec![(0, 0)];
        let mut next: Vec<(i32, u64)> = Vec::with_capacity(self.top_n * PROFILE_AA_SIZE);

        let mut i = 0;
        while i < k {
            let take_pair = i + 1 < k;
            next.clear();
            // cross the beam with one 2-mer table (or a single row at the tail)
            for &(score, partial) in &beam {
                for code_a in 0..PROFILE_AA_SIZE as u8 {
                    let score_a = score + profile.score(positions[i], code_a);
                    let partial_a = partial + code_a as u64 * power(i);
                    if take_pair {
                        for code_b in 0..PROFILE_AA_SIZE as u8 {
                            let score_b = score_a + profile.score(positions[i + 1], code_b);
                            next.push((score_b, partial_a + code_b as u64 * power(i + 1)));
                        }
                    } else {
                        next.push((score_a, partial_a));
                    }
                }
            }
            next.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            next.truncate(self.top_n);
            std::mem::swap(&mut beam, &mut next);
            i += if take_pair { 2 } else { 1 };
        }

        beam.iter().map(|&(score, idx)| (idx, score)).collect()
    }
}

/// Radix weight of profile k-mer digit `i`, matching
/// [`KmerIndexer::index`](crate::KmerIndexer::index) over the 21-letter
/// alphabet.
#[inline(always)]
fn power(i: usize) -> u64 {
    (PROFILE_AA_SIZE as u64).pow(i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_kmer_comes_first() {
        // position 0 strongly prefers code 3, position 1 prefers code 5
        let mut scores = [[-1i8; 20]; 2];
        scores[0][3] = 9;
        scores[1][5] = 7;
        let payload = ProfileData::serialize(&scores, &[3, 5], &[3, 5]);
        let profile = ProfileData::parse(&payload).unwrap();

        let generator = ProfileKmerGenerator::new(2, 10);
        let kmers = generator.generate(&profile, &[0, 1]);
        assert_eq!(kmers.len(), 10);
        assert_eq!(kmers[0].1, 16);
        // digit 0 is position 0
        assert_eq!(kmers[0].0, 3 + 5 * 20);
        assert!(kmers[0].1 >= kmers[1].1);
    }
}
