//! Pipeline parameters and the derived per-job configuration.

use seqclust_seq::{Alphabet, KmerIndexer, SeqError, SeqKind, SpacedPattern};

/// How the coverage gate interprets `-c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovMode {
    /// fraction of the query that must be alignable
    Query,
    /// fraction of the target that must be alignable
    Target,
    /// both fractions at once
    Bidirectional,
    /// ratio of the shorter to the longer sequence
    LengthRatio,
}

impl CovMode {
    pub fn from_code(code: u8) -> Option<CovMode> {
        match code {
            0 => Some(CovMode::Query),
            1 => Some(CovMode::Target),
            2 => Some(CovMode::Bidirectional),
            3 => Some(CovMode::LengthRatio),
            _ => None,
        }
    }
}

/// Length-based pre-check: can a pair possibly reach the coverage
/// threshold, whatever the alignment looks like.
pub fn can_be_covered(cov_thr: f32, mode: CovMode, query_len: f32, target_len: f32) -> bool {
    if cov_thr <= 0.0 {
        return true;
    }
    match mode {
        CovMode::Query => target_len / query_len >= cov_thr,
        CovMode::Target => query_len / target_len >= cov_thr,
        CovMode::Bidirectional => {
            target_len / query_len >= cov_thr && query_len / target_len >= cov_thr
        }
        CovMode::LengthRatio => query_len.min(target_len) / query_len.max(target_len) >= cov_thr,
    }
}

/// User-facing knobs of the k-mer matching pipeline. Zero values of `k`,
/// `alphabet_size` and `kmers_per_seq` resolve from the database statistics.
#[derive(Debug, Clone)]
pub struct MatchParams {
    pub k: usize,
    pub alphabet_size: usize,
    pub kmers_per_seq: usize,
    pub kmers_per_seq_scale: f32,
    pub spaced: bool,
    pub mask: bool,
    pub mask_lowercase: bool,
    pub cov_mode: CovMode,
    pub cov_thr: f32,
    pub include_only_extendable: bool,
    pub ignore_multi_kmer: bool,
    pub adjust_kmer_length: bool,
    pub hash_shift: u32,
    pub threads: usize,
    pub split_memory_limit: u64,
    pub compressed: bool,
    /// similar k-mers emitted per window for profile queries
    pub pick_n_best: usize,
}

impl Default for MatchParams {
    fn default() -> MatchParams {
        MatchParams {
            k: 0,
            alphabet_size: 0,
            kmers_per_seq: 0,
            kmers_per_seq_scale: 0.0,
            spaced: false,
            mask: false,
            mask_lowercase: false,
            cov_mode: CovMode::Query,
            cov_thr: 0.8,
            include_only_extendable: false,
            ignore_multi_kmer: false,
            adjust_kmer_length: false,
            hash_shift: 5,
            threads: 1,
            split_memory_limit: 0,
            compressed: false,
            pick_n_best: 1,
        }
    }
}

impl MatchParams {
    /// Fills the automatic values from the database statistics, mirroring
    /// how the defaults scale with database size.
    pub fn resolve(&mut self, residue_count: usize, kind: SeqKind) {
        let residues = (residue_count.max(2)) as f32;
        match kind {
            SeqKind::Nucleotide => {
                if self.k == 0 {
                    self.k = 15.max((residues.ln() / 4f32.ln()) as usize);
                }
                self.alphabet_size = 5;
                if self.kmers_per_seq == 0 {
                    self.kmers_per_seq = 60;
                }
            }
            SeqKind::Amino | SeqKind::Profile => {
                if self.k == 0 {
                    self.k = 10.max((residues.ln() / 8.7f32.ln()) as usize);
                }
                if self.alphabet_size == 0 {
                    self.alphabet_size = 13;
                }
                if self.kmers_per_seq == 0 {
                    self.kmers_per_seq = 20;
                }
            }
        }
    }
}

/// Everything the extraction stage derives once per job from the resolved
/// parameters.
pub struct KmerConfig {
    pub kind: SeqKind,
    pub alphabet: Alphabet,
    pub k: usize,
    /// window size; exceeds `k` for nucleotide length adjustment
    pub window_k: usize,
    pub pattern: SpacedPattern,
    pub indexer: KmerIndexer,
    pub hash_shift: u32,
}

/// Length adjustment keeps windows this much longer than `k`, capped.
const ADJUST_EXTRA: usize = 5;
const ADJUST_MAX_K: usize = 23;

impl KmerConfig {
    pub fn new(params: &MatchParams, kind: SeqKind) -> Result<KmerConfig, SeqError> {
        let alphabet = Alphabet::for_kind(kind, params.alphabet_size);
        let adjust = params.adjust_kmer_length && kind == SeqKind::Nucleotide;
        let window_k = if adjust {
            (params.k + ADJUST_EXTRA).min(ADJUST_MAX_K)
        } else {
            params.k
        };
        // length adjustment needs a contiguous window
        let pattern = SpacedPattern::new(window_k, params.spaced && !adjust)?;
        let indexer = KmerIndexer::new(alphabet.size(), params.k);
        Ok(KmerConfig {
            kind,
            alphabet,
            k: params.k,
            window_k,
            pattern,
            indexer,
            hash_shift: params.hash_shift,
        })
    }

    pub fn is_nucleotide(&self) -> bool { self.kind == SeqKind::Nucleotide }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_coverage_gate_matches_the_length_ratio() {
        // a 100-residue target can cover at most a third of a 300-residue query
        assert!(!can_be_covered(0.8, CovMode::Query, 300.0, 100.0));
        assert!(can_be_covered(0.8, CovMode::Query, 100.0, 300.0));
        assert!(can_be_covered(0.8, CovMode::Target, 300.0, 100.0));
        assert!(!can_be_covered(0.8, CovMode::Bidirectional, 300.0, 100.0));
        assert!(can_be_covered(0.3, CovMode::LengthRatio, 300.0, 100.0));
        assert!(!can_be_covered(0.8, CovMode::LengthRatio, 300.0, 100.0));
    }

    #[test]
    fn automatic_parameters_scale_with_database_size() {
        let mut p = MatchParams::default();
        p.resolve(1_000_000, SeqKind::Amino);
        assert_eq!(p.alphabet_size, 13);
        assert_eq!(p.kmers_per_seq, 20);
        assert!(p.k >= 10);

        let mut p = MatchParams::default();
        p.resolve(1_000_000_000, SeqKind::Nucleotide);
        assert_eq!(p.alphabet_size, 5);
        assert!(p.k >= 15);
    }
}
