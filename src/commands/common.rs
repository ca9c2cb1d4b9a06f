use clap::Args;

use seqclust_kmer::{CovMode, MatchParams};

use crate::CliError;

/// The k-mer pipeline flags shared by `kmermatcher`, `kmersearch` and
/// `createlinindex`.
#[derive(Args, Debug, Clone)]
pub struct KmerArgs {
    /// k-mer length (0: automatically set to optimum)
    #[clap(short = 'k', default_value_t = 0, value_name = "INT")]
    pub kmer_size: usize,
    /// alphabet size: 21 or 13 for amino acids, 5 for nucleotides (0: automatic)
    #[clap(long = "alph-size", default_value_t = 0, value_name = "INT")]
    pub alph_size: usize,
    /// k-mers per sequence (0: automatic)
    #[clap(long = "kmer-per-seq", default_value_t = 0, value_name = "INT")]
    pub kmer_per_seq: usize,
    /// scale the k-mer count per sequence with its length
    #[clap(long = "kmer-per-seq-scale", default_value_t = 0.0, value_name = "FLOAT")]
    pub kmer_per_seq_scale: f32,
    /// mask low-complexity regions before extraction (0: no, 1: yes)
    #[clap(long = "mask", default_value_t = 0, value_name = "INT")]
    pub mask: u8,
    /// mask lowercase residues before extraction (0: no, 1: yes)
    #[clap(long = "mask-lower-case", default_value_t = 0, value_name = "INT")]
    pub mask_lower_case: u8,
    /// use a spaced k-mer pattern (0: consecutive, 1: spaced)
    #[clap(long = "spaced-kmer-mode", default_value_t = 0, value_name = "INT")]
    pub spaced_kmer_mode: u8,
    /// coverage mode: 0 query, 1 target, 2 both, 3 length ratio
    #[clap(long = "cov-mode", default_value_t = 0, value_name = "INT")]
    pub cov_mode: u8,
    /// coverage threshold a pair must be able to reach
    #[clap(short = 'c', default_value_t = 0.8, value_name = "FLOAT")]
    pub cov_thr: f32,
    /// keep only hits that can extend past one end of the representative
    #[clap(long = "include-only-extendable", action)]
    pub include_only_extendable: bool,
    /// drop k-mers occurring more than once in a sequence
    #[clap(long = "ignore-multi-kmer", action)]
    pub ignore_multi_kmer: bool,
    /// shorten nucleotide k-mers to an information threshold, per k-mer
    #[clap(long = "adjust-kmer-length", action)]
    pub adjust_kmer_length: bool,
    /// rotation amount of the rolling k-mer hash
    #[clap(long = "hash-shift", default_value_t = 5, value_name = "INT")]
    pub hash_shift: u32,
    /// worker threads (0: all cores)
    #[clap(long = "threads", default_value_t = 0, value_name = "INT")]
    pub threads: usize,
    /// memory budget per split in bytes (0: 90% of main memory)
    #[clap(long = "split-memory-limit", default_value_t = 0, value_name = "BYTES")]
    pub split_memory_limit: u64,
    /// compress result entries (0: no, 1: yes)
    #[clap(long = "compressed", default_value_t = 0, value_name = "INT")]
    pub compressed: u8,
}

impl KmerArgs {
    pub fn to_params(&self) -> Result<MatchParams, CliError> {
        let cov_mode = CovMode::from_code(self.cov_mode)
            .ok_or_else(|| CliError::Config(format!("unknown --cov-mode {}", self.cov_mode)))?;
        Ok(MatchParams {
            k: self.kmer_size,
            alphabet_size: self.alph_size,
            kmers_per_seq: self.kmer_per_seq,
            kmers_per_seq_scale: self.kmer_per_seq_scale,
            spaced: self.spaced_kmer_mode != 0,
            mask: self.mask != 0,
            mask_lowercase: self.mask_lower_case != 0,
            cov_mode,
            cov_thr: self.cov_thr,
            include_only_extendable: self.include_only_extendable,
            ignore_multi_kmer: self.ignore_multi_kmer,
            adjust_kmer_length: self.adjust_kmer_length,
            hash_shift: self.hash_shift,
            threads: resolve_threads(self.threads),
            split_memory_limit: self.split_memory_limit,
            compressed: self.compressed != 0,
            pick_n_best: 1,
        })
    }
}

/// 0 means every available core.
pub fn resolve_threads(threads: usize) -> usize {
    if threads > 0 {
        threads
    } else {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
}

/// Builds the worker pool a command runs its parallel sections in.
pub fn build_pool(threads: usize) -> Result<rayon::ThreadPool, CliError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(resolve_threads(threads))
        .build()
        .map_err(|e| CliError::Config(format!("can't build thread pool: {}", e)))
}

/// Re-attaches the command word so `clap` reports usage under the right
/// name.
pub fn parse_args<T: clap::Parser>(command: &str, args: &[String]) -> T {
    T::parse_from(std::iter::once(command.to_string()).chain(args.iter().cloned()))
}
