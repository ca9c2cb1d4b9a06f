//! The `kmermatcher` pipeline: extraction, grouping and split/merge
//! orchestration over a sequence store.

use std::mem::size_of;
use std::path::{Path, PathBuf};

use log::info;
use rayon::prelude::*;

use seqclust_seq::{PackedKmer, SeqKind};
use seqclust_store::{OpenMode, SortMode, StoreError, StoreKind, StoreReader, StoreWriter};

use crate::buffer::TokenBuffer;
use crate::errors::KmerError;
use crate::extract::fill_token_buffer;
use crate::group::assign_groups;
use crate::merge::{backfill_missing, merge_run_files, reduce_pair};
use crate::params::{KmerConfig, MatchParams};
use crate::runfile::{done_path, write_run_file};
use crate::token::{cmp_kmer_len_id_pos, cmp_rep_id_diag, KmerToken, SeqLenType};

/// Maps a store tag to the sequence kind the pipeline handles.
pub fn seq_kind_of(kind: StoreKind) -> Option<SeqKind> {
    match kind {
        StoreKind::Amino => Some(SeqKind::Amino),
        StoreKind::Nucleotide => Some(SeqKind::Nucleotide),
        StoreKind::Profile => Some(SeqKind::Profile),
        _ => None,
    }
}

/// Upper bound on the tokens the whole database can emit, the size of a
/// single-split allocation.
pub fn compute_kmer_count(reader: &StoreReader, k: usize, kmers_per_seq: usize, scale: f32) -> usize {
    (0..reader.size())
        .map(|id| {
            let len = reader.seq_len(id);
            let possible = len.saturating_sub(k).wrapping_add(1).max(1);
            possible.min(kmers_per_seq + (scale * len as f32) as usize + 1)
        })
        .sum()
}

/// 90% of physical memory, the split budget when none is configured.
pub(crate) fn default_memory_limit() -> u64 {
    let fallback = 8 * (1u64 << 30);
    let meminfo = match std::fs::read_to_string("/proc/meminfo") {
        Ok(text) => text,
        Err(_) => return fallback,
    };
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            if let Some(kb) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()) {
                return kb * 1024 / 10 * 9;
            }
        }
    }
    fallback
}

/// Path of one split's run file.
pub fn split_path(result_db: &Path, split: usize) -> PathBuf {
    let mut os = result_db.as_os_str().to_owned();
    os.push(format!("_split_{}", split));
    PathBuf::from(os)
}

/// Computes the split count a `kmermatcher` run over `seq_db` will use,
/// for distributing split ranges across processes.
pub fn plan_splits(seq_db: &Path, params: &MatchParams) -> Result<usize, KmerError> {
    let reader = StoreReader::open(seq_db, OpenMode::DataAndIndex, SortMode::NoSort)?;
    let kind = seq_kind_of(reader.kind()).ok_or_else(|| {
        KmerError::Store(StoreError::WrongKind {
            path: seq_db.display().to_string(),
            expected: StoreKind::Amino,
            found: reader.kind(),
        })
    })?;
    let mut params = params.clone();
    params.resolve(reader.residue_count(), kind);
    let token_bytes = if reader.max_seq_len() < i16::MAX as usize {
        size_of::<KmerToken<i16>>()
    } else {
        size_of::<KmerToken<i32>>()
    };
    let total_kmers =
        compute_kmer_count(&reader, params.k, params.kmers_per_seq, params.kmers_per_seq_scale);
    let memory_limit = if params.split_memory_limit > 0 {
        params.split_memory_limit
    } else {
        default_memory_limit()
    };
    let mut splits = ((total_kmers * token_bytes) as u64).div_ceil(memory_limit).max(1) as usize;
    if splits > 1 {
        splits += 1;
    }
    Ok(splits)
}

/// Groups the sequences of `seq_db` by shared selected k-mers and writes
/// one candidate hit list per representative into `result_db`.
///
/// `split_range` restricts the computed splits for the process-parallel
/// outer layer; a restricted run stops before the merge so a final
/// invocation over the full range can pick up the (`.done`-marked) run
/// files of every process.
pub fn run_kmer_matcher(
    seq_db: &Path,
    result_db: &Path,
    params: &MatchParams,
    split_range: Option<(usize, usize)>,
) -> Result<(), KmerError> {
    let reader = StoreReader::open(seq_db, OpenMode::DataAndIndex, SortMode::NoSort)?;
    let kind = seq_kind_of(reader.kind()).ok_or_else(|| {
        KmerError::Store(StoreError::WrongKind {
            path: seq_db.display().to_string(),
            expected: StoreKind::Amino,
            found: reader.kind(),
        })
    })?;
    let mut params = params.clone();
    params.resolve(reader.residue_count(), kind);
    info!(
        "Database size: {} type: {:?}, k-mer size {}, alphabet {}",
        reader.size(),
        kind,
        params.k,
        params.alphabet_size
    );

    if reader.max_seq_len() < i16::MAX as usize {
        matcher_inner::<i16>(&reader, result_db, &params, kind, split_range)
    } else {
        matcher_inner::<i32>(&reader, result_db, &params, kind, split_range)
    }
}

fn matcher_inner<L: SeqLenType>(
    reader: &StoreReader,
    result_db: &Path,
    params: &MatchParams,
    kind: SeqKind,
    split_range: Option<(usize, usize)>,
) -> Result<(), KmerError> {
    let config = KmerConfig::new(params, kind)?;
    let nucleotide = config.is_nucleotide();

    let total_kmers =
        compute_kmer_count(reader, params.k, params.kmers_per_seq, params.kmers_per_seq_scale);
    let total_bytes = (total_kmers * size_of::<KmerToken<L>>()) as u64;
    let memory_limit = if params.split_memory_limit > 0 {
        params.split_memory_limit
    } else {
        default_memory_limit()
    };
    info!("Estimated memory consumption {} MB", total_bytes / 1024 / 1024);

    let mut splits = total_bytes.div_ceil(memory_limit).max(1) as usize;
    if splits > 1 {
        // security buffer against the estimate running short
        splits += 1;
        info!("Process file into {} parts", splits);
    }

    let split_files: Vec<PathBuf> = (0..splits).map(|s| split_path(result_db, s)).collect();
    let (from, to) = split_range
        .map(|(a, b)| (a.min(splits), b.min(splits)))
        .unwrap_or((0, splits));

    let mut single_split_tokens: Option<Vec<KmerToken<L>>> = None;
    for split in from..to {
        if splits == 1 {
            single_split_tokens =
                Some(compute_split::<L>(reader, &config, params, splits, split, total_kmers, memory_limit)?);
        } else {
            let run = &split_files[split];
            if done_path(run).exists() {
                info!("Split {} already done, skipping", split);
                continue;
            }
            let tokens =
                compute_split::<L>(reader, &config, params, splits, split, total_kmers, memory_limit)?;
            write_run_file(run, &tokens, nucleotide)?;
        }
    }

    // a restricted range leaves the merge to the final full invocation
    if to < splits {
        return Ok(());
    }

    let out_kind = if nucleotide { StoreKind::PrefilterRevRes } else { StoreKind::PrefilterRes };
    let writer_threads = if splits == 1 { params.threads } else { 1 };
    let writer = StoreWriter::create(result_db, writer_threads, params.compressed, out_kind)?;

    let reps_written = match single_split_tokens {
        Some(tokens) => write_sorted_hits(&tokens, &writer, nucleotide, params.threads, true)?,
        None => merge_run_files::<L>(&split_files, &writer, true)?,
    };

    let added = backfill_missing(reader, &writer, &reps_written)?;
    info!("Wrote {} groups and {} singleton records", reps_written.len(), added);
    writer.close()?;

    if splits > 1 {
        for run in &split_files {
            let _ = std::fs::remove_file(run);
            let _ = std::fs::remove_file(done_path(run));
        }
    }
    Ok(())
}

/// One split: fill the token buffer, sort, assign groups, sort again.
/// Returns the compacted hit tokens in `(rep, target, diagonal)` order.
pub(crate) fn compute_split<L: SeqLenType>(
    reader: &StoreReader,
    config: &KmerConfig,
    params: &MatchParams,
    splits: usize,
    split: usize,
    total_kmers: usize,
    memory_limit: u64,
) -> Result<Vec<KmerToken<L>>, KmerError> {
    info!("Generate k-mers list for {} split", split + 1);
    let capacity = if splits > 1 {
        (memory_limit as usize / size_of::<KmerToken<L>>()).max(1)
    } else {
        // profiles emit up to pick_n_best tokens per window
        total_kmers * params.pick_n_best.max(1)
    };
    let buffer: TokenBuffer<L> = TokenBuffer::new(capacity);
    let outcome = fill_token_buffer(reader, &buffer, config, params, splits, split, true)?;
    let filled = outcome.tokens.min(capacity);
    let mut tokens = buffer.into_tokens();

    let nucleotide = config.is_nucleotide();
    tokens[..filled].par_sort_unstable_by(|a, b| cmp_kmer_len_id_pos(a, b, nucleotide));
    let kept = assign_groups(
        &mut tokens[..filled],
        nucleotide,
        params.include_only_extendable,
        params.cov_mode,
        params.cov_thr,
    );
    tokens[..kept].par_sort_unstable_by(|a, b| cmp_rep_id_diag(a, b, nucleotide));
    tokens.truncate(kept);
    Ok(tokens)
}

/// Direct result writing for the single-split case: the in-memory hit
/// tokens stream straight into the store, one block per representative,
/// partitioned at representative boundaries across the writer shards.
pub(crate) fn write_sorted_hits<L: SeqLenType>(
    tokens: &[KmerToken<L>],
    writer: &StoreWriter,
    nucleotide: bool,
    threads: usize,
    with_header: bool,
) -> Result<Vec<u32>, KmerError> {
    let n = tokens.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let rep_of = |t: &KmerToken<L>| PackedKmer::index_of(t.kmer) as u32;

    let mut bounds = vec![0usize];
    for t in 1..threads.max(1) {
        // start at the even share, then advance to a representative boundary
        let mut at = (t * n / threads.max(1)).max(*bounds.last().unwrap());
        while at < n && at > 0 && rep_of(&tokens[at]) == rep_of(&tokens[at - 1]) {
            at += 1;
        }
        bounds.push(at.min(n));
    }
    bounds.push(n);
    bounds.dedup();

    let chunk_reps: Vec<Vec<u32>> = bounds
        .windows(2)
        .enumerate()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(thread_idx, window)| -> Result<Vec<u32>, KmerError> {
            write_hit_chunk(&tokens[window[0]..window[1]], writer, nucleotide, thread_idx, with_header)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(chunk_reps.into_iter().flatten().collect())
}

fn write_hit_chunk<L: SeqLenType>(
    tokens: &[KmerToken<L>],
    writer: &StoreWriter,
    nucleotide: bool,
    thread_idx: usize,
    with_header: bool,
) -> Result<Vec<u32>, KmerError> {
    let mut reps = Vec::new();
    let mut block = String::with_capacity(1 << 16);
    let mut pair: Vec<(L, u32, bool)> = Vec::new();
    let mut i = 0usize;
    while i < tokens.len() && !tokens[i].is_sentinel() {
        let rep = PackedKmer::index_of(tokens[i].kmer) as u32;
        block.clear();
        if with_header {
            block.push_str(&format!("{}\t0\t0\n", rep));
        }

        while i < tokens.len()
            && !tokens[i].is_sentinel()
            && PackedKmer::index_of(tokens[i].kmer) as u32 == rep
        {
            let target = tokens[i].id;
            // gather the (rep, target) run, one entry per k-mer hit
            pair.clear();
            while i < tokens.len()
                && !tokens[i].is_sentinel()
                && PackedKmer::index_of(tokens[i].kmer) as u32 == rep
                && tokens[i].id == target
            {
                let rev = nucleotide && !PackedKmer::unpack(tokens[i].kmer).forward;
                pair.push((tokens[i].pos, 1, rev));
                i += 1;
            }
            if target != rep || !with_header {
                let (total, best_diag, best_rev) = reduce_pair(&mut pair);
                let signed = if best_rev { -total } else { total };
                block.push_str(&format!("{}\t{}\t{}\n", target, signed, best_diag));
            }
        }
        writer.write(thread_idx, rep, block.as_bytes())?;
        reps.push(rep);
    }
    Ok(reps)
}
