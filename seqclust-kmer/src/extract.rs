//! Per-sequence selection of representative k-mers.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use rayon::prelude::*;

use seqclust_seq::profile::ProfileKmerGenerator;
use seqclust_seq::{PackedKmer, SeqKind, SequenceView};
use seqclust_store::StoreReader;

use crate::buffer::{TokenBuffer, BATCH_SIZE};
use crate::errors::KmerError;
use crate::hash::{circ_hash, circ_hash_next, sequence_hash};
use crate::mask::{mask_lowercase, mask_tandem_repeats};
use crate::params::{KmerConfig, MatchParams};
use crate::token::{KmerToken, SeqLenType};

/// One scored k-mer of the current sequence, before selection.
#[derive(Debug, Clone, Copy)]
struct SeqPos {
    score: u16,
    kmer: u64,
    pos: u32,
}

/// Outcome of a fill pass over the whole database.
pub struct FillOutcome {
    pub tokens: usize,
    /// longest k-mer emitted, differs from `k` under length adjustment
    pub longest_kmer: usize,
}

/// Per-kmer Markov-informativeness threshold scaling (see
/// [`adjusted_kmer_length`]).
const MARKOV_ORDER: usize = 2;
const MARKOV_MEDIAN_SCORE: f32 = 2.0;

/// Shortens a window until its accumulated order-2 background score passes
/// the informativeness threshold: low-complexity stretches contribute
/// little, so repetitive k-mers come out longer and unique ones shorter.
fn adjusted_kmer_length(window: &[u8], threshold: f32) -> usize {
    let mut score = 0.0f32;
    for i in MARKOV_ORDER..window.len() {
        score += if window[i] == window[i - 1] || window[i] == window[i - 2] {
            MARKOV_MEDIAN_SCORE * 0.25
        } else {
            MARKOV_MEDIAN_SCORE
        };
        if score >= threshold {
            return i + 1;
        }
    }
    window.len()
}

/// Worker-local scratch reused across the sequences of one range.
struct ThreadState<L> {
    view: SequenceView,
    window: Vec<u8>,
    rev_window: Vec<u8>,
    scratch: Vec<SeqPos>,
    batch: Vec<KmerToken<L>>,
    generator: Option<ProfileKmerGenerator>,
    positions: Vec<usize>,
    longest_kmer: usize,
}

impl<L: SeqLenType> ThreadState<L> {
    fn new(config: &KmerConfig, max_seq_len: usize) -> ThreadState<L> {
        let generator = (config.kind == SeqKind::Profile)
            .then(|| ProfileKmerGenerator::new(config.k, 150));
        ThreadState {
            view: SequenceView::new(max_seq_len, config.kind, config.pattern.clone()),
            window: vec![0; config.window_k],
            rev_window: vec![0; config.window_k],
            scratch: Vec::with_capacity(max_seq_len + 1),
            batch: Vec::with_capacity(BATCH_SIZE),
            generator,
            positions: Vec::with_capacity(config.k),
            longest_kmer: config.k,
        }
    }

    fn push_token(&mut self, buffer: &TokenBuffer<L>, token: KmerToken<L>) -> Result<(), KmerError> {
        self.batch.push(token);
        if self.batch.len() >= BATCH_SIZE {
            buffer.commit(&self.batch)?;
            self.batch.clear();
        }
        Ok(())
    }

    fn flush(&mut self, buffer: &TokenBuffer<L>) -> Result<(), KmerError> {
        buffer.commit(&self.batch)?;
        self.batch.clear();
        Ok(())
    }
}

/// Extracts the selected k-mers of every sequence into `buffer`.
///
/// Workers process contiguous id ranges; each worker commits batches of at
/// most [`BATCH_SIZE`] tokens through the buffer's atomic offset. Only
/// k-mers whose canonical key falls into `split` (of `splits`) are emitted.
#[allow(clippy::too_many_arguments)]
pub fn fill_token_buffer<L: SeqLenType>(
    reader: &StoreReader,
    buffer: &TokenBuffer<L>,
    config: &KmerConfig,
    params: &MatchParams,
    splits: usize,
    split: usize,
    include_identity: bool,
) -> Result<FillOutcome, KmerError> {
    let size = reader.size();
    let ranges = id_ranges(size, params.threads);
    let longest = AtomicUsize::new(config.k);
    let max_seq_len = reader.max_seq_len();

    ranges.into_par_iter().try_for_each(|(start, end)| -> Result<(), KmerError> {
        let mut state: ThreadState<L> = ThreadState::new(config, max_seq_len);
        for id in start..end {
            extract_one(reader, buffer, config, params, splits, split, include_identity, id, &mut state)?;
        }
        state.flush(buffer)?;
        longest.fetch_max(state.longest_kmer, Ordering::Relaxed);
        Ok(())
    })?;

    debug!("extracted {} tokens for split {}/{}", buffer.len(), split + 1, splits);
    Ok(FillOutcome { tokens: buffer.len(), longest_kmer: longest.load(Ordering::Relaxed) })
}

fn id_ranges(size: usize, threads: usize) -> Vec<(usize, usize)> {
    let pieces = (threads.max(1) * 4).min(size.max(1));
    let chunk = size.div_ceil(pieces);
    (0..pieces)
        .map(|p| (p * chunk, ((p + 1) * chunk).min(size)))
        .filter(|(s, e)| s < e)
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn extract_one<L: SeqLenType>(
    reader: &StoreReader,
    buffer: &TokenBuffer<L>,
    config: &KmerConfig,
    params: &MatchParams,
    splits: usize,
    split: usize,
    include_identity: bool,
    id: usize,
    state: &mut ThreadState<L>,
) -> Result<(), KmerError> {
    let key = reader.key(id);
    let payload = reader.data(id)?;
    state.view.map(id, key, payload.as_ref(), &config.alphabet)?;
    drop(payload);

    let seq_len = state.view.len();
    if seq_len == 0 {
        return Ok(());
    }

    // the identity bucket hashes the unmasked residues
    let identity_kmer = include_identity
        .then(|| config.indexer.highest_index() + sequence_hash(state.view.codes()) as u64);

    let unknown = config.alphabet.unknown();
    if params.mask && config.kind != SeqKind::Profile {
        mask_tandem_repeats(state.view.codes_mut(), unknown);
    }
    if params.mask_lowercase && config.kind != SeqKind::Profile {
        let (codes, lowercase) = state.view.codes_and_lowercase_mut();
        mask_lowercase(codes, lowercase, unknown);
    }

    collect_sequence_kmers(config, params, state, unknown, seq_len);

    // the per-sequence identity token guarantees identical sequences meet
    // even when no selected k-mer survives
    if let Some(identity_kmer) = identity_kmer {
        if identity_kmer % splits as u64 == split as u64 {
            let token = KmerToken {
                kmer: identity_kmer,
                id: key,
                pos: L::zero(),
                seq_len: L::from_usize(seq_len),
            };
            state.push_token(buffer, token)?;
        }
    }

    select_top_kmers(buffer, config, params, splits, split, key, seq_len, state)
}

/// Walks the cursor and fills the scratch list with scored k-mers.
fn collect_sequence_kmers<L: SeqLenType>(
    config: &KmerConfig,
    params: &MatchParams,
    state: &mut ThreadState<L>,
    unknown: u8,
    seq_len: usize,
) {
    let k = config.k;
    let shift = config.hash_shift;
    let adjust = params.adjust_kmer_length && config.is_nucleotide();
    let adjust_threshold = k.saturating_sub(MARKOV_ORDER) as f32 * MARKOV_MEDIAN_SCORE;

    state.scratch.clear();
    state.view.reset();

    // the first window only seeds the rolling hash
    let mut prev_hash = 0u16;
    let mut prev_first = 0u8;
    if state.view.has_next_kmer() {
        let (window, _) = state.view.next_kmer();
        prev_hash = circ_hash(window, shift);
        prev_first = window[0];
    }

    while state.view.has_next_kmer() {
        let pos = {
            let (window, pos) = state.view.next_kmer();
            state.window.copy_from_slice(window);
            pos
        };

        match config.kind {
            SeqKind::Amino => {
                prev_hash = circ_hash_next(prev_hash, prev_first, state.window[k - 1], k, shift);
                prev_first = state.window[0];
                if state.window.contains(&unknown) {
                    continue;
                }
                let idx = config.indexer.index(&state.window);
                state.scratch.push(SeqPos { score: prev_hash, kmer: idx, pos: pos as u32 });
            }
            SeqKind::Nucleotide => {
                if state.window.contains(&unknown) {
                    continue;
                }
                let mut kmer_len = k;
                let idx = config.indexer.nucleotide_index_prefix(&state.window, kmer_len);
                let rev_idx = config.indexer.rev_complement_len(idx, kmer_len);
                let pick_reverse = rev_idx < idx;

                let oriented: &[u8] = if pick_reverse {
                    let wk = config.window_k;
                    for i in 0..wk {
                        state.rev_window[i] = config.alphabet.complement(state.window[wk - 1 - i]);
                    }
                    &state.rev_window
                } else {
                    &state.window
                };
                let hash = circ_hash(&oriented[..kmer_len], shift);
                let mut canonical = if pick_reverse { rev_idx } else { idx };
                if adjust {
                    kmer_len = adjusted_kmer_length(oriented, adjust_threshold);
                    canonical = config.indexer.nucleotide_index_prefix(oriented, kmer_len);
                    state.longest_kmer = state.longest_kmer.max(kmer_len);
                }

                let stored_pos = if pick_reverse { seq_len - pos - kmer_len } else { pos };
                let packed = PackedKmer { index: canonical, forward: !pick_reverse }.pack();
                state.scratch.push(SeqPos { score: hash, kmer: packed, pos: stored_pos as u32 });
            }
            SeqKind::Profile => {
                if state.window.contains(&unknown) {
                    continue;
                }
                let hash = circ_hash(&state.window, shift);
                state.positions.clear();
                state
                    .positions
                    .extend(config.pattern.positions().iter().map(|&offset| pos + offset));
                let similar = match (state.view.profile(), state.generator.as_ref()) {
                    (Some(profile), Some(generator)) => generator.generate(profile, &state.positions),
                    _ => continue,
                };
                for (kmer_idx, _score) in similar.into_iter().take(params.pick_n_best) {
                    state.scratch.push(SeqPos { score: hash, kmer: kmer_idx, pos: pos as u32 });
                }
            }
        }
    }

    let nucleotide = config.is_nucleotide();
    state.scratch.sort_unstable_by(|a, b| {
        let (ka, kb) = if nucleotide {
            (PackedKmer::strand_blind(a.kmer), PackedKmer::strand_blind(b.kmer))
        } else {
            (a.kmer, b.kmer)
        };
        a.score.cmp(&b.score).then_with(|| ka.cmp(&kb)).then_with(|| a.pos.cmp(&b.pos))
    });
}

/// Walks the scored list in order and emits the first `M` distinct k-mers
/// that belong to this split.
#[allow(clippy::too_many_arguments)]
fn select_top_kmers<L: SeqLenType>(
    buffer: &TokenBuffer<L>,
    config: &KmerConfig,
    params: &MatchParams,
    splits: usize,
    split: usize,
    key: u32,
    seq_len: usize,
    state: &mut ThreadState<L>,
) -> Result<(), KmerError> {
    let nucleotide = config.is_nucleotide();
    let blind = |kmer: u64| if nucleotide { PackedKmer::strand_blind(kmer) } else { kmer };

    let want = (params.kmers_per_seq.saturating_sub(1) as f32
        + params.kmers_per_seq_scale * seq_len as f32) as usize;
    let want = want.min(state.scratch.len());

    let mut considered = 0usize;
    let mut prev_seen = u64::MAX;
    let mut prev_kept = u64::MAX;
    for i in 0..state.scratch.len() {
        if considered >= want {
            break;
        }
        let cur = blind(state.scratch[i].kmer);
        let next = if i + 1 < state.scratch.len() {
            blind(state.scratch[i + 1].kmer)
        } else {
            u64::MAX
        };
        let repeated = cur == next || cur == prev_seen;
        prev_seen = cur;
        if params.ignore_multi_kmer && repeated {
            continue;
        }
        if cur == prev_kept {
            continue;
        }
        considered += 1;
        prev_kept = cur;
        if cur % splits as u64 != split as u64 {
            continue;
        }
        let entry = state.scratch[i];
        let token = KmerToken {
            kmer: entry.kmer,
            id: key,
            pos: L::from_usize(entry.pos as usize),
            seq_len: L::from_usize(seq_len),
        };
        state.push_token(buffer, token)?;
    }
    Ok(())
}
