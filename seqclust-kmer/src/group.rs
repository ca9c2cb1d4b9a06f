//! Representative assignment: collapsing k-mer groups into candidate hits.

use seqclust_seq::PackedKmer;

use crate::params::{can_be_covered, CovMode};
use crate::token::{KmerToken, SeqLenType};

/// Rewrites the sorted token array in place: every run of one canonical
/// k-mer becomes candidate hits against the run's first element (the
/// longest sequence, by the sort order). Returns the number of hits kept.
///
/// Each surviving token is a phase-2 record: `kmer` holds the packed
/// representative id (bit 63 = query-flip for nucleotides), `pos` the
/// diagonal. Singleton runs are dropped, as are hits that cannot reach the
/// coverage threshold or, under `include_only_extendable`, hits whose
/// alignment cannot extend past either end of the representative.
pub fn assign_groups<L: SeqLenType>(
    tokens: &mut [KmerToken<L>],
    nucleotide: bool,
    include_only_extendable: bool,
    cov_mode: CovMode,
    cov_thr: f32,
) -> usize {
    let mut write_pos = 0usize;
    let mut run_start = 0usize;

    let total = tokens.len();
    let mut idx = 0usize;
    while idx <= total {
        let run_ends = if idx == total {
            true
        } else if tokens[idx].is_sentinel() {
            true
        } else if idx == run_start {
            false
        } else {
            let prev = blind(tokens[run_start].kmer, nucleotide);
            let cur = blind(tokens[idx].kmer, nucleotide);
            prev != cur
        };

        if run_ends {
            let run_len = idx - run_start;
            if run_len > 1 {
                write_pos = collapse_run(
                    tokens,
                    run_start,
                    idx,
                    write_pos,
                    nucleotide,
                    include_only_extendable,
                    cov_mode,
                    cov_thr,
                );
            }
            if idx >= total || tokens[idx].is_sentinel() {
                break;
            }
            run_start = idx;
        }
        idx += 1;
    }

    // the tail keeps sentinels so downstream scans stop at write_pos
    for token in tokens.iter_mut().take(total).skip(write_pos) {
        *token = KmerToken::sentinel();
    }
    write_pos
}

#[inline(always)]
fn blind(kmer: u64, nucleotide: bool) -> u64 {
    if nucleotide { PackedKmer::strand_blind(kmer) } else { kmer }
}

#[allow(clippy::too_many_arguments)]
fn collapse_run<L: SeqLenType>(
    tokens: &mut [KmerToken<L>],
    run_start: usize,
    run_end: usize,
    mut write_pos: usize,
    nucleotide: bool,
    include_only_extendable: bool,
    cov_mode: CovMode,
    cov_thr: f32,
) -> usize {
    let rep = tokens[run_start];
    let rep_id = rep.id;
    let rep_pos = rep.pos.to_i64();
    let rep_len = rep.seq_len.to_i64();
    let rep_is_reverse = nucleotide && !PackedKmer::unpack(rep.kmer).forward;

    for i in run_start..run_end {
        let elem = tokens[i];
        let elem_pos = elem.pos.to_i64();
        let elem_len = elem.seq_len.to_i64();

        let (diagonal, packed_rep) = if nucleotide {
            let target_is_reverse = !PackedKmer::unpack(elem.kmer).forward;
            // four strand states collapse into one query-flip bit: flipping
            // the query reconciles any mixed-strand pair, and a double
            // reverse is the forward case with offset coordinates
            let (query_pos, target_pos, query_flip) = match (rep_is_reverse, target_is_reverse) {
                (true, false) => (rep_pos, elem_pos, true),
                (true, true) => ((rep_len - 1) - rep_pos, (elem_len - 1) - elem_pos, false),
                (false, true) => ((rep_len - 1) - rep_pos, (elem_len - 1) - elem_pos, true),
                (false, false) => (rep_pos, elem_pos, false),
            };
            let packed = PackedKmer { index: rep_id as u64, forward: !query_flip }.pack();
            (query_pos - target_pos, packed)
        } else {
            (rep_pos - elem_pos, rep_id as u64)
        };

        let can_extend = diagonal < 0 || diagonal > rep_len - elem_len;
        let coverable = can_be_covered(cov_thr, cov_mode, rep_len as f32, elem_len as f32);
        let keep = if include_only_extendable { can_extend } else { coverable };
        if keep {
            tokens[write_pos] = elem.into_hit(packed_rep, diagonal);
            write_pos += 1;
        }
    }
    write_pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::cmp_kmer_len_id_pos;

    fn token(kmer: u64, id: u32, pos: i64, seq_len: i64) -> KmerToken<i32> {
        KmerToken {
            kmer,
            id,
            pos: pos as i32,
            seq_len: seq_len as i32,
        }
    }

    #[test]
    fn longest_sequence_becomes_the_representative() {
        let mut tokens = vec![
            token(10, 3, 5, 50),
            token(10, 7, 2, 90),
            token(10, 8, 9, 30),
            token(42, 1, 0, 40),
        ];
        tokens.sort_unstable_by(|a, b| cmp_kmer_len_id_pos(a, b, false));
        let kept = assign_groups(&mut tokens, false, false, CovMode::Query, 0.0);

        // group 10 keeps all three hits (self hit included), group 42 is a
        // dropped singleton
        assert_eq!(kept, 3);
        assert!(tokens[..kept].iter().all(|t| t.kmer == 7));
        let self_hit = tokens[..kept].iter().find(|t| t.id == 7).unwrap();
        assert_eq!(self_hit.pos, 0);
        let hit = tokens[..kept].iter().find(|t| t.id == 3).unwrap();
        assert_eq!(hit.pos, 2 - 5);
        assert!(tokens[kept].is_sentinel());
    }

    #[test]
    fn coverage_gate_drops_short_against_long() {
        let mut tokens = vec![
            token(10, 1, 0, 300),
            token(10, 2, 0, 100),
        ];
        tokens.sort_unstable_by(|a, b| cmp_kmer_len_id_pos(a, b, false));
        let kept = assign_groups(&mut tokens, false, false, CovMode::Query, 0.8);
        // the 100-residue member cannot cover 80% of the 300-residue rep;
        // only the representative self-hit survives
        assert_eq!(kept, 1);
        assert_eq!(tokens[0].id, 1);
    }

    #[test]
    fn strand_cases_resolve_to_one_flip_bit() {
        const FWD: u64 = 1 << 63;
        // rep (id 1, len 20) forward; member (id 2, len 10) reverse
        let mut tokens = vec![
            token(9 | FWD, 1, 4, 20),
            token(9, 2, 3, 10),
        ];
        tokens.sort_unstable_by(|a, b| cmp_kmer_len_id_pos(a, b, true));
        let kept = assign_groups(&mut tokens, true, false, CovMode::Query, 0.0);
        assert_eq!(kept, 2);
        let hit = tokens[..kept].iter().find(|t| t.id == 2).unwrap();
        let packed = PackedKmer::unpack(hit.kmer);
        assert_eq!(packed.index, 1);
        // (fwd, rev) flips the query
        assert!(!packed.forward);
        // diagonal uses flipped coordinates: (20-1-4) - (10-1-3) = 9
        assert_eq!(hit.pos, 9);
    }

    #[test]
    fn extendable_policy_keeps_overhanging_hits_only() {
        let mut tokens = vec![
            token(5, 1, 0, 50),
            token(5, 2, 10, 50),
            token(5, 3, 0, 30),
        ];
        tokens.sort_unstable_by(|a, b| cmp_kmer_len_id_pos(a, b, false));
        let kept = assign_groups(&mut tokens, false, true, CovMode::Query, 0.0);
        // id 2: diagonal -10 < 0, extendable; id 3: diagonal 0 within
        // [0, 50-30], not extendable; the self hit is not extendable either
        assert_eq!(kept, 1);
        assert_eq!(tokens[0].id, 2);
        assert_eq!(tokens[0].pos, -10);
    }
}
