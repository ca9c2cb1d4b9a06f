//! Stage B: banded gapped extension with Z-drop termination.
//!
//! A clean-room extension aligner over integer-coded sequences. The DP is
//! anchored at the pair origin, restricted to a stripe of `2*band + 1`
//! diagonals and abandoned once the best score of a row falls more than
//! `zdrop` below the running maximum. Score-only mode skips the traceback
//! matrix entirely; that is the mode the left-extension probe runs in.

use seqclust_seq::scoring::SubstitutionMatrix;

use crate::cigar::{Cigar, CigarOp};

/// Default stripe half-width.
pub const DEFAULT_BAND: usize = 64;
/// Default score drop terminating an extension.
pub const DEFAULT_ZDROP: i32 = 40;

const NEG: i32 = i32::MIN / 4;

/// Outcome of one extension run.
///
/// `max_q` / `max_t` are the 0-based offsets of the best-scoring cell, or
/// `-1` when no cell scored above zero (an empty extension).
#[derive(Debug, Clone)]
pub struct BandedExtension {
    pub max: i32,
    pub max_q: isize,
    pub max_t: isize,
    pub zdropped: bool,
    pub cigar: Cigar,
}

// traceback cell bits
const SRC_MASK: u8 = 0x3;
const SRC_DIAG: u8 = 0;
const SRC_DEL: u8 = 1;
const SRC_INS: u8 = 2;
const DEL_EXT: u8 = 0x4;
const INS_EXT: u8 = 0x8;

/// Extends `query` against `target` from their shared origin.
///
/// Gap of length `l` costs `gap_open + l * gap_extend`.
///
/// # Example
/// ```rust
/// use seqclust_align::banded::{extend, DEFAULT_BAND, DEFAULT_ZDROP};
/// use seqclust_seq::scoring::{SubstitutionMatrix, SubstitutionMatrixList};
/// use seqclust_seq::Alphabet;
///
/// let m = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
/// let nt = Alphabet::nucleotide();
/// let q = nt.encode(b"ACGTACGTACGT");
/// let ext = extend(&q, &q, m, 5, 2, DEFAULT_BAND, DEFAULT_ZDROP, true);
/// assert_eq!(ext.max, 24);
/// assert_eq!((ext.max_q, ext.max_t), (11, 11));
/// assert_eq!(ext.cigar.to_string(), "12M");
/// ```
#[allow(clippy::too_many_arguments)]
pub fn extend(
    query: &[u8],
    target: &[u8],
    matrix: &SubstitutionMatrix,
    gap_open: i32,
    gap_extend: i32,
    band: usize,
    zdrop: i32,
    with_cigar: bool,
) -> BandedExtension {
    let qlen = query.len();
    let tlen = target.len();
    if qlen == 0 || tlen == 0 {
        return BandedExtension { max: 0, max_q: -1, max_t: -1, zdropped: false, cigar: Cigar::new() };
    }

    // arrays carry a virtual j = -1 slot at position 0
    let mut h_prev = vec![NEG; tlen + 2];
    let mut h_cur = vec![NEG; tlen + 2];
    let mut f_prev = vec![NEG; tlen + 2];
    let mut f_cur = vec![NEG; tlen + 2];

    // row -1: the origin and the leading-deletion boundary
    h_prev[0] = 0;
    for j in 0..=band.min(tlen - 1) {
        h_prev[j + 1] = -(gap_open + (j as i32 + 1) * gap_extend);
    }

    let bw = 2 * band + 1;
    let mut dirs: Vec<u8> = if with_cigar { vec![0u8; qlen * bw] } else { Vec::new() };

    let mut max = 0i32;
    let mut max_q: isize = -1;
    let mut max_t: isize = -1;
    let mut zdropped = false;

    for i in 0..qlen {
        let jlo = i.saturating_sub(band);
        if jlo >= tlen {
            break;
        }
        let jhi = (tlen - 1).min(i + band);

        // H[i][-1] and the cell left of the band are unreachable this row
        h_cur[0] = if jlo == 0 { -(gap_open + (i as i32 + 1) * gap_extend) } else { NEG };
        if jlo > 0 {
            h_cur[jlo] = NEG;
        }
        f_cur[0] = NEG;

        let mut e = NEG;
        let mut row_best = NEG;
        for j in jlo..=jhi {
            let q_code = query[i];
            let diag = h_prev[j] + matrix.score_by_code(q_code, target[j]);

            let h_left = h_cur[j];
            let e_open = h_left - gap_open - gap_extend;
            let e_ext = e - gap_extend;
            let e_from_e = e_ext >= e_open;
            e = e_ext.max(e_open);

            let f_open = h_prev[j + 1] - gap_open - gap_extend;
            let f_ext = f_prev[j + 1] - gap_extend;
            let f_from_f = f_ext >= f_open;
            let f = f_ext.max(f_open);
            f_cur[j + 1] = f;

            let h = diag.max(e).max(f);
            h_cur[j + 1] = h;

            if with_cigar {
                let mut dir = if h == diag {
                    SRC_DIAG
                } else if h == e {
                    SRC_DEL
                } else {
                    SRC_INS
                };
                if e_from_e {
                    dir |= DEL_EXT;
                }
                if f_from_f {
                    dir |= INS_EXT;
                }
                dirs[i * bw + (j + band - i)] = dir;
            }

            if h > row_best {
                row_best = h;
            }
            if h > max {
                max = h;
                max_q = i as isize;
                max_t = j as isize;
            }
        }

        // seal the stripe edge the next row will peek over
        if jhi + 2 < h_cur.len() {
            h_cur[jhi + 2] = NEG;
            f_cur[jhi + 2] = NEG;
        }

        if max - row_best > zdrop {
            zdropped = true;
            break;
        }

        std::mem::swap(&mut h_prev, &mut h_cur);
        std::mem::swap(&mut f_prev, &mut f_cur);
    }

    let cigar = if with_cigar && max_q >= 0 {
        traceback(&dirs, bw, band, max_q, max_t)
    } else {
        Cigar::new()
    };

    BandedExtension { max, max_q, max_t, zdropped, cigar }
}

/// Walks the direction matrix back from the best cell to the origin.
fn traceback(dirs: &[u8], bw: usize, band: usize, max_q: isize, max_t: isize) -> Cigar {
    let mut ops: Vec<CigarOp> = Vec::new();
    let mut i = max_q;
    let mut j = max_t;
    // 0 = in H, 1 = in the deletion chain, 2 = in the insertion chain
    let mut state = 0u8;
    while i >= 0 && j >= 0 {
        // a reachable path never leaves the stripe
        debug_assert!(j + band as isize >= i && j <= i + band as isize);
        let dir = dirs[i as usize * bw + (j as usize + band - i as usize)];
        match state {
            0 => match dir & SRC_MASK {
                SRC_DIAG => {
                    ops.push(CigarOp::Match);
                    i -= 1;
                    j -= 1;
                }
                SRC_DEL => state = 1,
                _ => state = 2,
            },
            1 => {
                ops.push(CigarOp::Del);
                if dir & DEL_EXT == 0 {
                    state = 0;
                }
                j -= 1;
            }
            _ => {
                ops.push(CigarOp::Ins);
                if dir & INS_EXT == 0 {
                    state = 0;
                }
                i -= 1;
            }
        }
    }
    // the path may have entered through a boundary gap
    for _ in 0..(i + 1) {
        ops.push(CigarOp::Ins);
    }
    for _ in 0..(j + 1) {
        ops.push(CigarOp::Del);
    }

    let mut cigar = Cigar::new();
    for op in ops.into_iter().rev() {
        cigar.push(op, 1);
    }
    cigar
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqclust_seq::scoring::SubstitutionMatrixList;
    use seqclust_seq::Alphabet;

    fn nt_codes(s: &[u8]) -> Vec<u8> {
        Alphabet::nucleotide().encode(s)
    }

    #[test]
    fn single_deletion_is_recovered() {
        let m = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
        let q = nt_codes(b"ACGTACACGTAC");
        let t = nt_codes(b"ACGTACGACGTAC");
        // target has one extra G after position 6
        let ext = extend(&q, &t, m, 5, 2, 16, 100, true);
        assert_eq!(ext.cigar.to_string(), "6M1D6M");
        assert_eq!(ext.max, 12 * 2 - 5 - 2);
        assert_eq!((ext.max_q, ext.max_t), (11, 12));
    }

    #[test]
    fn single_insertion_is_recovered() {
        let m = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
        let q = nt_codes(b"ACGTACGACGTAC");
        let t = nt_codes(b"ACGTACACGTAC");
        let ext = extend(&q, &t, m, 5, 2, 16, 100, true);
        assert_eq!(ext.cigar.to_string(), "6M1I6M");
    }

    #[test]
    fn zdrop_cuts_a_dead_tail() {
        let m = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
        // 12 matching positions followed by 40 mismatching ones
        let mut q = nt_codes(b"ACGTACGTACGT");
        let mut t = q.clone();
        q.extend(std::iter::repeat(0u8).take(40));
        t.extend(std::iter::repeat(1u8).take(40));
        let ext = extend(&q, &t, m, 5, 2, DEFAULT_BAND, DEFAULT_ZDROP, false);
        assert!(ext.zdropped);
        assert_eq!(ext.max, 24);
        assert_eq!((ext.max_q, ext.max_t), (11, 11));
    }

    #[test]
    fn empty_extension_reports_no_cell() {
        let m = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
        let q = nt_codes(b"AAAA");
        let t = nt_codes(b"CCCC");
        let ext = extend(&q, &t, m, 5, 2, DEFAULT_BAND, DEFAULT_ZDROP, true);
        assert_eq!(ext.max, 0);
        assert_eq!(ext.max_q, -1);
        assert!(ext.cigar.is_empty());
    }
}
