use seqclust_seq::scoring::SubstitutionMatrix;
use seqclust_seq::Alphabet;

use crate::banded;
use crate::cigar::{Cigar, CigarOp};
use crate::errors::AlignError;
use crate::evalue::EvalueComputation;
use crate::ungapped::{rescore_diagonal, rescore_diagonal_wrapped};

/// A verified local gapped alignment. Endpoints are inclusive and refer to
/// the (strand-resolved) query and the target.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub score: i32,
    pub q_start: usize,
    pub q_end: usize,
    pub t_start: usize,
    pub t_end: usize,
    pub cigar: Cigar,
    pub e_value: f64,
    pub q_cov: f32,
    pub t_cov: f32,
    pub identities: usize,
}

/// Verifies candidate hits: ungapped rescore on the reported diagonal, then
/// banded Z-drop extension in both directions from the segment.
///
/// The query is bound once with [`init_query`](BandedKmerAligner::init_query)
/// and reused for all its targets; reverse-strand hits align against the
/// precomputed reverse-complement pre-image.
pub struct BandedKmerAligner<'a> {
    matrix: &'a SubstitutionMatrix,
    evaluer: EvalueComputation,
    gap_open: i32,
    gap_extend: i32,
    band: usize,
    zdrop: i32,
    query: Vec<u8>,
    query_rev: Vec<u8>,
    query_revcomp: Vec<u8>,
    query_revcomp_rev: Vec<u8>,
    target_rev: Vec<u8>,
}

impl<'a> BandedKmerAligner<'a> {
    pub fn new(
        matrix: &'a SubstitutionMatrix,
        evaluer: EvalueComputation,
        gap_open: i32,
        gap_extend: i32,
    ) -> BandedKmerAligner<'a> {
        BandedKmerAligner {
            matrix,
            evaluer,
            gap_open,
            gap_extend,
            band: banded::DEFAULT_BAND,
            zdrop: banded::DEFAULT_ZDROP,
            query: Vec::new(),
            query_rev: Vec::new(),
            query_revcomp: Vec::new(),
            query_revcomp_rev: Vec::new(),
            target_rev: Vec::new(),
        }
    }

    /// Overrides the stripe width and Z-drop threshold.
    pub fn with_band(mut self, band: usize, zdrop: i32) -> BandedKmerAligner<'a> {
        self.band = band;
        self.zdrop = zdrop;
        self
    }

    /// Binds the query codes; for nucleotides the reverse-complement
    /// pre-image is prepared here as well.
    pub fn init_query(&mut self, codes: &[u8]) {
        self.query.clear();
        self.query.extend_from_slice(codes);
        self.query_rev.clear();
        self.query_rev.extend(codes.iter().rev());
        self.query_revcomp.clear();
        self.query_revcomp_rev.clear();
        if self.matrix.alphabet().is_nucleotide() {
            let alphabet: &Alphabet = self.matrix.alphabet();
            self.query_revcomp.extend(codes.iter().rev().map(|&c| alphabet.complement(c)));
            self.query_revcomp_rev.extend(codes.iter().map(|&c| alphabet.complement(c)));
        }
    }

    /// Aligns the bound query against `target` around `diagonal`.
    ///
    /// `reverse` selects the reverse-complement query pre-image;
    /// `wrapped` treats the bound query as doubled and folds it into the
    /// target modulo its original length, clamping query coverage at 1.0.
    ///
    /// `fails with` [`AlignError::DiagonalOutOfRange`](crate::AlignError::DiagonalOutOfRange)
    /// when a non-wrapped diagonal leaves the two sequences without overlap.
    pub fn align(
        &mut self,
        target: &[u8],
        diagonal: i32,
        reverse: bool,
        wrapped: bool,
    ) -> Result<Alignment, AlignError> {
        let (q, q_rev): (&[u8], &[u8]) = if reverse {
            (&self.query_revcomp, &self.query_revcomp_rev)
        } else {
            (&self.query, &self.query_rev)
        };
        let qlen = q.len();
        let tlen = target.len();
        let orig_query_len = if wrapped { qlen / 2 } else { qlen };
        if qlen == 0 || tlen == 0 {
            return Err(AlignError::EmptyAlignment);
        }
        // a wrapped diagonal always folds back into range
        if !wrapped && (diagonal >= qlen as i32 || diagonal <= -(tlen as i32)) {
            return Err(AlignError::DiagonalOutOfRange { query_len: qlen, diagonal });
        }

        // ---------- stage A: ungapped segment on the diagonal
        let seg = if wrapped {
            rescore_diagonal_wrapped(q, target, diagonal, self.matrix)
        } else {
            rescore_diagonal(q, target, diagonal, self.matrix)
        }
        .ok_or(AlignError::EmptyAlignment)?;

        // the segment already covers query and target completely
        if seg.q_end - seg.q_start == orig_query_len - 1 && seg.t_start == 0 && seg.t_end == tlen - 1 {
            let mut cigar = Cigar::new();
            cigar.push(CigarOp::Match, orig_query_len as u32);
            let identities = (0..orig_query_len)
                .filter(|&i| q[seg.q_start + i] == target[seg.t_start + i])
                .count();
            let mut q_cov = cov(seg.q_start, seg.q_end, qlen);
            if wrapped {
                q_cov = (q_cov * 2.0).min(1.0);
            }
            return Ok(Alignment {
                score: seg.score,
                q_start: seg.q_start,
                q_end: seg.q_end,
                t_start: seg.t_start,
                t_end: seg.t_end,
                cigar,
                e_value: self.evaluer.evalue(seg.score, orig_query_len),
                q_cov,
                t_cov: cov(seg.t_start, seg.t_end, tlen),
                identities,
            });
        }

        // ---------- stage B: banded extension from the segment end
        self.target_rev.clear();
        self.target_rev.extend(target.iter().rev());

        let q_start_rev = qlen.saturating_sub(seg.q_end + 1);
        let t_start_rev = tlen.saturating_sub(seg.t_end + 1);

        let mut q_rev_span = qlen - q_start_rev;
        if wrapped && q_rev_span > orig_query_len {
            q_rev_span = orig_query_len;
        }
        let left = banded::extend(
            &q_rev[q_start_rev..q_start_rev + q_rev_span],
            &self.target_rev[t_start_rev..],
            self.matrix,
            self.gap_open,
            self.gap_extend,
            self.band,
            self.zdrop,
            false,
        );

        let q_start_pos = (qlen as isize - (q_start_rev as isize + left.max_q) - 1) as usize;
        let t_start_pos = (tlen as isize - (t_start_rev as isize + left.max_t) - 1) as usize;

        let mut q_fwd_span = qlen - q_start_pos;
        if wrapped && q_fwd_span > orig_query_len {
            q_fwd_span = orig_query_len;
        }
        let mut chosen = banded::extend(
            &q[q_start_pos..q_start_pos + q_fwd_span],
            &target[t_start_pos..],
            self.matrix,
            self.gap_open,
            self.gap_extend,
            self.band,
            self.zdrop,
            true,
        );

        // rerun the left side with traceback when it extended farther
        if left.max_q > chosen.max_q && left.max_t > chosen.max_t {
            chosen = banded::extend(
                &q_rev[q_start_rev..q_start_rev + q_rev_span],
                &self.target_rev[t_start_rev..],
                self.matrix,
                self.gap_open,
                self.gap_extend,
                self.band,
                self.zdrop,
                true,
            );
            chosen.cigar = chosen.cigar.reversed();
        }
        if chosen.cigar.is_empty() || chosen.max_q < 0 {
            return Err(AlignError::EmptyAlignment);
        }

        let q_end_pos = q_start_pos + chosen.max_q as usize;
        let t_end_pos = t_start_pos + chosen.max_t as usize;
        let identities = chosen.cigar.count_identities(&q[q_start_pos..], &target[t_start_pos..]);

        let mut q_cov = cov(q_start_pos, q_end_pos, qlen);
        if wrapped {
            q_cov = (q_cov * 2.0).min(1.0);
        }

        Ok(Alignment {
            score: chosen.max,
            q_start: q_start_pos,
            q_end: q_end_pos,
            t_start: t_start_pos,
            t_end: t_end_pos,
            cigar: chosen.cigar,
            e_value: self.evaluer.evalue(chosen.max, orig_query_len),
            q_cov,
            t_cov: cov(t_start_pos, t_end_pos, tlen),
            identities,
        })
    }
}

#[inline(always)]
fn cov(start: usize, end: usize, len: usize) -> f32 {
    (end - start + 1) as f32 / len as f32
}
