//! Stage A: maximum-scoring ungapped segment along a fixed diagonal.

use seqclust_seq::scoring::SubstitutionMatrix;

/// The best ungapped segment found on a diagonal; endpoints are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UngappedAlignment {
    pub score: i32,
    pub q_start: usize,
    pub q_end: usize,
    pub t_start: usize,
    pub t_end: usize,
}

/// Slides `query` against `target` on `diagonal = q_pos - t_pos` and keeps
/// the maximum-scoring run.
///
/// Returns `None` when the diagonal has no overlap or no positive-scoring
/// segment.
///
/// # Example
/// ```rust
/// use seqclust_align::ungapped::rescore_diagonal;
/// use seqclust_seq::scoring::{SubstitutionMatrix, SubstitutionMatrixList};
/// use seqclust_seq::Alphabet;
///
/// let m = SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62);
/// let aa = Alphabet::amino();
/// let q = aa.encode(b"MKTAYIAK");
/// let t = aa.encode(b"MKTAYIAK");
/// let seg = rescore_diagonal(&q, &t, 0, m).unwrap();
/// assert_eq!((seg.q_start, seg.q_end), (0, 7));
/// assert_eq!((seg.t_start, seg.t_end), (0, 7));
/// ```
pub fn rescore_diagonal(
    query: &[u8],
    target: &[u8],
    diagonal: i32,
    matrix: &SubstitutionMatrix,
) -> Option<UngappedAlignment> {
    let (q_off, t_off) = if diagonal >= 0 { (diagonal as usize, 0) } else { (0, (-diagonal) as usize) };
    if q_off >= query.len() || t_off >= target.len() {
        return None;
    }
    let len = (query.len() - q_off).min(target.len() - t_off);

    // Kadane scan over the diagonal
    let mut best = 0i32;
    let mut best_start = 0usize;
    let mut best_end = 0usize;
    let mut run = 0i32;
    let mut run_start = 0usize;
    for i in 0..len {
        run += matrix.score_by_code(query[q_off + i], target[t_off + i]);
        if run <= 0 {
            run = 0;
            run_start = i + 1;
        } else if run > best {
            best = run;
            best_start = run_start;
            best_end = i;
        }
    }
    if best <= 0 {
        return None;
    }
    Some(UngappedAlignment {
        score: best,
        q_start: q_off + best_start,
        q_end: q_off + best_end,
        t_start: t_off + best_start,
        t_end: t_off + best_end,
    })
}

/// Wrapped-diagonal variant for circular matches: the caller passes the
/// doubled query and the index folds back modulo the *original* (half)
/// length while the target is walked once. The reported query start lies in
/// the first copy; the end may reach into the second, which is exactly what
/// the doubled buffer is for.
pub fn rescore_diagonal_wrapped(
    query: &[u8],
    target: &[u8],
    diagonal: i32,
    matrix: &SubstitutionMatrix,
) -> Option<UngappedAlignment> {
    if query.len() < 2 || target.is_empty() {
        return None;
    }
    let qlen = (query.len() / 2) as i64;
    let mut best = 0i32;
    let mut best_start = 0usize;
    let mut best_end = 0usize;
    let mut run = 0i32;
    let mut run_start = 0usize;
    for (i, &t_code) in target.iter().enumerate() {
        let q_pos = (i as i64 + diagonal as i64).rem_euclid(qlen) as usize;
        run += matrix.score_by_code(query[q_pos], t_code);
        if run <= 0 {
            run = 0;
            run_start = i + 1;
        } else if run > best {
            best = run;
            best_start = run_start;
            best_end = i;
        }
    }
    if best <= 0 {
        return None;
    }
    let q_start = (best_start as i64 + diagonal as i64).rem_euclid(qlen) as usize;
    Some(UngappedAlignment {
        score: best,
        q_start,
        q_end: q_start + (best_end - best_start),
        t_start: best_start,
        t_end: best_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqclust_seq::scoring::SubstitutionMatrixList;
    use seqclust_seq::Alphabet;

    #[test]
    fn offset_diagonal_finds_the_shared_block() {
        let m = SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62);
        let aa = Alphabet::amino();
        // query carries the target block at offset 3
        let q = aa.encode(b"GGGMKTAYIAK");
        let t = aa.encode(b"MKTAYIAK");
        let seg = rescore_diagonal(&q, &t, 3, m).unwrap();
        assert_eq!((seg.q_start, seg.q_end), (3, 10));
        assert_eq!((seg.t_start, seg.t_end), (0, 7));
    }

    #[test]
    fn disjoint_diagonal_yields_nothing() {
        let m = SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62);
        let aa = Alphabet::amino();
        let q = aa.encode(b"MKT");
        let t = aa.encode(b"MKT");
        assert!(rescore_diagonal(&q, &t, 5, m).is_none());
    }

    #[test]
    fn wrapped_rescore_crosses_the_origin() {
        let m = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
        let nt = Alphabet::nucleotide();
        // target is a rotation of the 8-mer; on diagonal 12 the query index
        // folds back through position 0 mid-segment
        let q = nt.encode(b"ACGTTGCAACGTTGCA");
        let t = nt.encode(b"TGCAACGT");
        let seg = rescore_diagonal_wrapped(&q, &t, 12, m).unwrap();
        assert_eq!(seg.score, 16);
        assert_eq!((seg.t_start, seg.t_end), (0, 7));
        assert_eq!(seg.q_start, 4);
    }
}
