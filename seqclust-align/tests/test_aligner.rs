use seqclust_align::{AlignError, BandedKmerAligner, EvalueComputation};
use seqclust_seq::scoring::{SubstitutionMatrix, SubstitutionMatrixList};
use seqclust_seq::Alphabet;

fn aa_aligner(matrix: &SubstitutionMatrix) -> BandedKmerAligner<'_> {
    let evaluer = EvalueComputation::new(*matrix.gumbel(), 100_000);
    BandedKmerAligner::new(matrix, evaluer, 11, 1)
}

fn nt_aligner(matrix: &SubstitutionMatrix) -> BandedKmerAligner<'_> {
    let evaluer = EvalueComputation::new(*matrix.gumbel(), 100_000);
    BandedKmerAligner::new(matrix, evaluer, 5, 2)
}

#[test]
fn identical_sequences_get_a_trivial_all_match_path() {
    let matrix = SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62);
    let aa = Alphabet::amino();
    let codes = aa.encode(b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIE");

    let mut aligner = aa_aligner(matrix);
    aligner.init_query(&codes);
    let result = aligner.align(&codes, 0, false, false).unwrap();

    assert_eq!(result.cigar.to_string(), "31M");
    assert_eq!(result.identities, 31);
    assert_eq!((result.q_start, result.q_end), (0, 30));
    assert_eq!((result.t_start, result.t_end), (0, 30));
    assert!(result.score > 0);
    assert!((result.q_cov - 1.0).abs() < 1e-6);
    assert!((result.t_cov - 1.0).abs() < 1e-6);
    assert!(result.e_value < 1e-6);
}

#[test]
fn gapped_pair_aligns_through_the_extension() {
    let matrix = SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62);
    let aa = Alphabet::amino();
    // target misses five query residues in the middle
    let query = aa.encode(b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIE");
    let target = aa.encode(b"MKTAYIAKQRQISFSRQLEERLGLIE");

    let mut aligner = aa_aligner(matrix);
    aligner.init_query(&query);
    let result = aligner.align(&target, 0, false, false).unwrap();

    let (q_span, t_span) = result.cigar.spans();
    assert_eq!(q_span, result.q_end - result.q_start + 1);
    assert_eq!(t_span, result.t_end - result.t_start + 1);
    // replaying the cigar reproduces the reported identity count
    let replayed = result
        .cigar
        .count_identities(&query[result.q_start..], &target[result.t_start..]);
    assert_eq!(replayed, result.identities);
    assert!(result.identities >= 26 - 3);
}

#[test]
fn reverse_complement_hit_aligns_on_the_preimage() {
    let matrix = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
    let nt = Alphabet::nucleotide();
    let query = nt.encode(b"ACGGTTACGTAACCGTACGTTACG");
    let target: Vec<u8> = query.iter().rev().map(|&c| nt.complement(c)).collect();

    let mut aligner = nt_aligner(matrix);
    aligner.init_query(&query);
    let result = aligner.align(&target, 0, true, false).unwrap();

    assert_eq!(result.cigar.to_string(), "24M");
    assert_eq!(result.identities, 24);
    assert!((result.q_cov - 1.0).abs() < 1e-6);
}

#[test]
fn wrapped_scoring_covers_a_rotated_query() {
    let matrix = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
    let nt = Alphabet::nucleotide();
    // doubled 8-mer against one of its rotations
    let doubled = nt.encode(b"ACGTTGCAACGTTGCA");
    let target = nt.encode(b"TGCAACGT");

    let mut aligner = nt_aligner(matrix);
    aligner.init_query(&doubled);
    let result = aligner.align(&target, 4, false, true).unwrap();

    assert_eq!(result.cigar.to_string(), "8M");
    assert_eq!(result.identities, 8);
    assert!((result.q_cov - 1.0).abs() < 1e-6);
    assert!((result.t_cov - 1.0).abs() < 1e-6);
}

#[test]
fn out_of_range_diagonal_is_rejected_up_front() {
    let matrix = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
    let nt = Alphabet::nucleotide();
    let query = nt.encode(b"ACGTACGT");
    let target = nt.encode(b"ACGTACGT");

    let mut aligner = nt_aligner(matrix);
    aligner.init_query(&query);
    // the diagonal places the query entirely past the target
    let result = aligner.align(&target, 8, false, false);
    assert!(matches!(result, Err(AlignError::DiagonalOutOfRange { query_len: 8, diagonal: 8 })));
    let result = aligner.align(&target, -8, false, false);
    assert!(matches!(result, Err(AlignError::DiagonalOutOfRange { .. })));
}

#[test]
fn unrelated_pair_is_rejected() {
    let matrix = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
    let nt = Alphabet::nucleotide();
    let query = nt.encode(b"AAAAAAAAAA");
    let target = nt.encode(b"CCCCCCCCCC");

    let mut aligner = nt_aligner(matrix);
    aligner.init_query(&query);
    let result = aligner.align(&target, 0, false, false);
    assert!(matches!(result, Err(AlignError::EmptyAlignment)));
}
