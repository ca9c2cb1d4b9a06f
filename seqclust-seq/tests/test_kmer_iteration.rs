use seqclust_seq::scoring::{SubstitutionMatrix, SubstitutionMatrixList};
use seqclust_seq::{Alphabet, KmerIndexer, PackedKmer, SeqKind, SequenceView, SpacedPattern};

#[test]
fn contiguous_kmers_cover_the_sequence() {
    let pattern = SpacedPattern::new(10, false).unwrap();
    let mut view = SequenceView::new(1024, SeqKind::Amino, pattern);
    let seq = b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIE";
    view.map(0, 0, seq, &Alphabet::amino()).unwrap();

    let mut count = 0;
    let mut last_pos = 0;
    while view.has_next_kmer() {
        view.next_kmer();
        last_pos = view.current_position();
        count += 1;
    }
    assert_eq!(count, seq.len() - 10 + 1);
    assert_eq!(last_pos, seq.len() - 10);
}

#[test]
fn identical_windows_share_an_index() {
    let aa = Alphabet::amino();
    let idx = KmerIndexer::new(aa.size(), 6);
    let a = idx.index(&aa.encode(b"MKTAYI"));
    let b = idx.index(&aa.encode(b"MKTAYI"));
    let c = idx.index(&aa.encode(b"MKTAYL"));
    assert_eq!(a, b);
    assert_ne!(a, c);
    // indices stay clear of the strand bit, identity tokens included
    assert!(idx.highest_index() + u32::MAX as u64 <= PackedKmer::index_of(u64::MAX));
}

#[test]
fn canonical_nucleotide_kmer_matches_its_reverse_complement() {
    let nt = Alphabet::nucleotide();
    let idx = KmerIndexer::new(nt.size(), 15);
    let forward = nt.encode(b"ACGTACGTACGTACG");
    let mut rc: Vec<u8> = forward.iter().rev().map(|&c| nt.complement(c)).collect();

    let fwd_idx = idx.nucleotide_index(&forward);
    let rc_idx = idx.nucleotide_index(&rc);
    assert_eq!(idx.rev_complement(fwd_idx), rc_idx);
    assert_eq!(fwd_idx.min(rc_idx), idx.rev_complement(rc_idx).min(rc_idx));

    // canonical choice is invariant under strand swap
    rc.reverse();
    assert_eq!(
        fwd_idx.min(idx.rev_complement(fwd_idx)),
        rc_idx.min(idx.rev_complement(rc_idx))
    );
}

#[test]
fn blosum62_diagonal_is_positive() {
    let m = SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62);
    let aa = Alphabet::amino();
    for ch in b"ARNDCQEGHILKMFPSTWYV" {
        let code = aa.encode_residue(*ch);
        assert!(m.score_by_code(code, code) > 0, "self score of {}", *ch as char);
    }
}
