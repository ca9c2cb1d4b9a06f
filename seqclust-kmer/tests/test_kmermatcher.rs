use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use seqclust_kmer::count::count_kmers;
use seqclust_kmer::{plan_splits, run_kmer_matcher, CovMode, MatchParams};
use seqclust_store::{OpenMode, SortMode, StoreKind, StoreReader, StoreWriter};

fn write_seq_db(dir: &Path, name: &str, kind: StoreKind, seqs: &[&[u8]]) -> PathBuf {
    let db = dir.join(name);
    let writer = StoreWriter::create(&db, 1, false, kind).unwrap();
    for (key, seq) in seqs.iter().enumerate() {
        writer.write(0, key as u32, seq).unwrap();
    }
    writer.close().unwrap();
    db
}

/// Parses a result store into `rep -> [(target, score, diagonal)]`.
fn read_result(db: &Path) -> HashMap<u32, Vec<(u32, i64, i64)>> {
    let reader = StoreReader::open(db, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();
    let mut out = HashMap::new();
    for id in 0..reader.size() {
        let key = reader.key(id);
        let text = String::from_utf8(reader.data(id).unwrap().into_owned()).unwrap();
        let hits: Vec<(u32, i64, i64)> = text
            .lines()
            .map(|line| {
                let mut cols = line.split('\t');
                (
                    cols.next().unwrap().parse().unwrap(),
                    cols.next().unwrap().parse().unwrap(),
                    cols.next().unwrap().parse().unwrap(),
                )
            })
            .collect();
        out.insert(key, hits);
    }
    out
}

fn random_protein(rng: &mut SmallRng, len: usize) -> Vec<u8> {
    const RESIDUES: &[u8] = b"ARNDCQEGHILKMFPSTWYV";
    (0..len).map(|_| RESIDUES[rng.gen_range(0..RESIDUES.len())]).collect()
}

fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            other => other,
        })
        .collect()
}

#[test]
fn identical_sequences_form_one_group() {
    let dir = tempfile::tempdir().unwrap();
    let seq = b"MKTAYIAKQRQISFVKSHFSRQLEERLGLIE";
    let db = write_seq_db(dir.path(), "seqs", StoreKind::Amino, &[seq, seq]);
    let result = dir.path().join("pref");

    let params = MatchParams { k: 10, cov_thr: 0.0, ..MatchParams::default() };
    run_kmer_matcher(&db, &result, &params, None).unwrap();

    let groups = read_result(&result);
    // rep 0 leads its block and carries member 1 on diagonal 0
    let block = &groups[&0];
    assert_eq!(block[0], (0, 0, 0));
    let member = block.iter().find(|h| h.0 == 1).expect("member 1 clustered with rep 0");
    assert!(member.1 > 0, "positive k-mer count, got {}", member.1);
    assert_eq!(member.2, 0, "identical sequences sit on diagonal 0");
    // id 1 never became a representative, the backfill keeps it addressable
    assert_eq!(groups[&1], vec![(1, 0, 0)]);
}

#[test]
fn reverse_complement_pair_groups_with_negative_score() {
    let dir = tempfile::tempdir().unwrap();
    let forward = b"ACGGTTACGTAACCGTACGTTACGAATTGGCC";
    let revcomp = reverse_complement(forward);
    let db = write_seq_db(dir.path(), "nt", StoreKind::Nucleotide, &[forward, &revcomp]);
    let result = dir.path().join("pref");

    let params = MatchParams { k: 15, cov_thr: 0.0, ..MatchParams::default() };
    run_kmer_matcher(&db, &result, &params, None).unwrap();

    let groups = read_result(&result);
    let block = &groups[&0];
    let member = block.iter().find(|h| h.0 == 1).expect("reverse complement clustered");
    assert!(member.1 < 0, "reverse-strand hit carries a negative score, got {}", member.1);
    assert_eq!(member.2, 0, "full-length reverse complement sits on diagonal 0");
}

#[test]
fn unrelated_sequences_stay_singletons() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = SmallRng::seed_from_u64(7);
    let a = random_protein(&mut rng, 100);
    let b = random_protein(&mut rng, 100);
    let db = write_seq_db(dir.path(), "seqs", StoreKind::Amino, &[&a, &b]);
    let result = dir.path().join("pref");

    let params = MatchParams { k: 14, alphabet_size: 21, cov_thr: 0.0, ..MatchParams::default() };
    run_kmer_matcher(&db, &result, &params, None).unwrap();

    let groups = read_result(&result);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[&0], vec![(0, 0, 0)]);
    assert_eq!(groups[&1], vec![(1, 0, 0)]);
}

#[test]
fn coverage_threshold_rejects_short_against_long() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = SmallRng::seed_from_u64(21);
    let long = random_protein(&mut rng, 300);
    let short = long[..100].to_vec();
    let db = write_seq_db(dir.path(), "seqs", StoreKind::Amino, &[&long, &short]);
    let result = dir.path().join("pref");

    let params = MatchParams {
        k: 10,
        kmers_per_seq: 300,
        cov_mode: CovMode::Query,
        cov_thr: 0.8,
        ..MatchParams::default()
    };
    run_kmer_matcher(&db, &result, &params, None).unwrap();

    let groups = read_result(&result);
    // the shared k-mers are there, but a 100-residue target cannot cover
    // 80% of a 300-residue representative
    assert!(groups[&0].iter().all(|h| h.0 != 1));
    assert_eq!(groups[&1], vec![(1, 0, 0)]);

    // without the gate the pair clusters
    let relaxed = dir.path().join("pref_relaxed");
    let params = MatchParams { k: 10, kmers_per_seq: 300, cov_thr: 0.0, ..MatchParams::default() };
    run_kmer_matcher(&db, &relaxed, &params, None).unwrap();
    let groups = read_result(&relaxed);
    assert!(groups[&0].iter().any(|h| h.0 == 1));
}

#[test]
fn split_runs_reproduce_the_single_split_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = SmallRng::seed_from_u64(99);

    // families of related sequences force shared k-mers across groups
    let mut seqs: Vec<Vec<u8>> = Vec::new();
    for _ in 0..60 {
        let len = rng.gen_range(60..140);
        let base = random_protein(&mut rng, len);
        seqs.push(base.clone());
        for _ in 0..4 {
            let mut variant = base.clone();
            let cut = rng.gen_range(0..variant.len() / 2);
            variant.drain(..cut);
            seqs.push(variant);
        }
    }
    let refs: Vec<&[u8]> = seqs.iter().map(|s| s.as_slice()).collect();
    let db = write_seq_db(dir.path(), "seqs", StoreKind::Amino, &refs);

    let base_params = MatchParams { k: 10, cov_thr: 0.0, threads: 2, ..MatchParams::default() };

    let single = dir.path().join("pref_single");
    run_kmer_matcher(&db, &single, &base_params, None).unwrap();

    let split = dir.path().join("pref_split");
    let params = MatchParams { split_memory_limit: 16 * 1024, ..base_params.clone() };
    run_kmer_matcher(&db, &split, &params, None).unwrap();

    let mut single_groups = read_result(&single);
    let mut split_groups = read_result(&split);
    assert_eq!(single_groups.len(), split_groups.len());
    for (_, hits) in single_groups.iter_mut() {
        hits.sort_unstable();
    }
    for (_, hits) in split_groups.iter_mut() {
        hits.sort_unstable();
    }
    assert_eq!(single_groups, split_groups);
}

#[test]
fn restart_resumes_at_the_next_undone_split() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = SmallRng::seed_from_u64(13);
    let mut seqs: Vec<Vec<u8>> = Vec::new();
    for _ in 0..40 {
        let base = random_protein(&mut rng, 80);
        seqs.push(base.clone());
        seqs.push(base[10..].to_vec());
    }
    let refs: Vec<&[u8]> = seqs.iter().map(|s| s.as_slice()).collect();
    let db = write_seq_db(dir.path(), "seqs", StoreKind::Amino, &refs);

    let params = MatchParams {
        k: 10,
        cov_thr: 0.0,
        split_memory_limit: 8 * 1024,
        ..MatchParams::default()
    };
    let splits = plan_splits(&db, &params).unwrap();
    assert!(splits > 2, "test needs a multi-split job, got {}", splits);

    // a first invocation computes only the leading splits, then stops
    let result = dir.path().join("pref");
    run_kmer_matcher(&db, &result, &params, Some((0, 2))).unwrap();
    assert!(!result.exists(), "partial run must not produce a result store");

    // the resumed full run skips the `.done` splits and merges everything
    run_kmer_matcher(&db, &result, &params, None).unwrap();

    let single = dir.path().join("pref_single");
    let single_params = MatchParams { split_memory_limit: 0, ..params };
    run_kmer_matcher(&db, &single, &single_params, None).unwrap();

    let mut resumed = read_result(&result);
    let mut reference = read_result(&single);
    for hits in resumed.values_mut().chain(reference.values_mut()) {
        hits.sort_unstable();
    }
    assert_eq!(resumed, reference);
}

#[test]
fn count_table_tallies_every_window() {
    let dir = tempfile::tempdir().unwrap();
    let db = write_seq_db(dir.path(), "nt", StoreKind::Nucleotide, &[b"ACGTACGT"]);
    let reader = StoreReader::open(&db, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();

    let counts = count_kmers(&reader, 2, false, 1).unwrap();
    assert_eq!(counts.len(), 16);
    // AC CG GT TA AC CG GT
    assert_eq!(counts[0b0001], 2, "AC");
    assert_eq!(counts[0b0110], 2, "CG");
    assert_eq!(counts[0b1011], 2, "GT");
    assert_eq!(counts[0b1100], 1, "TA");
    assert_eq!(counts.iter().map(|&c| c as usize).sum::<usize>(), 7);
}

#[test]
fn every_input_id_appears_in_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = SmallRng::seed_from_u64(3);
    let seqs: Vec<Vec<u8>> = (0..40)
        .map(|_| {
            let len = rng.gen_range(40..90);
            random_protein(&mut rng, len)
        })
        .collect();
    let refs: Vec<&[u8]> = seqs.iter().map(|s| s.as_slice()).collect();
    let db = write_seq_db(dir.path(), "seqs", StoreKind::Amino, &refs);
    let result = dir.path().join("pref");

    let params = MatchParams { k: 10, cov_thr: 0.0, ..MatchParams::default() };
    run_kmer_matcher(&db, &result, &params, None).unwrap();

    let groups = read_result(&result);
    for key in 0u32..40 {
        let as_entry = groups.contains_key(&key);
        let as_member = groups.values().any(|hits| hits.iter().any(|h| h.0 == key));
        assert!(as_entry || as_member, "id {} is missing from the output", key);
    }
    // rebuilding from the same inputs is byte-identical
    let again = dir.path().join("pref_again");
    run_kmer_matcher(&db, &again, &params, None).unwrap();
    assert_eq!(std::fs::read(&result).unwrap(), std::fs::read(&again).unwrap());
}
