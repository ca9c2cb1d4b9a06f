use std::path::PathBuf;

use seqclust_store::{
    create_sub_store, merge_stores, read_lookup, write_lookup, OpenMode, SortMode, StoreError,
    StoreKind, StoreReader, StoreWriter,
};

fn db_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

#[test]
fn shard_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir, "seqs");

    // --- write from four "threads", out of key order on purpose
    let writer = StoreWriter::create(&db, 4, false, StoreKind::Amino).unwrap();
    writer.write(3, 11, b"MKTAYIAKQR").unwrap();
    writer.write(0, 2, b"QISFVKSHFS").unwrap();
    writer.write(2, 7, b"RQLEERLGLI").unwrap();
    writer.write(1, 5, b"E").unwrap();
    writer.close().unwrap();

    let reader = StoreReader::open(&db, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();
    assert_eq!(reader.size(), 4);
    assert_eq!(reader.kind(), StoreKind::Amino);
    assert_eq!(reader.data_by_key(2).unwrap().as_ref(), b"QISFVKSHFS");
    assert_eq!(reader.data_by_key(5).unwrap().as_ref(), b"E");
    assert_eq!(reader.data_by_key(7).unwrap().as_ref(), b"RQLEERLGLI");
    assert_eq!(reader.data_by_key(11).unwrap().as_ref(), b"MKTAYIAKQR");
    assert_eq!(reader.last_key(), Some(11));
    assert_eq!(reader.max_seq_len(), 10);
    assert_eq!(reader.residue_count(), 31);
}

#[test]
fn offsets_address_merged_data_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir, "seqs");

    let writer = StoreWriter::create(&db, 3, false, StoreKind::Generic).unwrap();
    for key in 0u32..30 {
        let payload = vec![b'A' + (key % 20) as u8; (key as usize % 7) + 1];
        writer.write(key as usize % 3, key, &payload).unwrap();
    }
    writer.close().unwrap();

    let reader = StoreReader::open(&db, OpenMode::DataAndIndex, SortMode::ByKey).unwrap();
    for id in 0..reader.size() {
        let key = reader.key(id);
        let expected = vec![b'A' + (key % 20) as u8; (key as usize % 7) + 1];
        assert_eq!(reader.data(id).unwrap().as_ref(), expected.as_slice());
        // every raw entry ends with the uncompressed flag byte
        assert_eq!(*reader.raw_entry(id).unwrap().last().unwrap(), 0u8);
    }
}

#[test]
fn compressed_and_plain_entries_coexist() {
    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir, "mixed");

    let long: Vec<u8> = std::iter::repeat(*b"ACGT")
        .take(100)
        .flat_map(|c| c.into_iter())
        .collect();
    let writer = StoreWriter::create(&db, 1, true, StoreKind::Nucleotide).unwrap();
    writer.write(0, 0, &long).unwrap();
    // too short to compress, stays plain
    writer.write(0, 1, b"ACGT").unwrap();
    writer.close().unwrap();

    let reader = StoreReader::open(&db, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();
    assert!(reader.is_compressed(reader.get_id(0).unwrap()).unwrap());
    assert!(!reader.is_compressed(reader.get_id(1).unwrap()).unwrap());
    assert_eq!(reader.data_by_key(0).unwrap().as_ref(), long.as_slice());
    assert_eq!(reader.data_by_key(1).unwrap().as_ref(), b"ACGT");
    assert_eq!(reader.seq_len(reader.get_id(0).unwrap()), 400);
}

#[test]
fn merge_concatenates_duplicate_keys_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = db_path(&dir, "a");
    let b = db_path(&dir, "b");
    let merged = db_path(&dir, "merged");

    let writer = StoreWriter::create(&a, 1, false, StoreKind::PrefilterRes).unwrap();
    writer.write(0, 1, b"3\t2\t0\n").unwrap();
    writer.write(0, 2, b"9\t1\t-1\n").unwrap();
    writer.close().unwrap();

    let writer = StoreWriter::create(&b, 1, false, StoreKind::PrefilterRes).unwrap();
    writer.write(0, 1, b"5\t4\t7\n").unwrap();
    writer.write(0, 3, b"8\t1\t0\n").unwrap();
    writer.close().unwrap();

    merge_stores(&[a, b], &merged).unwrap();
    let reader = StoreReader::open(&merged, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();
    assert_eq!(reader.size(), 3);
    assert_eq!(reader.data_by_key(1).unwrap().as_ref(), b"3\t2\t0\n5\t4\t7\n");
    assert_eq!(reader.data_by_key(2).unwrap().as_ref(), b"9\t1\t-1\n");
    assert_eq!(reader.data_by_key(3).unwrap().as_ref(), b"8\t1\t0\n");
}

#[test]
fn missing_key_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir, "tiny");
    let writer = StoreWriter::create(&db, 1, false, StoreKind::Amino).unwrap();
    writer.write(0, 4, b"PEPTIDE").unwrap();
    writer.close().unwrap();

    let reader = StoreReader::open(&db, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();
    match reader.data_by_key(99) {
        Err(StoreError::KeyNotFound { key }) => assert_eq!(key, 99),
        other => panic!("expected KeyNotFound, got {:?}", other.map(|c| c.len())),
    }
}

#[test]
fn wrong_kind_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir, "nt");
    let writer = StoreWriter::create(&db, 1, false, StoreKind::Nucleotide).unwrap();
    writer.write(0, 0, b"ACGT").unwrap();
    writer.close().unwrap();

    let err = StoreReader::open_expecting(&db, OpenMode::IndexOnly, SortMode::NoSort, StoreKind::Profile)
        .unwrap_err();
    assert!(matches!(err, StoreError::WrongKind { .. }));
}

#[test]
fn sub_store_preserves_entries_and_skips_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir, "full");
    let sub = db_path(&dir, "sub");

    let writer = StoreWriter::create(&db, 1, true, StoreKind::Amino).unwrap();
    let long = vec![b'K'; 200];
    writer.write(0, 0, &long).unwrap();
    writer.write(0, 1, b"SHORT").unwrap();
    writer.write(0, 2, b"OTHER").unwrap();
    writer.close().unwrap();

    let reader = StoreReader::open(&db, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();
    let written = create_sub_store(&reader, &[0, 2, 77], &sub).unwrap();
    assert_eq!(written, 2);

    let sub_reader = StoreReader::open(&sub, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();
    assert_eq!(sub_reader.size(), 2);
    // the compressed entry was copied frame-intact and still decompresses
    assert_eq!(sub_reader.data_by_key(0).unwrap().as_ref(), long.as_slice());
    assert_eq!(sub_reader.data_by_key(2).unwrap().as_ref(), b"OTHER");
    assert!(sub_reader.data_by_key(1).is_err());
}

#[test]
fn lookup_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir, "db");
    let entries = vec![(0u32, "Q9Y6K9".to_string(), 0u32), (1, "P69905".to_string(), 0)];
    write_lookup(&db, &entries).unwrap();
    assert_eq!(read_lookup(&db).unwrap().unwrap(), entries);
}
