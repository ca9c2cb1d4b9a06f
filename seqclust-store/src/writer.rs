use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use crate::index::parse_index;
use crate::reader::{index_path, lookup_path};
use crate::{IndexRecord, StoreError, StoreKind, StoreReader, MIN_COMPRESSED_LEN};
use crate::reader::{OpenMode, SortMode};

struct Shard {
    data: BufWriter<File>,
    index: BufWriter<File>,
    offset: u64,
}

/// Parallel store writer.
///
/// Every worker thread appends to its own shard pair `data.<t>` /
/// `index.<t>`, so writes never contend. [`close()`](StoreWriter::close)
/// concatenates the shards into the final data file, rebuilds a single
/// index with offsets shifted by the cumulative shard sizes, sorts it by
/// `(key, offset)` and writes the `.dbtype` tag.
///
/// # Example
/// ```rust
/// use seqclust_store::{OpenMode, SortMode, StoreKind, StoreReader, StoreWriter};
///
/// let dir = tempfile::tempdir().unwrap();
/// let db = dir.path().join("hits");
/// let writer = StoreWriter::create(&db, 2, false, StoreKind::PrefilterRes).unwrap();
/// writer.write(1, 10, b"5\t1\t0\n").unwrap();
/// writer.write(0, 3, b"7\t2\t-4\n").unwrap();
/// writer.close().unwrap();
///
/// let reader = StoreReader::open(&db, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();
/// assert_eq!(reader.data_by_key(10).unwrap().as_ref(), b"5\t1\t0\n");
/// ```
pub struct StoreWriter {
    db_path: PathBuf,
    kind: StoreKind,
    compressed: bool,
    shards: Vec<Mutex<Shard>>,
}

impl StoreWriter {
    /// Creates shard files for `threads` writers under the store root `db_path`.
    pub fn create(
        db_path: &Path,
        threads: usize,
        compressed: bool,
        kind: StoreKind,
    ) -> Result<StoreWriter, StoreError> {
        let threads = threads.max(1);
        let mut shards = Vec::with_capacity(threads);
        for t in 0..threads {
            let data = BufWriter::new(File::create(shard_path(db_path, t))?);
            let index = BufWriter::new(File::create(shard_index_path(db_path, t))?);
            shards.push(Mutex::new(Shard { data, index, offset: 0 }));
        }
        Ok(StoreWriter { db_path: db_path.to_path_buf(), kind, compressed, shards })
    }

    /// Number of shards this writer was created with.
    pub fn threads(&self) -> usize { self.shards.len() }

    /// Appends one entry to the shard owned by `thread_idx`.
    ///
    /// The payload is compressed when the writer was created with
    /// `compressed` and the entry is large enough to gain from it; the
    /// trailing flag byte records the choice per entry.
    pub fn write(&self, thread_idx: usize, key: u32, payload: &[u8]) -> Result<(), StoreError> {
        let mut shard = self.shards[thread_idx].lock().unwrap();
        let start = shard.offset;
        let written = if self.compressed && payload.len() >= MIN_COMPRESSED_LEN {
            let frame = zstd::bulk::compress(payload, 0)?;
            shard.data.write_all(&(payload.len() as u32).to_le_bytes())?;
            shard.data.write_all(&frame)?;
            shard.data.write_all(&[1u8])?;
            4 + frame.len() as u64 + 1
        } else {
            shard.data.write_all(payload)?;
            shard.data.write_all(&[0u8])?;
            payload.len() as u64 + 1
        };
        shard.offset += written;
        let record = IndexRecord { key, offset: start, length: written };
        shard.index.write_all(&record.to_bytes())?;
        Ok(())
    }

    /// Copies a raw entry (flag byte included) verbatim, preserving its
    /// compression state.
    pub fn write_raw(&self, thread_idx: usize, key: u32, raw: &[u8]) -> Result<(), StoreError> {
        let mut shard = self.shards[thread_idx].lock().unwrap();
        let start = shard.offset;
        shard.data.write_all(raw)?;
        shard.offset += raw.len() as u64;
        let record = IndexRecord { key, offset: start, length: raw.len() as u64 };
        shard.index.write_all(&record.to_bytes())?;
        Ok(())
    }

    /// Merges the shards into `<db>` / `<db>.index`, removes them and tags
    /// the store. Offsets of shard `t` are shifted by the total size of
    /// shards `0..t`, so the rebuilt index addresses the concatenated data
    /// exactly.
    pub fn close(self) -> Result<(), StoreError> {
        let db_path = self.db_path;
        let mut out_data = BufWriter::new(File::create(&db_path)?);
        let mut records: Vec<IndexRecord> = Vec::new();
        let mut shift = 0u64;
        for (t, shard) in self.shards.into_iter().enumerate() {
            let mut shard = shard.into_inner().unwrap();
            shard.data.flush()?;
            shard.index.flush()?;
            drop(shard.data);
            drop(shard.index);

            let data_path = shard_path(&db_path, t);
            let mut file = File::open(&data_path)?;
            let copied = std::io::copy(&mut file, &mut out_data)?;

            let index_bytes = fs::read(shard_index_path(&db_path, t))?;
            for mut rec in parse_index(&index_bytes, &shard_index_path(&db_path, t))? {
                rec.offset += shift;
                records.push(rec);
            }
            debug!("merged shard {} ({} bytes)", t, copied);
            shift += copied;

            fs::remove_file(data_path)?;
            fs::remove_file(shard_index_path(&db_path, t))?;
        }
        out_data.flush()?;

        records.sort_unstable_by_key(|r| (r.key, r.offset));
        let mut out_index = BufWriter::new(File::create(index_path(&db_path))?);
        for rec in &records {
            out_index.write_all(&rec.to_bytes())?;
        }
        out_index.flush()?;
        self.kind.write(&db_path)?;
        Ok(())
    }
}

fn shard_path(db_path: &Path, t: usize) -> PathBuf {
    let mut os = db_path.as_os_str().to_owned();
    os.push(format!(".{}", t));
    PathBuf::from(os)
}

fn shard_index_path(db_path: &Path, t: usize) -> PathBuf {
    let mut os = db_path.as_os_str().to_owned();
    os.push(format!(".index.{}", t));
    PathBuf::from(os)
}

/// Merges complete sub-databases entry-by-entry into `output`.
///
/// Keys are emitted in ascending order. A key present in several inputs
/// concatenates its payloads in input order into one entry, so the merge is
/// associative and independent of thread scheduling.
pub fn merge_stores(inputs: &[PathBuf], output: &Path) -> Result<(), StoreError> {
    let mut readers = Vec::with_capacity(inputs.len());
    for path in inputs {
        readers.push(StoreReader::open(path, OpenMode::DataAndIndex, SortMode::ByKey)?);
    }
    let kind = readers.first().map(|r| r.kind()).unwrap_or(StoreKind::Generic);

    let mut keys: Vec<u32> = Vec::new();
    for reader in &readers {
        for id in 0..reader.size() {
            keys.push(reader.key(id));
        }
    }
    keys.sort_unstable();
    keys.dedup();

    let writer = StoreWriter::create(output, 1, false, kind)?;
    let mut payload = Vec::new();
    for key in keys {
        payload.clear();
        for reader in &readers {
            if let Some(id) = reader.get_id(key) {
                payload.extend_from_slice(reader.data(id)?.as_ref());
            }
        }
        writer.write(0, key, &payload)?;
    }
    writer.close()
}

/// Writes the `key\tname\tfile_no` lookup sidecar of a store.
pub fn write_lookup(db_path: &Path, entries: &[(u32, String, u32)]) -> Result<(), StoreError> {
    let mut out = BufWriter::new(File::create(lookup_path(db_path))?);
    for (key, name, file_no) in entries {
        writeln!(out, "{}\t{}\t{}", key, name, file_no)?;
    }
    out.flush()?;
    Ok(())
}

/// Copies the entries named by `keys` from `source` into a new store at
/// `output`, preserving per-entry compression. Missing keys log a warning
/// and are skipped.
pub fn create_sub_store(
    source: &StoreReader,
    keys: &[u32],
    output: &Path,
) -> Result<usize, StoreError> {
    let writer = StoreWriter::create(output, 1, false, source.kind())?;
    let mut written = 0usize;
    for &key in keys {
        match source.get_id(key) {
            Some(id) => {
                writer.write_raw(0, key, source.raw_entry(id)?)?;
                written += 1;
            }
            None => {
                log::warn!("Key {} not found in database {}", key, source.db_path().display());
            }
        }
    }
    writer.close()?;
    Ok(written)
}
