use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::index::parse_index;
use crate::{IndexRecord, StoreError, StoreKind};

/// Selects which files of a store are memory-mapped on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// map only the index; payload access is an error
    IndexOnly,
    /// map the index and the data file
    DataAndIndex,
}

/// Ordering of the in-memory index after open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// keep the on-disk record order
    NoSort,
    /// reorder records by `(key, offset)`
    ByKey,
}

/// Read access to a store: the data file is memory-mapped and payload
/// lookups return borrowed slices.
///
/// # Example
/// ```rust
/// use seqclust_store::{OpenMode, SortMode, StoreKind, StoreReader, StoreWriter};
///
/// let dir = tempfile::tempdir().unwrap();
/// let db = dir.path().join("db");
/// let writer = StoreWriter::create(&db, 1, false, StoreKind::Amino).unwrap();
/// writer.write(0, 7, b"MKTAYIAK").unwrap();
/// writer.close().unwrap();
///
/// let reader = StoreReader::open(&db, OpenMode::DataAndIndex, SortMode::NoSort).unwrap();
/// assert_eq!(reader.size(), 1);
/// assert_eq!(reader.data(0).unwrap().as_ref(), b"MKTAYIAK");
/// assert_eq!(reader.seq_len(0), 8);
/// ```
#[derive(Debug)]
pub struct StoreReader {
    db_path: PathBuf,
    data: Option<Mmap>,
    index: Vec<IndexRecord>,
    /// entry ids ordered by key, for key lookups in any sort mode
    key_order: Vec<u32>,
    kind: StoreKind,
}

impl StoreReader {
    /// Opens the store rooted at `db_path` (`<db>`, `<db>.index`, `<db>.dbtype`).
    pub fn open(db_path: &Path, mode: OpenMode, sort: SortMode) -> Result<StoreReader, StoreError> {
        let kind = StoreKind::read(db_path)?;
        let index_path = index_path(db_path);
        let index_file = File::open(&index_path)?;
        let index_bytes = if index_file.metadata()?.len() == 0 {
            Vec::new()
        } else {
            // the index is read once and parsed, a map would not outlive this call
            std::fs::read(&index_path)?
        };
        let mut index = parse_index(&index_bytes, &index_path)?;
        if sort == SortMode::ByKey {
            index.sort_unstable_by_key(|r| (r.key, r.offset));
        }
        let mut key_order: Vec<u32> = (0..index.len() as u32).collect();
        key_order.sort_unstable_by_key(|&id| index[id as usize].key);

        let data = match mode {
            OpenMode::IndexOnly => None,
            OpenMode::DataAndIndex => {
                let file = File::open(db_path)?;
                if file.metadata()?.len() == 0 {
                    None
                } else {
                    // Safety: the data file is not mutated while the store is open.
                    Some(unsafe { Mmap::map(&file)? })
                }
            }
        };

        Ok(StoreReader { db_path: db_path.to_path_buf(), data, index, key_order, kind })
    }

    /// Opens a store and `fails with` [`StoreError::WrongKind`](crate::StoreError::WrongKind)
    /// unless its `.dbtype` matches `expected`.
    pub fn open_expecting(
        db_path: &Path,
        mode: OpenMode,
        sort: SortMode,
        expected: StoreKind,
    ) -> Result<StoreReader, StoreError> {
        let reader = StoreReader::open(db_path, mode, sort)?;
        if reader.kind != expected {
            return Err(StoreError::WrongKind {
                path: db_path.display().to_string(),
                expected,
                found: reader.kind,
            });
        }
        Ok(reader)
    }

    pub fn db_path(&self) -> &Path { &self.db_path }

    pub fn kind(&self) -> StoreKind { self.kind }

    /// Number of entries.
    pub fn size(&self) -> usize { self.index.len() }

    /// Key of the entry at `id`.
    pub fn key(&self, id: usize) -> u32 { self.index[id].key }

    /// The largest key present, or `None` for an empty store.
    pub fn last_key(&self) -> Option<u32> {
        self.key_order.last().map(|&id| self.index[id as usize].key)
    }

    /// On-disk length of the entry at `id`, including the flag byte.
    pub fn entry_len(&self, id: usize) -> u64 { self.index[id].length }

    /// Resolves a key to an entry id.
    pub fn get_id(&self, key: u32) -> Option<usize> {
        self.key_order
            .binary_search_by_key(&key, |&id| self.index[id as usize].key)
            .ok()
            .map(|pos| self.key_order[pos] as usize)
    }

    /// Raw entry bytes including the trailing flag byte.
    pub fn raw_entry(&self, id: usize) -> Result<&[u8], StoreError> {
        let data = self.data.as_ref().ok_or(StoreError::NoDataMapped)?;
        let rec = &self.index[id];
        Ok(&data[rec.offset as usize..(rec.offset + rec.length) as usize])
    }

    /// True if the entry at `id` is stored as a zstd frame.
    pub fn is_compressed(&self, id: usize) -> Result<bool, StoreError> {
        let raw = self.raw_entry(id)?;
        Ok(raw.last().copied() == Some(1))
    }

    /// Payload of the entry at `id`, without the flag byte.
    ///
    /// Borrows straight from the map for plain entries; compressed entries
    /// decompress into an owned buffer.
    pub fn data(&self, id: usize) -> Result<Cow<'_, [u8]>, StoreError> {
        let raw = self.raw_entry(id)?;
        let key = self.index[id].key;
        match raw.last().copied() {
            Some(1) => {
                let plain_len = u32::from_le_bytes(
                    raw[0..4].try_into().map_err(|_| StoreError::Decompress { key })?,
                ) as usize;
                let frame = &raw[4..raw.len() - 1];
                let out = zstd::bulk::decompress(frame, plain_len)
                    .map_err(|_| StoreError::Decompress { key })?;
                Ok(Cow::Owned(out))
            }
            _ => Ok(Cow::Borrowed(&raw[..raw.len().saturating_sub(1)])),
        }
    }

    /// Payload lookup by key; `fails with`
    /// [`StoreError::KeyNotFound`](crate::StoreError::KeyNotFound) on a miss.
    pub fn data_by_key(&self, key: u32) -> Result<Cow<'_, [u8]>, StoreError> {
        let id = self.get_id(key).ok_or(StoreError::KeyNotFound { key })?;
        self.data(id)
    }

    /// Residue count of the sequence entry at `id`.
    pub fn seq_len(&self, id: usize) -> usize {
        let rec = &self.index[id];
        if let Some(data) = self.data.as_ref() {
            let raw = &data[rec.offset as usize..(rec.offset + rec.length) as usize];
            if raw.last().copied() == Some(1) && raw.len() >= 5 {
                return u32::from_le_bytes(raw[0..4].try_into().unwrap()) as usize;
            }
        }
        rec.length.saturating_sub(1) as usize
    }

    /// The longest sequence in the store.
    pub fn max_seq_len(&self) -> usize {
        (0..self.size()).map(|id| self.seq_len(id)).max().unwrap_or(0)
    }

    /// Total residue count over all entries.
    pub fn residue_count(&self) -> usize {
        (0..self.size()).map(|id| self.seq_len(id)).sum()
    }
}

/// Path of the binary index for a store data file.
pub(crate) fn index_path(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_owned();
    os.push(".index");
    PathBuf::from(os)
}

/// Path of the optional `key\tname\tfile_no` lookup sidecar.
pub(crate) fn lookup_path(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_owned();
    os.push(".lookup");
    PathBuf::from(os)
}

/// Reads a `.lookup` sidecar if one exists.
pub fn read_lookup(db_path: &Path) -> Result<Option<Vec<(u32, String, u32)>>, StoreError> {
    let path = lookup_path(db_path);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    let mut out = Vec::new();
    for line in text.lines() {
        let mut cols = line.split('\t');
        let key = cols.next().and_then(|c| c.parse().ok());
        let name = cols.next();
        let file_no = cols.next().and_then(|c| c.parse().ok());
        if let (Some(key), Some(name), Some(file_no)) = (key, name, file_no) {
            out.push((key, name.to_string(), file_no));
        }
    }
    Ok(Some(out))
}
