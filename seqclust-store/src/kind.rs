use std::fs;
use std::io::Write;
use std::path::Path;

use crate::StoreError;

/// Tags the content of a store, persisted as a single byte in the
/// `<db>.dbtype` sidecar file.
///
/// # Example
/// ```rust
/// use seqclust_store::StoreKind;
///
/// let dir = tempfile::tempdir().unwrap();
/// let db = dir.path().join("seqs");
/// StoreKind::Nucleotide.write(&db).unwrap();
/// assert_eq!(StoreKind::read(&db).unwrap(), StoreKind::Nucleotide);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// integer-encoded amino acid sequences
    Amino,
    /// integer-encoded nucleotide sequences
    Nucleotide,
    /// sequence profiles with per-position score rows
    Profile,
    /// candidate hit lists keyed by representative
    PrefilterRes,
    /// candidate hit lists with strand-signed scores
    PrefilterRevRes,
    /// gapped alignment results
    AlignmentRes,
    /// a serialized linear k-mer index
    LinearIndex,
    /// anything else
    Generic,
}

impl StoreKind {
    /// The on-disk tag byte of this kind.
    pub fn code(self) -> u8 {
        match self {
            StoreKind::Amino => 0,
            StoreKind::Nucleotide => 1,
            StoreKind::Profile => 2,
            StoreKind::PrefilterRes => 3,
            StoreKind::PrefilterRevRes => 4,
            StoreKind::AlignmentRes => 5,
            StoreKind::LinearIndex => 6,
            StoreKind::Generic => 7,
        }
    }

    /// Decodes a tag byte read from a `.dbtype` file.
    pub fn from_code(code: u8) -> Option<StoreKind> {
        match code {
            0 => Some(StoreKind::Amino),
            1 => Some(StoreKind::Nucleotide),
            2 => Some(StoreKind::Profile),
            3 => Some(StoreKind::PrefilterRes),
            4 => Some(StoreKind::PrefilterRevRes),
            5 => Some(StoreKind::AlignmentRes),
            6 => Some(StoreKind::LinearIndex),
            7 => Some(StoreKind::Generic),
            _ => None,
        }
    }

    /// True for the three kinds that hold sequences the pipeline can map.
    pub fn is_sequence(self) -> bool {
        matches!(self, StoreKind::Amino | StoreKind::Nucleotide | StoreKind::Profile)
    }

    /// Reads the kind of the store rooted at `db_path` from its `.dbtype` file.
    pub fn read(db_path: &Path) -> Result<StoreKind, StoreError> {
        let path = kind_path(db_path);
        let bytes = fs::read(&path).map_err(|_| StoreError::MissingKind {
            path: db_path.display().to_string(),
        })?;
        if bytes.is_empty() {
            return Err(StoreError::MissingKind { path: db_path.display().to_string() });
        }
        StoreKind::from_code(bytes[0]).ok_or_else(|| StoreError::UnknownKind {
            path: path.display().to_string(),
            code: bytes[0],
        })
    }

    /// Writes the `.dbtype` file for the store rooted at `db_path`.
    pub fn write(self, db_path: &Path) -> Result<(), StoreError> {
        let mut file = fs::File::create(kind_path(db_path))?;
        file.write_all(&[self.code()])?;
        Ok(())
    }
}

/// Path of the `.dbtype` sidecar for a store data file.
pub(crate) fn kind_path(db_path: &Path) -> std::path::PathBuf {
    let mut os = db_path.as_os_str().to_owned();
    os.push(".dbtype");
    std::path::PathBuf::from(os)
}
