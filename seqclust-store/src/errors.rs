use displaydoc::Display;
use thiserror::Error;

#[derive(Debug, Error, Display)]
#[non_exhaustive]
/// Errors that may be thrown while reading or writing a sequence store
pub enum StoreError {
    /// I/O error while accessing a store file: {0}
    Io(#[from] std::io::Error),
    /// The index file {path} is corrupt: {length} bytes is not a whole number of records
    CorruptIndex {
        /// path of the offending index file
        path: String,
        /// actual file length
        length: u64,
    },
    /// The store {path} has no `.dbtype` file
    MissingKind {
        /// path of the store
        path: String,
    },
    /// The byte {code} of {path} does not name a known store kind
    UnknownKind {
        /// path of the `.dbtype` file
        path: String,
        /// offending tag byte
        code: u8,
    },
    /// The store {path} holds {found:?} entries, expected {expected:?}
    WrongKind {
        /// path of the store
        path: String,
        /// kind required by the caller
        expected: crate::StoreKind,
        /// kind found on disk
        found: crate::StoreKind,
    },
    /// Key {key} not found in the store
    KeyNotFound {
        /// the missing key
        key: u32,
    },
    /// Entry {key} can't be decompressed
    Decompress {
        /// key of the broken entry
        key: u32,
    },
    /// The store was opened without its data file mapped
    NoDataMapped,
}
