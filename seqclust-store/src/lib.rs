//! On-disk keyed blob databases used by the `seqclust` pipeline.
//!
//! A *store* is a pair of files: a data file of concatenated payloads, each
//! terminated by a single flag byte, and a binary index of fixed-width
//! records addressing them. A one-byte `.dbtype` sidecar tags the content.
//! Stores are written in parallel (one shard per thread) and read through a
//! memory map, so a payload lookup never copies unless the entry is
//! compressed.
//!
//! The three main entry points are:
//!  - [`StoreReader`](crate::StoreReader) for memory-mapped read access,
//!  - [`StoreWriter`](crate::StoreWriter) for parallel shard writing with a
//!    merging [`close()`](crate::StoreWriter::close),
//!  - [`merge_stores`](crate::merge_stores) for the entry-by-entry merge of
//!    complete sub-databases.

mod errors;
mod index;
mod kind;
mod reader;
mod writer;

pub use errors::StoreError;
pub use index::IndexRecord;
pub use kind::StoreKind;
pub use reader::{read_lookup, OpenMode, SortMode, StoreReader};
pub use writer::{create_sub_store, merge_stores, write_lookup, StoreWriter};

/// Entries below this payload size are never compressed, the zstd frame
/// header alone would outgrow them.
pub const MIN_COMPRESSED_LEN: usize = 60;
