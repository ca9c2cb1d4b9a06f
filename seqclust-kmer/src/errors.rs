use displaydoc::Display;
use thiserror::Error;

#[derive(Debug, Error, Display)]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
/// Errors that may be thrown by the k-mer matching pipeline
pub enum KmerError {
    /// {0}
    Store(#[from] seqclust_store::StoreError),
    /// {0}
    Seq(#[from] seqclust_seq::SeqError),
    /// I/O error in a split run file: {0}
    Io(#[from] std::io::Error),
    /// k-mer buffer over-commit: {committed} tokens into capacity {capacity}
    ///
    /// Unreachable when split sizing is correct; hitting it is a bug, not an
    /// input problem.
    TokenBufferOvercommit {
        /// tokens committed so far
        committed: usize,
        /// buffer capacity
        capacity: usize,
    },
    /// Index was created with {field} {index} but the search requested {requested}
    IndexConfigMismatch {
        /// name of the conflicting setting
        field: &'static str,
        /// value recorded in the index
        index: u64,
        /// value requested on the command line
        requested: u64,
    },
    /// {path} is not a linear k-mer index
    NotAnIndex {
        /// offending path
        path: String,
    },
    /// A full k-mer table for k={k} over {alphabet} letters does not fit memory
    KmerTableTooLarge {
        /// requested k-mer size
        k: usize,
        /// alphabet size
        alphabet: usize,
    },
}
