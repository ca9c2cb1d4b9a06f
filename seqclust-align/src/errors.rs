use displaydoc::Display;
use thiserror::Error;

#[derive(Debug, Error, Display, PartialEq)]
#[non_exhaustive]
/// Errors that may be thrown while verifying a candidate hit
pub enum AlignError {
    /// Neither extension direction produced an alignment path
    EmptyAlignment,
    /// Query of {query_len} residues has no overlap on diagonal {diagonal}
    DiagonalOutOfRange {
        /// query length
        query_len: usize,
        /// offending diagonal
        diagonal: i32,
    },
}
