use displaydoc::Display;
use thiserror::Error;

#[derive(Debug, Error, Display, PartialEq)]
#[non_exhaustive]
/// Errors that may be thrown while encoding sequences or loading scoring matrices
pub enum SeqError {
    /// No spaced seed pattern is defined for k-mer size {k}
    NoPatternForKmerSize {
        /// the requested k-mer size
        k: usize,
    },
    /// The following line of a NCBI matrix is not formatted correctly: {line}
    IncorrectNcbiFormat {
        /// the incorrectly formatted line
        line: String,
    },
    /// The entry {value} can't be parsed as a score; the problematic line was: {line}
    CantParseNcbiEntry {
        /// the incorrectly formatted line
        line: String,
        /// the unparsable token
        value: String,
    },
    /// A profile entry of {bytes} bytes is not a whole number of {row} byte rows
    TruncatedProfile {
        /// total payload size
        bytes: usize,
        /// serialized row width
        row: usize,
    },
    /// Sequence of {length} residues is too long for the configured limit {max}
    SequenceTooLong {
        /// actual length
        length: usize,
        /// configured maximum
        max: usize,
    },
}
