//! Alignment verification for candidate hits.
//!
//! A candidate pair arrives as `(query, target, diagonal, strand)`. Stage A
//! rescoring slides the two sequences along that diagonal and keeps the
//! maximum-scoring ungapped segment; stage B extends the segment with a
//! banded, Z-drop-terminated gapped aligner and reports a
//! [`Alignment`](crate::Alignment) with CIGAR, identities and E-value, or
//! rejects the pair.

mod errors;
pub mod banded;
pub mod cigar;
pub mod evalue;
pub mod ungapped;
mod aligner;

pub use aligner::{Alignment, BandedKmerAligner};
pub use cigar::{Cigar, CigarOp};
pub use errors::AlignError;
pub use evalue::EvalueComputation;
pub use ungapped::UngappedAlignment;
