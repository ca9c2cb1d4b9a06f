//! Sequence encoding and k-mer iteration for the `seqclust` pipeline.
//!
//! This crate provides:
//!  - [`Alphabet`](crate::alphabet::Alphabet): residue-to-integer maps for
//!    amino acid, nucleotide and reduced alphabets, with a reserved unknown
//!    code,
//!  - [`SubstitutionMatrix`](crate::scoring::SubstitutionMatrix): embedded
//!    NCBI-format scoring matrices with their Gumbel statistics,
//!  - [`SequenceView`](crate::view::SequenceView): a rewindable cursor
//!    yielding successive (possibly spaced) k-mers over one encoded
//!    sequence,
//!  - [`KmerIndexer`](crate::packed::KmerIndexer) and
//!    [`PackedKmer`](crate::packed::PackedKmer): canonical k-mer indices
//!    and the bit-63 strand packing used on disk,
//!  - [`ProfileKmerGenerator`](crate::profile::ProfileKmerGenerator): the
//!    top-N similar k-mer enumeration for profile sequences.

mod errors;
pub mod alphabet;
pub mod packed;
pub mod profile;
pub mod scoring;
pub mod spaced;
pub mod view;

pub use errors::SeqError;
pub use alphabet::{Alphabet, SeqKind};
pub use packed::{KmerIndexer, PackedKmer};
pub use spaced::SpacedPattern;
pub use view::SequenceView;
