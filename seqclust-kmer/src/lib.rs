//! Linear-time k-mer grouping.
//!
//! The pipeline turns a sequence store into candidate hit lists in three
//! stages: per-sequence selection of representative k-mers
//! ([`extract`](crate::extract)), grouping by canonical k-mer with a
//! representative per group ([`group`](crate::group)), and a split/merge
//! layer bounding peak memory ([`matcher`](crate::matcher),
//! [`merge`](crate::merge)). A prebuilt [`index`](crate::index) supports
//! searching instead of clustering, and [`count`](crate::count) tallies raw
//! k-mer occurrences.

mod errors;
pub mod buffer;
pub mod count;
pub mod extract;
pub mod group;
pub mod hash;
pub mod index;
pub mod matcher;
pub mod merge;
pub mod params;
pub mod runfile;
pub mod token;

mod mask;

pub use errors::KmerError;
pub use index::{build_linear_index, run_kmer_search, IndexMeta};
pub use matcher::{plan_splits, run_kmer_matcher};
pub use params::{CovMode, MatchParams};
pub use token::{KmerToken, SeqLenType};

pub use mask::{mask_lowercase, mask_tandem_repeats};
