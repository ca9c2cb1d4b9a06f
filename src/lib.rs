//! Command-line surface of the `seqclust` toolkit.
//!
//! The binary dispatches through an explicit
//! [`CommandRegistry`](crate::registry::CommandRegistry) value built in
//! `main`; every sub-command lives in its own module under
//! [`commands`](crate::commands) and owns its `clap` parser.

pub mod commands;
pub mod registry;

use displaydoc::Display;
use thiserror::Error;

/// The environment variable naming the binary for sub-process dispatch.
pub const BIN_ENV: &str = "SEQCLUST_BIN";

#[derive(Debug, Error, Display)]
#[non_exhaustive]
/// Top-level errors a sub-command can exit with
pub enum CliError {
    /// {0}
    Store(#[from] seqclust_store::StoreError),
    /// {0}
    Seq(#[from] seqclust_seq::SeqError),
    /// {0}
    Kmer(#[from] seqclust_kmer::KmerError),
    /// {0}
    Align(#[from] seqclust_align::AlignError),
    /// I/O error: {0}
    Io(#[from] std::io::Error),
    /// {0}
    Config(String),
    /// sub-process for splits {0} exited with an error
    SplitProcess(String),
}
