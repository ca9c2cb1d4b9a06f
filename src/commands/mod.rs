//! One module per sub-command; each owns its `clap` parser and translates
//! flags into the library parameter structs.

mod common;
pub mod countkmer;
pub mod createlinindex;
pub mod createsubdb;
pub mod kmermatcher;
pub mod kmersearch;
pub mod rescorediagonal;
