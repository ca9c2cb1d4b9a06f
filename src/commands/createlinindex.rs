use std::path::PathBuf;

use clap::Parser;

use seqclust_kmer::build_linear_index;

use crate::commands::common::{build_pool, parse_args, KmerArgs};
use crate::CliError;

#[derive(Parser, Debug)]
#[clap(name = "createlinindex")]
#[clap(about = "Extract and sort the k-mers of a database into a linear index", long_about = None)]
struct Args {
    /// input sequence database
    seq_db: PathBuf,
    /// output index database
    index_db: PathBuf,
    #[clap(flatten)]
    kmer: KmerArgs,
}

pub fn run(args: &[String]) -> Result<(), CliError> {
    let parsed: Args = parse_args("createlinindex", args);
    let params = parsed.kmer.to_params()?;
    let pool = build_pool(params.threads)?;
    Ok(pool.install(|| build_linear_index(&parsed.seq_db, &parsed.index_db, &params))?)
}
