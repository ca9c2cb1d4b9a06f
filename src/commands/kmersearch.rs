use std::path::PathBuf;

use clap::Parser;

use seqclust_kmer::run_kmer_search;

use crate::commands::common::{build_pool, parse_args, KmerArgs};
use crate::CliError;

#[derive(Parser, Debug)]
#[clap(name = "kmersearch")]
#[clap(about = "Match a query database against a prebuilt linear k-mer index", long_about = None)]
struct Args {
    /// query sequence database
    query_db: PathBuf,
    /// linear k-mer index built with createlinindex
    index_db: PathBuf,
    /// output prefilter result database
    result_db: PathBuf,
    #[clap(flatten)]
    kmer: KmerArgs,
}

pub fn run(args: &[String]) -> Result<(), CliError> {
    let parsed: Args = parse_args("kmersearch", args);
    let params = parsed.kmer.to_params()?;
    let pool = build_pool(params.threads)?;
    Ok(pool.install(|| run_kmer_search(&parsed.query_db, &parsed.index_db, &parsed.result_db, &params))?)
}
