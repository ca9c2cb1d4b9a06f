use std::path::PathBuf;
use std::process::Command;

use clap::Parser;
use log::info;

use seqclust_kmer::{plan_splits, run_kmer_matcher};

use crate::commands::common::{build_pool, parse_args, KmerArgs};
use crate::{CliError, BIN_ENV};

#[derive(Parser, Debug)]
#[clap(name = "kmermatcher")]
#[clap(about = "Find bottom-m-hashed k-mer matches within a sequence database", long_about = None)]
struct Args {
    /// input sequence database
    seq_db: PathBuf,
    /// output prefilter result database
    result_db: PathBuf,
    #[clap(flatten)]
    kmer: KmerArgs,
    /// compute only the splits [FROM:TO) and exit before the merge
    #[clap(long = "split-range", value_name = "FROM:TO")]
    split_range: Option<String>,
    /// distribute the splits over N sub-processes, then merge
    #[clap(long = "process-parallel", default_value_t = 1, value_name = "INT")]
    process_parallel: usize,
}

fn parse_range(range: &str) -> Result<(usize, usize), CliError> {
    let (from, to) = range
        .split_once(':')
        .ok_or_else(|| CliError::Config(format!("--split-range wants FROM:TO, got {}", range)))?;
    let from = from.parse().map_err(|_| CliError::Config(format!("bad split range {}", range)))?;
    let to = to.parse().map_err(|_| CliError::Config(format!("bad split range {}", range)))?;
    if from >= to {
        return Err(CliError::Config(format!("empty split range {}", range)));
    }
    Ok((from, to))
}

pub fn run(args: &[String]) -> Result<(), CliError> {
    let parsed: Args = parse_args("kmermatcher", args);
    let params = parsed.kmer.to_params()?;
    let split_range = parsed.split_range.as_deref().map(parse_range).transpose()?;

    if parsed.process_parallel > 1 && split_range.is_none() {
        run_process_parallel(&parsed, args)?;
        // the children left `.done` run files behind; this pass merges them
        let pool = build_pool(params.threads)?;
        return Ok(pool.install(|| run_kmer_matcher(&parsed.seq_db, &parsed.result_db, &params, None))?);
    }

    let pool = build_pool(params.threads)?;
    Ok(pool.install(|| run_kmer_matcher(&parsed.seq_db, &parsed.result_db, &params, split_range))?)
}

/// Fans split ranges out to sub-processes of this binary and waits for all
/// of them before the caller merges.
fn run_process_parallel(parsed: &Args, raw_args: &[String]) -> Result<(), CliError> {
    let params = parsed.kmer.to_params()?;
    let splits = plan_splits(&parsed.seq_db, &params)?;
    let procs = parsed.process_parallel.min(splits);
    let binary = std::env::var(BIN_ENV)
        .map(PathBuf::from)
        .or_else(|_| std::env::current_exe())?;
    info!("Distributing {} splits over {} processes", splits, procs);

    let mut children = Vec::with_capacity(procs);
    let per_proc = splits.div_ceil(procs);
    for p in 0..procs {
        let from = p * per_proc;
        let to = ((p + 1) * per_proc).min(splits);
        if from >= to {
            continue;
        }
        let child = Command::new(&binary)
            .arg("kmermatcher")
            .args(raw_args)
            .arg("--split-range")
            .arg(format!("{}:{}", from, to))
            .spawn()?;
        children.push(((from, to), child));
    }
    // barrier: every split range must finish before the merge
    for ((from, to), mut child) in children {
        let status = child.wait()?;
        if !status.success() {
            return Err(CliError::SplitProcess(format!("{}:{}", from, to)));
        }
    }
    Ok(())
}
