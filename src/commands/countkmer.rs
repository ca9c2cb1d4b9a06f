use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;

use seqclust_kmer::count::{count_kmers, write_count_table};
use seqclust_store::{OpenMode, SortMode, StoreKind, StoreReader};

use crate::commands::common::{build_pool, parse_args, resolve_threads};
use crate::CliError;

#[derive(Parser, Debug)]
#[clap(name = "countkmer")]
#[clap(about = "Count k-mer occurrences over a whole database", long_about = None)]
struct Args {
    /// input sequence database
    seq_db: PathBuf,
    /// k-mer length
    #[clap(short = 'k', default_value_t = 5, value_name = "INT")]
    kmer_size: usize,
    /// use a spaced k-mer pattern (0: consecutive, 1: spaced)
    #[clap(long = "spaced-kmer-mode", default_value_t = 0, value_name = "INT")]
    spaced_kmer_mode: u8,
    /// worker threads (0: all cores)
    #[clap(long = "threads", default_value_t = 0, value_name = "INT")]
    threads: usize,
}

pub fn run(args: &[String]) -> Result<(), CliError> {
    let parsed: Args = parse_args("countkmer", args);
    let threads = resolve_threads(parsed.threads);
    let reader = StoreReader::open(&parsed.seq_db, OpenMode::DataAndIndex, SortMode::NoSort)?;
    let nucleotide = reader.kind() == StoreKind::Nucleotide;

    let pool = build_pool(threads)?;
    let counts = pool.install(|| {
        count_kmers(&reader, parsed.kmer_size, parsed.spaced_kmer_mode != 0, threads)
    })?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_count_table(&mut out, &counts, parsed.kmer_size, nucleotide)?;
    out.flush()?;
    Ok(())
}
