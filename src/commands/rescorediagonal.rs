use std::path::PathBuf;

use clap::Parser;
use log::debug;
use rayon::prelude::*;

use seqclust_align::{Alignment, BandedKmerAligner, EvalueComputation};
use seqclust_kmer::CovMode;
use seqclust_seq::scoring::SubstitutionMatrix;
use seqclust_store::{OpenMode, SortMode, StoreKind, StoreReader, StoreWriter};

use crate::commands::common::{build_pool, parse_args, resolve_threads};
use crate::CliError;

#[derive(Parser, Debug)]
#[clap(name = "rescorediagonal")]
#[clap(about = "Verify prefilter hits with an ungapped rescore and banded gapped extension", long_about = None)]
struct Args {
    /// query sequence database
    query_db: PathBuf,
    /// target sequence database
    target_db: PathBuf,
    /// prefilter result database to verify
    result_db: PathBuf,
    /// output alignment database
    out_db: PathBuf,
    /// gap open penalty (default 11 amino acid / 5 nucleotide)
    #[clap(long = "gap-open", value_name = "INT")]
    gap_open: Option<i32>,
    /// gap extension penalty (default 1 amino acid / 2 nucleotide)
    #[clap(long = "gap-extend", value_name = "INT")]
    gap_extend: Option<i32>,
    /// keep alignments up to this E-value
    #[clap(short = 'e', default_value_t = 1e-3, value_name = "FLOAT")]
    evalue: f64,
    /// coverage mode: 0 query, 1 target, 2 both, 3 length ratio
    #[clap(long = "cov-mode", default_value_t = 0, value_name = "INT")]
    cov_mode: u8,
    /// coverage an accepted alignment must reach
    #[clap(short = 'c', default_value_t = 0.0, value_name = "FLOAT")]
    cov_thr: f32,
    /// fold the doubled query into the target to score circular matches
    #[clap(long = "wrapped-scoring", action)]
    wrapped_scoring: bool,
    /// worker threads (0: all cores)
    #[clap(long = "threads", default_value_t = 0, value_name = "INT")]
    threads: usize,
    /// compress result entries (0: no, 1: yes)
    #[clap(long = "compressed", default_value_t = 0, value_name = "INT")]
    compressed: u8,
}

fn coverage_ok(mode: CovMode, thr: f32, aln: &Alignment) -> bool {
    if thr <= 0.0 {
        return true;
    }
    match mode {
        CovMode::Query => aln.q_cov >= thr,
        CovMode::Target => aln.t_cov >= thr,
        CovMode::Bidirectional => aln.q_cov >= thr && aln.t_cov >= thr,
        CovMode::LengthRatio => aln.q_cov.min(aln.t_cov) >= thr,
    }
}

pub fn run(args: &[String]) -> Result<(), CliError> {
    let parsed: Args = parse_args("rescorediagonal", args);
    let cov_mode = CovMode::from_code(parsed.cov_mode)
        .ok_or_else(|| CliError::Config(format!("unknown --cov-mode {}", parsed.cov_mode)))?;
    let threads = resolve_threads(parsed.threads);

    let query = StoreReader::open(&parsed.query_db, OpenMode::DataAndIndex, SortMode::NoSort)?;
    let target = StoreReader::open(&parsed.target_db, OpenMode::DataAndIndex, SortMode::NoSort)?;
    let hits = StoreReader::open(&parsed.result_db, OpenMode::DataAndIndex, SortMode::NoSort)?;

    let nucleotide = query.kind() == StoreKind::Nucleotide;
    if parsed.wrapped_scoring && !nucleotide {
        return Err(CliError::Config("--wrapped-scoring needs a nucleotide database".to_string()));
    }
    let matrix = SubstitutionMatrix::for_nucleotide(nucleotide);
    let alphabet = matrix.alphabet();
    let gap_open = parsed.gap_open.unwrap_or(if nucleotide { 5 } else { 11 });
    let gap_extend = parsed.gap_extend.unwrap_or(if nucleotide { 2 } else { 1 });
    let evaluer = EvalueComputation::new(*matrix.gumbel(), target.residue_count() as u64);

    let writer = StoreWriter::create(&parsed.out_db, threads, parsed.compressed != 0, StoreKind::AlignmentRes)?;

    let size = hits.size();
    let chunk = size.div_ceil(threads.max(1)).max(1);
    let ranges: Vec<(usize, usize)> = (0..threads.max(1))
        .map(|t| (t * chunk, ((t + 1) * chunk).min(size)))
        .filter(|(s, e)| s < e)
        .collect();

    let pool = build_pool(threads)?;
    pool.install(|| {
        ranges.into_par_iter().enumerate().try_for_each(|(thread_idx, (start, end))| {
            let mut aligner = BandedKmerAligner::new(matrix, evaluer, gap_open, gap_extend);
            let mut block = String::with_capacity(1 << 14);
            let mut query_codes: Vec<u8> = Vec::new();
            for id in start..end {
                let key = hits.key(id);
                let query_data = query.data_by_key(key)?;
                query_codes.clear();
                query_codes.extend(query_data.iter().map(|&r| alphabet.encode_residue(r)));
                drop(query_data);
                let query_len = query_codes.len();
                if parsed.wrapped_scoring {
                    query_codes.extend_from_within(..query_len);
                }
                aligner.init_query(&query_codes);

                block.clear();
                let entry = hits.data(id)?;
                for line in std::str::from_utf8(entry.as_ref()).unwrap_or("").lines() {
                    let mut cols = line.split('\t');
                    let (Some(target_key), Some(score), Some(diagonal)) =
                        (cols.next(), cols.next(), cols.next())
                    else {
                        continue;
                    };
                    let (Ok(target_key), Ok(score), Ok(diagonal)) = (
                        target_key.parse::<u32>(),
                        score.parse::<i64>(),
                        diagonal.parse::<i64>(),
                    ) else {
                        continue;
                    };

                    let target_data = target.data_by_key(target_key)?;
                    let target_codes: Vec<u8> =
                        target_data.iter().map(|&r| alphabet.encode_residue(r)).collect();
                    drop(target_data);

                    let reverse = nucleotide && score < 0;
                    match aligner.align(&target_codes, diagonal as i32, reverse, parsed.wrapped_scoring)
                    {
                        Ok(aln) => {
                            if aln.e_value <= parsed.evalue && coverage_ok(cov_mode, parsed.cov_thr, &aln)
                            {
                                let columns: u32 = aln.cigar.runs().map(|(_, len)| len).sum();
                                let identity = aln.identities as f64 / columns.max(1) as f64;
                                block.push_str(&format!(
                                    "{}\t{}\t{:.3}\t{:.3e}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                                    target_key,
                                    aln.score,
                                    identity,
                                    aln.e_value,
                                    aln.q_start,
                                    aln.q_end,
                                    query_len,
                                    aln.t_start,
                                    aln.t_end,
                                    target_codes.len(),
                                    aln.cigar,
                                ));
                            }
                        }
                        Err(err) => {
                            // a candidate that does not align is skipped, not fatal
                            debug!("skipping {} vs {}: {}", key, target_key, err);
                        }
                    }
                }
                writer.write(thread_idx, key, block.as_bytes())?;
            }
            Ok::<(), CliError>(())
        })
    })?;

    writer.close()?;
    Ok(())
}
