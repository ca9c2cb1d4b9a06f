//! Whole-database k-mer occurrence counting.

use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use seqclust_seq::{Alphabet, KmerIndexer, SeqKind, SequenceView, SpacedPattern};
use seqclust_store::StoreReader;

use crate::errors::KmerError;
use crate::matcher::seq_kind_of;

/// A count table larger than this many cells will not fit a sane machine.
const MAX_TABLE_CELLS: u64 = 1 << 34;

/// Counts every k-mer occurrence of the database into a flat table indexed
/// by k-mer index. The table has one cell per possible k-mer, so only small
/// `k` are practical; `fails with`
/// [`KmerError::KmerTableTooLarge`](crate::KmerError::KmerTableTooLarge)
/// otherwise.
pub fn count_kmers(
    reader: &StoreReader,
    k: usize,
    spaced: bool,
    threads: usize,
) -> Result<Vec<u32>, KmerError> {
    let kind = seq_kind_of(reader.kind()).ok_or_else(|| KmerError::NotAnIndex {
        path: reader.db_path().display().to_string(),
    })?;
    let alphabet = match kind {
        SeqKind::Nucleotide => Alphabet::nucleotide(),
        _ => Alphabet::amino(),
    };
    let indexer = KmerIndexer::new(alphabet.size(), k);
    let cells = indexer.table_size();
    if cells > MAX_TABLE_CELLS {
        return Err(KmerError::KmerTableTooLarge { k, alphabet: alphabet.size() });
    }

    let table: Vec<AtomicU32> = (0..cells).map(|_| AtomicU32::new(0)).collect();
    let pattern = SpacedPattern::new(k, spaced)?;
    let max_seq_len = reader.max_seq_len();
    let nucleotide = alphabet.is_nucleotide();

    let size = reader.size();
    let pieces = (threads.max(1) * 4).min(size.max(1));
    let chunk = size.div_ceil(pieces);
    (0..pieces).into_par_iter().try_for_each(|piece| -> Result<(), KmerError> {
        let mut view = SequenceView::new(max_seq_len, kind, pattern.clone());
        let unknown = alphabet.unknown();
        for id in piece * chunk..((piece + 1) * chunk).min(size) {
            let payload = reader.data(id)?;
            view.map(id, reader.key(id), payload.as_ref(), &alphabet)?;
            drop(payload);
            view.reset();
            while view.has_next_kmer() {
                let (window, _) = view.next_kmer();
                if window.contains(&unknown) {
                    continue;
                }
                let idx = if nucleotide {
                    indexer.nucleotide_index(window)
                } else {
                    indexer.index(window)
                };
                table[idx as usize].fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    })?;

    Ok(table.into_iter().map(|c| c.into_inner()).collect())
}

/// Prints the count table as `kmer<TAB>count` lines.
pub fn write_count_table<W: Write>(
    out: &mut W,
    counts: &[u32],
    k: usize,
    nucleotide: bool,
) -> Result<(), KmerError> {
    let alphabet = if nucleotide { Alphabet::nucleotide() } else { Alphabet::amino() };
    let indexer = KmerIndexer::new(alphabet.size(), k);
    for (idx, &count) in counts.iter().enumerate() {
        let codes = if nucleotide {
            indexer.decode_nucleotide(idx as u64)
        } else {
            indexer.decode(idx as u64)
        };
        let text = alphabet.decode(&codes);
        out.write_all(&text)?;
        writeln!(out, "\t{}", count)?;
    }
    Ok(())
}
