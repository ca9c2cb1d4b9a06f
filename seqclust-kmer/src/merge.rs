//! Streaming merge of split run files into the result store.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::path::PathBuf;

use log::info;
use memmap2::Mmap;

use seqclust_store::{StoreReader, StoreWriter};

use crate::errors::KmerError;
use crate::runfile::{RunCursor, RunRecord};
use crate::token::SeqLenType;

struct HeapEntry<L> {
    rep: u32,
    id: u32,
    diag: L,
    score: u16,
    rev: bool,
    file: usize,
}

impl<L: SeqLenType> PartialEq for HeapEntry<L> {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl<L: SeqLenType> Eq for HeapEntry<L> {}

impl<L: SeqLenType> PartialOrd for HeapEntry<L> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl<L: SeqLenType> Ord for HeapEntry<L> {
    /// Reversed so the `BinaryHeap` pops the smallest `(rep, id, diag,
    /// file)` first; the file index keeps equal keys in a fixed order.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.rep, other.id, other.diag, other.file).cmp(&(self.rep, self.id, self.diag, self.file))
    }
}

/// Accumulates one representative's output block and flushes it as a store
/// entry keyed by the representative.
struct BlockWriter<'a> {
    writer: &'a StoreWriter,
    with_rep_header: bool,
    block: String,
    current_rep: Option<u32>,
    reps_written: Vec<u32>,
}

impl<'a> BlockWriter<'a> {
    fn new(writer: &'a StoreWriter, with_rep_header: bool) -> BlockWriter<'a> {
        BlockWriter {
            writer,
            with_rep_header,
            block: String::with_capacity(1 << 16),
            current_rep: None,
            reps_written: Vec::new(),
        }
    }

    fn start_rep(&mut self, rep: u32) -> Result<(), KmerError> {
        if self.current_rep == Some(rep) {
            return Ok(());
        }
        self.flush()?;
        self.current_rep = Some(rep);
        if self.with_rep_header {
            self.block.push_str(&format!("{}\t0\t0\n", rep));
        }
        Ok(())
    }

    fn push_hit(&mut self, target: u32, score: i64, diagonal: i64) {
        self.block.push_str(&format!("{}\t{}\t{}\n", target, score, diagonal));
    }

    fn flush(&mut self) -> Result<(), KmerError> {
        if let Some(rep) = self.current_rep.take() {
            self.writer.write(0, rep, self.block.as_bytes())?;
            self.reps_written.push(rep);
            self.block.clear();
        }
        Ok(())
    }
}

/// Collapses the gathered `(diagonal, score, rev)` entries of one
/// `(rep, target)` pair to its best diagonal: most k-mer hits win, ties go
/// to the first-seen (smallest) diagonal. Returns
/// `(total_score, best_diagonal, best_rev)`.
///
/// Both result paths share this reduction: the heap merge feeds it run-file
/// records, the direct single-split writer one entry per token, so the tie
/// rule cannot diverge between split counts.
pub(crate) fn reduce_pair<L: SeqLenType>(entries: &mut Vec<(L, u32, bool)>) -> (i64, i64, bool) {
    entries.sort_unstable_by_key(|&(diag, _, _)| diag);
    let mut total = 0i64;
    let mut best_sum = 0u32;
    let mut best_diag = entries[0].0;
    let mut best_rev = entries[0].2;

    let mut i = 0;
    while i < entries.len() {
        let diag = entries[i].0;
        let mut sum = 0u32;
        let mut fwd = 0u32;
        let mut rev = 0u32;
        while i < entries.len() && entries[i].0 == diag {
            sum += entries[i].1;
            if entries[i].2 { rev += 1 } else { fwd += 1 }
            i += 1;
        }
        total += sum as i64;
        if sum > best_sum {
            best_sum = sum;
            best_diag = diag;
            best_rev = rev > fwd;
        }
    }
    (total, best_diag.to_i64(), best_rev)
}

/// Merges sorted run files entry-by-entry through a min-heap keyed
/// `(representative, target)`, applying the best-diagonal reduction per
/// pair, and writes one packed block per representative.
///
/// With `with_rep_header`, every block starts with the representative's
/// self record; the returned list holds every representative written, for
/// the backfill pass.
pub fn merge_run_files<L: SeqLenType>(
    paths: &[PathBuf],
    writer: &StoreWriter,
    with_rep_header: bool,
) -> Result<Vec<u32>, KmerError> {
    info!("Merging {} split files", paths.len());
    let mut maps = Vec::with_capacity(paths.len());
    for path in paths {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            maps.push(None);
            continue;
        }
        // Safety: run files are private to this job and complete (`.done`).
        let map = unsafe { Mmap::map(&file)? };
        #[cfg(unix)]
        map.advise(memmap2::Advice::Sequential)?;
        maps.push(Some(map));
    }

    let mut cursors: Vec<RunCursor<'_, L>> = maps
        .iter()
        .map(|m| RunCursor::new(m.as_ref().map(|m| m.as_ref()).unwrap_or(&[])))
        .collect();

    let mut heap: BinaryHeap<HeapEntry<L>> = BinaryHeap::new();
    for (file, cursor) in cursors.iter_mut().enumerate() {
        if let Some((rep, rec)) = cursor.next() {
            heap.push(entry(rep, rec, file));
        }
    }

    let mut out = BlockWriter::new(writer, with_rep_header);
    let mut pair: Vec<(L, u32, bool)> = Vec::new();
    while let Some(top) = heap.pop() {
        if let Some((rep, rec)) = cursors[top.file].next() {
            heap.push(entry(rep, rec, top.file));
        }

        let (rep, id) = (top.rep, top.id);
        pair.clear();
        pair.push((top.diag, top.score as u32, top.rev));
        while let Some(next) = heap.peek() {
            if next.rep != rep || next.id != id {
                break;
            }
            let next = heap.pop().unwrap();
            if let Some((r, rec)) = cursors[next.file].next() {
                heap.push(entry(r, rec, next.file));
            }
            pair.push((next.diag, next.score as u32, next.rev));
        }

        out.start_rep(rep)?;
        if with_rep_header && id == rep {
            // in clustering mode the self record is covered by the header
            continue;
        }
        let (total, best_diag, best_rev) = reduce_pair(&mut pair);
        let signed = if best_rev { -total } else { total };
        out.push_hit(id, signed, best_diag);
    }
    out.flush()?;
    Ok(out.reps_written)
}

fn entry<L: SeqLenType>(rep: u32, rec: RunRecord<L>, file: usize) -> HeapEntry<L> {
    HeapEntry { rep, id: rec.seq_id, diag: rec.diag, score: rec.score, rev: rec.rev, file }
}

/// Emits a singleton self record for every input id that never became a
/// representative, so downstream clustering sees complete coverage.
pub fn backfill_missing(
    reader: &StoreReader,
    writer: &StoreWriter,
    reps_written: &[u32],
) -> Result<usize, KmerError> {
    let max_key = reader.last_key().unwrap_or(0) as usize;
    let mut used = vec![false; max_key + 1];
    for &rep in reps_written {
        used[rep as usize] = true;
    }
    let mut added = 0usize;
    for id in 0..reader.size() {
        let key = reader.key(id);
        if !used[key as usize] {
            writer.write(0, key, format!("{}\t0\t0\n", key).as_bytes())?;
            added += 1;
        }
    }
    Ok(added)
}
