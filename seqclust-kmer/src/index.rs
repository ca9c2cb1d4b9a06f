//! The on-disk linear k-mer index and the search against it.
//!
//! `createlinindex` extracts and sorts the target database's selected
//! k-mers once; `kmersearch` then streams query k-mers through a merge-join
//! against that sorted list instead of rebuilding target k-mers per query
//! batch.

use std::mem::size_of;
use std::path::{Path, PathBuf};

use log::info;
use rayon::prelude::*;

use seqclust_seq::{PackedKmer, SeqKind};
use seqclust_store::{OpenMode, SortMode, StoreKind, StoreReader, StoreWriter};

use crate::buffer::TokenBuffer;
use crate::errors::KmerError;
use crate::extract::fill_token_buffer;
use crate::matcher::{compute_kmer_count, default_memory_limit, seq_kind_of, split_path, write_sorted_hits};
use crate::merge::merge_run_files;
use crate::params::{KmerConfig, MatchParams};
use crate::runfile::{done_path, write_run_file};
use crate::token::{cmp_kmer_len_id_pos, cmp_rep_id_diag, KmerToken};

/// Store key of the metadata block.
const META_KEY: u32 = 0;
/// Store key of the sorted entry blob.
const ENTRIES_KEY: u32 = 1;

/// Serialized settings of a linear index; a search must run with the same
/// k-mer parameters the index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMeta {
    pub k: u32,
    pub alphabet_size: u32,
    pub spaced: bool,
    pub kind: SeqKind,
    pub max_seq_len: u64,
    pub seq_count: u64,
    pub entry_count: u64,
}

impl IndexMeta {
    const WIDTH: usize = 34;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIDTH);
        out.extend_from_slice(&self.k.to_le_bytes());
        out.extend_from_slice(&self.alphabet_size.to_le_bytes());
        out.push(self.spaced as u8);
        out.push(match self.kind {
            SeqKind::Amino => 0,
            SeqKind::Nucleotide => 1,
            SeqKind::Profile => 2,
        });
        out.extend_from_slice(&self.max_seq_len.to_le_bytes());
        out.extend_from_slice(&self.seq_count.to_le_bytes());
        out.extend_from_slice(&self.entry_count.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8], path: &Path) -> Result<IndexMeta, KmerError> {
        if bytes.len() < Self::WIDTH {
            return Err(KmerError::NotAnIndex { path: path.display().to_string() });
        }
        let kind = match bytes[9] {
            0 => SeqKind::Amino,
            1 => SeqKind::Nucleotide,
            2 => SeqKind::Profile,
            _ => return Err(KmerError::NotAnIndex { path: path.display().to_string() }),
        };
        Ok(IndexMeta {
            k: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            alphabet_size: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            spaced: bytes[8] != 0,
            kind,
            max_seq_len: u64::from_le_bytes(bytes[10..18].try_into().unwrap()),
            seq_count: u64::from_le_bytes(bytes[18..26].try_into().unwrap()),
            entry_count: u64::from_le_bytes(bytes[26..34].try_into().unwrap()),
        })
    }
}

/// One serialized index entry: `kmer:u64, id:u32, pos:i32, seq_len:i32`.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    pub kmer: u64,
    pub id: u32,
    pub pos: i32,
    pub seq_len: i32,
}

impl IndexEntry {
    pub const WIDTH: usize = 20;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.kmer.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.pos.to_le_bytes());
        out.extend_from_slice(&self.seq_len.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> IndexEntry {
        IndexEntry {
            kmer: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            id: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            pos: i32::from_le_bytes(bytes[12..16].try_into().unwrap()),
            seq_len: i32::from_le_bytes(bytes[16..20].try_into().unwrap()),
        }
    }
}

/// Builds the linear k-mer index of `seq_db` into `index_db`.
pub fn build_linear_index(
    seq_db: &Path,
    index_db: &Path,
    params: &MatchParams,
) -> Result<(), KmerError> {
    let reader = StoreReader::open(seq_db, OpenMode::DataAndIndex, SortMode::NoSort)?;
    let kind = seq_kind_of(reader.kind()).ok_or_else(|| KmerError::NotAnIndex {
        path: seq_db.display().to_string(),
    })?;
    let mut params = params.clone();
    params.resolve(reader.residue_count(), kind);
    let config = KmerConfig::new(&params, kind)?;

    let total_kmers = compute_kmer_count(&reader, params.k, params.kmers_per_seq, params.kmers_per_seq_scale)
        * params.pick_n_best.max(1);
    let buffer: TokenBuffer<i32> = TokenBuffer::new(total_kmers);
    let outcome = fill_token_buffer(&reader, &buffer, &config, &params, 1, 0, false)?;
    let filled = outcome.tokens.min(total_kmers);
    let mut tokens = buffer.into_tokens();
    let nucleotide = config.is_nucleotide();
    tokens[..filled].par_sort_unstable_by(|a, b| cmp_kmer_len_id_pos(a, b, nucleotide));

    let mut blob = Vec::with_capacity(filled * IndexEntry::WIDTH);
    for token in &tokens[..filled] {
        IndexEntry { kmer: token.kmer, id: token.id, pos: token.pos, seq_len: token.seq_len }
            .encode_into(&mut blob);
    }
    let meta = IndexMeta {
        k: params.k as u32,
        alphabet_size: params.alphabet_size as u32,
        spaced: params.spaced,
        kind,
        max_seq_len: reader.max_seq_len() as u64,
        seq_count: reader.size() as u64,
        entry_count: filled as u64,
    };

    let writer = StoreWriter::create(index_db, 1, false, StoreKind::LinearIndex)?;
    writer.write(0, META_KEY, &meta.encode())?;
    writer.write(0, ENTRIES_KEY, &blob)?;
    writer.close()?;
    info!("Indexed {} k-mers from {} sequences", filled, reader.size());
    Ok(())
}

/// Loads the metadata of a linear index store.
pub fn read_index_meta(index_db: &Path) -> Result<IndexMeta, KmerError> {
    let reader =
        StoreReader::open_expecting(index_db, OpenMode::DataAndIndex, SortMode::NoSort, StoreKind::LinearIndex)
            .map_err(|_| KmerError::NotAnIndex { path: index_db.display().to_string() })?;
    let meta = reader.data_by_key(META_KEY).map_err(|_| KmerError::NotAnIndex {
        path: index_db.display().to_string(),
    })?;
    IndexMeta::decode(meta.as_ref(), index_db)
}

fn check_setting(field: &'static str, index: u64, requested: u64) -> Result<(), KmerError> {
    if requested != 0 && requested != index {
        return Err(KmerError::IndexConfigMismatch { field, index, requested });
    }
    Ok(())
}

/// Searches the query database against a prebuilt linear index and writes
/// per-target hit lists into `result_db`.
///
/// `fails with` [`KmerError::IndexConfigMismatch`](crate::KmerError::IndexConfigMismatch)
/// when `-k`, `--alph-size` or `--spaced-kmer-mode` contradict the values
/// the index was built with.
pub fn run_kmer_search(
    query_db: &Path,
    index_db: &Path,
    result_db: &Path,
    params: &MatchParams,
) -> Result<(), KmerError> {
    let meta = read_index_meta(index_db)?;
    check_setting("-k", meta.k as u64, params.k as u64)?;
    check_setting("--alph-size", meta.alphabet_size as u64, params.alphabet_size as u64)?;
    if params.spaced != meta.spaced {
        return Err(KmerError::IndexConfigMismatch {
            field: "--spaced-kmer-mode",
            index: meta.spaced as u64,
            requested: params.spaced as u64,
        });
    }

    let query = StoreReader::open(query_db, OpenMode::DataAndIndex, SortMode::NoSort)?;
    let query_kind = seq_kind_of(query.kind()).ok_or_else(|| KmerError::NotAnIndex {
        path: query_db.display().to_string(),
    })?;
    if query_kind != meta.kind && !(query_kind == SeqKind::Profile && meta.kind == SeqKind::Amino) {
        return Err(KmerError::IndexConfigMismatch {
            field: "database type",
            index: meta.kind as u64,
            requested: query_kind as u64,
        });
    }

    let mut params = params.clone();
    params.k = meta.k as usize;
    params.alphabet_size = meta.alphabet_size as usize;
    params.spaced = meta.spaced;
    params.resolve(query.residue_count(), query_kind);
    let config = KmerConfig::new(&params, query_kind)?;
    let nucleotide = config.is_nucleotide();

    let index_store =
        StoreReader::open_expecting(index_db, OpenMode::DataAndIndex, SortMode::NoSort, StoreKind::LinearIndex)?;
    let entries = index_store.data_by_key(ENTRIES_KEY)?;
    let entries = entries.as_ref();

    let total_kmers = compute_kmer_count(&query, params.k, params.kmers_per_seq, params.kmers_per_seq_scale)
        * params.pick_n_best.max(1);
    let total_bytes = (total_kmers * size_of::<KmerToken<i32>>()) as u64;
    let memory_limit = if params.split_memory_limit > 0 {
        params.split_memory_limit
    } else {
        default_memory_limit()
    };
    let mut splits = total_bytes.div_ceil(memory_limit.max(1)).max(1) as usize;
    if splits > 1 {
        splits += 1;
        info!("Process file into {} parts", splits);
    }

    let split_files: Vec<PathBuf> = (0..splits).map(|s| split_path(result_db, s)).collect();
    let mut single_split_tokens: Option<Vec<KmerToken<i32>>> = None;
    for split in 0..splits {
        let run = &split_files[split];
        if splits > 1 && done_path(run).exists() {
            info!("Split {} already done, skipping", split);
            continue;
        }
        let capacity = if splits > 1 {
            (memory_limit as usize / size_of::<KmerToken<i32>>()).max(1)
        } else {
            total_kmers
        };
        let buffer: TokenBuffer<i32> = TokenBuffer::new(capacity);
        let outcome = fill_token_buffer(&query, &buffer, &config, &params, splits, split, false)?;
        let filled = outcome.tokens.min(capacity);
        let mut tokens = buffer.into_tokens();
        tokens[..filled].par_sort_unstable_by(|a, b| cmp_kmer_len_id_pos(a, b, nucleotide));
        tokens.truncate(filled);

        let mut hits = search_in_index(&tokens, entries, nucleotide);
        hits.par_sort_unstable_by(|a, b| cmp_rep_id_diag(a, b, nucleotide));

        if splits == 1 {
            single_split_tokens = Some(hits);
        } else {
            write_run_file(run, &hits, nucleotide)?;
        }
    }

    let out_kind = if nucleotide { StoreKind::PrefilterRevRes } else { StoreKind::PrefilterRes };
    let writer = StoreWriter::create(result_db, 1, params.compressed, out_kind)?;
    match single_split_tokens {
        Some(hits) => {
            write_sorted_hits(&hits, &writer, nucleotide, 1, false)?;
        }
        None => {
            merge_run_files::<i32>(&split_files, &writer, false)?;
        }
    }
    writer.close()?;
    if splits > 1 {
        for run in &split_files {
            let _ = std::fs::remove_file(run);
            let _ = std::fs::remove_file(done_path(run));
        }
    }
    Ok(())
}

/// Merge-join of sorted query tokens against the sorted index entries.
///
/// Produces one hit token per `(query k-mer, index entry)` pair of equal
/// canonical k-mers: the index sequence becomes the result key, the query
/// id the hit, the diagonal `index_pos - query_pos` after strand
/// resolution.
fn search_in_index(
    query_tokens: &[KmerToken<i32>],
    entries: &[u8],
    nucleotide: bool,
) -> Vec<KmerToken<i32>> {
    let blind = |kmer: u64| if nucleotide { PackedKmer::strand_blind(kmer) } else { kmer };
    let entry_at = |i: usize| IndexEntry::decode(&entries[i * IndexEntry::WIDTH..]);
    let entry_count = entries.len() / IndexEntry::WIDTH;

    let mut hits: Vec<KmerToken<i32>> = Vec::new();
    let mut qi = 0usize;
    let mut ti = 0usize;
    while qi < query_tokens.len() && ti < entry_count {
        if query_tokens[qi].is_sentinel() {
            break;
        }
        let qk = blind(query_tokens[qi].kmer);
        let tk = blind(entry_at(ti).kmer);
        if qk < tk {
            qi += 1;
        } else if tk < qk {
            ti += 1;
        } else {
            // bounds of the equal runs on both sides
            let q_end = {
                let mut end = qi + 1;
                while end < query_tokens.len() && blind(query_tokens[end].kmer) == qk {
                    end += 1;
                }
                end
            };
            let t_end = {
                let mut end = ti + 1;
                while end < entry_count && blind(entry_at(end).kmer) == tk {
                    end += 1;
                }
                end
            };
            for q in qi..q_end {
                let qtoken = query_tokens[q];
                for t in ti..t_end {
                    let entry = entry_at(t);
                    hits.push(join_pair(&qtoken, &entry, nucleotide));
                }
            }
            qi = q_end;
            ti = t_end;
        }
    }
    hits
}

/// Builds one hit token from a query token and a matching index entry.
fn join_pair(qtoken: &KmerToken<i32>, entry: &IndexEntry, nucleotide: bool) -> KmerToken<i32> {
    if nucleotide {
        let rep_rev = !PackedKmer::unpack(entry.kmer).forward;
        let tgt_rev = !PackedKmer::unpack(qtoken.kmer).forward;
        let rep_len = entry.seq_len as i64;
        let tgt_len = qtoken.seq_len as i64;
        let rep_pos = entry.pos as i64;
        let tgt_pos = qtoken.pos as i64;
        let (query_pos, target_pos, query_flip) = match (rep_rev, tgt_rev) {
            (true, false) => (rep_pos, tgt_pos, true),
            (true, true) => ((rep_len - 1) - rep_pos, (tgt_len - 1) - tgt_pos, false),
            (false, true) => ((rep_len - 1) - rep_pos, (tgt_len - 1) - tgt_pos, true),
            (false, false) => (rep_pos, tgt_pos, false),
        };
        KmerToken {
            kmer: PackedKmer { index: entry.id as u64, forward: !query_flip }.pack(),
            id: qtoken.id,
            pos: (query_pos - target_pos) as i32,
            seq_len: qtoken.seq_len,
        }
    } else {
        KmerToken {
            kmer: entry.id as u64,
            id: qtoken.id,
            pos: entry.pos - qtoken.pos,
            seq_len: qtoken.seq_len,
        }
    }
}
