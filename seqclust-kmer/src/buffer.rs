//! The shared token buffer worker threads commit batches into.

use std::cell::UnsafeCell;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::errors::KmerError;
use crate::token::{KmerToken, SeqLenType};

/// Worker-local batches stay below this size before being committed.
pub const BATCH_SIZE: usize = 1024;

/// One contiguous token allocation shared by all workers of a split.
///
/// Commit protocol: a worker reserves a range with a relaxed `fetch_add` on
/// the shared offset, copies its batch into the reserved slots and issues a
/// release fence. Ranges never overlap, so the copies are disjoint; the
/// buffer is only read after the parallel fill joins.
pub struct TokenBuffer<L> {
    tokens: UnsafeCell<Box<[KmerToken<L>]>>,
    offset: AtomicUsize,
}

// Safety: disjoint ranges are handed out by fetch_add; reads happen only
// after the fill phase joined (see commit / into_tokens).
unsafe impl<L: Send> Sync for TokenBuffer<L> {}

impl<L: SeqLenType> TokenBuffer<L> {
    /// Allocates `size + 1` tokens pre-set to the sentinel; the fill runs
    /// across the pool so page faults do not serialize on one thread.
    pub fn new(size: usize) -> TokenBuffer<L> {
        let tokens: Vec<KmerToken<L>> =
            (0..size + 1).into_par_iter().map(|_| KmerToken::sentinel()).collect();
        TokenBuffer { tokens: UnsafeCell::new(tokens.into_boxed_slice()), offset: AtomicUsize::new(0) }
    }

    /// Usable capacity (excluding the trailing sentinel slot).
    pub fn capacity(&self) -> usize {
        unsafe { (&*self.tokens.get()).len() - 1 }
    }

    /// Tokens committed so far.
    pub fn len(&self) -> usize { self.offset.load(Ordering::Relaxed) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Commits a worker batch.
    ///
    /// `fails with` [`KmerError::TokenBufferOvercommit`](crate::KmerError::TokenBufferOvercommit)
    /// when the reserved range would leave the allocation; split sizing makes
    /// that unreachable, so it aborts the job as a bug.
    pub fn commit(&self, batch: &[KmerToken<L>]) -> Result<(), KmerError> {
        if batch.is_empty() {
            return Ok(());
        }
        let start = self.offset.fetch_add(batch.len(), Ordering::Relaxed);
        let capacity = self.capacity();
        if start + batch.len() > capacity {
            return Err(KmerError::TokenBufferOvercommit {
                committed: start + batch.len(),
                capacity,
            });
        }
        unsafe {
            let tokens = &mut *self.tokens.get();
            let dst = tokens.as_mut_ptr().add(start);
            std::ptr::copy_nonoverlapping(batch.as_ptr(), dst, batch.len());
        }
        fence(Ordering::Release);
        Ok(())
    }

    /// Takes the filled prefix and the sentinel tail, after all writers
    /// joined.
    pub fn into_tokens(self) -> Vec<KmerToken<L>> {
        let filled = self.len().min(self.capacity());
        let tokens: Vec<KmerToken<L>> = self.tokens.into_inner().into_vec();
        // everything past the committed prefix keeps the sentinel
        debug_assert!(tokens[filled..].iter().all(|t| t.is_sentinel()));
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_commits_never_overlap() {
        let buffer: TokenBuffer<i16> = TokenBuffer::new(4096);
        (0u32..64).into_par_iter().try_for_each(|worker| {
            let batch: Vec<KmerToken<i16>> = (0..64)
                .map(|i| KmerToken { kmer: worker as u64, id: i, pos: 0, seq_len: 1 })
                .collect();
            buffer.commit(&batch)
        })
        .unwrap();

        assert_eq!(buffer.len(), 64 * 64);
        let tokens = buffer.into_tokens();
        let mut per_worker = vec![0usize; 64];
        for token in &tokens[..64 * 64] {
            per_worker[token.kmer as usize] += 1;
        }
        assert!(per_worker.iter().all(|&n| n == 64));
        assert!(tokens[64 * 64].is_sentinel());
    }

    #[test]
    fn overcommit_is_a_hard_error() {
        let buffer: TokenBuffer<i16> = TokenBuffer::new(10);
        let batch = vec![KmerToken::<i16>::sentinel(); 8];
        buffer.commit(&batch).unwrap();
        assert!(matches!(
            buffer.commit(&batch),
            Err(KmerError::TokenBufferOvercommit { .. })
        ));
    }
}
