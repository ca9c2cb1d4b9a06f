//! A rewindable k-mer cursor over one encoded sequence.

use crate::alphabet::{Alphabet, SeqKind};
use crate::errors::SeqError;
use crate::profile::ProfileData;
use crate::spaced::SpacedPattern;

/// Cursor over one sequence that yields successive k-mers under a spaced
/// pattern.
///
/// The view owns its buffers and is re-`map`ped for every sequence, so a
/// worker thread allocates once per job rather than once per sequence.
///
/// # Example
/// ```rust
/// use seqclust_seq::{Alphabet, SeqKind, SequenceView, SpacedPattern};
///
/// let pattern = SpacedPattern::new(3, false).unwrap();
/// let mut view = SequenceView::new(64, SeqKind::Amino, pattern);
/// view.map(0, 42, b"MKTAYIA", &Alphabet::amino()).unwrap();
///
/// let mut kmers = 0;
/// while view.has_next_kmer() {
///     let (window, pos) = view.next_kmer();
///     assert_eq!(window.len(), 3);
///     assert_eq!(pos, kmers);
///     kmers += 1;
/// }
/// assert_eq!(kmers, 5);
///
/// view.reset();
/// assert!(view.has_next_kmer());
/// ```
pub struct SequenceView {
    id: usize,
    key: u32,
    kind: SeqKind,
    codes: Vec<u8>,
    lowercase: Vec<bool>,
    window: Vec<u8>,
    pattern: SpacedPattern,
    cur: isize,
    max_len: usize,
    profile: Option<ProfileData>,
}

impl SequenceView {
    pub fn new(max_len: usize, kind: SeqKind, pattern: SpacedPattern) -> SequenceView {
        let window = vec![0u8; pattern.weight()];
        SequenceView {
            id: 0,
            key: 0,
            kind,
            codes: Vec::with_capacity(max_len),
            lowercase: Vec::with_capacity(max_len),
            window,
            pattern,
            cur: -1,
            max_len,
            profile: None,
        }
    }

    /// Points the cursor at a new sequence.
    ///
    /// For plain sequences `payload` holds residue characters; for profiles
    /// it holds the serialized per-position rows and the consensus residues
    /// become the iterated codes.
    pub fn map(
        &mut self,
        id: usize,
        key: u32,
        payload: &[u8],
        alphabet: &Alphabet,
    ) -> Result<(), SeqError> {
        self.id = id;
        self.key = key;
        self.codes.clear();
        self.lowercase.clear();
        self.profile = None;
        match self.kind {
            SeqKind::Profile => {
                let profile = ProfileData::parse(payload)?;
                self.codes.extend_from_slice(profile.consensus());
                self.lowercase.resize(self.codes.len(), false);
                self.profile = Some(profile);
            }
            SeqKind::Amino | SeqKind::Nucleotide => {
                for &residue in payload {
                    self.codes.push(alphabet.encode_residue(residue));
                    self.lowercase.push(residue.is_ascii_lowercase());
                }
            }
        }
        if self.codes.len() > self.max_len {
            return Err(SeqError::SequenceTooLong { length: self.codes.len(), max: self.max_len });
        }
        self.cur = -1;
        Ok(())
    }

    pub fn id(&self) -> usize { self.id }

    pub fn key(&self) -> u32 { self.key }

    pub fn kind(&self) -> SeqKind { self.kind }

    /// Residue count of the mapped sequence.
    pub fn len(&self) -> usize { self.codes.len() }

    pub fn is_empty(&self) -> bool { self.codes.is_empty() }

    /// Encoded residues of the mapped sequence.
    pub fn codes(&self) -> &[u8] { &self.codes }

    /// Mutable access for the masking passes, which overwrite residues with
    /// the unknown code before extraction.
    pub fn codes_mut(&mut self) -> &mut [u8] { &mut self.codes }

    /// Which residues were lowercase in the source text.
    pub fn lowercase(&self) -> &[bool] { &self.lowercase }

    /// Mutable codes together with the lowercase flags, for the lowercase
    /// masking pass.
    pub fn codes_and_lowercase_mut(&mut self) -> (&mut [u8], &[bool]) {
        (&mut self.codes, &self.lowercase)
    }

    /// Per-position profile rows, present only for profile sequences.
    pub fn profile(&self) -> Option<&ProfileData> { self.profile.as_ref() }

    /// Effective k-mer size of the pattern.
    pub fn kmer_size(&self) -> usize { self.pattern.weight() }

    pub fn pattern(&self) -> &SpacedPattern { &self.pattern }

    /// True while another full window fits the sequence.
    #[inline(always)]
    pub fn has_next_kmer(&self) -> bool {
        (self.cur + 1) as usize + self.pattern.span() <= self.codes.len()
    }

    /// Advances the cursor and fills the window from the pattern's
    /// 1-positions; returns the window and its start position.
    #[inline(always)]
    pub fn next_kmer(&mut self) -> (&[u8], usize) {
        debug_assert!(self.has_next_kmer());
        self.cur += 1;
        let start = self.cur as usize;
        for (w, &offset) in self.window.iter_mut().zip(self.pattern.positions()) {
            *w = self.codes[start + offset];
        }
        (&self.window, start)
    }

    /// Window start position of the k-mer most recently returned.
    #[inline(always)]
    pub fn current_position(&self) -> usize {
        debug_assert!(self.cur >= 0);
        self.cur as usize
    }

    /// Rewinds the cursor to the start of the sequence.
    pub fn reset(&mut self) { self.cur = -1; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaced_window_skips_zero_positions() {
        // pattern 1 1 0 1: weight 3, span 4
        let pattern = SpacedPattern::from_mask(&[1, 1, 0, 1]);
        let mut view = SequenceView::new(32, SeqKind::Amino, pattern);
        view.map(0, 0, b"ARNDC", &Alphabet::amino()).unwrap();

        assert!(view.has_next_kmer());
        // A R _ D
        assert_eq!(view.next_kmer(), ([0u8, 1, 3].as_slice(), 0));
        assert_eq!(view.current_position(), 0);
        // R N _ C
        assert_eq!(view.next_kmer(), ([1u8, 2, 4].as_slice(), 1));
        assert!(!view.has_next_kmer());
    }

    #[test]
    fn lowercase_positions_are_tracked() {
        let pattern = SpacedPattern::new(2, false).unwrap();
        let mut view = SequenceView::new(32, SeqKind::Amino, pattern);
        view.map(0, 0, b"AkrD", &Alphabet::amino()).unwrap();
        assert_eq!(view.lowercase(), &[false, true, true, false]);
        // case does not change the code
        assert_eq!(view.codes()[1], Alphabet::amino().encode_residue(b'K'));
    }
}
