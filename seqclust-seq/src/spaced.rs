//! Fixed spaced seed patterns.
//!
//! A pattern is a `{0,1}` mask over a window; the positions marked 1 form
//! the k-mer, the 0 positions are skipped. The spaced variants below were
//! tuned on benchmark ROC curves and are kept verbatim per k-mer size.

use crate::errors::SeqError;

const SPACED_4: &[u8] = &[1, 1, 1, 0, 1];
const SPACED_5: &[u8] = &[1, 1, 0, 0, 1, 0, 0, 0, 0, 1, 0, 1];
const SPACED_6: &[u8] = &[1, 1, 0, 1, 0, 1, 0, 0, 1, 1];
const SPACED_7: &[u8] = &[1, 1, 0, 1, 0, 1, 1, 0, 0, 1, 1];
const SPACED_8: &[u8] = &[1, 1, 0, 1, 0, 1, 1, 1, 0, 0, 1, 1];
const SPACED_9: &[u8] = &[1, 1, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 1];
const SPACED_10: &[u8] = &[1, 1, 0, 1, 0, 1, 1, 0, 1, 0, 1, 1, 0, 1, 1];
const SPACED_11: &[u8] = &[1, 1, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 1, 0, 1, 1];
const SPACED_12: &[u8] = &[1, 1, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 1, 0, 1, 0, 1, 1];
const SPACED_13: &[u8] = &[1, 1, 0, 1, 0, 1, 1, 1, 0, 0, 1, 1, 0, 1, 1, 0, 1, 0, 1, 1];
const SPACED_14: &[u8] = &[1, 1, 0, 1, 0, 1, 1, 1, 0, 0, 1, 1, 0, 1, 1, 0, 1, 1, 0, 1, 1];
const SPACED_15: &[u8] = &[1, 1, 1, 0, 1, 0, 1, 1, 1, 1, 0, 1, 1, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1];
const SPACED_16: &[u8] = &[1, 1, 1, 0, 1, 1, 1, 0, 0, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 1, 1, 1];
const SPACED_17: &[u8] = &[1, 1, 1, 0, 1, 1, 1, 0, 0, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1];
const SPACED_18: &[u8] = &[1, 1, 1, 0, 1, 0, 0, 1, 1, 1, 0, 1, 1, 0, 0, 1, 0, 1, 0, 0, 1, 1, 1, 0, 1, 1, 1, 1];
const SPACED_19: &[u8] = &[1, 1, 1, 0, 1, 0, 0, 1, 1, 1, 0, 1, 1, 0, 0, 1, 0, 1, 0, 0, 1, 1, 1, 0, 1, 1, 1, 1, 1];
const SPACED_20: &[u8] = &[1, 1, 1, 0, 1, 0, 1, 1, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 1, 0, 1, 0, 1, 1, 1, 1, 1];
const SPACED_21: &[u8] = &[1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 1, 1, 1];
const SPACED_22: &[u8] = &[1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 1, 1, 1, 1];
const SPACED_23: &[u8] = &[1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 1, 1, 1];
const SPACED_24: &[u8] = &[1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1];
const SPACED_25: &[u8] = &[1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1];
const SPACED_26: &[u8] = &[1, 1, 1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 1, 1, 1];
const SPACED_27: &[u8] = &[1, 1, 1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1];
const SPACED_28: &[u8] = &[1, 1, 1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1, 1];
const SPACED_29: &[u8] = &[1, 1, 1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1];
const SPACED_30: &[u8] = &[1, 1, 1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1, 0, 1, 1, 1];

fn spaced_mask(k: usize) -> Option<&'static [u8]> {
    match k {
        4 => Some(SPACED_4),
        5 => Some(SPACED_5),
        6 => Some(SPACED_6),
        7 => Some(SPACED_7),
        8 => Some(SPACED_8),
        9 => Some(SPACED_9),
        10 => Some(SPACED_10),
        11 => Some(SPACED_11),
        12 => Some(SPACED_12),
        13 => Some(SPACED_13),
        14 => Some(SPACED_14),
        15 => Some(SPACED_15),
        16 => Some(SPACED_16),
        17 => Some(SPACED_17),
        18 => Some(SPACED_18),
        19 => Some(SPACED_19),
        20 => Some(SPACED_20),
        21 => Some(SPACED_21),
        22 => Some(SPACED_22),
        23 => Some(SPACED_23),
        24 => Some(SPACED_24),
        25 => Some(SPACED_25),
        26 => Some(SPACED_26),
        27 => Some(SPACED_27),
        28 => Some(SPACED_28),
        29 => Some(SPACED_29),
        30 => Some(SPACED_30),
        _ => None,
    }
}

/// A resolved seed pattern: the effective k-mer size, the window span and
/// the offsets of the contributing positions.
///
/// # Example
/// ```rust
/// use seqclust_seq::SpacedPattern;
///
/// let plain = SpacedPattern::new(10, false).unwrap();
/// assert_eq!(plain.weight(), 10);
/// assert_eq!(plain.span(), 10);
///
/// let spaced = SpacedPattern::new(10, true).unwrap();
/// assert_eq!(spaced.weight(), 10);
/// assert_eq!(spaced.span(), 15);
/// assert_eq!(spaced.positions()[0], 0);
/// ```
#[derive(Debug, Clone)]
pub struct SpacedPattern {
    positions: Vec<usize>,
    span: usize,
}

impl SpacedPattern {
    /// Resolves the pattern for an effective k-mer size; `spaced` selects
    /// the tuned spaced mask, otherwise the contiguous one.
    pub fn new(k: usize, spaced: bool) -> Result<SpacedPattern, SeqError> {
        if spaced {
            let mask = spaced_mask(k).ok_or(SeqError::NoPatternForKmerSize { k })?;
            Ok(SpacedPattern::from_mask(mask))
        } else {
            if k == 0 || k > 32 {
                return Err(SeqError::NoPatternForKmerSize { k });
            }
            Ok(SpacedPattern { positions: (0..k).collect(), span: k })
        }
    }

    /// Builds a pattern from an explicit `{0,1}` mask.
    pub fn from_mask(mask: &[u8]) -> SpacedPattern {
        let positions = mask
            .iter()
            .enumerate()
            .filter(|(_, &bit)| bit != 0)
            .map(|(pos, _)| pos)
            .collect();
        SpacedPattern { positions, span: mask.len() }
    }

    /// Effective k-mer size: the number of contributing positions.
    pub fn weight(&self) -> usize { self.positions.len() }

    /// Window length the pattern covers on the sequence.
    pub fn span(&self) -> usize { self.span }

    /// Offsets of the contributing positions within the window.
    pub fn positions(&self) -> &[usize] { &self.positions }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_spaced_mask_has_the_right_weight() {
        for k in 4..=30 {
            let pattern = SpacedPattern::new(k, true).unwrap();
            assert_eq!(pattern.weight(), k, "weight of spaced mask for k={}", k);
            assert!(pattern.span() >= k);
        }
    }

    #[test]
    fn unsupported_sizes_are_reported() {
        assert!(SpacedPattern::new(3, true).is_err());
        assert!(SpacedPattern::new(31, true).is_err());
        assert!(SpacedPattern::new(33, false).is_err());
    }
}
