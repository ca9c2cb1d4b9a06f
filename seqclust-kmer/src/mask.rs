//! Low-complexity masking before k-mer extraction.
//!
//! A small repeat HMM in the tantan mould: one background state plus one
//! repeat state per period up to [`MAX_PERIOD`], where the repeat state of
//! period `p` emits residues matching the residue `p` positions back.
//! Posterior repeat probabilities come from a scaled forward-backward pass;
//! positions above the mask threshold are overwritten with the unknown code.

/// Longest tandem period the model tracks.
pub const MAX_PERIOD: usize = 50;
/// Prior probability of entering a repeat.
const REPEAT_PROB: f64 = 0.005;
/// Probability of leaving a repeat per position.
const REPEAT_END_PROB: f64 = 0.05;
/// Geometric decay of the period prior.
const PERIOD_DECAY: f64 = 0.9;
/// Posterior above which a position is masked.
const MIN_MASK_PROB: f64 = 0.9;

/// Emission likelihood ratio of a repeat state against background.
#[inline(always)]
fn emission_ratio(a: u8, b: u8) -> f64 {
    if a == b { 4.0 } else { 0.25 }
}

/// The forward matrix is O(len * periods); longer sequences are masked in
/// windows of this size.
const MASK_WINDOW: usize = 1 << 16;

/// Masks tandem repeats in `codes`, overwriting them with `unknown`.
/// Returns the number of masked positions.
pub fn mask_tandem_repeats(codes: &mut [u8], unknown: u8) -> usize {
    let mut masked = 0;
    for chunk in codes.chunks_mut(MASK_WINDOW) {
        masked += mask_window(chunk, unknown);
    }
    masked
}

fn mask_window(codes: &mut [u8], unknown: u8) -> usize {
    let n = codes.len();
    if n < 2 {
        return 0;
    }
    let periods = MAX_PERIOD.min(n - 1);

    // period prior, geometric with normalization
    let mut prior = vec![0.0f64; periods + 1];
    let mut norm = 0.0;
    for (p, prior_p) in prior.iter_mut().enumerate().skip(1) {
        *prior_p = PERIOD_DECAY.powi(p as i32 - 1);
        norm += *prior_p;
    }
    for p in prior.iter_mut().skip(1) {
        *p /= norm;
    }

    // forward pass, scaled per position; state 0 is background
    let mut fwd = vec![vec![0.0f64; periods + 1]; n + 1];
    let mut scale = vec![1.0f64; n + 1];
    fwd[0][0] = 1.0;
    for i in 1..=n {
        let pos = i - 1;
        let stay_bg = 1.0 - REPEAT_PROB;
        let mut total = 0.0;
        // background emits at ratio 1
        let bg_in: f64 = fwd[i - 1][0] * stay_bg
            + (1..=periods).map(|p| fwd[i - 1][p] * REPEAT_END_PROB).sum::<f64>();
        fwd[i][0] = bg_in;
        total += bg_in;
        for p in 1..=periods {
            if pos < p {
                fwd[i][p] = 0.0;
                continue;
            }
            let emit = emission_ratio(codes[pos], codes[pos - p]);
            let stay = fwd[i - 1][p] * (1.0 - REPEAT_END_PROB);
            let enter = fwd[i - 1][0] * REPEAT_PROB * prior[p];
            fwd[i][p] = (stay + enter) * emit;
            total += fwd[i][p];
        }
        if total > 0.0 {
            scale[i] = total;
            for state in fwd[i].iter_mut() {
                *state /= total;
            }
        }
    }

    // backward pass with the same scaling
    let mut bwd_next = vec![1.0f64; periods + 1];
    let mut bwd_cur = vec![0.0f64; periods + 1];
    let mut posterior = vec![0.0f64; n];
    // posterior of the last position uses bwd == 1
    for i in (1..=n).rev() {
        let pos = i - 1;
        let repeat_mass: f64 = (1..=periods).map(|p| fwd[i][p] * bwd_next[p]).sum();
        let total: f64 = fwd[i][0] * bwd_next[0] + repeat_mass;
        if total > 0.0 {
            posterior[pos] = repeat_mass / total;
        }
        if i == 1 {
            break;
        }
        // bwd for position i-1
        let prev_pos = pos;
        let mut bg = bwd_next[0] * (1.0 - REPEAT_PROB);
        for p in 1..=periods {
            if prev_pos >= p {
                let emit = emission_ratio(codes[prev_pos], codes[prev_pos - p]);
                bg += bwd_next[p] * REPEAT_PROB * prior[p] * emit;
            }
        }
        bwd_cur[0] = bg / scale[i];
        for p in 1..=periods {
            let mut acc = bwd_next[0] * REPEAT_END_PROB;
            if prev_pos >= p {
                let emit = emission_ratio(codes[prev_pos], codes[prev_pos - p]);
                acc += bwd_next[p] * (1.0 - REPEAT_END_PROB) * emit;
            }
            bwd_cur[p] = acc / scale[i];
        }
        std::mem::swap(&mut bwd_next, &mut bwd_cur);
    }

    let mut masked = 0;
    for (pos, &p) in posterior.iter().enumerate() {
        if p > MIN_MASK_PROB {
            codes[pos] = unknown;
            masked += 1;
        }
    }
    masked
}

/// Replaces residues that were lowercase in the source text with `unknown`.
pub fn mask_lowercase(codes: &mut [u8], lowercase: &[bool], unknown: u8) -> usize {
    let mut masked = 0;
    for (code, &lower) in codes.iter_mut().zip(lowercase) {
        if lower {
            *code = unknown;
            masked += 1;
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homopolymer_run_is_masked() {
        // unique prefix, then a long A-run
        let mut codes: Vec<u8> = vec![0, 1, 2, 3, 1, 3, 2, 0];
        codes.extend(std::iter::repeat(0u8).take(40));
        let masked = mask_tandem_repeats(&mut codes, 20);
        assert!(masked >= 30, "masked only {} positions", masked);
        assert!(codes[20..40].iter().all(|&c| c == 20));
        // the unique prefix survives
        assert!(codes[..6].iter().any(|&c| c != 20));
    }

    #[test]
    fn diverse_sequence_stays_unmasked() {
        // codes cycle through a long non-repeating pattern
        let mut codes: Vec<u8> = (0..60u8).map(|i| (i.wrapping_mul(7).wrapping_add(i / 3)) % 19).collect();
        let masked = mask_tandem_repeats(&mut codes, 20);
        assert_eq!(masked, 0);
    }

    #[test]
    fn lowercase_mask_replaces_flagged_positions() {
        let mut codes = vec![1u8, 2, 3, 4];
        let lower = vec![false, true, true, false];
        assert_eq!(mask_lowercase(&mut codes, &lower, 20), 2);
        assert_eq!(codes, vec![1, 20, 20, 4]);
    }
}
