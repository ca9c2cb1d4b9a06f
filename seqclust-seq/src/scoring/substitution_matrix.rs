use std::io::BufRead;

use once_cell::sync::Lazy;

use crate::alphabet::Alphabet;
use crate::errors::SeqError;
use crate::errors::SeqError::{CantParseNcbiEntry, IncorrectNcbiFormat};

/// Lists the scoring matrices shipped with this crate.
pub enum SubstitutionMatrixList {
    /// BLOSUM62 over the 21-letter amino acid alphabet
    Blosum62,
    /// match/mismatch scoring over the 5-letter nucleotide alphabet
    Nucleotide,
}

/// Precomputed Gumbel distribution parameters of a scoring system, used to
/// turn an alignment score into an E-value:
/// `E = K * m * n * exp(-lambda * score)`.
#[derive(Debug, Clone, Copy)]
pub struct GumbelParams {
    pub lambda: f64,
    pub k: f64,
    pub log_k: f64,
}

const N_COLUMNS: usize = 21;

/// A residue substitution matrix together with its Gumbel background.
///
/// Scores are indexed by alphabet codes, so
/// [`Alphabet::encode_residue`](crate::Alphabet::encode_residue) output can
/// be used directly.
///
/// # Example
/// ```rust
/// use seqclust_seq::scoring::{SubstitutionMatrix, SubstitutionMatrixList};
///
/// let blosum62 = SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62);
/// assert_eq!(blosum62.score_by_residue(b'C', b'C'), 9);
/// assert_eq!(blosum62.score_by_residue(b'W', b'W'), 11);
/// assert_eq!(blosum62.score_by_residue(b'A', b'W'), -3);
/// ```
pub struct SubstitutionMatrix {
    score: [[i32; N_COLUMNS]; N_COLUMNS],
    alphabet: Alphabet,
    gumbel: GumbelParams,
}

static BLOSUM62: Lazy<SubstitutionMatrix> = Lazy::new(|| {
    let data = include_str!("../../data/BLOSUM62");
    // BLOSUM62 with affine gaps 11/1
    let gumbel = GumbelParams { lambda: 0.267, k: 0.041, log_k: (0.041f64).ln() };
    SubstitutionMatrix::ncbi_matrix_from_buffer(data.as_bytes(), gumbel)
        .expect("embedded BLOSUM62 is well formed")
});

static NUCLEOTIDE: Lazy<SubstitutionMatrix> = Lazy::new(|| {
    let mut score = [[0i32; N_COLUMNS]; N_COLUMNS];
    for i in 0..4 {
        for j in 0..4 {
            score[i][j] = if i == j { 2 } else { -3 };
        }
    }
    // N scores zero against everything, itself included
    // match +2 / mismatch -3 with affine gaps 5/2
    let gumbel = GumbelParams { lambda: 1.28, k: 0.46, log_k: (0.46f64).ln() };
    SubstitutionMatrix { score, alphabet: Alphabet::nucleotide(), gumbel }
});

impl SubstitutionMatrix {
    /// Returns the singleton instance of a shipped matrix.
    pub fn load(which: SubstitutionMatrixList) -> &'static SubstitutionMatrix {
        match which {
            SubstitutionMatrixList::Blosum62 => &BLOSUM62,
            SubstitutionMatrixList::Nucleotide => &NUCLEOTIDE,
        }
    }

    /// The shipped matrix for the sequence kind at hand.
    pub fn for_nucleotide(nucleotide: bool) -> &'static SubstitutionMatrix {
        if nucleotide {
            SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide)
        } else {
            SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62)
        }
    }

    /// The alphabet whose codes index this matrix.
    pub fn alphabet(&self) -> &Alphabet { &self.alphabet }

    /// Gumbel parameters of this scoring system.
    pub fn gumbel(&self) -> &GumbelParams { &self.gumbel }

    #[inline(always)]
    /// Score of a pair of alphabet codes.
    pub fn score_by_code(&self, code_i: u8, code_j: u8) -> i32 {
        self.score[code_i as usize][code_j as usize]
    }

    #[inline(always)]
    /// Score of a pair of residue characters.
    pub fn score_by_residue(&self, res_i: u8, res_j: u8) -> i32 {
        self.score_by_code(self.alphabet.encode_residue(res_i), self.alphabet.encode_residue(res_j))
    }

    /// The per-position substitution row of one code.
    pub fn row(&self, code: u8) -> &[i32; N_COLUMNS] { &self.score[code as usize] }

    /// The largest score anywhere in the matrix.
    pub fn max_score(&self) -> i32 {
        let n = self.alphabet.size();
        let mut best = i32::MIN;
        for i in 0..n {
            for j in 0..n {
                best = best.max(self.score[i][j]);
            }
        }
        best
    }

    /// Loads a matrix from data in the NCBI format.
    ///
    /// The first 20 residue rows are read; the `B`, `Z` and `*` entries are
    /// not loaded and the `X` column of each row becomes the score against
    /// the unknown code.
    pub fn ncbi_matrix_from_buffer<R: BufRead>(
        reader: R,
        gumbel: GumbelParams,
    ) -> Result<SubstitutionMatrix, SeqError> {
        let alphabet = Alphabet::amino();
        let mut score = [[0i32; N_COLUMNS]; N_COLUMNS];
        let mut rows_read = 0usize;
        for line in reader.lines() {
            let line = line.map_err(|_| IncorrectNcbiFormat { line: String::from("<read error>") })?;
            if line.starts_with('#') || line.starts_with(' ') || line.is_empty() {
                continue;
            }
            let values: Vec<&str> = line.split_whitespace().collect();
            if values.len() < 23 {
                return Err(IncorrectNcbiFormat { line: line.clone() });
            }
            let row_char = values[0].as_bytes()[0];
            if row_char == b'B' || row_char == b'Z' || row_char == b'*' || row_char == b'X' {
                continue;
            }
            let i = alphabet.encode_residue(row_char) as usize;
            for j in 1..21 {
                let val = values[j].parse::<i32>().map_err(|_| CantParseNcbiEntry {
                    line: line.clone(),
                    value: values[j].to_string(),
                })?;
                // column order in the file matches the alphabet order
                score[i][j - 1] = val;
                score[j - 1][i] = val;
            }
            // the X column sits two entries before the line end
            let x_col = values.len() - 2;
            let val = values[x_col].parse::<i32>().map_err(|_| CantParseNcbiEntry {
                line: line.clone(),
                value: values[x_col].to_string(),
            })?;
            score[i][20] = val;
            score[20][i] = val;
            rows_read += 1;
            if rows_read == 20 {
                break;
            }
        }
        score[20][20] = -1;
        Ok(SubstitutionMatrix { score, alphabet, gumbel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blosum62_is_symmetric() {
        let m = SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62);
        for i in 0..21u8 {
            for j in 0..21u8 {
                assert_eq!(m.score_by_code(i, j), m.score_by_code(j, i));
            }
        }
        assert_eq!(m.score_by_residue(b'X', b'X'), -1);
        assert_eq!(m.max_score(), 11);
    }

    #[test]
    fn nucleotide_matrix_scores() {
        let m = SubstitutionMatrix::load(SubstitutionMatrixList::Nucleotide);
        assert_eq!(m.score_by_residue(b'A', b'A'), 2);
        assert_eq!(m.score_by_residue(b'A', b'C'), -3);
        assert_eq!(m.score_by_residue(b'A', b'N'), 0);
    }
}
