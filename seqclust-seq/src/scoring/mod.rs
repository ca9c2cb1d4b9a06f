//! Substitution matrices and their Gumbel statistics.

mod substitution_matrix;

pub use substitution_matrix::{GumbelParams, SubstitutionMatrix, SubstitutionMatrixList};
