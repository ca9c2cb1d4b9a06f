use seqclust_seq::scoring::GumbelParams;

/// Turns raw alignment scores into E-values over a fixed database size.
///
/// Uses the precomputed Gumbel background of the scoring matrix:
/// `E = K * m * n * exp(-lambda * S)` with `m` the query length and `n` the
/// residue count of the database.
///
/// # Example
/// ```rust
/// use seqclust_align::EvalueComputation;
/// use seqclust_seq::scoring::{SubstitutionMatrix, SubstitutionMatrixList};
///
/// let matrix = SubstitutionMatrix::load(SubstitutionMatrixList::Blosum62);
/// let evaluer = EvalueComputation::new(*matrix.gumbel(), 1_000_000);
/// let strong = evaluer.evalue(150, 300);
/// let weak = evaluer.evalue(30, 300);
/// assert!(strong < weak);
/// assert!(strong < 1e-10);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EvalueComputation {
    gumbel: GumbelParams,
    db_residues: u64,
}

impl EvalueComputation {
    pub fn new(gumbel: GumbelParams, db_residues: u64) -> EvalueComputation {
        EvalueComputation { gumbel, db_residues }
    }

    /// E-value of a score against a query of `query_len` residues.
    pub fn evalue(&self, score: i32, query_len: usize) -> f64 {
        let mn = query_len as f64 * self.db_residues as f64;
        (self.gumbel.log_k + mn.ln() - self.gumbel.lambda * score as f64).exp()
    }

    /// The smallest score whose E-value stays under `max_evalue`.
    pub fn min_score(&self, max_evalue: f64, query_len: usize) -> i32 {
        let mn = query_len as f64 * self.db_residues as f64;
        ((self.gumbel.log_k + mn.ln() - max_evalue.ln()) / self.gumbel.lambda).ceil() as i32
    }
}
