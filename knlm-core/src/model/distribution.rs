use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use super::symbols::TokenId;
use crate::error::{KnlmError, Result};

/// Next-token distribution over a fixed list of candidates.
///
/// Conceptually one row of the Markov chain: each candidate carries the
/// estimated probability of following the current context. Weights are kept
/// as estimated and only normalized on sampling or lookup.
///
/// ## Invariants
/// - `candidates.len() == weights.len()`
#[derive(Clone, Debug)]
pub struct NextTokenDistribution {
	candidates: Vec<TokenId>,
	weights: Vec<f64>,
}

impl NextTokenDistribution {
	pub(crate) fn new(candidates: Vec<TokenId>, weights: Vec<f64>) -> Self {
		debug_assert_eq!(candidates.len(), weights.len());
		Self { candidates, weights }
	}

	pub fn candidates(&self) -> &[TokenId] {
		&self.candidates
	}

	/// Raw weights, in candidate order.
	pub fn weights(&self) -> &[f64] {
		&self.weights
	}

	/// Sum of all weights; 1 for a well-formed model and a context over its
	/// vocabulary.
	pub fn total_mass(&self) -> f64 {
		self.weights.iter().sum()
	}

	/// Normalized probability of `token`, `None` if it is not a candidate.
	pub fn probability_of(&self, token: TokenId) -> Option<f64> {
		let index = self.candidates.iter().position(|c| *c == token)?;
		Some(self.weights[index] / self.total_mass())
	}

	/// Draws a candidate with probability proportional to its weight.
	///
	/// # Errors
	/// Returns an error if a weight is negative or not finite, or if all
	/// weights are zero.
	pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TokenId> {
		let index = WeightedIndex::new(&self.weights).map_err(|e| KnlmError::Sampling(e.to_string()))?;
		Ok(self.candidates[index.sample(rng)])
	}
}
