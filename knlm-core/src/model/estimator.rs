use rand::Rng;

use super::distribution::NextTokenDistribution;
use super::language_model::{LanguageModel, Table};
use super::ngram::{pad_sentence, window_count};
use super::symbols::TokenId;
use crate::error::{KnlmError, Result};

/// Masses contributed by one level of the backoff chain.
///
/// `discount_mass` is the discounted relative frequency of the n-gram at this
/// level, `leftover_mass` the share passed on to the next shorter context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelMasses {
	pub discount_mass: f64,
	pub leftover_mass: f64,
}

/// Interpolated Kneser-Ney probabilities over a borrowed `LanguageModel`.
///
/// The discount is fixed per estimator; build one per discount to compare
/// several on the same model. The model itself is never mutated.
///
/// # Levels
/// For an n-gram `w1 … wk`:
/// - level 0 scores the full n-gram with absolute counts
///   (`c_abc`, `c_abx`, `u_abx`)
/// - level `i >= 1` scores `wi+1 … wk` with continuation counts
///   (`u_xbc`, `u_xbx`, `r_xbx`)
/// - the empty n-gram gets the uniform `1 / |vocab|`
#[derive(Debug, Clone, Copy)]
pub struct Estimator<'m> {
	model: &'m LanguageModel,
	discount: f64,
}

impl<'m> Estimator<'m> {
	/// Creates an estimator using `discount`.
	///
	/// A discount outside `(0, 1)` is accepted but logged: at 0 the estimate
	/// degenerates to raw relative frequencies, close to 1 discount masses
	/// may turn negative.
	///
	/// # Errors
	/// Returns an error if `discount` is NaN or infinite.
	pub fn new(model: &'m LanguageModel, discount: f64) -> Result<Self> {
		let estimator = Self::unlogged(model, discount)?;
		if !estimator.is_discount_in_range() {
			log::warn!("Discount {discount} is outside (0, 1), probabilities may be degenerate");
		}
		Ok(estimator)
	}

	/// Same as `new`, without reporting a discount outside `(0, 1)`.
	///
	/// Used where the caller picks the discounts itself, such as a sweep
	/// ending on 1.
	pub(crate) fn unlogged(model: &'m LanguageModel, discount: f64) -> Result<Self> {
		if !discount.is_finite() {
			return Err(KnlmError::InvalidDiscount(discount));
		}
		Ok(Self { model, discount })
	}

	pub fn model(&self) -> &'m LanguageModel {
		self.model
	}

	pub fn discount(&self) -> f64 {
		self.discount
	}

	/// Whether the discount lies strictly between 0 and 1.
	pub fn is_discount_in_range(&self) -> bool {
		self.discount > 0.0 && self.discount < 1.0
	}

	/// Probability of the empty n-gram, the floor of every estimate.
	pub fn uniform(&self) -> f64 {
		1.0 / self.model.vocab().len() as f64
	}

	fn masses(&self, ngram: &[TokenId], full: Table, prefix: Table, right: Table) -> LevelMasses {
		let context = &ngram[..ngram.len() - 1];
		let context_count = match self.model.count(prefix, context) {
			Some(count) if count > 0 => count as f64,
			_ => return LevelMasses { discount_mass: 0.0, leftover_mass: 1.0 },
		};
		let discount_mass = match self.model.count(full, ngram) {
			Some(count) => (count as f64 - self.discount) / context_count,
			None => 0.0,
		};
		let right_count = self.model.count(right, context).unwrap_or(0) as f64;
		LevelMasses { discount_mass, leftover_mass: self.discount * right_count / context_count }
	}

	fn continuation_masses(&self, suffix: &[TokenId]) -> LevelMasses {
		self.masses(suffix, Table::SuffixContinuations, Table::InnerContinuations, Table::InnerRightTokens)
	}

	/// Masses of level `depth` for `ngram` (see the type-level docs).
	///
	/// Returns `None` once `depth` reaches the length of the n-gram, where the
	/// uniform floor takes over.
	pub fn level(&self, ngram: &[TokenId], depth: usize) -> Option<LevelMasses> {
		if depth >= ngram.len() {
			return None;
		}
		let suffix = &ngram[depth..];
		Some(if depth == 0 {
			self.masses(suffix, Table::FullCount, Table::PrefixCount, Table::PrefixContinuations)
		} else {
			self.continuation_masses(suffix)
		})
	}

	/// Folds levels from the longest context down, ending on the uniform floor.
	fn interpolate<I>(&self, levels: I) -> f64
	where
		I: IntoIterator<Item = LevelMasses>,
	{
		let mut probability = 0.0;
		let mut weight = 1.0;
		for level in levels {
			probability += weight * level.discount_mass;
			weight *= level.leftover_mass;
		}
		probability + weight * self.uniform()
	}

	/// Probability of the last id of `ngram` following the ids before it.
	///
	/// The empty n-gram yields the uniform floor. Missing keys are treated as
	/// zero counts; with a discount close to 1 the result may be negative.
	pub fn probability_ids(&self, ngram: &[TokenId]) -> f64 {
		self.interpolate((0..ngram.len()).filter_map(|depth| self.level(ngram, depth)))
	}

	/// Continuation-count probability of `ngram`, skipping the absolute level.
	///
	/// This is the estimate backed off to once the leftmost token of a longer
	/// n-gram has been dropped.
	pub fn backoff_probability_ids(&self, ngram: &[TokenId]) -> f64 {
		self.interpolate((0..ngram.len()).map(|start| self.continuation_masses(&ngram[start..])))
	}

	/// Probability of the last token of `ngram` given the tokens before it.
	///
	/// Tokens unknown to the model are allowed; they back off to the uniform
	/// floor.
	pub fn probability<S: AsRef<str>>(&self, ngram: &[S]) -> f64 {
		self.probability_ids(&self.model.resolve(ngram))
	}

	/// Perplexity of the model over held-out sentences.
	///
	/// Sentences are padded exactly as during training, and every window of
	/// the model's order is scored. Returns `2^mean(-log2 p)`.
	///
	/// # Errors
	/// - `EmptyEvaluationSet` when `sentences` is empty
	/// - `NonPositiveProbability` when a window scores `<= 0` or non-finite,
	///   which only happens with a malformed model or an out-of-range discount
	pub fn perplexity<T, S>(&self, sentences: &[T]) -> Result<f64>
	where
		T: AsRef<[S]>,
		S: AsRef<str>,
	{
		if sentences.is_empty() {
			return Err(KnlmError::EmptyEvaluationSet);
		}
		let order = self.model.order();
		let mut total = 0.0;
		let mut windows = 0usize;
		for sentence in sentences {
			let ids = self.model.resolve(sentence.as_ref());
			let padded = pad_sentence(&ids, order, self.model.boundary_id());
			windows += window_count(ids.len());
			for window in padded.windows(order) {
				let probability = self.probability_ids(window);
				if !(probability > 0.0 && probability.is_finite()) {
					return Err(KnlmError::NonPositiveProbability {
						ngram: self.model.render(window).join(" "),
						value: probability,
						discount: self.discount,
					});
				}
				total -= probability.log2();
			}
		}
		Ok(2f64.powf(total / windows as f64))
	}

	/// Next-token distribution over the whole vocabulary after `context`.
	///
	/// Only the last `order - 1` ids of `context` are used.
	pub fn distribution(&self, context: &[TokenId]) -> NextTokenDistribution {
		let keep = (self.model.order() - 1).min(context.len());
		let mut ngram = context[context.len() - keep..].to_vec();
		ngram.push(TokenId::UNKNOWN);
		let last = ngram.len() - 1;

		let vocab = self.model.vocab();
		let mut weights = Vec::with_capacity(vocab.len());
		for candidate in vocab {
			ngram[last] = *candidate;
			weights.push(self.probability_ids(&ngram));
		}
		NextTokenDistribution::new(vocab.to_vec(), weights)
	}

	/// Samples one sentence, token by token.
	///
	/// Starts from a context of `order - 1` boundary markers and draws from
	/// `distribution` until the boundary marker is drawn or `max_length`
	/// draws were made. The marker itself is never part of the output.
	///
	/// # Errors
	/// Returns an error if a distribution cannot be sampled (negative or
	/// all-zero weights).
	pub fn generate<R: Rng + ?Sized>(&self, max_length: usize, rng: &mut R) -> Result<Vec<String>> {
		let boundary = self.model.boundary_id();
		let start = self.model.order() - 1;
		let mut sequence = vec![boundary; start];
		for _ in 0..max_length {
			let token = self.distribution(&sequence).sample(rng)?;
			if token == boundary {
				break;
			}
			sequence.push(token);
		}
		Ok(self.model.render(&sequence[start..]))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::aggregator::Aggregator;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	const EPSILON: f64 = 1e-9;

	fn train(order: usize, corpus: &[&str]) -> LanguageModel {
		let mut aggregator = Aggregator::new(order).unwrap();
		for line in corpus {
			let tokens: Vec<&str> = line.split_whitespace().collect();
			aggregator.observe_sentence(&tokens).unwrap();
		}
		aggregator.finalize().unwrap()
	}

	fn sentences(lines: &[&str]) -> Vec<Vec<String>> {
		lines.iter().map(|l| l.split_whitespace().map(str::to_owned).collect()).collect()
	}

	#[test]
	fn empty_ngram_is_uniform() {
		let model = train(2, &["a b a", "a b c"]);
		let estimator = Estimator::new(&model, 0.75).unwrap();
		assert!((estimator.probability::<&str>(&[]) - 0.25).abs() < EPSILON);
		assert!((estimator.backoff_probability_ids(&[]) - 0.25).abs() < EPSILON);
	}

	#[test]
	fn seen_bigram_beats_rare_one() {
		let model = train(2, &["a b a", "a b c"]);
		let estimator = Estimator::new(&model, 0.75).unwrap();
		assert!(estimator.probability(&["a", "b"]) > estimator.probability(&["a", "c"]));
	}

	#[test]
	fn bigram_probability_by_hand() {
		let model = train(2, &["a b a", "a b c"]);
		let estimator = Estimator::new(&model, 0.75).unwrap();

		// continuation unigram of b: u_xbc[b] = 1, u_xbx[] = 6, r_xbx[] = 4
		let lower = (1.0 - 0.75) / 6.0 + 0.75 * 4.0 / 6.0 * 0.25;
		let b = model.resolve(&["b"]);
		assert!((estimator.backoff_probability_ids(&b) - lower).abs() < EPSILON);

		// c_abc[a b] = 2, c_abx[a] = 3, u_abx[a] = 2
		let expected = (2.0 - 0.75) / 3.0 + 0.75 * 2.0 / 3.0 * lower;
		assert!((estimator.probability(&["a", "b"]) - expected).abs() < EPSILON);
	}

	#[test]
	fn levels_stop_at_ngram_length() {
		let model = train(3, &["a b c"]);
		let estimator = Estimator::new(&model, 0.5).unwrap();
		let ngram = model.resolve(&["a", "b", "c"]);
		assert!(estimator.level(&ngram, 0).is_some());
		assert!(estimator.level(&ngram, 2).is_some());
		assert!(estimator.level(&ngram, 3).is_none());

		// unseen context: nothing discounted, everything deferred
		let unseen = model.resolve(&["c", "c", "a"]);
		let top = estimator.level(&unseen, 0).unwrap();
		assert_eq!(top, LevelMasses { discount_mass: 0.0, leftover_mass: 1.0 });
	}

	#[test]
	fn distributions_sum_to_one() {
		let model = train(3, &["the cat sat on the mat", "the dog sat on the log", "a cat ran"]);
		let estimator = Estimator::new(&model, 0.75).unwrap();
		let contexts: [&[&str]; 4] = [&["the", "cat"], &["<s>", "<s>"], &["mat", "dog"], &["zebra", "the"]];
		for context in contexts {
			let ids = model.resolve(context);
			let total = estimator.distribution(&ids).total_mass();
			assert!((total - 1.0).abs() < 1e-9, "{:?} sums to {}", context, total);
		}
	}

	#[test]
	fn unseen_token_gets_positive_probability() {
		let model = train(3, &["a b c", "b c a"]);
		let estimator = Estimator::new(&model, 0.75).unwrap();
		assert!(estimator.probability(&["a", "b", "unicorn"]) > 0.0);
		assert!(estimator.probability(&["unicorn", "unicorn", "unicorn"]) > 0.0);
	}

	#[test]
	fn perplexity_rejects_empty_set() {
		let model = train(2, &["a b"]);
		let estimator = Estimator::new(&model, 0.75).unwrap();
		let empty: Vec<Vec<String>> = Vec::new();
		assert!(matches!(estimator.perplexity(&empty), Err(KnlmError::EmptyEvaluationSet)));
	}

	#[test]
	fn perplexity_is_finite_and_at_least_one() {
		let model = train(3, &["a b c d", "a b d c", "b c d a"]);
		let held_out = sentences(&["a b c", "d c b a", "x a b"]);
		for step in 1..=10 {
			let d = step as f64 / 10.0;
			let ppl = model.perplexity(&held_out, d).unwrap();
			assert!(ppl.is_finite() && ppl >= 1.0, "d = {d}: {ppl}");
		}
	}

	#[test]
	fn non_finite_discount_is_rejected() {
		let model = train(2, &["a b"]);
		assert!(matches!(Estimator::new(&model, f64::INFINITY), Err(KnlmError::InvalidDiscount(_))));
	}

	#[test]
	fn large_discount_turns_singleton_negative() {
		// every n-gram seen once; u_xbx[] = 6, r_xbx[] = 5, vocab of 5
		let model = train(2, &["a b", "c d"]);
		let estimator = Estimator::new(&model, 1.5).unwrap();
		assert!(!estimator.is_discount_in_range());

		let lower = (1.0 - 1.5) / 6.0 + 1.5 * 5.0 / 6.0 * 0.2;
		let b = model.resolve(&["b"]);
		assert!((estimator.backoff_probability_ids(&b) - lower).abs() < EPSILON);

		// c_abc[a b] = 1, c_abx[a] = 1, u_abx[a] = 1
		let expected = (1.0 - 1.5) / 1.0 + 1.5 * 1.0 / 1.0 * lower;
		let value = estimator.probability(&["a", "b"]);
		assert!((value - expected).abs() < EPSILON);
		assert!((value + 0.25).abs() < EPSILON);

		let held_out = sentences(&["a b"]);
		assert!(matches!(
			estimator.perplexity(&held_out),
			Err(KnlmError::NonPositiveProbability { discount, .. }) if discount == 1.5
		));
	}

	#[test]
	fn backoff_matches_the_continuation_levels() {
		let model = train(3, &["the cat sat on the mat", "the dog sat on the log"]);
		let estimator = Estimator::new(&model, 0.6).unwrap();
		let ngram = model.resolve(&["on", "the", "mat"]);
		let mut padded = vec![TokenId::UNKNOWN];
		padded.extend_from_slice(&ngram);

		let mut expected = 0.0;
		let mut weight = 1.0;
		for depth in 1..padded.len() {
			let level = estimator.level(&padded, depth).unwrap();
			expected += weight * level.discount_mass;
			weight *= level.leftover_mass;
		}
		expected += weight * estimator.uniform();
		assert!((estimator.backoff_probability_ids(&ngram) - expected).abs() < EPSILON);
	}

	#[test]
	fn unlogged_estimator_scores_like_the_logged_one() {
		let model = train(2, &["a b a", "a b c"]);
		let logged = Estimator::new(&model, 1.0).unwrap();
		let quiet = Estimator::unlogged(&model, 1.0).unwrap();
		assert_eq!(logged.probability(&["a", "b"]), quiet.probability(&["a", "b"]));
		assert!(Estimator::unlogged(&model, f64::NAN).is_err());
	}

	#[test]
	fn distribution_covers_the_vocabulary_in_order() {
		let model = train(2, &["a b a", "a b c"]);
		let estimator = Estimator::new(&model, 0.75).unwrap();
		let context = model.resolve(&["a"]);
		let distribution = estimator.distribution(&context);
		assert_eq!(distribution.candidates(), model.vocab());
		for (candidate, weight) in distribution.candidates().iter().zip(distribution.weights()) {
			let ngram = [context[0], *candidate];
			assert!((estimator.probability_ids(&ngram) - weight).abs() < EPSILON);
		}
	}

	#[test]
	fn generation_is_reproducible() {
		let model = train(3, &["the cat sat", "the dog sat", "a dog ran far away"]);
		let estimator = Estimator::new(&model, 0.75).unwrap();
		let first: Vec<Vec<String>> = {
			let mut rng = StdRng::seed_from_u64(7);
			(0..5).map(|_| estimator.generate(20, &mut rng).unwrap()).collect()
		};
		let second: Vec<Vec<String>> = {
			let mut rng = StdRng::seed_from_u64(7);
			(0..5).map(|_| estimator.generate(20, &mut rng).unwrap()).collect()
		};
		assert_eq!(first, second);
	}

	#[test]
	fn generation_respects_max_length_and_strips_boundary() {
		let model = train(2, &["a a a a a a"]);
		let estimator = Estimator::new(&model, 0.75).unwrap();
		let mut rng = StdRng::seed_from_u64(1);
		for _ in 0..20 {
			let sentence = estimator.generate(3, &mut rng).unwrap();
			assert!(sentence.len() <= 3);
			assert!(sentence.iter().all(|t| t != "<s>"));
		}
	}
}
