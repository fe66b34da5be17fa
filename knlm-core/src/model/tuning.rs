use super::estimator::Estimator;
use super::language_model::LanguageModel;
use crate::error::{KnlmError, Result};

/// Perplexity measured for one discount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscountScore {
	pub discount: f64,
	pub perplexity: f64,
}

/// Evaluates held-out perplexity at `d = k / steps` for `k` in `1..=steps`.
///
/// The grid excludes 0, where unseen n-grams would get no mass, and ends at 1.
/// Grid points are not reported as out-of-range discounts.
///
/// # Errors
/// Returns an error if `steps` is 0, or if any perplexity fails
/// (see `Estimator::perplexity`).
pub fn sweep_discounts<T, S>(model: &LanguageModel, sentences: &[T], steps: usize) -> Result<Vec<DiscountScore>>
where
	T: AsRef<[S]>,
	S: AsRef<str>,
{
	if steps == 0 {
		return Err(KnlmError::InvalidParameter("sweep needs at least one step".to_owned()));
	}
	(1..=steps)
		.map(|k| -> Result<DiscountScore> {
			let discount = k as f64 / steps as f64;
			let perplexity = Estimator::unlogged(model, discount)?.perplexity(sentences)?;
			log::debug!("d = {discount:.4}: perplexity {perplexity}");
			Ok(DiscountScore { discount, perplexity })
		})
		.collect()
}

/// The sweep entry with the lowest perplexity.
pub fn best_discount<T, S>(model: &LanguageModel, sentences: &[T], steps: usize) -> Result<DiscountScore>
where
	T: AsRef<[S]>,
	S: AsRef<str>,
{
	let scores = sweep_discounts(model, sentences, steps)?;
	let best = scores
		.into_iter()
		.min_by(|a, b| a.perplexity.total_cmp(&b.perplexity))
		.ok_or_else(|| KnlmError::InvalidParameter("empty sweep".to_owned()))?;
	log::info!("Best discount {:.4} (perplexity {})", best.discount, best.perplexity);
	Ok(best)
}
