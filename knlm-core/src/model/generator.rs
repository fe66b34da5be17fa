use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::config::GenerationConfig;
use super::estimator::Estimator;
use super::language_model::LanguageModel;
use crate::error::Result;

/// High-level sentence generator over a trained model.
///
/// # Responsibilities
/// - Own the model, the generation parameters and the random source
/// - Sample sentences one after another from the same random stream
///
/// With `GenerationConfig::seed` set, the produced sentences are fully
/// reproducible for a given model.
#[derive(Debug)]
pub struct Generator {
	model: LanguageModel,
	config: GenerationConfig,
	rng: StdRng,
}

impl Generator {
	/// Creates a generator over `model`.
	///
	/// # Errors
	/// Returns an error if the configured discount is not finite.
	pub fn new(model: LanguageModel, config: GenerationConfig) -> Result<Self> {
		Estimator::new(&model, config.discount())?;
		let rng = match config.seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_os_rng(),
		};
		Ok(Self { model, config, rng })
	}

	/// Loads a model from disk (see `LanguageModel::load`) and wraps it.
	pub fn load<P: AsRef<Path>>(path: P, config: GenerationConfig) -> Result<Self> {
		Self::new(LanguageModel::load(path)?, config)
	}

	pub fn model(&self) -> &LanguageModel {
		&self.model
	}

	pub fn config(&self) -> &GenerationConfig {
		&self.config
	}

	/// Samples one sentence, without boundary markers.
	pub fn generate_sentence(&mut self) -> Result<Vec<String>> {
		let estimator = Estimator::new(&self.model, self.config.discount())?;
		estimator.generate(self.config.max_length(), &mut self.rng)
	}

	/// Samples `count` sentences in a row.
	pub fn generate_sentences(&mut self, count: usize) -> Result<Vec<Vec<String>>> {
		let estimator = Estimator::new(&self.model, self.config.discount())?;
		(0..count)
			.map(|_| estimator.generate(self.config.max_length(), &mut self.rng))
			.collect()
	}
}
