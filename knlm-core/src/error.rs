use thiserror::Error;

/// Error type shared by every operation of the language model.
///
/// Absent table keys are never reported through this type: a missing key
/// means "zero occurrences" and simply sends the estimate to a shorter context.
#[derive(Error, Debug)]
pub enum KnlmError {
	/// The maximum order of a model must be at least 2.
	#[error("model order must be >= 2, got {0}")]
	InvalidOrder(usize),

	/// An n-gram needs a prefix and a suffix, so at least 2 tokens.
	#[error("cannot count an n-gram of {0} token(s), at least 2 are required")]
	NGramTooShort(usize),

	/// Nothing was observed, the vocabulary would be empty.
	#[error("no n-gram was observed, the model would have an empty vocabulary")]
	EmptyCorpus,

	/// The boundary marker is reserved and may not occur inside a sentence.
	#[error("token '{0}' is the reserved boundary marker")]
	ReservedToken(String),

	/// Persisted keys are joined with `|`, a token holding it would collide.
	#[error("token '{0}' contains the key separator '|'")]
	SeparatorInToken(String),

	/// The persisted model does not have the expected shape.
	#[error("invalid model record: {0}")]
	InvalidRecord(String),

	/// Perplexity is undefined over zero sentences.
	#[error("cannot compute perplexity over an empty evaluation set")]
	EmptyEvaluationSet,

	/// A probability that should be strictly positive was not.
	#[error("probability of n-gram '{ngram}' is {value} (discount {discount})")]
	NonPositiveProbability { ngram: String, value: f64, discount: f64 },

	/// The discount must at least be a finite number.
	#[error("discount must be finite, got {0}")]
	InvalidDiscount(f64),

	/// Generation parameters out of range.
	#[error("invalid generation parameter: {0}")]
	InvalidParameter(String),

	/// The next-token distribution could not be sampled.
	#[error("cannot sample next token: {0}")]
	Sampling(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("binary model error: {0}")]
	Postcard(#[from] postcard::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, KnlmError>;
