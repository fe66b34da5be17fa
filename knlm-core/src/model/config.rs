use crate::error::{KnlmError, Result};

/// Default maximum n-gram order.
pub const DEFAULT_ORDER: usize = 5;

/// Default sentence boundary marker.
pub const DEFAULT_BOUNDARY: &str = "<s>";

/// Default Kneser-Ney discount.
pub const DEFAULT_DISCOUNT: f64 = 0.75;

/// Default number of discounts tried by a sweep over `(0, 1]`.
pub const DEFAULT_SWEEP_STEPS: usize = 20;

/// Default maximum number of draws per generated sentence.
pub const DEFAULT_MAX_LENGTH: usize = 20;

/// Separator joining tokens into persisted table keys.
pub const KEY_SEPARATOR: char = '|';

/// Parameters fixed once for a training run.
///
/// # Invariants
/// - `order >= 2`
/// - `boundary` is non-empty and holds no `KEY_SEPARATOR`
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
	order: usize,
	boundary: String,
}

impl Default for TrainingConfig {
	fn default() -> Self {
		Self { order: DEFAULT_ORDER, boundary: DEFAULT_BOUNDARY.to_owned() }
	}
}

impl TrainingConfig {
	/// Creates a configuration with the default boundary marker.
	///
	/// # Errors
	/// Returns an error if `order < 2`.
	pub fn new(order: usize) -> Result<Self> {
		let mut config = Self::default();
		config.set_order(order)?;
		Ok(config)
	}

	pub fn order(&self) -> usize {
		self.order
	}

	pub fn boundary(&self) -> &str {
		&self.boundary
	}

	/// Sets the maximum n-gram order.
	///
	/// # Errors
	/// Returns an error if `order < 2`.
	pub fn set_order(&mut self, order: usize) -> Result<()> {
		if order < 2 {
			return Err(KnlmError::InvalidOrder(order));
		}
		self.order = order;
		Ok(())
	}

	/// Sets the boundary marker.
	///
	/// # Errors
	/// Returns an error if the marker is empty or contains the key separator.
	pub fn set_boundary(&mut self, boundary: &str) -> Result<()> {
		if boundary.is_empty() {
			return Err(KnlmError::InvalidParameter("boundary marker cannot be empty".to_owned()));
		}
		if boundary.contains(KEY_SEPARATOR) {
			return Err(KnlmError::SeparatorInToken(boundary.to_owned()));
		}
		self.boundary = boundary.to_owned();
		Ok(())
	}
}

/// Input parameters for sampling sentences out of a trained model.
///
/// # Responsibilities
/// - Hold the discount used by every probability computed while sampling
/// - Bound the number of draws per sentence
/// - Optionally fix the random seed so output is reproducible
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
	/// Maximum number of draws per sentence (>= 1).
	max_length: usize,

	/// Discount applied by the estimator (finite).
	discount: f64,

	/// Seed of the random source, `None` draws one from the OS.
	pub seed: Option<u64>,
}

impl Default for GenerationConfig {
	fn default() -> Self {
		Self { max_length: DEFAULT_MAX_LENGTH, discount: DEFAULT_DISCOUNT, seed: None }
	}
}

impl GenerationConfig {
	pub fn max_length(&self) -> usize {
		self.max_length
	}

	pub fn discount(&self) -> f64 {
		self.discount
	}

	/// Sets the maximum number of draws per sentence.
	///
	/// # Errors
	/// Returns an error if `max_length` is 0.
	pub fn set_max_length(&mut self, max_length: usize) -> Result<()> {
		if max_length == 0 {
			return Err(KnlmError::InvalidParameter("max length must be >= 1".to_owned()));
		}
		self.max_length = max_length;
		Ok(())
	}

	/// Sets the discount.
	///
	/// Values outside `(0, 1)` are accepted, the estimator reports them.
	///
	/// # Errors
	/// Returns an error if the value is NaN or infinite.
	pub fn set_discount(&mut self, discount: f64) -> Result<()> {
		if !discount.is_finite() {
			return Err(KnlmError::InvalidDiscount(discount));
		}
		self.discount = discount;
		Ok(())
	}
}
