//! Interpolated Kneser-Ney n-gram language model.
//!
//! This crate provides:
//! - Single-pass aggregation of the six Kneser-Ney statistic tables
//! - Recursive backoff probability estimation with an explicit discount
//! - Held-out perplexity, discount sweeps and sentence sampling
//! - JSON and compact binary persistence of trained models
//!
//! Training produces an immutable `LanguageModel`; estimators borrow it
//! read-only, each with its own discount.

/// Language model aggregation, estimation and generation.
pub mod model;

/// Corpus reading and model file helpers.
pub mod io;

/// Error type shared by the crate.
pub mod error;

pub use error::{KnlmError, Result};
pub use model::aggregator::Aggregator;
pub use model::config::{GenerationConfig, TrainingConfig};
pub use model::estimator::Estimator;
pub use model::generator::Generator;
pub use model::language_model::{LanguageModel, ModelRecord, Table};
