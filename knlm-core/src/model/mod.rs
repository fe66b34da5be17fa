//! Top-level module of the Kneser-Ney language model.
//!
//! - Training-time counting (`Aggregator`)
//! - The frozen table set and its persisted form (`LanguageModel`)
//! - Probability estimation, perplexity and sampling (`Estimator`)
//! - A high-level sentence generator (`Generator`)

/// Single-pass counting of the statistic tables over a corpus.
pub mod aggregator;

/// Training and generation parameters, with validated setters.
pub mod config;

/// Categorical next-token distribution and weighted sampling.
pub mod distribution;

/// Interpolated backoff estimation over a frozen model.
///
/// Computes next-token probabilities, perplexity over held-out text
/// and sentence samples for a given discount.
pub mod estimator;

/// High-level interface owning a model and a seeded random source.
pub mod generator;

/// The immutable table set, its validation and persistence.
pub mod language_model;

/// Sentence padding and n-gram views shared by training and estimation.
pub mod ngram;

/// Token interning.
pub mod symbols;

/// Discount selection by perplexity sweep.
pub mod tuning;
