use std::collections::{HashMap, HashSet};

use super::config::TrainingConfig;
use super::language_model::{CountTable, LanguageModel};
use super::ngram::{NGramParts, pad_sentence};
use super::symbols::{SymbolTable, TokenId};
use crate::error::{KnlmError, Result};

/// Accumulates Kneser-Ney statistics over a corpus.
///
/// Every sentence is counted once per order in `2..=order`, each order with
/// its own padding width, so a single pass fills all order levels.
///
/// # Responsibilities
/// - Count absolute n-gram and prefix occurrences
/// - Count distinct continuations on the first occurrence of an n-gram
/// - Track the right tokens seen after each inner context
/// - Produce the frozen `LanguageModel` (`finalize`)
///
/// # Invariants
/// - `order >= 2`
/// - `u_abx[k] <= c_abx[k]` for every prefix `k`
/// - `unigram_order` lists each length-1 prefix once, in first-seen order
#[derive(Debug)]
pub struct Aggregator {
	order: usize,
	boundary: TokenId,
	symbols: SymbolTable,
	c_abc: CountTable,
	c_abx: CountTable,
	u_abx: CountTable,
	u_xbc: CountTable,
	u_xbx: CountTable,
	/// Right tokens seen per inner context, only its cardinality is kept.
	right_tokens: HashMap<Vec<TokenId>, HashSet<TokenId>>,
	unigram_order: Vec<TokenId>,
	sentences: usize,
}

/// Increments `table[key]` and returns the new count.
///
/// Allocates the owned key only when it is inserted for the first time.
fn increment(table: &mut CountTable, key: &[TokenId]) -> u64 {
	if let Some(count) = table.get_mut(key) {
		*count += 1;
		return *count;
	}
	table.insert(key.to_vec(), 1);
	1
}

impl Aggregator {
	/// Creates an aggregator counting orders `2..=order` with the default
	/// boundary marker.
	///
	/// # Errors
	/// Returns an error if `order < 2`.
	pub fn new(order: usize) -> Result<Self> {
		Ok(Self::with_config(&TrainingConfig::new(order)?))
	}

	/// Creates an aggregator from a validated configuration.
	pub fn with_config(config: &TrainingConfig) -> Self {
		let mut symbols = SymbolTable::new();
		let boundary = symbols.intern(config.boundary());
		Self {
			order: config.order(),
			boundary,
			symbols,
			c_abc: CountTable::new(),
			c_abx: CountTable::new(),
			u_abx: CountTable::new(),
			u_xbc: CountTable::new(),
			u_xbx: CountTable::new(),
			right_tokens: HashMap::new(),
			unigram_order: Vec::new(),
			sentences: 0,
		}
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Number of sentences observed so far.
	pub fn sentences(&self) -> usize {
		self.sentences
	}

	fn intern_sentence<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<Vec<TokenId>> {
		let boundary = self.symbols.token(self.boundary).unwrap_or_default();
		if let Some(reserved) = tokens.iter().find(|t| t.as_ref() == boundary) {
			return Err(KnlmError::ReservedToken(reserved.as_ref().to_owned()));
		}
		Ok(tokens.iter().map(|t| self.symbols.intern(t.as_ref())).collect())
	}

	/// Adds a tokenized sentence (without boundary markers) to the statistics.
	///
	/// # Behavior
	/// - For each order `k` in `2..=order`, pads with `k - 1` markers on the
	///   left and one on the right, then counts every window of width `k`.
	///
	/// # Errors
	/// Returns an error if a token equals the boundary marker. Nothing is
	/// counted in that case.
	pub fn observe_sentence<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<()> {
		let sentence = self.intern_sentence(tokens)?;
		for k in 2..=self.order {
			let padded = pad_sentence(&sentence, k, self.boundary);
			for window in padded.windows(k) {
				self.count_ids(window)?;
			}
		}
		self.sentences += 1;
		if self.sentences % 100_000 == 0 {
			log::debug!("Observed {} sentences", self.sentences);
		}
		Ok(())
	}

	/// Counts a single n-gram given as token strings.
	///
	/// Tokens are interned as they are met; the boundary marker is allowed
	/// here since explicit n-grams carry their own padding.
	///
	/// # Errors
	/// Returns an error if the n-gram has fewer than 2 tokens.
	pub fn count_ngram<S: AsRef<str>>(&mut self, ngram: &[S]) -> Result<()> {
		if ngram.len() < 2 {
			return Err(KnlmError::NGramTooShort(ngram.len()));
		}
		let ids: Vec<TokenId> = ngram.iter().map(|t| self.symbols.intern(t.as_ref())).collect();
		self.count_ids(&ids)
	}

	fn count_ids(&mut self, ngram: &[TokenId]) -> Result<()> {
		let parts = NGramParts::split(ngram).ok_or(KnlmError::NGramTooShort(ngram.len()))?;

		let full_count = increment(&mut self.c_abc, parts.full);
		if increment(&mut self.c_abx, parts.prefix) == 1 && parts.prefix.len() == 1 {
			self.unigram_order.push(parts.prefix[0]);
		}
		if full_count == 1 {
			increment(&mut self.u_abx, parts.prefix);
			increment(&mut self.u_xbc, parts.suffix);
			increment(&mut self.u_xbx, parts.inner);
		}
		match self.right_tokens.get_mut(parts.inner) {
			Some(set) => {
				set.insert(parts.last);
			}
			None => {
				self.right_tokens.insert(parts.inner.to_vec(), HashSet::from([parts.last]));
			}
		}
		Ok(())
	}

	/// Freezes the statistics into a `LanguageModel`.
	///
	/// # Behavior
	/// - `r_xbx[b]` becomes the number of distinct right tokens seen after `b`
	/// - The vocabulary is every length-1 prefix, sorted by descending count;
	///   equal counts keep first-seen order (stable sort)
	///
	/// Consumes the aggregator, so no sentence can be observed afterwards.
	///
	/// # Errors
	/// Returns an error if nothing was counted.
	pub fn finalize(self) -> Result<LanguageModel> {
		if self.c_abc.is_empty() {
			return Err(KnlmError::EmptyCorpus);
		}
		let r_xbx: CountTable = self
			.right_tokens
			.into_iter()
			.map(|(inner, tokens)| (inner, tokens.len() as u64))
			.collect();

		let mut vocab = self.unigram_order;
		vocab.sort_by_key(|id| std::cmp::Reverse(self.c_abx.get([*id].as_slice()).copied().unwrap_or(0)));

		log::info!(
			"Finalized order-{} model: {} sentences, {} n-grams, {} prefixes, {} vocabulary entries",
			self.order,
			self.sentences,
			self.c_abc.len(),
			self.c_abx.len(),
			vocab.len()
		);

		Ok(LanguageModel::from_parts(
			self.order,
			self.boundary,
			self.symbols,
			self.c_abc,
			self.c_abx,
			self.u_abx,
			self.u_xbc,
			self.u_xbx,
			r_xbx,
			vocab,
		))
	}
}
