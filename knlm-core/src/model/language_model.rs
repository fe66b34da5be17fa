use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::config::KEY_SEPARATOR;
use super::estimator::Estimator;
use super::symbols::{SymbolTable, TokenId};
use crate::error::{KnlmError, Result};
use crate::io;

/// Counts keyed by an ordered tuple of interned tokens.
pub type CountTable = HashMap<Vec<TokenId>, u64>;

/// The six statistic tables of a trained model.
///
/// Names follow the `a…b c` reading of an n-gram: `a` is the leftmost token,
/// `b` the inner context and `c` the predicted token; `x` marks a position
/// that is summed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
	/// `c_abc`: absolute count of the full n-gram.
	FullCount,
	/// `c_abx`: absolute count of the prefix, over all continuations.
	PrefixCount,
	/// `u_abx`: distinct continuations seen after the prefix.
	PrefixContinuations,
	/// `u_xbc`: distinct left extensions seen before the suffix.
	SuffixContinuations,
	/// `u_xbx`: distinct `(a, c)` pairs seen around the inner context.
	InnerContinuations,
	/// `r_xbx`: distinct right tokens seen after the inner context.
	InnerRightTokens,
}

impl Table {
	pub const ALL: [Table; 6] = [
		Table::FullCount,
		Table::PrefixCount,
		Table::PrefixContinuations,
		Table::SuffixContinuations,
		Table::InnerContinuations,
		Table::InnerRightTokens,
	];

	/// Field name of the table in a persisted model.
	pub fn field_name(self) -> &'static str {
		match self {
			Table::FullCount => "c_abc",
			Table::PrefixCount => "c_abx",
			Table::PrefixContinuations => "u_abx",
			Table::SuffixContinuations => "u_xbc",
			Table::InnerContinuations => "u_xbx",
			Table::InnerRightTokens => "r_xbx",
		}
	}
}

/// Persisted form of a model.
///
/// Table keys are token sequences joined with `|`; the empty sequence is the
/// empty string. Unknown fields are rejected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelRecord {
	pub n: usize,
	pub eos: String,
	pub c_abc: BTreeMap<String, u64>,
	pub c_abx: BTreeMap<String, u64>,
	pub u_abx: BTreeMap<String, u64>,
	pub u_xbc: BTreeMap<String, u64>,
	pub u_xbx: BTreeMap<String, u64>,
	pub r_xbx: BTreeMap<String, u64>,
	pub vocab: Vec<String>,
}

/// A trained, immutable Kneser-Ney table set.
///
/// Built once by `Aggregator::finalize` or loaded from disk, then only read.
/// Any number of `Estimator`s, each with its own discount, may borrow it.
///
/// # Invariants
/// - `order >= 2`
/// - `vocab` is non-empty and sorted by descending unigram frequency
/// - every `FullCount` and `PrefixCount` value is >= 1
/// - `PrefixContinuations[k] <= PrefixCount[k]`
#[derive(Debug, Clone)]
pub struct LanguageModel {
	order: usize,
	boundary: TokenId,
	symbols: SymbolTable,
	c_abc: CountTable,
	c_abx: CountTable,
	u_abx: CountTable,
	u_xbc: CountTable,
	u_xbx: CountTable,
	r_xbx: CountTable,
	vocab: Vec<TokenId>,
}

impl LanguageModel {
	/// Assembles a model from already-consistent parts.
	///
	/// Reserved to the aggregator, which maintains the invariants itself.
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn from_parts(
		order: usize,
		boundary: TokenId,
		symbols: SymbolTable,
		c_abc: CountTable,
		c_abx: CountTable,
		u_abx: CountTable,
		u_xbc: CountTable,
		u_xbx: CountTable,
		r_xbx: CountTable,
		vocab: Vec<TokenId>,
	) -> Self {
		Self { order, boundary, symbols, c_abc, c_abx, u_abx, u_xbc, u_xbx, r_xbx, vocab }
	}

	/// Loads a model from a JSON file, or from a postcard file when the path
	/// ends in `.bin`, and validates it.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let record = io::read_record(&path)?;
		let model = Self::try_from(record)?;
		log::info!(
			"Loaded order-{} model from {} ({} vocabulary entries)",
			model.order,
			path.as_ref().display(),
			model.vocab.len()
		);
		for table in Table::ALL {
			log::debug!("  {}: {} keys", table.field_name(), model.table_len(table));
		}
		Ok(model)
	}

	/// Saves the model as JSON, or as postcard when the path ends in `.bin`.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let record = self.to_record()?;
		io::write_record(&path, &record)?;
		log::info!("Saved model to {}", path.as_ref().display());
		Ok(())
	}

	/// Maximum n-gram order the model was trained with.
	pub fn order(&self) -> usize {
		self.order
	}

	pub fn boundary(&self) -> &str {
		self.symbols.token(self.boundary).unwrap_or_default()
	}

	pub fn boundary_id(&self) -> TokenId {
		self.boundary
	}

	/// Vocabulary ids, most frequent first.
	pub fn vocab(&self) -> &[TokenId] {
		&self.vocab
	}

	/// Vocabulary strings, most frequent first.
	pub fn vocab_tokens(&self) -> impl Iterator<Item = &str> {
		self.vocab.iter().filter_map(|id| self.symbols.token(*id))
	}

	pub fn symbols(&self) -> &SymbolTable {
		&self.symbols
	}

	/// Maps tokens to ids; unseen tokens become `TokenId::UNKNOWN`.
	pub fn resolve<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<TokenId> {
		tokens.iter().map(|t| self.symbols.resolve(t.as_ref())).collect()
	}

	/// Maps ids back to tokens, `"<unk>"` standing for ids the model lacks.
	pub fn render(&self, ids: &[TokenId]) -> Vec<String> {
		ids.iter().map(|id| self.symbols.token(*id).unwrap_or("<unk>").to_owned()).collect()
	}

	pub(crate) fn table(&self, table: Table) -> &CountTable {
		match table {
			Table::FullCount => &self.c_abc,
			Table::PrefixCount => &self.c_abx,
			Table::PrefixContinuations => &self.u_abx,
			Table::SuffixContinuations => &self.u_xbc,
			Table::InnerContinuations => &self.u_xbx,
			Table::InnerRightTokens => &self.r_xbx,
		}
	}

	/// Count stored under `key`, `None` when the key was never observed.
	pub fn count(&self, table: Table, key: &[TokenId]) -> Option<u64> {
		self.table(table).get(key).copied()
	}

	/// Same as `count`, keyed by token strings.
	pub fn count_of<S: AsRef<str>>(&self, table: Table, key: &[S]) -> Option<u64> {
		self.count(table, &self.resolve(key))
	}

	/// Number of keys stored in a table.
	pub fn table_len(&self, table: Table) -> usize {
		self.table(table).len()
	}

	/// Perplexity of `sentences` under discount `discount`.
	///
	/// Shorthand for `Estimator::new(self, discount)?.perplexity(sentences)`.
	pub fn perplexity<T, S>(&self, sentences: &[T], discount: f64) -> Result<f64>
	where
		T: AsRef<[S]>,
		S: AsRef<str>,
	{
		Estimator::new(self, discount)?.perplexity(sentences)
	}

	fn join_key(&self, key: &[TokenId]) -> Result<String> {
		let mut joined = String::new();
		for (i, id) in key.iter().enumerate() {
			let token = self
				.symbols
				.token(*id)
				.ok_or_else(|| KnlmError::InvalidRecord(format!("dangling token id {}", id.index())))?;
			if token.contains(KEY_SEPARATOR) {
				return Err(KnlmError::SeparatorInToken(token.to_owned()));
			}
			if i > 0 {
				joined.push(KEY_SEPARATOR);
			}
			joined.push_str(token);
		}
		Ok(joined)
	}

	fn export_table(&self, table: Table) -> Result<BTreeMap<String, u64>> {
		self.table(table)
			.iter()
			.map(|(key, count)| -> Result<(String, u64)> { Ok((self.join_key(key)?, *count)) })
			.collect()
	}

	/// Converts the model to its persisted shape.
	///
	/// # Errors
	/// Fails if a token contains the key separator `|`.
	pub fn to_record(&self) -> Result<ModelRecord> {
		Ok(ModelRecord {
			n: self.order,
			eos: self.boundary().to_owned(),
			c_abc: self.export_table(Table::FullCount)?,
			c_abx: self.export_table(Table::PrefixCount)?,
			u_abx: self.export_table(Table::PrefixContinuations)?,
			u_xbc: self.export_table(Table::SuffixContinuations)?,
			u_xbx: self.export_table(Table::InnerContinuations)?,
			r_xbx: self.export_table(Table::InnerRightTokens)?,
			vocab: self.vocab_tokens().map(str::to_owned).collect(),
		})
	}
}

fn split_key(symbols: &mut SymbolTable, key: &str) -> Vec<TokenId> {
	if key.is_empty() {
		return Vec::new();
	}
	key.split(KEY_SEPARATOR).map(|token| symbols.intern(token)).collect()
}

fn import_table(
	symbols: &mut SymbolTable,
	table: Table,
	entries: BTreeMap<String, u64>,
	key_lengths: std::ops::RangeInclusive<usize>,
) -> Result<CountTable> {
	let mut counts = CountTable::with_capacity(entries.len());
	for (key, count) in entries {
		let ids = split_key(symbols, &key);
		if !key_lengths.contains(&ids.len()) {
			return Err(KnlmError::InvalidRecord(format!(
				"{} key '{}' has {} token(s), expected {}..={}",
				table.field_name(),
				key,
				ids.len(),
				key_lengths.start(),
				key_lengths.end()
			)));
		}
		counts.insert(ids, count);
	}
	Ok(counts)
}

fn require_positive(table: Table, counts: &BTreeMap<String, u64>) -> Result<()> {
	match counts.iter().find(|(_, count)| **count == 0) {
		Some((key, _)) => Err(KnlmError::InvalidRecord(format!(
			"{} key '{}' has a zero count",
			table.field_name(),
			key
		))),
		None => Ok(()),
	}
}

/// Requires `counts` and `bounds` to share their keys, each count being at
/// most its bound.
fn require_bounded(
	table: Table,
	counts: &BTreeMap<String, u64>,
	bound_table: Table,
	bounds: &BTreeMap<String, u64>,
) -> Result<()> {
	for (key, count) in counts {
		match bounds.get(key) {
			Some(bound) if count <= bound => {}
			Some(bound) => {
				return Err(KnlmError::InvalidRecord(format!(
					"{} key '{}' is {}, above its {} count {}",
					table.field_name(),
					key,
					count,
					bound_table.field_name(),
					bound
				)));
			}
			None => {
				return Err(KnlmError::InvalidRecord(format!(
					"{} key '{}' is missing from {}",
					table.field_name(),
					key,
					bound_table.field_name()
				)));
			}
		}
	}
	match bounds.keys().find(|key| !counts.contains_key(*key)) {
		Some(key) => Err(KnlmError::InvalidRecord(format!(
			"{} key '{}' is missing from {}",
			bound_table.field_name(),
			key,
			table.field_name()
		))),
		None => Ok(()),
	}
}

impl TryFrom<ModelRecord> for LanguageModel {
	type Error = KnlmError;

	/// Validates a persisted record and interns its keys.
	///
	/// The vocabulary is interned first, so vocabulary ids are dense and in
	/// vocabulary order.
	fn try_from(record: ModelRecord) -> Result<Self> {
		let n = record.n;
		if n < 2 {
			return Err(KnlmError::InvalidRecord(format!("n must be >= 2, got {n}")));
		}
		if record.eos.is_empty() {
			return Err(KnlmError::InvalidRecord("eos cannot be empty".to_owned()));
		}
		if record.vocab.is_empty() {
			return Err(KnlmError::InvalidRecord("vocab cannot be empty".to_owned()));
		}
		let mut seen = HashSet::with_capacity(record.vocab.len());
		if let Some(duplicate) = record.vocab.iter().find(|token| !seen.insert(token.as_str())) {
			return Err(KnlmError::InvalidRecord(format!("vocab lists '{duplicate}' twice")));
		}
		require_positive(Table::FullCount, &record.c_abc)?;
		require_positive(Table::PrefixCount, &record.c_abx)?;
		require_positive(Table::InnerContinuations, &record.u_xbx)?;
		require_bounded(Table::PrefixContinuations, &record.u_abx, Table::PrefixCount, &record.c_abx)?;
		require_bounded(Table::InnerRightTokens, &record.r_xbx, Table::InnerContinuations, &record.u_xbx)?;
		if !seen.contains(record.eos.as_str()) {
			return Err(KnlmError::InvalidRecord(format!("eos '{}' is missing from vocab", record.eos)));
		}
		if let Some(token) = record
			.c_abx
			.keys()
			.find(|key| !key.contains(KEY_SEPARATOR) && !key.is_empty() && !seen.contains(key.as_str()))
		{
			return Err(KnlmError::InvalidRecord(format!("c_abx token '{token}' is missing from vocab")));
		}

		let mut symbols = SymbolTable::new();
		let vocab: Vec<TokenId> = record.vocab.iter().map(|token| symbols.intern(token)).collect();
		let boundary = symbols.intern(&record.eos);

		let c_abc = import_table(&mut symbols, Table::FullCount, record.c_abc, 2..=n)?;
		let c_abx = import_table(&mut symbols, Table::PrefixCount, record.c_abx, 1..=n - 1)?;
		let u_abx = import_table(&mut symbols, Table::PrefixContinuations, record.u_abx, 1..=n - 1)?;
		let u_xbc = import_table(&mut symbols, Table::SuffixContinuations, record.u_xbc, 1..=n - 1)?;
		let u_xbx = import_table(&mut symbols, Table::InnerContinuations, record.u_xbx, 0..=n - 2)?;
		let r_xbx = import_table(&mut symbols, Table::InnerRightTokens, record.r_xbx, 0..=n - 2)?;

		Ok(Self::from_parts(n, boundary, symbols, c_abc, c_abx, u_abx, u_xbc, u_xbx, r_xbx, vocab))
	}
}
