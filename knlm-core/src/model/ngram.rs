use super::symbols::TokenId;

/// Pads a sentence for n-grams of size `order`.
///
/// `order - 1` boundary markers go on the left and a single one on the right,
/// so the first window predicts the first token from a pure boundary context
/// and the last window predicts the end of the sentence.
///
/// Example (`order = 3`, boundary `<s>`):
/// `a b` → `<s> <s> a b <s>` → windows `<s> <s> a`, `<s> a b`, `a b <s>`
pub fn pad_sentence(sentence: &[TokenId], order: usize, boundary: TokenId) -> Vec<TokenId> {
	let left = order.saturating_sub(1);
	let mut padded = Vec::with_capacity(left + sentence.len() + 1);
	padded.resize(left, boundary);
	padded.extend_from_slice(sentence);
	padded.push(boundary);
	padded
}

/// Number of windows of size `order` produced by a padded sentence.
pub fn window_count(sentence_len: usize) -> usize {
	sentence_len + 1
}

/// The four views of an n-gram `a…b c` used as table keys.
///
/// For `ngram = [a, b, c]`:
/// - `full`   = `a b c`
/// - `prefix` = `a b`  (rightmost token dropped)
/// - `suffix` = `b c`  (leftmost token dropped)
/// - `inner`  = `b`    (both dropped)
/// - `last`   = `c`
#[derive(Debug, Clone, Copy)]
pub struct NGramParts<'a> {
	pub full: &'a [TokenId],
	pub prefix: &'a [TokenId],
	pub suffix: &'a [TokenId],
	pub inner: &'a [TokenId],
	pub last: TokenId,
}

impl<'a> NGramParts<'a> {
	/// Splits an n-gram; returns `None` below 2 tokens, where a prefix and a
	/// suffix cannot be told apart.
	pub fn split(ngram: &'a [TokenId]) -> Option<Self> {
		let len = ngram.len();
		if len < 2 {
			return None;
		}
		Some(Self {
			full: ngram,
			prefix: &ngram[..len - 1],
			suffix: &ngram[1..],
			inner: &ngram[1..len - 1],
			last: ngram[len - 1],
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::symbols::SymbolTable;

	fn ids(symbols: &mut SymbolTable, tokens: &[&str]) -> Vec<TokenId> {
		tokens.iter().map(|t| symbols.intern(t)).collect()
	}

	#[test]
	fn padding_matches_order() {
		let mut symbols = SymbolTable::new();
		let eos = symbols.intern("<s>");
		let sentence = ids(&mut symbols, &["a", "b"]);

		let padded = pad_sentence(&sentence, 3, eos);
		assert_eq!(padded, vec![eos, eos, sentence[0], sentence[1], eos]);
		assert_eq!(padded.windows(3).count(), window_count(sentence.len()));
	}

	#[test]
	fn empty_sentence_still_yields_one_window() {
		let mut symbols = SymbolTable::new();
		let eos = symbols.intern("<s>");
		let padded = pad_sentence(&[], 2, eos);
		assert_eq!(padded.windows(2).count(), 1);
	}

	#[test]
	fn split_views() {
		let mut symbols = SymbolTable::new();
		let ngram = ids(&mut symbols, &["a", "b", "c"]);
		let parts = NGramParts::split(&ngram).unwrap();
		assert_eq!(parts.prefix, &ngram[..2]);
		assert_eq!(parts.suffix, &ngram[1..]);
		assert_eq!(parts.inner, &ngram[1..2]);
		assert_eq!(parts.last, ngram[2]);

		let bigram = &ngram[..2];
		assert!(NGramParts::split(bigram).unwrap().inner.is_empty());
		assert!(NGramParts::split(&ngram[..1]).is_none());
	}
}
