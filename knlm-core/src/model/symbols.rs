use std::collections::HashMap;

/// Interned identifier of a token.
///
/// Ids are dense and assigned in first-seen order, starting at 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u32);

impl TokenId {
	/// Id handed out for tokens the model has never seen.
	///
	/// It is never interned, so every table key containing it is absent.
	pub const UNKNOWN: TokenId = TokenId(u32::MAX);

	pub fn index(self) -> usize {
		self.0 as usize
	}
}

/// Bidirectional mapping between token strings and `TokenId`s.
///
/// ## Invariants
/// - `tokens[id.index()]` is the string interned as `id`
/// - `ids` and `tokens` always hold the same number of entries
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
	ids: HashMap<String, TokenId>,
	tokens: Vec<String>,
}

impl SymbolTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the id of `token`, interning it if it was never seen.
	pub fn intern(&mut self, token: &str) -> TokenId {
		if let Some(id) = self.ids.get(token) {
			return *id;
		}
		let id = TokenId(self.tokens.len() as u32);
		self.tokens.push(token.to_owned());
		self.ids.insert(token.to_owned(), id);
		id
	}

	/// Looks up a token without interning it.
	pub fn get(&self, token: &str) -> Option<TokenId> {
		self.ids.get(token).copied()
	}

	/// Like `get`, but maps unseen tokens to `TokenId::UNKNOWN`.
	pub fn resolve(&self, token: &str) -> TokenId {
		self.get(token).unwrap_or(TokenId::UNKNOWN)
	}

	/// Returns the string behind an id, `None` for `UNKNOWN` or foreign ids.
	pub fn token(&self, id: TokenId) -> Option<&str> {
		self.tokens.get(id.index()).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}
}
