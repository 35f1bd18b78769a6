//! The tokenizer capability the batching pipeline is built on, and the implementations of it that
//! ship with this crate.
//!
//! Learning a subword vocabulary is not something this crate does.  Tokenizers here load a
//! vocabulary that was trained elsewhere and apply it.
use crate::{Result, TokenId};

mod tiktoken;
mod vocab;

pub use tiktoken::*;
pub use vocab::*;

/// Text to token id conversion, in both directions.
///
/// Implementations are trusted to return a (possibly empty) id sequence for any input text,
/// including the empty string.  An `Err` from `encode` aborts the batch being built rather than
/// dropping the offending sentence.
pub trait Tokenizer {
    /// Encode text into token ids, without adding any sentinels
    fn encode(&self, text: &str) -> Result<Vec<TokenId>>;

    /// Decode token ids back into text
    fn decode(&self, ids: &[TokenId]) -> Result<String>;

    /// The id of a single vocabulary piece, if the vocabulary has such a piece
    fn piece_to_id(&self, piece: &str) -> Option<TokenId>;

    /// The number of ids in the vocabulary.  Every valid id is below this.
    fn vocab_size(&self) -> usize;

    /// Whether `id` stands for something in the vocabulary and can be decoded.
    ///
    /// Only vocabularies with holes in their id range need to override this.
    fn contains_id(&self, id: TokenId) -> bool {
        id < self.vocab_size()
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for Box<T> {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        (**self).encode(text)
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String> {
        (**self).decode(ids)
    }

    fn piece_to_id(&self, piece: &str) -> Option<TokenId> {
        (**self).piece_to_id(piece)
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn contains_id(&self, id: TokenId) -> bool {
        (**self).contains_id(id)
    }
}
