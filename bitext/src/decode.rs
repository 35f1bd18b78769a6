//! Turning ids generated by a model back into text.
//!
//! Nothing in the encoding path can produce an id outside the vocabulary, but a model's output
//! layer can be wider than the tokenizer's vocabulary, so generated ids have to be checked.
use crate::{Result, TokenId, Tokenizer, VocabBoundsSnafu};
use snafu::ensure;
use tracing::*;

/// Replace every id at or beyond `vocab_size` with `pad_id`.
pub fn clamp_to_vocab(ids: &[TokenId], vocab_size: usize, pad_id: TokenId) -> Vec<TokenId> {
    ids.iter()
        .map(|&id| if id < vocab_size { id } else { pad_id })
        .collect()
}

/// Fail on the first id that isn't in a vocabulary of `vocab_size` ids.
pub fn check_vocab_bounds(ids: &[TokenId], vocab_size: usize) -> Result<()> {
    for &id in ids {
        ensure!(id < vocab_size, VocabBoundsSnafu { id, vocab_size });
    }

    Ok(())
}

/// Decode model output, replacing every id the tokenizer can't decode with `pad_id` first.
///
/// That covers ids at or beyond the vocab size as well as any holes the tokenizer has in its id
/// range.
pub fn decode_generated(tokenizer: &dyn Tokenizer, ids: &[TokenId], pad_id: TokenId) -> Result<String> {
    let clamped: Vec<TokenId> = ids
        .iter()
        .map(|&id| if tokenizer.contains_id(id) { id } else { pad_id })
        .collect();

    let num_clamped = ids.iter().filter(|&&id| !tokenizer.contains_id(id)).count();
    if num_clamped > 0 {
        warn!(
            num_clamped,
            vocab_size = tokenizer.vocab_size(),
            "Generated ids outside of the vocabulary were replaced with padding"
        );
    }

    tokenizer.decode(&clamped)
}
