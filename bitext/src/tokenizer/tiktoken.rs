//! [`Tokenizer`] implementation backed by the OpenAI BPE encodings in `tiktoken-rs`
use crate::{Result, TiktokenSnafu, TokenId, Tokenizer, UnknownTokenizerSnafu, VocabBoundsSnafu};
use snafu::{ensure, OptionExt};
use std::ops::RangeInclusive;
use tracing::*;

pub type Encoding = tiktoken_rs::tokenizer::Tokenizer;

pub const ENCODINGS: &[Encoding] = &[
    Encoding::Cl100kBase,
    Encoding::P50kBase,
    Encoding::R50kBase,
    Encoding::P50kEdit,
    Encoding::Gpt2,
];

#[allow(unreachable_patterns)]
pub fn get_encoding_name(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Cl100kBase => "cl100k_base",
        Encoding::P50kBase => "p50k_base",
        Encoding::R50kBase => "r50k_base",
        Encoding::P50kEdit => "p50k_edit",
        Encoding::Gpt2 => "gpt2",
        _ => "unsupported",
    }
}

/// Find one of the supported encodings by its tiktoken name, like `cl100k_base`.
pub fn get_encoding_by_name(name: &str) -> Result<Encoding> {
    ENCODINGS
        .iter()
        .copied()
        .find(|encoding| get_encoding_name(*encoding) == name)
        .context(UnknownTokenizerSnafu { name })
}

/// The number of ids used by an encoding, counting its special tokens.
///
/// `CoreBPE` doesn't expose the size of its rank tables, so these are the highest special token
/// rank of each encoding plus one.
#[allow(unreachable_patterns)]
fn get_vocab_size(encoding: Encoding) -> Option<usize> {
    match encoding {
        Encoding::Cl100kBase => Some(100_277),
        Encoding::P50kBase => Some(50_281),
        Encoding::P50kEdit => Some(50_284),
        Encoding::R50kBase | Encoding::Gpt2 => Some(50_257),
        _ => None,
    }
}

/// Ids below the vocab size that neither a BPE rank nor a special token uses.
///
/// `CoreBPE` panics when asked to decode one of these.  In cl100k_base the ranks end at 100_255
/// and the special tokens are 100_257..=100_260 and 100_276.
fn get_unused_ids(encoding: Encoding) -> &'static [RangeInclusive<TokenId>] {
    const CL100K_UNUSED: &[RangeInclusive<TokenId>] = &[100_256..=100_256, 100_261..=100_275];

    match encoding {
        Encoding::Cl100kBase => CL100K_UNUSED,
        _ => &[],
    }
}

pub struct TiktokenTokenizer {
    encoding: Encoding,
    vocab_size: usize,
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenTokenizer {
    pub fn new(encoding: Encoding) -> Result<Self> {
        let vocab_size = get_vocab_size(encoding).context(UnknownTokenizerSnafu {
            name: format!("{encoding:?}"),
        })?;

        debug!(
            encoding = get_encoding_name(encoding),
            vocab_size, "Loading tiktoken encoding"
        );
        let bpe = tiktoken_rs::get_bpe_from_tokenizer(encoding)
            .map_err(|e| TiktokenSnafu { inner: e }.build())?;

        Ok(Self {
            encoding,
            vocab_size,
            bpe,
        })
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::new(get_encoding_by_name(name)?)
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Tokenizer for TiktokenTokenizer {
    /// Special token strings in `text` are treated as ordinary text, so corpus content can never
    /// smuggle in a sentinel id.
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        Ok(self.bpe.encode_ordinary(text))
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String> {
        for &id in ids {
            ensure!(
                self.contains_id(id),
                VocabBoundsSnafu {
                    id,
                    vocab_size: self.vocab_size
                }
            );
        }

        self.bpe
            .decode(ids.to_vec())
            .map_err(|e| TiktokenSnafu { inner: e }.build())
    }

    /// Special tokens like `<|endoftext|>` are the only useful sentinels in these encodings, so
    /// they're recognized here.  Anything that doesn't encode to exactly one id isn't a piece.
    fn piece_to_id(&self, piece: &str) -> Option<TokenId> {
        match self.bpe.encode_with_special_tokens(piece).as_slice() {
            [id] => Some(*id),
            _ => None,
        }
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn contains_id(&self, id: TokenId) -> bool {
        id < self.vocab_size
            && !get_unused_ids(self.encoding)
                .iter()
                .any(|unused| unused.contains(&id))
    }
}
