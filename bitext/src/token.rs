use crate::{Result, Tokenizer, UnknownPieceSnafu};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

/// A token id, which is the index of a subword unit in a tokenizer's vocabulary.
///
/// Ids only mean something relative to the tokenizer that produced them; the source and target
/// sides of a corpus usually have separate vocabularies so the same integer can stand for
/// unrelated pieces on each side.
pub type TokenId = usize;

/// An attention mask row.  `1` marks a real token, `0` marks padding.
pub type Mask = Vec<u8>;

/// The names of the sentinel pieces in a tokenizer's vocabulary.
///
/// These default to the SentencePiece conventions.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialPieces {
    pub bos: String,
    pub eos: String,
    pub pad: String,
}

impl Default for SpecialPieces {
    fn default() -> Self {
        Self {
            bos: "<s>".to_string(),
            eos: "</s>".to_string(),
            pad: "<pad>".to_string(),
        }
    }
}

/// The sentinel ids for one side of the corpus, resolved against that side's tokenizer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpecialTokens {
    pub bos_id: TokenId,
    pub eos_id: TokenId,
    pub pad_id: TokenId,
}

impl SpecialTokens {
    /// Look up each of the sentinel pieces in the tokenizer's vocabulary.
    ///
    /// Fails if any of them isn't a single piece in the vocabulary.
    pub fn resolve(tokenizer: &dyn Tokenizer, pieces: &SpecialPieces) -> Result<Self> {
        let lookup = |piece: &str| {
            tokenizer.piece_to_id(piece).context(UnknownPieceSnafu {
                piece: piece.to_string(),
            })
        };

        Ok(Self {
            bos_id: lookup(&pieces.bos)?,
            eos_id: lookup(&pieces.eos)?,
            pad_id: lookup(&pieces.pad)?,
        })
    }
}

/// Which id the decoder sees as the first position of every target sequence.
///
/// Most sequence-to-sequence models want the real begin-of-sequence id here, but some
/// encoder-decoder families (T5 among them) are trained to start decoding from the padding id.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::EnumVariantNames,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DecoderStart {
    #[default]
    Bos,
    Pad,
}

impl DecoderStart {
    pub fn begin_id(self, specials: &SpecialTokens) -> TokenId {
        match self {
            DecoderStart::Bos => specials.bos_id,
            DecoderStart::Pad => specials.pad_id,
        }
    }
}
