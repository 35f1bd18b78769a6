//! A [`Tokenizer`] over a fixed piece vocabulary, such as the `.vocab` file SentencePiece writes
//! next to its model.
use crate::{FileIoSnafu, InvalidVocabLineSnafu, Result, TokenId, Tokenizer, VocabBoundsSnafu};
use rustc_hash::FxHashMap as HashMap;
use snafu::{ensure, OptionExt, ResultExt};
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::*;

/// Marks a piece that starts a new word, in place of the whitespace before it.
pub const WORD_BOUNDARY: char = '\u{2581}';

/// Pieces that carry no text and are dropped when decoding.
const CONTROL_PIECES: &[&str] = &["<s>", "</s>", "<pad>"];

const UNK_PIECE: &str = "<unk>";

/// How an unknown piece is rendered when decoding, same as SentencePiece
const UNK_SURFACE: &str = " \u{2047} ";

/// Greedy longest-match segmentation against a piece vocabulary.
///
/// Text is split on whitespace, each word gets a [`WORD_BOUNDARY`] prefix, and then the longest
/// vocabulary piece at each position is taken.  A character that no piece covers becomes
/// `<unk>`.
///
/// This is not a reimplementation of the unigram or BPE segmenters; given the same vocabulary it
/// can choose different splits than SentencePiece would.  What it does guarantee is that every
/// id it emits is in the vocabulary, which is all the batching pipeline relies on.
#[derive(Clone, Debug)]
pub struct VocabTokenizer {
    pieces: Vec<String>,
    ids: HashMap<String, TokenId>,
    unk_id: Option<TokenId>,

    /// Length of the longest piece, in chars, which bounds the longest-match search
    max_piece_chars: usize,
}

impl VocabTokenizer {
    /// Build a tokenizer from pieces in id order.
    ///
    /// If a piece appears more than once, the first occurrence wins.
    pub fn from_pieces<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pieces: Vec<String> = pieces.into_iter().map(Into::into).collect();

        let mut ids = HashMap::default();
        for (id, piece) in pieces.iter().enumerate() {
            ids.entry(piece.clone()).or_insert(id);
        }

        let max_piece_chars = pieces
            .iter()
            .map(|piece| piece.chars().count())
            .max()
            .unwrap_or(0);
        let unk_id = ids.get(UNK_PIECE).copied();

        Self {
            pieces,
            ids,
            unk_id,
            max_piece_chars,
        }
    }

    /// Load a vocabulary file with one `piece<TAB>score` entry per line; the score is optional and
    /// ignored.  The id of each piece is its zero-based line number.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = std::fs::File::open(path).with_context(|_| FileIoSnafu { path })?;
        let mut pieces = Vec::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|_| FileIoSnafu { path })?;
            let piece = line.split('\t').next().unwrap_or_default();

            ensure!(
                !piece.is_empty(),
                InvalidVocabLineSnafu {
                    path,
                    line: index + 1
                }
            );
            pieces.push(piece.to_string());
        }

        info!(path = %path.display(), vocab_size = pieces.len(), "Loaded vocabulary");

        Ok(Self::from_pieces(pieces))
    }

    fn encode_word(&self, word: &str, ids: &mut Vec<TokenId>) -> Result<()> {
        // Byte offsets of every char boundary, so the search can work in chars and slice in bytes
        let bounds: Vec<usize> = word
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(word.len()))
            .collect();
        let num_chars = bounds.len() - 1;

        let mut start = 0;
        while start < num_chars {
            let longest = (start + self.max_piece_chars).min(num_chars);

            let matched = (start + 1..=longest)
                .rev()
                .find_map(|end| {
                    self.ids
                        .get(&word[bounds[start]..bounds[end]])
                        .map(|id| (*id, end))
                });

            match matched {
                Some((id, end)) => {
                    ids.push(id);
                    start = end;
                }
                None => {
                    let unk_id = self.unk_id.context(crate::UnknownPieceSnafu {
                        piece: &word[bounds[start]..bounds[start + 1]],
                    })?;
                    ids.push(unk_id);
                    start += 1;
                }
            }
        }

        Ok(())
    }
}

impl Tokenizer for VocabTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let mut ids = Vec::new();

        for word in text.split_whitespace() {
            let word = format!("{WORD_BOUNDARY}{word}");
            self.encode_word(&word, &mut ids)?;
        }

        Ok(ids)
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String> {
        let mut text = String::new();

        for id in ids {
            let piece = self.pieces.get(*id).context(VocabBoundsSnafu {
                id: *id,
                vocab_size: self.pieces.len(),
            })?;

            if Some(*id) == self.unk_id {
                text.push_str(UNK_SURFACE);
            } else if !CONTROL_PIECES.contains(&piece.as_str()) {
                text.push_str(piece);
            }
        }

        let text = text.replace(WORD_BOUNDARY, " ");
        Ok(text.trim().to_string())
    }

    fn piece_to_id(&self, piece: &str) -> Option<TokenId> {
        self.ids.get(piece).copied()
    }

    fn vocab_size(&self) -> usize {
        self.pieces.len()
    }
}
