use crate::TokenId;
use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BitextError {
    #[snafu(display(
        "Index range {start}..{end} is not valid for a corpus of {len} sentence pairs"
    ))]
    InvalidRange { start: usize, end: usize, len: usize },

    #[snafu(display("Batch size must be at least 1"))]
    InvalidBatchSize,

    #[snafu(display(
        "Length {max_len} is too small; at least {required} positions are needed for the sentinel tokens"
    ))]
    InvalidLength { max_len: usize, required: usize },

    #[snafu(display(
        "Parallel corpus files '{}' and '{}' are not aligned: one of them ends at line {line} while the other continues",
        source_path.display(),
        target_path.display()
    ))]
    CorpusAlignment {
        source_path: PathBuf,
        target_path: PathBuf,
        line: usize,
    },

    #[snafu(display(
        "Parallel corpus has {source_len} source sentences but {target_len} target sentences"
    ))]
    CorpusLengthMismatch {
        source_len: usize,
        target_len: usize,
    },

    #[snafu(display("Token id {id} is outside of the vocabulary (size {vocab_size})"))]
    VocabBounds { id: TokenId, vocab_size: usize },

    #[snafu(display(
        "The tokenizer produced the padding id {pad_id} as content for sentence {index}"
    ))]
    PadIdInContent { pad_id: TokenId, index: usize },

    #[snafu(display("The piece '{piece}' is not in the tokenizer's vocabulary"))]
    UnknownPiece { piece: String },

    #[snafu(display("The tokenizer '{name}' isn't one of the supported tiktoken encodings"))]
    UnknownTokenizer { name: String },

    #[snafu(display("Invalid entry on line {line} of vocabulary file '{}'", path.display()))]
    InvalidVocabLine { path: PathBuf, line: usize },

    #[snafu(display("tiktoken error: {inner}"))]
    Tiktoken { inner: anyhow::Error },

    #[snafu(display(
        "Split fractions train={train} val={val} must each be within 0..=1 and sum to at most 1"
    ))]
    InvalidSplit { train: f64, val: f64 },

    #[snafu(display("File I/O error on file '{}'", path.display()))]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Error parsing config file '{}'", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
