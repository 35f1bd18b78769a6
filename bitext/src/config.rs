//! The JSON configuration file describing a corpus, its tokenizers and how to batch it.
//!
//! ```json
//! {
//!   "source": {
//!     "corpus": "data/train.bo",
//!     "tokenizer": { "kind": "vocab", "path": "bo.vocab" }
//!   },
//!   "target": {
//!     "corpus": "data/train.en",
//!     "tokenizer": { "kind": "tiktoken", "encoding": "cl100k_base" },
//!     "pieces": { "bos": "<|endoftext|>", "eos": "<|endoftext|>", "pad": "<|endofprompt|>" },
//!     "max_len": 128
//!   },
//!   "decoder_start": "pad",
//!   "split": { "train_fraction": 0.95, "val_fraction": 0.02 },
//!   "train_batch_size": 8,
//!   "eval_batch_size": 32
//! }
//! ```
//!
//! Relative paths are relative to the directory the config file is in.
use crate::{
    ConfigParseSnafu, DecoderStart, FileIoSnafu, Result, SpecialPieces, SplitPlan,
    TiktokenTokenizer, Tokenizer, VocabTokenizer,
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::path::{Path, PathBuf};
use tracing::*;

/// Where a side's tokenizer comes from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenizerSpec {
    /// A SentencePiece style `.vocab` file
    Vocab { path: PathBuf },

    /// One of the `tiktoken` BPE encodings, by name
    Tiktoken { encoding: String },
}

impl TokenizerSpec {
    pub fn load(&self) -> Result<Box<dyn Tokenizer>> {
        Ok(match self {
            TokenizerSpec::Vocab { path } => Box::new(VocabTokenizer::load(path)?),
            TokenizerSpec::Tiktoken { encoding } => Box::new(TiktokenTokenizer::from_name(encoding)?),
        })
    }
}

/// Configuration for one language of the corpus
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SideSpec {
    /// One sentence per line, line-aligned with the other side's file
    pub corpus: PathBuf,

    pub tokenizer: TokenizerSpec,

    #[serde(default)]
    pub pieces: SpecialPieces,

    /// Hard cap on sequence length, sentinels included.  Unset means batches are only bounded by
    /// their longest sentence.
    #[serde(default)]
    pub max_len: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source: SideSpec,
    pub target: SideSpec,

    #[serde(default)]
    pub decoder_start: DecoderStart,

    #[serde(default)]
    pub split: SplitPlan,

    #[serde(default = "default_train_batch_size")]
    pub train_batch_size: usize,

    /// Batch size for the validation and test splits
    #[serde(default = "default_eval_batch_size")]
    pub eval_batch_size: usize,
}

fn default_train_batch_size() -> usize {
    8
}

fn default_eval_batch_size() -> usize {
    32
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path).with_context(|_| FileIoSnafu { path })?;
        let mut config: Self =
            serde_json::from_str(&text).with_context(|_| ConfigParseSnafu { path })?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.split.validate()?;

        debug!(path = %path.display(), ?config, "Loaded pipeline config");

        Ok(config)
    }

    /// Make every relative path in the config relative to `base` instead of the working
    /// directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        for side in [&mut self.source, &mut self.target] {
            side.corpus = base.join(&side.corpus);
            if let TokenizerSpec::Vocab { path } = &mut side.tokenizer {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitextError;
    use assert_matches::assert_matches;

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{
                "source": { "corpus": "train.bo", "tokenizer": { "kind": "vocab", "path": "bo.vocab" } },
                "target": { "corpus": "/data/train.en", "tokenizer": { "kind": "tiktoken", "encoding": "gpt2" } }
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();

        assert_eq!(dir.path().join("train.bo"), config.source.corpus);
        assert_eq!(
            TokenizerSpec::Vocab {
                path: dir.path().join("bo.vocab")
            },
            config.source.tokenizer
        );
        assert_eq!(PathBuf::from("/data/train.en"), config.target.corpus);
        assert_eq!(SpecialPieces::default(), config.target.pieces);
        assert_eq!(None, config.target.max_len);
        assert_eq!(DecoderStart::Bos, config.decoder_start);
        assert_eq!(SplitPlan::default(), config.split);
        assert_eq!(8, config.train_batch_size);
        assert_eq!(32, config.eval_batch_size);
    }

    #[test]
    fn explicit_settings() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "source": { "corpus": "a", "tokenizer": { "kind": "vocab", "path": "a.vocab" } },
                "target": {
                    "corpus": "b",
                    "tokenizer": { "kind": "vocab", "path": "b.vocab" },
                    "pieces": { "bos": "[CLS]", "eos": "[SEP]" },
                    "max_len": 64
                },
                "decoder_start": "pad",
                "split": { "train_fraction": 0.8, "val_fraction": 0.1 },
                "train_batch_size": 16
            }"#,
        )
        .unwrap();

        assert_eq!("[CLS]", config.target.pieces.bos);
        assert_eq!("<pad>", config.target.pieces.pad);
        assert_eq!(Some(64), config.target.max_len);
        assert_eq!(DecoderStart::Pad, config.decoder_start);
        assert_eq!(0.8, config.split.train_fraction);
        assert_eq!(16, config.train_batch_size);
    }

    #[test]
    fn bad_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");

        assert_matches!(
            PipelineConfig::load(&path),
            Err(BitextError::FileIo { .. })
        );

        std::fs::write(&path, "{ \"source\": 12 }").unwrap();
        assert_matches!(
            PipelineConfig::load(&path),
            Err(BitextError::ConfigParse { .. })
        );

        std::fs::write(
            &path,
            r#"{
                "source": { "corpus": "a", "tokenizer": { "kind": "vocab", "path": "a.vocab" } },
                "target": { "corpus": "b", "tokenizer": { "kind": "vocab", "path": "b.vocab" } },
                "split": { "train_fraction": 0.8, "val_fraction": 0.3 }
            }"#,
        )
        .unwrap();
        assert_matches!(
            PipelineConfig::load(&path),
            Err(BitextError::InvalidSplit { .. })
        );
    }
}
