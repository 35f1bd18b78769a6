use crate::{
    BatchIterator, Mask, ParallelCorpus, PipelineConfig, Result, Side, SideConfig, Split,
    SplitRanges, SpecialTokens, TokenId, Tokenizer, UnknownPieceSnafu,
};
use snafu::OptionExt;
use tracing::*;

/// Which language of the corpus
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, strum::EnumString, strum::EnumVariantNames, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum Language {
    Source,
    Target,
}

/// A loaded corpus and its tokenizers, ready to hand out batch iterators for each split.
///
/// This owns everything the iterators borrow, so any number of iterators over any of the splits
/// can be alive at once.
pub struct Pipeline {
    corpus: ParallelCorpus,
    source_tokenizer: Box<dyn Tokenizer>,
    target_tokenizer: Box<dyn Tokenizer>,
    source_config: SideConfig,
    target_config: SideConfig,
    splits: SplitRanges,
    train_batch_size: usize,
    eval_batch_size: usize,
}

impl Pipeline {
    /// Load the corpus and both tokenizers named in `config`, and resolve the special ids.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let corpus = ParallelCorpus::load(&config.source.corpus, &config.target.corpus)?;
        let source_tokenizer = config.source.tokenizer.load()?;
        let target_tokenizer = config.target.tokenizer.load()?;

        // The source side is never wrapped, so only its padding piece has to exist
        let source_pad_id = source_tokenizer
            .piece_to_id(&config.source.pieces.pad)
            .context(UnknownPieceSnafu {
                piece: config.source.pieces.pad.as_str(),
            })?;
        let target_specials = SpecialTokens::resolve(&*target_tokenizer, &config.target.pieces)?;

        let source_config = SideConfig::source(source_pad_id).with_max_len(config.source.max_len);
        let target_config = SideConfig::target(&target_specials, config.decoder_start)
            .with_max_len(config.target.max_len);

        let splits = config.split.ranges(corpus.len())?;

        info!(
            pairs = corpus.len(),
            train = ?splits.train,
            val = ?splits.val,
            test = ?splits.test,
            source_vocab_size = source_tokenizer.vocab_size(),
            target_vocab_size = target_tokenizer.vocab_size(),
            decoder_start = %config.decoder_start,
            "Pipeline ready"
        );

        Ok(Self {
            corpus,
            source_tokenizer,
            target_tokenizer,
            source_config,
            target_config,
            splits,
            train_batch_size: config.train_batch_size,
            eval_batch_size: config.eval_batch_size,
        })
    }

    pub fn corpus(&self) -> &ParallelCorpus {
        &self.corpus
    }

    pub fn splits(&self) -> &SplitRanges {
        &self.splits
    }

    pub fn tokenizer(&self, language: Language) -> &dyn Tokenizer {
        match language {
            Language::Source => &*self.source_tokenizer,
            Language::Target => &*self.target_tokenizer,
        }
    }

    pub fn side(&self, language: Language) -> Side<'_> {
        let config = match language {
            Language::Source => self.source_config,
            Language::Target => self.target_config,
        };

        Side::new(self.tokenizer(language), config)
    }

    pub fn batch_size(&self, split: Split) -> usize {
        match split {
            Split::Train => self.train_batch_size,
            Split::Val | Split::Test => self.eval_batch_size,
        }
    }

    pub fn batches(&self, split: Split) -> Result<BatchIterator<'_>> {
        BatchIterator::new(
            &self.corpus,
            self.side(Language::Source),
            self.side(Language::Target),
            self.splits.get(split),
            self.batch_size(split),
        )
    }

    /// Tokenize and shape a single sentence the way it would be in a batch of its own.
    pub fn encode(&self, language: Language, text: &str) -> Result<(Vec<TokenId>, Mask)> {
        let (mut ids, mut masks) = self
            .side(language)
            .encode_batch(&[text.to_string()], 0)?;

        Ok((ids.remove(0), masks.remove(0)))
    }
}
