//! Restartable iteration over a range of a [`ParallelCorpus`], producing padded and masked batches
//! of token ids.
//!
//! Each batch is padded only to the longest sequence in that batch, not to a corpus-wide length,
//! so the width of the grids changes from one batch to the next.
use crate::{
    ensure_fits_sentinels, pad_and_mask, truncate, DecoderStart, InvalidBatchSizeSnafu,
    InvalidRangeSnafu, Mask, ParallelCorpus, PadIdInContentSnafu, Result, SpecialTokens, TokenId,
    Tokenizer, WrapPolicy,
};
use serde::Serialize;
use snafu::ensure;
use std::ops::Range;
use tracing::*;

/// How the sequences on one side of the corpus are shaped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SideConfig {
    pub pad_id: TokenId,
    pub wrap: WrapPolicy,

    /// Hard cap on the length of a sequence, sentinels included.
    ///
    /// With no cap a sequence is never truncated and the batch-local maximum is the only thing
    /// bounding the width of a batch.
    pub max_len: Option<usize>,
}

impl SideConfig {
    /// Source sequences: padded, never wrapped
    pub fn source(pad_id: TokenId) -> Self {
        Self {
            pad_id,
            wrap: WrapPolicy::NoWrap,
            max_len: None,
        }
    }

    /// Target sequences: wrapped in sentinels, starting with the id `start` picks
    pub fn target(specials: &SpecialTokens, start: DecoderStart) -> Self {
        Self {
            pad_id: specials.pad_id,
            wrap: WrapPolicy::WrapWith {
                bos_id: start.begin_id(specials),
                eos_id: specials.eos_id,
            },
            max_len: None,
        }
    }

    pub fn with_max_len(self, max_len: impl Into<Option<usize>>) -> Self {
        Self {
            max_len: max_len.into(),
            ..self
        }
    }

    /// The truncation budget for a sequence of `natural_len` content ids
    fn budget(&self, natural_len: usize) -> usize {
        self.max_len
            .unwrap_or(natural_len + self.wrap.overhead())
    }
}

/// One side of the corpus: the tokenizer for its language, and how to shape its sequences
#[derive(Clone, Copy)]
pub struct Side<'a> {
    pub tokenizer: &'a dyn Tokenizer,
    pub config: SideConfig,
}

impl<'a> Side<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, config: SideConfig) -> Self {
        Self { tokenizer, config }
    }

    /// Tokenize and shape `texts`, padding every row to the longest one.
    ///
    /// `first_index` is the corpus index of `texts[0]`, for error reporting.
    pub fn encode_batch(
        &self,
        texts: &[String],
        first_index: usize,
    ) -> Result<(Vec<Vec<TokenId>>, Vec<Mask>)> {
        let SideConfig { pad_id, wrap, .. } = self.config;

        let rows = texts
            .iter()
            .enumerate()
            .map(|(offset, text)| {
                let ids = self.tokenizer.encode(text)?;
                ensure!(
                    !ids.contains(&pad_id),
                    PadIdInContentSnafu {
                        pad_id,
                        index: first_index + offset
                    }
                );

                truncate(&ids, self.config.budget(ids.len()), wrap)
            })
            .collect::<Result<Vec<_>>>()?;

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);

        Ok(rows
            .into_iter()
            .map(|ids| pad_and_mask(ids, width, pad_id))
            .unzip())
    }
}

/// A batch of sentence pairs, ready to be turned into tensors.
///
/// Each field is a `rows x width` grid.  The source and target grids have the same number of rows
/// but usually different widths.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct BatchRecord {
    pub source_ids: Vec<Vec<TokenId>>,
    pub source_mask: Vec<Mask>,
    pub target_ids: Vec<Vec<TokenId>>,
    pub target_mask: Vec<Mask>,
}

/// Decoder inputs and loss labels derived from the target side of a [`BatchRecord`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TeacherForcing {
    /// Target ids without the last column
    pub decoder_input_ids: Vec<Vec<TokenId>>,

    /// Target ids without the first column, with padding replaced by the ignore index
    pub labels: Vec<Vec<i64>>,
}

impl BatchRecord {
    pub fn rows(&self) -> usize {
        self.source_ids.len()
    }

    pub fn source_width(&self) -> usize {
        self.source_ids.first().map_or(0, Vec::len)
    }

    pub fn target_width(&self) -> usize {
        self.target_ids.first().map_or(0, Vec::len)
    }

    /// Split the target grid into what the decoder is fed and what it's expected to predict.
    ///
    /// The decoder sees every position but the last, and is scored on every position but the
    /// first.  Label positions holding `pad_id` are set to `ignore_index` (-100 for most
    /// frameworks) so they don't count towards the loss.
    pub fn teacher_forcing(&self, pad_id: TokenId, ignore_index: i64) -> TeacherForcing {
        let decoder_input_ids = self
            .target_ids
            .iter()
            .map(|row| row[..row.len().saturating_sub(1)].to_vec())
            .collect();

        let labels = self
            .target_ids
            .iter()
            .map(|row| {
                row.iter()
                    .skip(1)
                    .map(|&id| if id == pad_id { ignore_index } else { id as i64 })
                    .collect()
            })
            .collect();

        TeacherForcing {
            decoder_input_ids,
            labels,
        }
    }
}

/// Where a traversal of a [`BatchIterator`] is.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchState {
    /// Nothing has been read yet
    Ready,

    /// At least one batch has been read, and there are more
    Active,

    /// Every batch has been read
    Exhausted,
}

/// The batches covering the half-open range `start..end` of a corpus.
///
/// This holds no cursor itself.  Each call to [`Self::iter`] (or iterating a `&BatchIterator`)
/// starts a fresh traversal from `start`, and traversals are deterministic, so iterating twice
/// yields the same batches twice.  Several iterators can share one corpus.
pub struct BatchIterator<'a> {
    corpus: &'a ParallelCorpus,
    source: Side<'a>,
    target: Side<'a>,
    range: Range<usize>,
    batch_size: usize,
}

impl<'a> BatchIterator<'a> {
    pub fn new(
        corpus: &'a ParallelCorpus,
        source: Side<'a>,
        target: Side<'a>,
        range: Range<usize>,
        batch_size: usize,
    ) -> Result<Self> {
        ensure!(
            range.start <= range.end && range.end <= corpus.len(),
            InvalidRangeSnafu {
                start: range.start,
                end: range.end,
                len: corpus.len()
            }
        );
        ensure!(batch_size > 0, InvalidBatchSizeSnafu);

        for side in [&source, &target] {
            if let Some(max_len) = side.config.max_len {
                ensure_fits_sentinels(max_len, side.config.wrap)?;
            }
        }

        Ok(Self {
            corpus,
            source,
            target,
            range,
            batch_size,
        })
    }

    /// Number of batches in a full traversal
    pub fn len(&self) -> usize {
        (self.range.end - self.range.start).div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Start a new traversal at the beginning of the range
    pub fn iter(&self) -> Batches<'_> {
        Batches {
            batches: self,
            cursor: self.range.start,
            state: BatchState::Ready,
        }
    }

    /// Build the batch for the corpus indices in `range`
    fn batch_at(&self, range: Range<usize>) -> Result<BatchRecord> {
        let (source_texts, target_texts) = self.corpus.slice(range.clone());

        let (source_ids, source_mask) = self.source.encode_batch(source_texts, range.start)?;
        let (target_ids, target_mask) = self.target.encode_batch(target_texts, range.start)?;

        let batch = BatchRecord {
            source_ids,
            source_mask,
            target_ids,
            target_mask,
        };

        debug!(
            start = range.start,
            end = range.end,
            rows = batch.rows(),
            source_width = batch.source_width(),
            target_width = batch.target_width(),
            "Built batch"
        );

        Ok(batch)
    }
}

impl<'a> IntoIterator for &'a BatchIterator<'a> {
    type Item = Result<BatchRecord>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One traversal over the batches of a [`BatchIterator`].
///
/// Every batch has `batch_size` rows except possibly the last, which has whatever is left of the
/// range.  If building a batch fails, that batch is yielded as an `Err` and the traversal moves on
/// to the next one; no sentence is ever silently left out of a batch that is yielded.
pub struct Batches<'a> {
    batches: &'a BatchIterator<'a>,
    cursor: usize,
    state: BatchState,
}

impl<'a> Batches<'a> {
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// The corpus index the next batch starts at
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Go back to the start of the range, as if this traversal was new
    pub fn reset(&mut self) {
        self.cursor = self.batches.range.start;
        self.state = BatchState::Ready;
    }
}

impl<'a> Iterator for Batches<'a> {
    type Item = Result<BatchRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.batches.range.end;

        if self.cursor >= end {
            self.state = BatchState::Exhausted;
            return None;
        }

        let head = self.cursor;
        let tail = end.min(head + self.batches.batch_size);
        self.cursor = tail;
        self.state = if tail == end {
            BatchState::Exhausted
        } else {
            BatchState::Active
        };

        Some(self.batches.batch_at(head..tail))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.batches.range.end - self.cursor).div_ceil(self.batches.batch_size);

        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Batches<'a> {}

impl<'a> std::iter::FusedIterator for Batches<'a> {}
