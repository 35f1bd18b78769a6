//! Carving a corpus into contiguous train, validation and test ranges.
use crate::{InvalidSplitSnafu, Result};
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::ops::Range;

/// One of the three parts of a split corpus.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::EnumIter,
    strum::EnumVariantNames,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Split {
    Train,
    Val,
    Test,
}

/// Fractions of the corpus that go to training and validation.  Whatever is left is the test
/// split.
///
/// The splits are contiguous and in corpus order: train first, then validation, then test.
/// Shuffling, if wanted, has to happen to the corpus before it is split.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub train_fraction: f64,
    pub val_fraction: f64,
}

impl Default for SplitPlan {
    fn default() -> Self {
        Self {
            train_fraction: 0.95,
            val_fraction: 0.02,
        }
    }
}

/// The index ranges of each split, for a corpus of a particular length.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SplitRanges {
    pub train: Range<usize>,
    pub val: Range<usize>,
    pub test: Range<usize>,
}

impl SplitRanges {
    pub fn get(&self, split: Split) -> Range<usize> {
        match split {
            Split::Train => self.train.clone(),
            Split::Val => self.val.clone(),
            Split::Test => self.test.clone(),
        }
    }
}

impl SplitPlan {
    pub fn new(train_fraction: f64, val_fraction: f64) -> Result<Self> {
        let plan = Self {
            train_fraction,
            val_fraction,
        };
        plan.validate()?;

        Ok(plan)
    }

    pub fn validate(&self) -> Result<()> {
        let in_unit = |fraction: f64| (0.0..=1.0).contains(&fraction);

        ensure!(
            in_unit(self.train_fraction)
                && in_unit(self.val_fraction)
                && self.train_fraction + self.val_fraction <= 1.0,
            InvalidSplitSnafu {
                train: self.train_fraction,
                val: self.val_fraction
            }
        );

        Ok(())
    }

    /// Boundaries are rounded down, so any rounding slack ends up in the test split.
    pub fn ranges(&self, len: usize) -> Result<SplitRanges> {
        self.validate()?;

        let boundary = |fraction: f64| ((fraction * len as f64) as usize).min(len);
        let train_end = boundary(self.train_fraction);
        let val_end = boundary(self.train_fraction + self.val_fraction).max(train_end);

        Ok(SplitRanges {
            train: 0..train_end,
            val: train_end..val_end,
            test: val_end..len,
        })
    }
}
