//! Loading of line-aligned parallel text.
use crate::{CorpusAlignmentSnafu, CorpusLengthMismatchSnafu, FileIoSnafu, Result};
use snafu::{ensure, ResultExt};
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;
use tracing::*;

/// Source sentences and their translations, where `source()[i]` translates to `target()[i]`.
///
/// The corpus is immutable once built.  Any number of [`crate::BatchIterator`]s can borrow the
/// same corpus at once, for example one each for the train, validation and test ranges.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParallelCorpus {
    source: Vec<String>,
    target: Vec<String>,
}

impl ParallelCorpus {
    pub fn new(source: Vec<String>, target: Vec<String>) -> Result<Self> {
        ensure!(
            source.len() == target.len(),
            CorpusLengthMismatchSnafu {
                source_len: source.len(),
                target_len: target.len()
            }
        );

        Ok(Self { source, target })
    }

    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let (source, target) = pairs
            .into_iter()
            .map(|(source, target)| (source.into(), target.into()))
            .unzip();

        Self { source, target }
    }

    /// Read a corpus from two line-aligned UTF-8 files, one sentence per line.
    ///
    /// Lines are trimmed.  Reading stops at the first line that is blank in either file, so
    /// anything after a blank line is ignored.  If one file runs out of lines while the other
    /// still has a sentence, the files aren't aligned and this fails.
    pub fn load(source_path: impl AsRef<Path>, target_path: impl AsRef<Path>) -> Result<Self> {
        let source_path = source_path.as_ref();
        let target_path = target_path.as_ref();

        let source_file =
            std::fs::File::open(source_path).with_context(|_| FileIoSnafu { path: source_path })?;
        let target_file =
            std::fs::File::open(target_path).with_context(|_| FileIoSnafu { path: target_path })?;

        let corpus = Self::read(
            BufReader::new(source_file),
            BufReader::new(target_file),
            source_path,
            target_path,
        )?;

        info!(
            source = %source_path.display(),
            target = %target_path.display(),
            pairs = corpus.len(),
            "Loaded parallel corpus"
        );

        Ok(corpus)
    }

    /// Same as [`Self::load`] but from already opened readers.  The paths are only used in error
    /// messages.
    pub fn read(
        source: impl BufRead,
        target: impl BufRead,
        source_path: &Path,
        target_path: &Path,
    ) -> Result<Self> {
        let mut source_lines = source.lines();
        let mut target_lines = target.lines();
        let mut corpus = Self::default();

        loop {
            let line = corpus.len() + 1;
            let source_line = source_lines
                .next()
                .transpose()
                .with_context(|_| FileIoSnafu { path: source_path })?;
            let target_line = target_lines
                .next()
                .transpose()
                .with_context(|_| FileIoSnafu { path: target_path })?;

            match (source_line, target_line) {
                (None, None) => break,
                (Some(source), Some(target)) => {
                    let (source, target) = (source.trim(), target.trim());
                    if source.is_empty() || target.is_empty() {
                        debug!(line, "Blank line ends the corpus");
                        break;
                    }

                    corpus.source.push(source.to_string());
                    corpus.target.push(target.to_string());
                }
                // Running out of one file right where the other has a blank line is just the end
                // of the corpus
                (Some(remaining), None) | (None, Some(remaining)) if remaining.trim().is_empty() => {
                    break
                }
                _ => {
                    return CorpusAlignmentSnafu {
                        source_path,
                        target_path,
                        line,
                    }
                    .fail()
                }
            }
        }

        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn source(&self) -> &[String] {
        &self.source
    }

    pub fn target(&self) -> &[String] {
        &self.target
    }

    pub fn pair(&self, index: usize) -> Option<(&str, &str)> {
        Some((
            self.source.get(index)?.as_str(),
            self.target.get(index)?.as_str(),
        ))
    }

    /// The source and target sentences in `range`.
    ///
    /// Panics if `range` is out of bounds, like slice indexing does.
    pub fn slice(&self, range: Range<usize>) -> (&[String], &[String]) {
        (&self.source[range.clone()], &self.target[range])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitextError;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    fn read(source: &str, target: &str) -> Result<ParallelCorpus> {
        ParallelCorpus::read(
            Cursor::new(source.to_string()),
            Cursor::new(target.to_string()),
            Path::new("train.src"),
            Path::new("train.tgt"),
        )
    }

    #[test]
    fn reads_aligned_lines() {
        let corpus = read("a b\n  c d  \n", "x\ny z\n").unwrap();

        assert_eq!(2, corpus.len());
        assert_eq!(Some(("c d", "y z")), corpus.pair(1));
        assert_eq!(None, corpus.pair(2));
    }

    #[test]
    fn stops_at_first_blank_line_in_either_file() {
        let corpus = read("a\nb\nc\nd\n", "w\nx\n\nz\n").unwrap();
        assert_eq!(vec!["a", "b"], corpus.source());

        let corpus = read("a\n   \nc\n", "w\nx\ny\n").unwrap();
        assert_eq!(vec!["w"], corpus.target());
    }

    #[test]
    fn trailing_blank_line_in_longer_file_is_fine() {
        let corpus = read("a\nb\n\n", "w\nx\n").unwrap();
        assert_eq!(2, corpus.len());
    }

    #[test]
    fn unequal_files_are_not_aligned() {
        assert_matches!(
            read("a\nb\nc\n", "w\nx\n"),
            Err(BitextError::CorpusAlignment { line: 3, .. })
        );
        assert_matches!(
            read("a\n", "w\nx\n"),
            Err(BitextError::CorpusAlignment { line: 2, .. })
        );
    }

    #[test]
    fn in_memory_corpus_must_be_aligned() {
        assert_matches!(
            ParallelCorpus::new(vec!["a".into()], vec![]),
            Err(BitextError::CorpusLengthMismatch {
                source_len: 1,
                target_len: 0
            })
        );

        let corpus = ParallelCorpus::from_pairs([("a", "x"), ("b", "y"), ("c", "z")]);
        let (source, target) = corpus.slice(1..3);
        assert_eq!(["b", "c"], source);
        assert_eq!(["y", "z"], target);
    }

    #[test]
    fn load_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("train.src");
        std::fs::write(&source, "a\n").unwrap();

        assert_matches!(
            ParallelCorpus::load(&source, dir.path().join("missing.tgt")),
            Err(BitextError::FileIo { path, .. }) if path.ends_with("missing.tgt")
        );
    }
}
