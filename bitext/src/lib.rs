//! Bitext turns a line-aligned parallel corpus into batches of token ids for training
//! sequence-to-sequence models.
//!
//! The moving parts, leaves first:
//!
//! - [`truncate`], [`pad_and_mask`] and [`trim`] reshape one token id sequence.
//! - A [`Tokenizer`] turns text into ids.  Tokenizers for SentencePiece style vocabularies and
//!   for the `tiktoken` encodings are included.
//! - [`BatchIterator`] walks a range of a [`ParallelCorpus`] in fixed size chunks, producing a
//!   [`BatchRecord`] of padded ids and attention masks for each chunk.
//! - [`Pipeline`] wires all of that up from a [`PipelineConfig`] file, with one iterator per
//!   train/validation/test [`Split`].
mod batch;
mod config;
mod corpus;
mod decode;
mod error;
mod pipeline;
mod progress;
mod split;
mod token;
mod tokenizer;
mod training;
mod trim;

pub use batch::*;
pub use config::*;
pub use corpus::*;
pub use decode::*;
pub use error::*;
pub use pipeline::*;
pub use progress::*;
pub use split::*;
pub use token::*;
pub use tokenizer::*;
pub use training::*;
pub use trim::*;

pub type Result<T> = std::result::Result<T, BitextError>;

#[cfg(test)]
pub mod test_helpers {
    use std::sync::OnceLock;
    use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

    static TRACING: OnceLock<()> = OnceLock::new();

    /// Initialize tracing for tests with a stdout subscriber.
    /// Safe to call multiple times - will only initialize once.
    pub fn init_test_logging() {
        TRACING.get_or_init(|| {
            let filter = std::env::var("RUST_LOG")
                .map(EnvFilter::new)
                .unwrap_or_else(|_| EnvFilter::new("debug"));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_span_events(FmtSpan::CLOSE)
                .with_test_writer()
                .try_init()
                .ok();
        });
    }
}
