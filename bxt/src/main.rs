use anyhow::Context;
use bitext::{BatchRecord, Language, Pipeline, PipelineConfig, Split};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;
use strum::IntoEnumIterator;
use tracing::*;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Globals {
    /// Pipeline config file describing the corpus, tokenizers and batch sizes
    #[arg(short, long, value_name = "FILE", global = true, env = "BXT_CONFIG")]
    config: Option<PathBuf>,

    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the batches of each split: row counts and padded widths
    Stats {
        /// Only report on this split (train, val or test)
        #[arg(long)]
        split: Option<Split>,
    },

    /// Write the batches of a split to stdout, one JSON object per line
    Dump {
        /// Which split to dump (train, val or test)
        #[arg(long, default_value_t = Split::Train)]
        split: Split,

        /// Stop after this many batches
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the ids and mask one sentence gets, as a batch of its own
    Encode {
        /// Which side's tokenizer and wrapping to use (source or target)
        #[arg(long, default_value_t = Language::Source)]
        side: Language,

        text: String,
    },
}

/// Min, max and mean of the padded widths of one side over a split
#[derive(Default)]
struct WidthStats {
    min: usize,
    max: usize,
    total: usize,
    batches: usize,
}

impl WidthStats {
    fn add(&mut self, width: usize) {
        self.min = if self.batches == 0 {
            width
        } else {
            self.min.min(width)
        };
        self.max = self.max.max(width);
        self.total += width;
        self.batches += 1;
    }

    fn mean(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.total as f64 / self.batches as f64
        }
    }
}

impl Commands {
    fn execute(self, globals: &Globals) -> anyhow::Result<()> {
        let config_path = globals
            .config
            .as_deref()
            .context("A pipeline config file is required; pass --config or set BXT_CONFIG")?;
        let config = PipelineConfig::load(config_path)
            .with_context(|| format!("Loading config {}", config_path.display()))?;
        let pipeline = Pipeline::from_config(&config)?;

        use Commands::*;
        match self {
            Stats { split } => {
                let splits: Vec<Split> = match split {
                    Some(split) => vec![split],
                    None => Split::iter().collect(),
                };

                for split in splits {
                    let batches = pipeline.batches(split)?;
                    let mut rows = 0;
                    let mut source = WidthStats::default();
                    let mut target = WidthStats::default();

                    for batch in &batches {
                        let batch = batch?;
                        rows += batch.rows();
                        source.add(batch.source_width());
                        target.add(batch.target_width());
                    }

                    println!(
                        "{split}: {rows} rows in {} batches of up to {}",
                        batches.len(),
                        batches.batch_size()
                    );
                    for (name, stats) in [("source", &source), ("target", &target)] {
                        println!(
                            "  {name} width: min {} max {} mean {:.1}",
                            stats.min,
                            stats.max,
                            stats.mean()
                        );
                    }
                }
            }
            Dump { split, limit } => {
                let batches = pipeline.batches(split)?;
                let stdout = std::io::stdout();
                let mut stdout = stdout.lock();

                for batch in batches.iter().take(limit.unwrap_or(usize::MAX)) {
                    let batch: BatchRecord = batch?;
                    serde_json::to_writer(&mut stdout, &batch)?;
                    writeln!(stdout)?;
                }
            }
            Encode { side, text } => {
                let (ids, mask) = pipeline.encode(side, &text)?;
                println!("ids:  {ids:?}");
                println!("mask: {mask:?}");
            }
        }

        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();
    let default_log_directive = match cli.globals.debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // JSON log events go to stderr, which keeps stdout clean for `dump`
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_directive.into())
                .from_env_lossy(),
        )
        .json()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    if let Err(e) = cli.command.execute(&cli.globals) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        exit(1);
    } else {
        debug!("command executed successfully");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify that there aren't any invalid attributes in the CLI specification that can only be
    /// detected at runtime
    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn parses_split_and_side_names() {
        let cli = Cli::try_parse_from(["bxt", "-c", "p.json", "dump", "--split", "val", "--limit", "2"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Dump {
                split: Split::Val,
                limit: Some(2)
            }
        ));

        let cli = Cli::try_parse_from(["bxt", "encode", "--side", "target", "hello"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Encode {
                side: Language::Target,
                ..
            }
        ));
    }

    #[test]
    fn width_stats() {
        let mut stats = WidthStats::default();
        for width in [7, 3, 5] {
            stats.add(width);
        }

        assert_eq!(3, stats.min);
        assert_eq!(7, stats.max);
        assert_eq!(5.0, stats.mean());
    }
}
