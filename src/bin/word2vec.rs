//! `word2vec` — CLI entry point: parses arguments, builds or loads the
//! vocabulary, builds the Huffman codes and sampling table, runs the
//! training engine, and writes the resulting model.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use word2vec::huffman::build_huffman_codes;
use word2vec::model_writer::write_model;
use word2vec::sampling::DEFAULT_TABLE_LEN;
use word2vec::train::{TrainConfig, TrainingEngine, default_alpha};
use word2vec::vocab::Vocabulary;
use word2vec::{Result, Word2VecError};

#[derive(Parser)]
#[command(name = "word2vec")]
#[command(about = "Parallel, lock-free CBOW / skip-gram word embedding trainer")]
struct Cli {
    /// Training corpus path.
    #[arg(long)]
    train: PathBuf,

    /// Output model path.
    #[arg(long)]
    output: PathBuf,

    /// Embedding dimension.
    #[arg(long, default_value_t = 100)]
    size: usize,

    /// Max skip/context distance.
    #[arg(long, default_value_t = 5)]
    window: usize,

    /// Subsampling threshold for frequent tokens (0 disables).
    #[arg(long, default_value_t = 1e-3)]
    sample: f32,

    /// Use hierarchical softmax.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1), default_value_t = 0)]
    hs: u8,

    /// Number of negative samples (0 disables negative sampling).
    #[arg(long, default_value_t = 5)]
    negative: u32,

    /// Worker thread count; defaults to the detected logical core count.
    #[arg(long)]
    threads: Option<usize>,

    /// Training epochs.
    #[arg(long, default_value_t = 5)]
    iter: u32,

    /// Minimum token frequency to keep in the vocabulary.
    #[arg(long = "min-count", default_value_t = 5)]
    min_count: u64,

    /// Starting learning rate; defaults to 0.05 (CBOW) / 0.025 (skip-gram).
    #[arg(long)]
    alpha: Option<f32>,

    /// Accepted for CLI compatibility; K-means post-clustering is out of
    /// scope and a nonzero value only logs a warning.
    #[arg(long, default_value_t = 0)]
    classes: u32,

    /// Logging verbosity: 0 = warnings only, 1 = info, 2+ = debug.
    #[arg(long, default_value_t = 2)]
    debug: u32,

    /// Write the model in binary (1) or text (0) form.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1), default_value_t = 0)]
    binary: u8,

    /// Save the learned vocabulary to this path.
    #[arg(long = "save-vocab")]
    save_vocab: Option<PathBuf>,

    /// Load a previously saved vocabulary instead of scanning the corpus.
    #[arg(long = "read-vocab")]
    read_vocab: Option<PathBuf>,

    /// Use the CBOW architecture (1) or skip-gram (0).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1), default_value_t = 1)]
    cbow: u8,
}

fn main() -> ExitCode {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("word2vec panicked: {panic_info}");
    }));

    let cli = Cli::parse();
    let _ = word2vec::logging::init_logging(word2vec::logging::debug_level_to_tracing(cli.debug));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "word2vec failed");
            eprintln!("word2vec: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if !cli.train.exists() {
        return Err(Word2VecError::InputMissing { path: cli.train });
    }
    if cli.classes != 0 {
        warn!(classes = cli.classes, "K-means post-clustering is not implemented; writing vectors instead");
    }

    let cbow = cli.cbow != 0;
    let hs = cli.hs != 0;
    let alpha = cli.alpha.unwrap_or_else(|| default_alpha(cbow));
    let threads = cli.threads.unwrap_or_else(num_cpus::get);

    let vocab = match &cli.read_vocab {
        Some(path) => {
            info!(path = %path.display(), "reading vocabulary");
            Vocabulary::load(path)?
        }
        None => {
            info!(path = %cli.train.display(), "learning vocabulary from corpus");
            let mut vocab = Vocabulary::new();
            let file = std::fs::File::open(&cli.train).map_err(|_| Word2VecError::InputMissing {
                path: cli.train.clone(),
            })?;
            vocab.learn_from_reader(file, cli.min_count)?;
            vocab
        }
    };
    info!(vocab_size = vocab.len(), train_words = vocab.train_words(), "vocabulary ready");

    if let Some(path) = &cli.save_vocab {
        vocab.save(path)?;
        info!(path = %path.display(), "vocabulary saved");
    }

    let counts: Vec<u64> = vocab.iter().map(|e| e.count).collect();
    let huffman = build_huffman_codes(&counts);

    let config = TrainConfig {
        dim: cli.size,
        window: cli.window,
        sample: cli.sample,
        hs,
        negative: cli.negative,
        threads,
        iter: cli.iter,
        min_count: cli.min_count,
        alpha,
        cbow,
        table_len: DEFAULT_TABLE_LEN,
    };

    info!(threads, dim = cli.size, cbow, hs, negative = cli.negative, "starting training");
    let engine = TrainingEngine::new(config, vocab, huffman, &cli.train, 1)?;
    engine.run()?;

    write_model(&cli.output, engine.vocab(), engine.in_vec(), cli.binary != 0)?;
    info!(path = %cli.output.display(), "model written");

    Ok(())
}
