//! word2vec - a parallel, lock-free training engine for CBOW and skip-gram
//! word embeddings, with hierarchical softmax and negative sampling output
//! objectives.
//!
//! The library exposes each stage of the pipeline as its own module so it
//! can be tested and driven independently; [`train::TrainingEngine`] ties
//! them together into the end-to-end training run the CLI drives.

pub mod corpus;
pub mod error;
pub mod huffman;
pub mod logging;
pub mod model_writer;
pub mod numeric;
pub mod params;
pub mod rng;
pub mod sampling;
pub mod sigmoid;
pub mod train;
pub mod vocab;

pub use error::{Result, Word2VecError};
pub use train::{TrainConfig, TrainingEngine, default_alpha};
pub use vocab::Vocabulary;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
