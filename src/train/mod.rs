//! The parallel, lock-free training engine: CBOW and skip-gram, each with
//! hierarchical softmax and/or negative sampling, driven by pre-spawned
//! `std::thread::spawn` workers sharing the parameter matrices through
//! [`crate::params::SharedMatrix`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, info};

use crate::corpus::CorpusReader;
use crate::error::{Result, Word2VecError};
use crate::huffman::HuffmanCode;
use crate::numeric;
use crate::params::SharedMatrix;
use crate::rng::Lcg64;
use crate::sampling::SamplingTable;
use crate::sigmoid::sigmoid;
use crate::vocab::Vocabulary;

/// Tokens processed between learning-rate/progress updates, matching the
/// reference's `10000` boundary.
const PROGRESS_INTERVAL: u64 = 10_000;

/// Immutable training configuration, built once from CLI arguments and
/// shared with every worker by `Arc` (no process-wide globals).
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub dim: usize,
    pub window: usize,
    pub sample: f32,
    pub hs: bool,
    pub negative: u32,
    pub threads: usize,
    pub iter: u32,
    pub min_count: u64,
    pub alpha: f32,
    pub cbow: bool,
    pub table_len: usize,
}

/// The reference's default starting learning rate, conditioned on
/// architecture: 0.025 for skip-gram, 0.05 for CBOW.
pub fn default_alpha(cbow: bool) -> f32 {
    if cbow { 0.05 } else { 0.025 }
}

struct EngineShared {
    config: TrainConfig,
    vocab: Vocabulary,
    huffman: Vec<HuffmanCode>,
    sampling_table: Option<SamplingTable>,
    in_vec: SharedMatrix,
    hs_vec: Option<SharedMatrix>,
    neg_vec: Option<SharedMatrix>,
    word_count_actual: AtomicU64,
    alpha_bits: AtomicU32,
    train_words: u64,
    corpus_path: PathBuf,
    started_at: Instant,
}

/// Orchestrates vocabulary-derived tables and the worker pool. Owns the
/// parameter matrices for the lifetime of a training run.
pub struct TrainingEngine {
    shared: Arc<EngineShared>,
}

impl TrainingEngine {
    /// Build the parameter matrices and wrap everything workers need behind
    /// one `Arc`. `init_seed` drives the deterministic uniform init of
    /// `in_vec`.
    pub fn new(
        config: TrainConfig,
        vocab: Vocabulary,
        huffman: Vec<HuffmanCode>,
        corpus_path: impl Into<PathBuf>,
        init_seed: u64,
    ) -> Result<Self> {
        let vocab_size = vocab.len();
        let mut in_vec = SharedMatrix::zeroed(vocab_size, config.dim)?;
        let mut init_rng = Lcg64::new(init_seed);
        in_vec.randomize_uniform(&mut init_rng);

        let hs_vec = if config.hs {
            Some(SharedMatrix::zeroed(vocab_size, config.dim)?)
        } else {
            None
        };
        let neg_vec = if config.negative > 0 {
            Some(SharedMatrix::zeroed(vocab_size, config.dim)?)
        } else {
            None
        };

        let sampling_table = if config.negative > 0 {
            let counts: Vec<u64> = vocab.iter().map(|e| e.count).collect();
            Some(SamplingTable::build(&counts, config.table_len))
        } else {
            None
        };

        let train_words = vocab.train_words();
        let starting_alpha = config.alpha;

        Ok(Self {
            shared: Arc::new(EngineShared {
                config,
                vocab,
                huffman,
                sampling_table,
                in_vec,
                hs_vec,
                neg_vec,
                word_count_actual: AtomicU64::new(0),
                alpha_bits: AtomicU32::new(starting_alpha.to_bits()),
                train_words,
                corpus_path: corpus_path.into(),
                started_at: Instant::now(),
            }),
        })
    }

    /// Spawn `config.threads` workers, run them to completion, and join
    /// every one. Returns an error without touching any output if at least
    /// one worker failed.
    pub fn run(&self) -> Result<()> {
        let num_workers = self.shared.config.threads.max(1);
        let mut handles = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let shared = Arc::clone(&self.shared);
            handles.push(std::thread::spawn(move || {
                worker_loop(worker_id, num_workers, &shared)
            }));
        }

        let mut failed = 0usize;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "training worker returned an error");
                    failed += 1;
                }
                Err(_) => {
                    tracing::error!("training worker panicked");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(Word2VecError::WorkerFailure {
                failed,
                total: num_workers,
            });
        }

        let elapsed = self.shared.started_at.elapsed();
        let words_per_sec = self.shared.word_count_actual.load(Ordering::Relaxed) as f64
            / elapsed.as_secs_f64().max(1e-6);
        info!(
            elapsed_secs = elapsed.as_secs_f64(),
            words_per_sec, "training complete"
        );
        Ok(())
    }

    /// The trained input-embedding matrix, ready for [`crate::model_writer`].
    pub fn in_vec(&self) -> &SharedMatrix {
        &self.shared.in_vec
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.shared.vocab
    }
}

fn schedule_alpha(starting_alpha: f32, word_count_actual: u64, iter: u32, train_words: u64) -> f32 {
    let denom = iter as f64 * train_words as f64 + 1.0;
    let frac = word_count_actual as f64 / denom;
    let floor = starting_alpha as f64 * 0.0001;
    (starting_alpha as f64 * (1.0 - frac)).max(floor) as f32
}

fn worker_loop(worker_id: usize, num_workers: usize, shared: &EngineShared) -> Result<()> {
    let mut reader = CorpusReader::open(&shared.corpus_path, worker_id as u32, num_workers as u32)?;
    let mut rng = Lcg64::new(worker_id as u64);
    let mut h = vec![0f32; shared.config.dim];
    let mut e = vec![0f32; shared.config.dim];

    let mut word_count = 0u64;
    let mut last_word_count = 0u64;
    let mut local_iter = shared.config.iter;
    let per_worker_budget = shared.train_words / num_workers as u64;

    loop {
        let (sentence, words_counted, eof) =
            reader.next_sentence(&shared.vocab, shared.config.sample, shared.train_words, &mut rng)?;
        word_count += words_counted;

        if eof || word_count > per_worker_budget {
            let delta = word_count - last_word_count;
            let total = shared.word_count_actual.fetch_add(delta, Ordering::Relaxed) + delta;
            report_progress(shared, worker_id, total);

            local_iter -= 1;
            if local_iter == 0 {
                break;
            }
            word_count = 0;
            last_word_count = 0;
            reader.rewind()?;
            continue;
        }

        for position in 0..sentence.len() {
            if word_count - last_word_count > PROGRESS_INTERVAL {
                let delta = word_count - last_word_count;
                last_word_count = word_count;
                let total = shared.word_count_actual.fetch_add(delta, Ordering::Relaxed) + delta;
                report_progress(shared, worker_id, total);
            }

            let alpha = f32::from_bits(shared.alpha_bits.load(Ordering::Relaxed));
            if shared.config.cbow {
                train_cbow_position(shared, &sentence, position, &mut rng, &mut h, &mut e, alpha);
            } else {
                train_skipgram_position(shared, &sentence, position, &mut rng, &mut e, alpha);
            }
        }
    }

    Ok(())
}

fn report_progress(shared: &EngineShared, worker_id: usize, total_words: u64) {
    let new_alpha = schedule_alpha(
        shared.config.alpha,
        total_words,
        shared.config.iter,
        shared.train_words,
    );
    shared.alpha_bits.store(new_alpha.to_bits(), Ordering::Relaxed);
    let progress = total_words as f64 / (shared.config.iter as f64 * shared.train_words as f64 + 1.0) * 100.0;
    debug!(worker_id, alpha = new_alpha, progress_pct = progress, "training progress");
}

fn context_bounds(position: usize, window: usize, shrink: usize, sentence_len: usize) -> impl Iterator<Item = usize> {
    let lo = shrink;
    let hi = 2 * window + 1 - shrink;
    (lo..hi).filter(move |&a| a != window).filter_map(move |a| {
        let c = position as isize - window as isize + a as isize;
        if c < 0 || c as usize >= sentence_len {
            None
        } else {
            Some(c as usize)
        }
    })
}

fn draw_negative(rng: &mut Lcg64, sampling_table: &SamplingTable) -> usize {
    sampling_table.get(rng.next_table_slot(sampling_table.len()))
}

fn apply_hierarchical_softmax(hs_vec: &SharedMatrix, code: &HuffmanCode, h: &[f32], e: &mut [f32], alpha: f32) {
    for d in 0..code.code.len() {
        let row = unsafe { hs_vec.row_mut(code.point[d]) };
        let f = sigmoid(numeric::dot(h, row));
        let g = (1.0 - code.code[d] as f32 - f) * alpha;
        numeric::axpy(e, g, row);
        numeric::axpy(row, g, h);
    }
}

/// Negative-sampling gradient pass for one target word. Keeps the
/// reference's one-iteration-delayed `target` reuse: a draw that collides
/// with the positive word is skipped without a gradient update, and the
/// colliding candidate becomes the next iteration's target rather than
/// being re-rolled immediately.
#[allow(clippy::too_many_arguments)]
fn apply_negative_sampling(
    neg_vec: &SharedMatrix,
    sampling_table: &SamplingTable,
    rng: &mut Lcg64,
    negative: u32,
    vocab_size: usize,
    target_word: usize,
    h: &[f32],
    e: &mut [f32],
    alpha: f32,
) {
    let mut target = target_word;
    let mut label = 1.0f32;
    let mut next_target = draw_negative(rng, sampling_table);

    for d in 0..=negative {
        if d > 0 {
            next_target = draw_negative(rng, sampling_table);
            if target == 0 {
                target = rng.next_below((vocab_size - 1) as u64) as usize + 1;
            }
            if target == target_word {
                target = next_target;
                continue;
            }
            label = 0.0;
        }

        let row = unsafe { neg_vec.row_mut(target) };
        let f = sigmoid(numeric::dot(h, row));
        let g = (label - f) * alpha;
        numeric::axpy(e, g, row);
        numeric::axpy(row, g, h);

        target = next_target;
    }
}

#[allow(clippy::too_many_arguments)]
fn train_cbow_position(
    shared: &EngineShared,
    sentence: &[usize],
    position: usize,
    rng: &mut Lcg64,
    h: &mut [f32],
    e: &mut [f32],
    alpha: f32,
) {
    let window = shared.config.window;
    let shrink = rng.next_below(window as u64) as usize;
    let target_word = sentence[position];

    h.fill(0.0);
    e.fill(0.0);

    let mut count = 0usize;
    for c in context_bounds(position, window, shrink, sentence.len()) {
        numeric::add(h, shared.in_vec.row(sentence[c]));
        count += 1;
    }
    if count == 0 {
        return;
    }
    let inv = 1.0 / count as f32;
    for v in h.iter_mut() {
        *v *= inv;
    }

    if let Some(hs_vec) = &shared.hs_vec {
        apply_hierarchical_softmax(hs_vec, &shared.huffman[target_word], h, e, alpha);
    }
    if let Some(neg_vec) = &shared.neg_vec {
        apply_negative_sampling(
            neg_vec,
            shared.sampling_table.as_ref().expect("neg_vec implies a sampling table"),
            rng,
            shared.config.negative,
            shared.vocab.len(),
            target_word,
            h,
            e,
            alpha,
        );
    }

    for c in context_bounds(position, window, shrink, sentence.len()) {
        numeric::add(unsafe { shared.in_vec.row_mut(sentence[c]) }, e);
    }
}

fn train_skipgram_position(
    shared: &EngineShared,
    sentence: &[usize],
    position: usize,
    rng: &mut Lcg64,
    e: &mut [f32],
    alpha: f32,
) {
    let window = shared.config.window;
    let shrink = rng.next_below(window as u64) as usize;
    let target_word = sentence[position];

    // The inner per-context loop draws from an isolated copy so that
    // negative-sample draws for one context word never perturb the window
    // shrink draw for the next training position.
    let mut local_rng = rng.clone();

    for c in context_bounds(position, window, shrink, sentence.len()) {
        let ctx_word = sentence[c];
        e.fill(0.0);

        let row = unsafe { shared.in_vec.row_mut(ctx_word) };

        if let Some(hs_vec) = &shared.hs_vec {
            apply_hierarchical_softmax(hs_vec, &shared.huffman[target_word], &*row, e, alpha);
        }
        if let Some(neg_vec) = &shared.neg_vec {
            apply_negative_sampling(
                neg_vec,
                shared.sampling_table.as_ref().expect("neg_vec implies a sampling table"),
                &mut local_rng,
                shared.config.negative,
                shared.vocab.len(),
                target_word,
                &*row,
                e,
                alpha,
            );
        }

        numeric::add(row, e);
    }

    rng.set_state(local_rng.state());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::huffman::build_huffman_codes;
    use std::io::Write;

    fn write_corpus(tokens: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("word2vec-train-test-{}-{}", std::process::id(), tokens.len()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("corpus.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(tokens.as_bytes()).unwrap();
        path
    }

    fn build_vocab(path: &Path, min_count: u64) -> Vocabulary {
        let mut vocab = Vocabulary::with_hash_bits(10);
        let file = std::fs::File::open(path).unwrap();
        vocab.learn_from_reader(file, min_count).unwrap();
        vocab
    }

    #[test]
    fn cbow_negative_sampling_learns_co_occurrence() {
        let corpus_text = "a b a b a b a b a b a b a b a b a b a b ".repeat(200);
        let path = write_corpus(&corpus_text);
        let vocab = build_vocab(&path, 1);
        let counts: Vec<u64> = vocab.iter().map(|e| e.count).collect();
        let huffman = build_huffman_codes(&counts);

        let config = TrainConfig {
            dim: 8,
            window: 2,
            sample: 0.0,
            hs: false,
            negative: 5,
            threads: 2,
            iter: 5,
            min_count: 1,
            alpha: 0.05,
            cbow: true,
            table_len: 10_000,
        };

        let engine = TrainingEngine::new(config, vocab, huffman, &path, 7).unwrap();
        engine.run().unwrap();

        let a = engine.vocab().find("a").unwrap();
        let b = engine.vocab().find("b").unwrap();
        let cos = cosine(engine.in_vec().row(a), engine.in_vec().row(b));
        assert!(cos > 0.5, "expected a,b to end up close, cos={cos}");
    }

    #[test]
    fn skipgram_hierarchical_softmax_runs_without_panicking() {
        let corpus_text = "the quick brown fox ".repeat(300);
        let path = write_corpus(&corpus_text);
        let vocab = build_vocab(&path, 1);
        let counts: Vec<u64> = vocab.iter().map(|e| e.count).collect();
        let huffman = build_huffman_codes(&counts);

        let config = TrainConfig {
            dim: 8,
            window: 2,
            sample: 0.0,
            hs: true,
            negative: 0,
            threads: 2,
            iter: 2,
            min_count: 1,
            alpha: 0.025,
            cbow: false,
            table_len: 1,
        };

        let engine = TrainingEngine::new(config, vocab, huffman, &path, 3).unwrap();
        engine.run().unwrap();
        assert_eq!(engine.in_vec().rows(), engine.vocab().len());
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot = numeric::dot(a, b);
        let na = numeric::dot(a, a).sqrt();
        let nb = numeric::dot(b, b).sqrt();
        dot / (na * nb)
    }
}
