//! Tokenizer, per-worker corpus reader, and frequency-based subsampling.
//!
//! The tokenizer is shared between the vocabulary-learning pass and the
//! training pass, mirroring the reference's reuse of `ReadWord`/
//! `ReadWordIndex` in both `LearnVocabFromTrainFile` and `TrainModelThread`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, Word2VecError};
use crate::rng::Lcg64;
use crate::vocab::{Vocabulary, EOS_TOKEN};

/// Sentences longer than this are cut and processed as if `</s>` occurred.
pub const MAX_SENTENCE_LENGTH: usize = 1000;

/// Tokens longer than this are truncated, keeping the most recently read
/// byte in the last slot (matches the reference's `a--` truncation).
pub const MAX_TOKEN_LEN: usize = 100;

/// Byte-at-a-time tokenizer over any buffered reader.
///
/// A literal `\n` emits `</s>` immediately; a `\n` that terminates a
/// non-empty token is held back (`pending`) so the *next* call sees it and
/// emits `</s>` in turn, the same two-step sequence the reference gets from
/// `ungetc`.
pub struct Tokenizer<R> {
    reader: R,
    pending: Option<u8>,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: None,
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        let buf = self.reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        let b = buf[0];
        self.reader.consume(1);
        Ok(Some(b))
    }

    /// Read the next whitespace-delimited token, or `None` at end of input.
    pub fn next_token(&mut self) -> io::Result<Option<Box<str>>> {
        let mut buf: Vec<u8> = Vec::with_capacity(16);
        loop {
            let ch = match self.next_byte()? {
                Some(ch) => ch,
                None => {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(finish_token(buf)));
                }
            };
            match ch {
                b'\r' => continue,
                b' ' | b'\t' | b'\n' => {
                    if !buf.is_empty() {
                        if ch == b'\n' {
                            self.pending = Some(b'\n');
                        }
                        return Ok(Some(finish_token(buf)));
                    }
                    if ch == b'\n' {
                        return Ok(Some(EOS_TOKEN.into()));
                    }
                    // Leading space/tab: keep scanning for the token start.
                }
                _ => {
                    if buf.len() < MAX_TOKEN_LEN - 1 {
                        buf.push(ch);
                    } else {
                        *buf.last_mut().expect("buf non-empty once full") = ch;
                    }
                }
            }
        }
    }
}

fn finish_token(buf: Vec<u8>) -> Box<str> {
    String::from_utf8_lossy(&buf).into_owned().into_boxed_str()
}

/// `p_keep` for a token with corpus-wide `count`, per the reference's
/// subsampling formula. Strictly decreasing in `count` once
/// `count > sample * train_words`; equals (approximately) 1 at the crossover.
pub fn keep_probability(count: u64, sample: f32, train_words: u64) -> f64 {
    let threshold = sample as f64 * train_words as f64;
    let c = count as f64;
    ((c / threshold).sqrt() + 1.0) * threshold / c
}

/// A single worker's view of the training corpus: its own file handle,
/// seeked to its byte shard, with the tokenizer state that goes with it.
pub struct CorpusReader {
    tokenizer: Tokenizer<BufReader<File>>,
    start_offset: u64,
}

impl CorpusReader {
    /// Open `path` and seek to `⌊file_size · worker_id / num_workers⌋`.
    pub fn open(path: &Path, worker_id: u32, num_workers: u32) -> Result<Self> {
        let mut file = File::open(path).map_err(|_| Word2VecError::InputMissing {
            path: path.to_path_buf(),
        })?;
        let file_size = file.metadata()?.len();
        let start_offset = file_size / num_workers as u64 * worker_id as u64;
        file.seek(SeekFrom::Start(start_offset))?;
        Ok(Self {
            tokenizer: Tokenizer::new(BufReader::new(file)),
            start_offset,
        })
    }

    /// Reset to the start of this worker's shard for the next epoch.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.tokenizer.clear_pending();
        self.tokenizer.get_mut().get_mut().seek(SeekFrom::Start(self.start_offset))?;
        Ok(())
    }

    /// Fill one sentence the way `TrainModelThread`'s inner loop does:
    /// every in-vocabulary token (including `</s>`) counts toward the
    /// returned word count; `</s>` ends the sentence without being
    /// appended; OOV tokens are skipped and uncounted; subsampling may drop
    /// a counted token after the count but before it is appended.
    ///
    /// Returns `(sentence, words_counted, eof)`.
    pub fn next_sentence(
        &mut self,
        vocab: &Vocabulary,
        sample: f32,
        train_words: u64,
        rng: &mut Lcg64,
    ) -> io::Result<(Vec<usize>, u64, bool)> {
        let mut sentence = Vec::new();
        let mut words_counted = 0u64;
        let mut eof = false;

        loop {
            let token = match self.tokenizer.next_token()? {
                Some(token) => token,
                None => {
                    eof = true;
                    break;
                }
            };
            let Some(index) = vocab.find(&token) else {
                continue;
            };
            words_counted += 1;
            if index == 0 {
                break;
            }
            if sample > 0.0 {
                let count = vocab.count(index);
                let keep = keep_probability(count, sample, train_words);
                if rng.next_unit_f32() as f64 > keep {
                    continue;
                }
            }
            sentence.push(index);
            if sentence.len() >= MAX_SENTENCE_LENGTH {
                break;
            }
        }

        Ok((sentence, words_counted, eof))
    }
}

/// Byte length of `path`, used to size the per-worker shards.
pub fn file_size(path: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(path).map_err(|_| Word2VecError::InputMissing {
        path: path.to_path_buf(),
    })?;
    Ok(metadata.len())
}
