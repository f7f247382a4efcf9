//! Streaming vocabulary builder with an open-addressing hash index.
//!
//! Mirrors the reference's `AddWordToVocab` / `SearchVocab` / `ReduceVocab` /
//! `SortVocab`, but stores each entry as a plain `Box<str>` rather than the
//! reference's inline-short-string union (a cache-locality trick that is
//! orthogonal to semantics; see DESIGN.md).

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::corpus::Tokenizer;
use crate::error::{Result, Word2VecError};

/// The end-of-sentence token. Always vocabulary index 0, never pruned.
pub const EOS_TOKEN: &str = "</s>";

/// Default hash-index capacity (2^21 slots). Grown only implicitly through
/// eager pruning, matching the reference's fixed-size hash table; callers
/// expecting very large vocabularies can pick a larger power of two with
/// [`Vocabulary::with_hash_bits`].
pub const DEFAULT_HASH_BITS: u32 = 21;

/// Load factor above which [`Vocabulary::learn_from_reader`] eagerly prunes.
const MAX_LOAD_FACTOR: f64 = 0.7;

/// A single vocabulary entry.
#[derive(Debug, Clone)]
pub struct VocabEntry {
    pub text: Box<str>,
    pub count: u64,
}

/// Token → index map with an open-addressing, linear-probing hash index.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: Vec<VocabEntry>,
    hash: Vec<i32>,
    hash_bits: u32,
    min_reduce: u64,
    train_words: u64,
}

impl Vocabulary {
    /// A new vocabulary containing only the `</s>` entry at index 0.
    pub fn new() -> Self {
        Self::with_hash_bits(DEFAULT_HASH_BITS)
    }

    /// Like [`Vocabulary::new`], but with an explicit hash-index size
    /// (`2^bits` slots). Useful for tests that want to exercise the
    /// eager-pruning path without a giant synthetic corpus.
    pub fn with_hash_bits(bits: u32) -> Self {
        let capacity = 1usize << bits;
        let mut vocab = Self {
            entries: Vec::new(),
            hash: vec![-1; capacity],
            hash_bits: bits,
            min_reduce: 1,
            train_words: 0,
        };
        vocab.add(EOS_TOKEN);
        vocab
    }

    #[inline]
    fn mask(&self) -> u64 {
        (1u64 << self.hash_bits) - 1
    }

    #[inline]
    fn capacity(&self) -> usize {
        1usize << self.hash_bits
    }

    fn hash_of(token: &str) -> u64 {
        let mut h: u64 = 1;
        for &b in token.as_bytes() {
            h = h.wrapping_mul(257).wrapping_add(b as u64);
        }
        h
    }

    /// Number of live entries, including `</s>`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total token occurrences across the vocabulary, set by
    /// [`Vocabulary::sort_and_prune`].
    pub fn train_words(&self) -> u64 {
        self.train_words
    }

    pub fn entry(&self, index: usize) -> &VocabEntry {
        &self.entries[index]
    }

    pub fn count(&self, index: usize) -> u64 {
        self.entries[index].count
    }

    pub fn text(&self, index: usize) -> &str {
        &self.entries[index].text
    }

    pub fn iter(&self) -> impl Iterator<Item = &VocabEntry> {
        self.entries.iter()
    }

    /// Probe from `hash(token)` until a hit or an empty slot.
    pub fn find(&self, token: &str) -> Option<usize> {
        let mask = self.mask();
        let mut slot = (Self::hash_of(token) & mask) as usize;
        loop {
            let idx = self.hash[slot];
            if idx < 0 {
                return None;
            }
            if self.entries[idx as usize].text.as_ref() == token {
                return Some(idx as usize);
            }
            slot = ((slot as u64 + 1) & mask) as usize;
        }
    }

    /// Append a new entry with count 1 and insert it into the hash index.
    /// The entry array grows geometrically for free via `Vec::push`.
    pub fn add(&mut self, token: &str) -> usize {
        let index = self.entries.len();
        self.entries.push(VocabEntry {
            text: token.into(),
            count: 1,
        });
        let mask = self.mask();
        let mut slot = (Self::hash_of(token) & mask) as usize;
        while self.hash[slot] != -1 {
            slot = ((slot as u64 + 1) & mask) as usize;
        }
        self.hash[slot] = index as i32;
        index
    }

    /// `count += 1`, saturating at `u64::MAX`.
    pub fn increment(&mut self, index: usize) {
        let entry = &mut self.entries[index];
        entry.count = entry.count.saturating_add(1);
    }

    fn rebuild_hash(&mut self) {
        for slot in self.hash.iter_mut() {
            *slot = -1;
        }
        let mask = self.mask();
        for (index, entry) in self.entries.iter().enumerate() {
            let mut slot = (Self::hash_of(&entry.text) & mask) as usize;
            while self.hash[slot] != -1 {
                slot = ((slot as u64 + 1) & mask) as usize;
            }
            self.hash[slot] = index as i32;
        }
    }

    /// Remove every entry with `count <= min_usage` (entry 0 always kept)
    /// and rebuild the hash index.
    pub fn reduce(&mut self, min_usage: u64) {
        let mut kept = Vec::with_capacity(self.entries.len());
        for (index, entry) in std::mem::take(&mut self.entries).into_iter().enumerate() {
            if index == 0 || entry.count > min_usage {
                kept.push(entry);
            }
        }
        self.entries = kept;
        self.rebuild_hash();
    }

    fn load_factor(&self) -> f64 {
        self.entries.len() as f64 / self.capacity() as f64
    }

    /// Sort entries `[1..)` by descending count, drop those below
    /// `min_count`, rebuild the hash index, and recompute `train_words`.
    pub fn sort_and_prune(&mut self, min_count: u64) {
        let mut rest = self.entries.split_off(1);
        rest.sort_by(|a, b| b.count.cmp(&a.count));
        rest.retain(|e| e.count >= min_count);
        self.entries.extend(rest);
        self.train_words = self.entries.iter().map(|e| e.count).sum();
        self.rebuild_hash();
    }

    /// Stream tokens from `reader`, building the vocabulary with eager
    /// pruning whenever the hash load factor exceeds 0.7, then sort and
    /// prune to `min_count`. Returns the number of tokens observed
    /// (including `</s>` emissions), i.e. the pre-prune token count.
    pub fn learn_from_reader<R: io::Read>(&mut self, reader: R, min_count: u64) -> io::Result<u64> {
        let mut tokenizer = Tokenizer::new(BufReader::new(reader));
        let mut tokens_seen = 0u64;
        while let Some(token) = tokenizer.next_token()? {
            tokens_seen += 1;
            match self.find(&token) {
                Some(index) => self.increment(index),
                None => {
                    self.add(&token);
                }
            }
            if self.load_factor() > MAX_LOAD_FACTOR {
                self.reduce(self.min_reduce);
                self.min_reduce += 1;
            }
        }
        self.sort_and_prune(min_count);
        Ok(tokens_seen)
    }

    /// Save as `<token> <count>` lines, one per entry, in vocabulary order.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        for entry in &self.entries {
            writeln!(writer, "{} {}", entry.text, entry.count)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load from the text format written by [`Vocabulary::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|_| Word2VecError::InputMissing {
            path: path.to_path_buf(),
        })?;
        let reader = BufReader::new(file);

        let mut vocab = Self {
            entries: Vec::new(),
            hash: vec![-1; 1usize << DEFAULT_HASH_BITS],
            hash_bits: DEFAULT_HASH_BITS,
            min_reduce: 1,
            train_words: 0,
        };

        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (text, count_str) = line.rsplit_once(' ').ok_or_else(|| Word2VecError::TruncatedRead {
                path: path.to_path_buf(),
            })?;
            let count: u64 = count_str.parse().map_err(|_| Word2VecError::TruncatedRead {
                path: path.to_path_buf(),
            })?;
            let index = vocab.add(text);
            vocab.entries[index].count = count;
        }

        if vocab.entries.is_empty() || vocab.entries[0].text.as_ref() != EOS_TOKEN {
            return Err(Word2VecError::TruncatedRead {
                path: path.to_path_buf(),
            });
        }

        vocab.sort_and_prune(0);
        Ok(vocab)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn new_vocab_has_only_eos() {
        let vocab = Vocabulary::new();
        assert_eq!(vocab.len(), 1);
        assert_eq!(vocab.text(0), EOS_TOKEN);
        assert_eq!(vocab.find(EOS_TOKEN), Some(0));
    }

    #[test]
    fn add_and_find_round_trip() {
        let mut vocab = Vocabulary::with_hash_bits(8);
        let a = vocab.add("apple");
        let b = vocab.add("banana");
        assert_eq!(vocab.find("apple"), Some(a));
        assert_eq!(vocab.find("banana"), Some(b));
        assert_eq!(vocab.find("cherry"), None);
    }

    #[test]
    fn hash_index_integrity_after_mutations() {
        let mut vocab = Vocabulary::with_hash_bits(6);
        let words = ["a", "b", "c", "d", "e", "f", "g", "h"];
        for w in words {
            vocab.add(w);
        }
        for (i, entry) in vocab.entries.clone().iter().enumerate() {
            assert_eq!(vocab.find(&entry.text), Some(i));
        }
        assert_eq!(vocab.find("never-inserted"), None);

        vocab.increment(2);
        vocab.reduce(1);
        for (i, entry) in vocab.entries.clone().iter().enumerate() {
            assert_eq!(vocab.find(&entry.text), Some(i));
        }
    }

    #[test]
    fn reduce_keeps_entry_zero_regardless_of_count() {
        let mut vocab = Vocabulary::with_hash_bits(6);
        vocab.add("rare");
        // </s> count is 1, below any min_usage >= 1, but must survive.
        vocab.reduce(5);
        assert_eq!(vocab.find(EOS_TOKEN), Some(0));
    }

    #[test]
    fn sort_and_prune_orders_descending_and_drops_rare() {
        let mut vocab = Vocabulary::with_hash_bits(8);
        let a = vocab.add("frequent");
        for _ in 0..9 {
            vocab.increment(a);
        }
        let b = vocab.add("rare");
        let c = vocab.add("mid");
        for _ in 0..4 {
            vocab.increment(c);
        }
        let _ = b;

        vocab.sort_and_prune(2);

        assert_eq!(vocab.text(0), EOS_TOKEN);
        assert_eq!(vocab.text(1), "frequent");
        assert_eq!(vocab.text(2), "mid");
        assert_eq!(vocab.find("rare"), None);
        assert_eq!(vocab.train_words(), 1 + 10 + 5);
    }

    #[test]
    fn learn_from_reader_counts_tokens() {
        let corpus = "a b a b a\nc d\n";
        let mut vocab = Vocabulary::with_hash_bits(8);
        vocab
            .learn_from_reader(Cursor::new(corpus), 1)
            .expect("learn should succeed");

        let a = vocab.find("a").expect("a present");
        assert_eq!(vocab.count(a), 3);
        let eos = vocab.find(EOS_TOKEN).expect("eos present");
        assert_eq!(vocab.count(eos), 2);
    }

    #[test]
    fn save_and_load_round_trip_preserves_multiset() {
        let corpus = "the quick brown fox jumps over the lazy dog the fox\n";
        let mut vocab = Vocabulary::with_hash_bits(8);
        vocab
            .learn_from_reader(Cursor::new(corpus), 1)
            .expect("learn should succeed");

        let dir = tempfile_dir();
        let path = dir.join("vocab.txt");
        vocab.save(&path).expect("save should succeed");
        let loaded = Vocabulary::load(&path).expect("load should succeed");

        let mut original: Vec<(String, u64)> = vocab
            .iter()
            .map(|e| (e.text.to_string(), e.count))
            .collect();
        let mut round_tripped: Vec<(String, u64)> = loaded
            .iter()
            .map(|e| (e.text.to_string(), e.count))
            .collect();
        original.sort();
        round_tripped.sort();
        assert_eq!(original, round_tripped);
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "word2vec-vocab-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
