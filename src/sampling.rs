//! Unigram sampling table for negative sampling.
//!
//! A flat table of vocabulary indices whose occupancy is proportional to
//! `count(i)^0.75`, so drawing a uniformly-random slot yields a negative
//! sample from (an approximation of) the smoothed unigram distribution in
//! O(1), at the cost of `table_len` memory up front.

/// Default table length (the reference's `table_size`). Callers building
/// small vocabularies for tests should pass a smaller length explicitly.
pub const DEFAULT_TABLE_LEN: usize = 1 << 27;

/// Smoothing exponent applied to raw counts before building the table.
const POWER: f64 = 0.75;

pub struct SamplingTable {
    table: Vec<u32>,
}

impl SamplingTable {
    /// Build a table of `table_len` slots from `counts`, one entry per
    /// vocabulary index (any order; unlike the Huffman builder this does
    /// not require descending-count order).
    pub fn build(counts: &[u64], table_len: usize) -> Self {
        assert!(!counts.is_empty(), "cannot build a sampling table from an empty vocabulary");
        assert!(table_len > 0);

        let total_pow: f64 = counts.iter().map(|&c| (c as f64).powf(POWER)).sum();
        let mut table = Vec::with_capacity(table_len);
        let mut index = 0usize;
        let mut cumulative = (counts[0] as f64).powf(POWER) / total_pow;

        for slot in 0..table_len {
            table.push(index as u32);
            if (slot as f64 / table_len as f64) > cumulative && index + 1 < counts.len() {
                index += 1;
                cumulative += (counts[index] as f64).powf(POWER) / total_pow;
            }
        }

        Self { table }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The vocabulary index stored at `slot`.
    #[inline]
    pub fn get(&self, slot: usize) -> usize {
        self.table[slot] as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_full_index_range_in_order() {
        let counts = vec![100u64, 50, 25, 10, 1];
        let table = SamplingTable::build(&counts, 1000);
        let mut last = 0usize;
        for slot in 0..table.len() {
            let idx = table.get(slot);
            assert!(idx >= last, "table must be non-decreasing");
            assert!(idx < counts.len());
            last = idx;
        }
        assert_eq!(table.get(table.len() - 1), counts.len() - 1);
    }

    #[test]
    fn frequent_words_occupy_more_slots() {
        let counts = vec![1000u64, 1];
        let table = SamplingTable::build(&counts, 10_000);
        let occupied_by_zero = (0..table.len()).filter(|&s| table.get(s) == 0).count();
        let occupied_by_one = table.len() - occupied_by_zero;
        assert!(occupied_by_zero > occupied_by_one * 10);
    }

    #[test]
    fn single_word_vocab_fills_whole_table() {
        let table = SamplingTable::build(&[42], 128);
        for slot in 0..table.len() {
            assert_eq!(table.get(slot), 0);
        }
    }

    #[test]
    fn marginal_distribution_approximates_smoothed_unigram() {
        let counts = vec![400u64, 300, 200, 100];
        let table = SamplingTable::build(&counts, 200_000);
        let total_pow: f64 = counts.iter().map(|&c| (c as f64).powf(0.75)).sum();
        let mut occurrences = vec![0u64; counts.len()];
        for slot in 0..table.len() {
            occurrences[table.get(slot)] += 1;
        }
        for (i, &count) in counts.iter().enumerate() {
            let expected = (count as f64).powf(0.75) / total_pow;
            let observed = occurrences[i] as f64 / table.len() as f64;
            assert!(
                (expected - observed).abs() < 0.01,
                "index {i}: expected {expected} observed {observed}"
            );
        }
    }
}
