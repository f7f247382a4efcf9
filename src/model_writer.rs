//! Serializes a trained input-embedding matrix to the output artifact.
//!
//! Format: header `"{vocab_size} {dim}\n"`, then one record per vocabulary
//! entry in vocabulary order: `"<token> "` followed by `dim` floats —
//! native-endian binary with no separators in binary mode, or space-
//! separated decimal text otherwise — terminated by `\n`.

use std::io::{BufWriter, Write};
use std::path::Path;

use bytemuck::cast_slice;

use crate::error::Result;
use crate::params::SharedMatrix;
use crate::vocab::Vocabulary;

/// Write `in_vec` (one row per `vocab` entry, in vocabulary order) to
/// `path`, in binary or text form.
pub fn write_model(path: impl AsRef<Path>, vocab: &Vocabulary, in_vec: &SharedMatrix, binary: bool) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{} {}", vocab.len(), in_vec.dim())?;

    for index in 0..vocab.len() {
        write!(writer, "{} ", vocab.text(index))?;
        let row = in_vec.row(index);
        if binary {
            writer.write_all(cast_slice(row))?;
        } else {
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    write!(writer, " ")?;
                }
                write!(writer, "{value}")?;
            }
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Lcg64;
    use std::io::BufRead;

    fn sample_vocab_and_matrix(dim: usize) -> (Vocabulary, SharedMatrix) {
        let mut vocab = Vocabulary::with_hash_bits(6);
        vocab.add("cat");
        vocab.add("dog");
        let mut matrix = SharedMatrix::zeroed(vocab.len(), dim).unwrap();
        let mut rng = Lcg64::new(11);
        matrix.randomize_uniform(&mut rng);
        (vocab, matrix)
    }

    #[test]
    fn text_mode_header_and_row_count_match_vocab() {
        let (vocab, matrix) = sample_vocab_and_matrix(4);
        let dir = std::env::temp_dir().join(format!("word2vec-model-writer-text-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.txt");

        write_model(&path, &vocab, &matrix, false).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut lines = std::io::BufReader::new(file).lines();
        let header = lines.next().unwrap().unwrap();
        assert_eq!(header, format!("{} {}", vocab.len(), matrix.dim()));
        let body_lines: Vec<String> = lines.map(|l| l.unwrap()).collect();
        assert_eq!(body_lines.len(), vocab.len());
        assert!(body_lines[0].starts_with(vocab.text(0)));
    }

    #[test]
    fn binary_and_text_modes_encode_equal_matrices() {
        let (vocab, matrix) = sample_vocab_and_matrix(6);
        let dir = std::env::temp_dir().join(format!("word2vec-model-writer-bin-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let text_path = dir.join("model_text.txt");
        let bin_path = dir.join("model_bin.bin");

        write_model(&text_path, &vocab, &matrix, false).unwrap();
        write_model(&bin_path, &vocab, &matrix, true).unwrap();

        let text_rows = parse_text_model(&text_path);
        let bin_rows = parse_binary_model(&bin_path);
        assert_eq!(text_rows.len(), bin_rows.len());
        for (t, b) in text_rows.iter().zip(&bin_rows) {
            assert_eq!(t.0, b.0);
            for (x, y) in t.1.iter().zip(&b.1) {
                assert!((x - y).abs() < 1e-6);
            }
        }
    }

    fn parse_text_model(path: &Path) -> Vec<(String, Vec<f32>)> {
        let content = std::fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        let header: Vec<usize> = lines.next().unwrap().split(' ').map(|s| s.parse().unwrap()).collect();
        let dim = header[1];
        let mut rows = Vec::new();
        for line in lines {
            let mut parts = line.splitn(2, ' ');
            let token = parts.next().unwrap().to_string();
            let values: Vec<f32> = parts
                .next()
                .unwrap()
                .split(' ')
                .take(dim)
                .map(|s| s.parse().unwrap())
                .collect();
            rows.push((token, values));
        }
        rows
    }

    fn parse_binary_model(path: &Path) -> Vec<(String, Vec<f32>)> {
        let bytes = std::fs::read(path).unwrap();
        let newline = bytes.iter().position(|&b| b == b'\n').unwrap();
        let header = std::str::from_utf8(&bytes[..newline]).unwrap();
        let mut header_parts = header.split(' ');
        let vocab_size: usize = header_parts.next().unwrap().parse().unwrap();
        let dim: usize = header_parts.next().unwrap().parse().unwrap();

        let mut offset = newline + 1;
        let mut rows = Vec::with_capacity(vocab_size);
        for _ in 0..vocab_size {
            let space = bytes[offset..].iter().position(|&b| b == b' ').unwrap();
            let token = std::str::from_utf8(&bytes[offset..offset + space]).unwrap().to_string();
            offset += space + 1;
            let floats_bytes = &bytes[offset..offset + dim * 4];
            let floats: Vec<f32> = cast_slice(floats_bytes).to_vec();
            offset += dim * 4;
            assert_eq!(bytes[offset], b'\n');
            offset += 1;
            rows.push((token, floats));
        }
        rows
    }
}
