//! Token-window text splitter.
//!
//! Splits document text into fixed-size windows of BPE tokens
//! (`cl100k_base`) with a fixed overlap between consecutive windows. Window
//! boundaries that fall inside a multi-byte character are nudged inward until
//! the window decodes to valid UTF-8.
//!
//! Each chunk gets a contiguous index starting at 0 plus a SHA-256 hash of
//! its text.

use anyhow::Result;
use sha2::{Digest, Sha256};
use tiktoken_rs::CoreBPE;

use crate::models::Chunk;

/// How far a window edge may move to land on a character boundary.
const MAX_BOUNDARY_SHIFT: usize = 3;

pub struct TokenTextSplitter {
    bpe: CoreBPE,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TokenTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            anyhow::bail!("chunk_size must be > 0");
        }
        if chunk_overlap >= chunk_size {
            anyhow::bail!("chunk_overlap must be smaller than chunk_size");
        }
        Ok(Self {
            bpe: tiktoken_rs::cl100k_base()?,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split `text` into token windows. Empty or whitespace-only text yields
    /// no windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(tokens.len());
            if let Some(piece) =
                decode_window(&tokens, start, end, |t| self.bpe.decode(t.to_vec()).ok())
            {
                if !piece.trim().is_empty() {
                    windows.push(piece);
                }
            }
            if end == tokens.len() {
                break;
            }
            start += step;
        }

        windows
    }

    /// Leading `max_tokens` tokens of `text`, used to bound summary prompts.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }
        decode_window(&tokens, 0, max_tokens, |t| self.bpe.decode(t.to_vec()).ok())
            .unwrap_or_default()
    }

    /// Split a document into [`Chunk`]s with contiguous indices.
    pub fn split_document(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(i, piece)| make_chunk(source_id, i as i64, piece))
            .collect()
    }
}

fn decode_window<T>(
    tokens: &[T],
    start: usize,
    end: usize,
    decode: impl Fn(&[T]) -> Option<String>,
) -> Option<String> {
    for shift_start in 0..=MAX_BOUNDARY_SHIFT {
        for shift_end in 0..=MAX_BOUNDARY_SHIFT {
            let s = start + shift_start;
            let e = end.saturating_sub(shift_end);
            if s >= e {
                continue;
            }
            if let Some(text) = decode(&tokens[s..e]) {
                return Some(text);
            }
        }
    }
    None
}

pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(source_id: &str, index: i64, text: String) -> Chunk {
    Chunk {
        source_id: source_id.to_string(),
        page: None,
        chunk_index: index,
        hash: hash_text(&text),
        text,
        summary: None,
        embedding: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let splitter = TokenTextSplitter::new(512, 20).unwrap();
        let chunks = splitter.split_document("doc1", "Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].source_id, "doc1");
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let splitter = TokenTextSplitter::new(512, 20).unwrap();
        assert!(splitter.split_document("doc1", "").is_empty());
        assert!(splitter.split_document("doc1", "   \n\n ").is_empty());
    }

    #[test]
    fn windows_respect_size_and_indices_are_contiguous() {
        let splitter = TokenTextSplitter::new(16, 4).unwrap();
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = splitter.split_document("doc1", &text);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert!(splitter.count_tokens(&c.text) <= 16 + 2);
        }
    }

    #[test]
    fn consecutive_windows_overlap() {
        let splitter = TokenTextSplitter::new(20, 5).unwrap();
        let text = (0..100)
            .map(|i| format!("alpha{} ", i))
            .collect::<String>();
        let windows = splitter.split_text(&text);
        assert!(windows.len() >= 2);
        let first_tail: String = windows[0]
            .split_whitespace()
            .last()
            .unwrap()
            .to_string();
        assert!(
            windows[1].contains(first_tail.as_str()),
            "expected '{}' in second window '{}'",
            first_tail,
            windows[1]
        );
    }

    #[test]
    fn vietnamese_text_stays_valid_utf8() {
        let splitter = TokenTextSplitter::new(7, 2).unwrap();
        let text = "Rối loạn trầm cảm chủ yếu được đặc trưng bởi tâm trạng buồn bã kéo dài. "
            .repeat(10);
        let windows = splitter.split_text(&text);
        assert!(!windows.is_empty());
        for w in &windows {
            assert!(!w.contains('\u{FFFD}'));
        }
    }

    #[test]
    fn deterministic() {
        let splitter = TokenTextSplitter::new(8, 2).unwrap();
        let text = "Alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let c1 = splitter.split_document("doc1", text);
        let c2 = splitter.split_document("doc1", text);
        assert_eq!(c1, c2);
    }

    #[test]
    fn truncate_bounds_tokens() {
        let splitter = TokenTextSplitter::new(8, 2).unwrap();
        let text = "one two three four five six seven eight nine ten";
        let cut = splitter.truncate(text, 3);
        assert!(splitter.count_tokens(&cut) <= 3);
        assert_eq!(splitter.truncate("short", 100), "short");
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(TokenTextSplitter::new(10, 10).is_err());
        assert!(TokenTextSplitter::new(0, 0).is_err());
    }
}
