use docqa_error::{DocqaError, Result};
use serde::{Deserialize, Serialize};

use crate::parser::ParsedPage;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            overlap: 200,
        }
    }
}

/// A chunk of page text together with the page it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PageChunk {
    pub page: Option<i32>,
    pub text: String,
}

/// Sliding-window chunker over Unicode scalar values. Chunks never cross a
/// page boundary, so every chunk carries an unambiguous page number for
/// citation.
#[derive(Debug, Clone)]
pub struct TextChunker {
    cfg: ChunkerConfig,
}

impl TextChunker {
    pub fn new(cfg: ChunkerConfig) -> Result<Self> {
        if cfg.chunk_size == 0 {
            return Err(DocqaError::Configuration {
                key: "chunk_size".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if cfg.overlap >= cfg.chunk_size {
            return Err(DocqaError::Configuration {
                key: "overlap".to_string(),
                reason: format!(
                    "overlap {} must be smaller than chunk_size {}",
                    cfg.overlap, cfg.chunk_size
                ),
            });
        }
        Ok(Self { cfg })
    }

    /// Split one text into chunks of at most `chunk_size` characters, each
    /// consecutive pair sharing exactly `overlap` characters. Empty input
    /// yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.cfg.chunk_size - self.cfg.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.cfg.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Chunk each page independently, tagging every chunk with its page
    /// number. Blank pages produce nothing.
    pub fn chunk_pages(&self, pages: &[ParsedPage]) -> Vec<PageChunk> {
        let mut out = Vec::new();
        for page in pages {
            for text in self.chunk(&page.text) {
                out.push(PageChunk {
                    page: Some(page.number),
                    text,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(ChunkerConfig {
            chunk_size: size,
            overlap,
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(TextChunker::new(ChunkerConfig {
            chunk_size: 0,
            overlap: 0
        })
        .is_err());
        assert!(TextChunker::new(ChunkerConfig {
            chunk_size: 100,
            overlap: 100
        })
        .is_err());
        assert!(TextChunker::new(ChunkerConfig {
            chunk_size: 100,
            overlap: 150
        })
        .is_err());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let c = chunker(1500, 200);
        let chunks = c.chunk("hello world");
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let c = chunker(1500, 200);
        assert!(c.chunk("").is_empty());
    }

    #[test]
    fn test_chunks_respect_max_size() {
        let c = chunker(10, 3);
        let text = "abcdefghijklmnopqrstuvwxyz";
        for chunk in c.chunk(text) {
            assert!(chunk.chars().count() <= 10);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap_exactly() {
        let c = chunker(10, 3);
        let text = "abcdefghijklmnopqrstuvwxyz0123456789";
        let chunks = c.chunk(text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let tail: String = prev[prev.len() - 3..].iter().collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn test_reconstruction_from_chunks() {
        let c = chunker(10, 3);
        let text = "the quick brown fox jumps over the lazy dog again and again";
        let chunks = c.chunk(text);

        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            let rest: String = chunk.chars().skip(3).collect();
            rebuilt.push_str(&rest);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let c = chunker(10, 3);
        let text = "abcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(c.chunk(text), c.chunk(text));
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let c = chunker(4, 1);
        let text = "日本語のテキストです";
        let chunks = c.chunk(text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 4);
        }
        // reconstruction still holds
        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(1));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_page_chunks_keep_page_numbers() {
        let c = chunker(10, 3);
        let pages = vec![
            ParsedPage {
                number: 1,
                text: "abcdefghijklmnop".to_string(),
            },
            ParsedPage {
                number: 2,
                text: "short".to_string(),
            },
            ParsedPage {
                number: 3,
                text: String::new(),
            },
        ];
        let chunks = c.chunk_pages(&pages);

        assert!(chunks.iter().any(|ch| ch.page == Some(1)));
        assert!(chunks.iter().any(|ch| ch.page == Some(2)));
        assert!(chunks.iter().all(|ch| ch.page != Some(3)));
        // no chunk mixes content from two pages
        for chunk in &chunks {
            if chunk.page == Some(2) {
                assert_eq!(chunk.text, "short");
            }
        }
    }
}
