//! Text chunking module
//!
//! Splits source text into fixed-size overlapping windows. The window is the
//! unit of embedding and retrieval; the overlap keeps sentences that straddle
//! a boundary visible to both neighbors.

use bifrost_common::errors::{AppError, Result};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between neighboring chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            chunk_overlap: 50,
        }
    }
}

/// Split text into fixed-size overlapping chunks.
///
/// Each chunk after the first starts `chunk_size - chunk_overlap` characters
/// after its predecessor, so concatenating the first chunk with every later
/// chunk minus its leading overlap reconstructs the input exactly.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    if config.chunk_overlap >= config.chunk_size {
        return Err(AppError::Configuration {
            message: format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            ),
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let total_len = chars.len();

    if total_len == 0 {
        return Ok(vec![]);
    }

    let stride = config.chunk_size - config.chunk_overlap;
    let mut chunks = Vec::with_capacity(total_len / stride + 1);
    let mut start = 0;

    while start < total_len {
        let end = (start + config.chunk_size).min(total_len);
        chunks.push(chars[start..end].iter().collect());

        if end == total_len {
            break;
        }
        start += stride;
    }

    debug!(
        input_len = total_len,
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Text chunked"
    );

    Ok(chunks)
}

/// Rebuild the original text from overlapping chunks.
///
/// Inverse of [`chunk_text`]; used to verify the chunking invariant.
pub fn reconstruct(chunks: &[String], overlap: usize) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            text.push_str(chunk);
        } else {
            text.extend(chunk.chars().skip(overlap));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruction_roundtrip() {
        let config = ChunkingConfig {
            chunk_size: 300,
            chunk_overlap: 50,
        };

        let inputs = [
            "short".to_string(),
            "FastAPI is a modern web framework. ".repeat(40),
            "a".repeat(299),
            "b".repeat(300),
            "c".repeat(301),
            "Unicode: éàü → across boundaries. ".repeat(30),
        ];

        for input in &inputs {
            let chunks = chunk_text(input, &config).unwrap();
            assert_eq!(&reconstruct(&chunks, config.chunk_overlap), input);
        }
    }

    #[test]
    fn test_overlap_between_neighbors() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 20,
        };
        let text = "x".repeat(500);
        let chunks = chunk_text(&text, &config).unwrap();

        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 20).collect();
            let head: String = pair[1].chars().take(20).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_chunk_sizes() {
        let config = ChunkingConfig::default();
        let text = "word ".repeat(200);
        let chunks = chunk_text(&text, &config).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.chars().count(), 300);
        }
        assert!(chunks.last().unwrap().chars().count() <= 300);
    }

    #[test]
    fn test_empty_text() {
        let chunks = chunk_text("", &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let config = ChunkingConfig {
            chunk_size: 50,
            chunk_overlap: 50,
        };
        assert!(chunk_text("some text", &config).is_err());
    }
}
