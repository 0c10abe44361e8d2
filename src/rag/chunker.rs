use text_splitter::{ChunkConfig, TextSplitter};

use crate::types::{AppError, Result, Snippet};

/// Form feed, used by text extracted from paged documents to mark page breaks.
const PAGE_BREAK: char = '\u{0C}';

/// Splits documents into overlapping snippets that remember where they came from.
pub struct TextChunker {
    splitter: TextSplitter<text_splitter::Characters>,
}

impl TextChunker {
    /// `chunk_size` and `chunk_overlap` are measured in characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| AppError::Configuration(format!("Invalid chunk settings: {}", e)))?;

        Ok(Self {
            splitter: TextSplitter::new(config),
        })
    }

    pub fn chunk(&self, source: &str, text: &str) -> Vec<Snippet> {
        self.splitter
            .chunk_indices(text)
            .map(|(offset, chunk)| {
                let page_start = page_at(text, offset);
                let page_end = page_at(text, offset + chunk.len());
                Snippet::new(chunk, source, offset).with_pages(page_start, page_end)
            })
            .collect()
    }
}

/// 1-based page number of the byte at `offset`.
fn page_at(text: &str, offset: usize) -> u32 {
    let breaks = text[..offset].chars().filter(|&c| c == PAGE_BREAK).count();
    breaks as u32 + 1
}
