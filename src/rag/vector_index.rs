//! Snippet index backed by the embedded `ares-vector` HNSW store.
//!
//! Every chunk is stored as one vector whose metadata carries the chunk text
//! and its location, so search results turn straight back into [`Snippet`]s.
//!
//! ```rust,ignore
//! let index = VectorSnippetDatabase::open(&config.retrieval, embedder).await?;
//! index.index_directory(Path::new("./docs")).await?;
//! index.persist().await?;
//! let snippets = index.find_nearest_merged("how do I configure pruning", 5).await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ares_vector::{Config, DistanceMetric, VectorDb, VectorMetadata};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::chunker::TextChunker;
use super::snippets::{merge_snippets, SnippetDatabase};
use crate::llm::EmbeddingClient;
use crate::types::{AppError, Result, Snippet};
use crate::utils::toml_config::RetrievalConfig;

/// Counts from an indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: usize,
    pub snippets: usize,
}

pub struct VectorSnippetDatabase {
    db: VectorDb,
    collection: String,
    embedder: Arc<dyn EmbeddingClient>,
    chunker: TextChunker,
}

impl VectorSnippetDatabase {
    /// Open the index described by `config`; in memory when it has no `index_path`.
    pub async fn open(config: &RetrievalConfig, embedder: Arc<dyn EmbeddingClient>) -> Result<Self> {
        let db_config = match &config.index_path {
            Some(path) => Config::persistent(path.clone()),
            None => Config::memory(),
        };

        let db = VectorDb::open(db_config).await.map_err(|e| {
            AppError::Configuration(format!("Failed to initialize snippet index: {}", e))
        })?;

        Ok(Self {
            db,
            collection: config.collection.clone(),
            embedder,
            chunker: TextChunker::new(config.chunk_size, config.chunk_overlap)?,
        })
    }

    /// Number of stored snippets.
    pub fn len(&self) -> usize {
        if !self.db.collection_exists(&self.collection) {
            return 0;
        }
        self.db.count(&self.collection).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        if self.db.collection_exists(&self.collection) {
            return Ok(());
        }
        self.db
            .create_collection(&self.collection, dimensions, DistanceMetric::Cosine)
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to create collection: {}", e)))
    }

    /// Chunk, embed and store one document. Returns the number of snippets stored.
    pub async fn add_document(&self, source: &str, text: &str) -> Result<usize> {
        let snippets = self.chunker.chunk(source, text);
        if snippets.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = snippets.iter().map(|s| s.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if let Some(first) = embeddings.first() {
            self.ensure_collection(first.len()).await?;
        }

        for (snippet, embedding) in snippets.iter().zip(&embeddings) {
            let id = format!("{}:{}", snippet.source, snippet.start_offset);
            self.db
                .insert(&self.collection, &id, embedding, Some(to_metadata(snippet)))
                .await
                .map_err(|e| AppError::Retrieval(format!("Failed to store snippet {}: {}", id, e)))?;
        }

        debug!(source, snippets = snippets.len(), "Document indexed");
        Ok(snippets.len())
    }

    /// Index every UTF-8 text file under `dir`, recursively.
    ///
    /// Sources are recorded relative to `dir`. Files that are not valid
    /// UTF-8 are skipped.
    pub async fn index_directory(&self, dir: &Path) -> Result<IndexStats> {
        let mut stats = IndexStats::default();

        for path in collect_files(dir)? {
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            let source = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            stats.snippets += self.add_document(&source, &text).await?;
            stats.documents += 1;
        }

        info!(
            documents = stats.documents,
            snippets = stats.snippets,
            "Directory indexed"
        );
        Ok(stats)
    }

    /// Write the index to disk; no-op for in-memory indexes.
    pub async fn persist(&self) -> Result<()> {
        self.db
            .persist()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to persist snippet index: {}", e)))
    }
}

#[async_trait]
impl SnippetDatabase for VectorSnippetDatabase {
    async fn find_nearest_merged(&self, query: &str, limit: usize) -> Result<Vec<Snippet>> {
        if limit == 0 || !self.db.collection_exists(&self.collection) {
            return Ok(Vec::new());
        }

        let embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Retrieval("Embedding backend returned nothing".to_string()))?;

        let results = self
            .db
            .search(&self.collection, &embedding, limit)
            .await
            .map_err(|e| AppError::Retrieval(format!("Snippet search failed: {}", e)))?;

        let snippets = results
            .into_iter()
            .filter_map(|result| {
                let snippet = result.metadata.as_ref().and_then(from_metadata);
                if snippet.is_none() {
                    warn!(id = %result.id, "Snippet without usable metadata");
                }
                snippet
            })
            .collect();

        Ok(merge_snippets(snippets))
    }
}

fn to_metadata(snippet: &Snippet) -> VectorMetadata {
    let mut metadata = VectorMetadata::new();
    metadata.insert("source", snippet.source.as_str());
    metadata.insert("start_offset", snippet.start_offset as i64);
    metadata.insert("page_start", i64::from(snippet.page_start));
    metadata.insert("page_end", i64::from(snippet.page_end));
    metadata.insert("text", snippet.text.as_str());
    metadata
}

fn from_metadata(metadata: &VectorMetadata) -> Option<Snippet> {
    Some(Snippet {
        source: metadata.get_string("source")?.to_string(),
        start_offset: usize::try_from(metadata.get_int("start_offset")?).ok()?,
        page_start: u32::try_from(metadata.get_int("page_start")?).ok()?,
        page_end: u32::try_from(metadata.get_int("page_end")?).ok()?,
        text: metadata.get_string("text")?.to_string(),
    })
}

fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| {
            AppError::NotFound(format!("Cannot read directory {}: {}", current.display(), e))
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
