//! Snippet retrieval for the `{rtfm()}` template function.
//!
//! # Module Structure
//!
//! - [`snippets`] - the [`SnippetDatabase`] trait and overlap merging
//! - [`chunker`] - splits documents into located snippets
//! - `vector_index` - embedded HNSW index (feature `ares-vector`)
//!
//! # Pipeline
//!
//! 1. **Ingestion** - documents are chunked and each chunk embedded
//! 2. **Storage** - embeddings and snippet metadata go into the vector store
//! 3. **Retrieval** - the query is embedded and the nearest snippets returned
//! 4. **Merging** - overlapping snippets of one source are joined

pub mod chunker;
pub mod snippets;

#[cfg(feature = "ares-vector")]
pub mod vector_index;

pub use chunker::TextChunker;
pub use snippets::{merge_snippets, DisabledSnippetDatabase, SnippetDatabase};

#[cfg(feature = "ares-vector")]
pub use vector_index::{IndexStats, VectorSnippetDatabase};
