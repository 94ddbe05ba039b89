//! Helpdesk vector crate - corpus chunking, embedding services, and the
//! brute-force similarity index used for retrieval.
//!
//! The index is built once at startup from the knowledge corpus and is
//! read-only afterwards, so it can be shared across request handlers
//! without locking.

pub mod chunking;
pub mod embedding;
pub mod error;
pub mod index;
pub mod openai;

pub use chunking::{load_corpus, split_sections};
pub use embedding::{DynEmbeddingService, EmbeddingService, MockEmbedding};
pub use error::EmbeddingError;
pub use index::{EmbeddingIndex, SimilarityResult};
pub use openai::OpenAiEmbedder;
