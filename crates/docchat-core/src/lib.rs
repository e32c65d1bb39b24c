//! # DocChat Core
//!
//! Pure logic for DocChat's retrieval-augmented question answering:
//! chunking, the in-memory vector index, retrieval, grounding prompts,
//! and citation highlighting.
//!
//! This crate performs no filesystem or network I/O. Embedding and text
//! generation are capabilities ([`embedding::Embedder`],
//! [`generate::TextGenerator`]) supplied by the application.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Deterministic overlapping text splitter |
//! | [`embedding`] | Embedder trait, cosine similarity, vector encoding |
//! | [`error`] | [`RagError`](error::RagError) taxonomy |
//! | [`generate`] | TextGenerator trait |
//! | [`highlight`] | Locate and mark a chunk in rendered HTML |
//! | [`index`] | Brute-force cosine index over `(source_id, ordinal)` |
//! | [`models`] | Chunk references, citations, answers |
//! | [`prompt`] | Grounding prompt and citation previews |
//! | [`retrieve`] | Fixed top-k retriever |

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod highlight;
pub mod index;
pub mod models;
pub mod prompt;
pub mod retrieve;

pub use error::{BuildStage, RagError, RagResult};
