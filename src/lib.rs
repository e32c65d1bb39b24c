//! # DocChat
//!
//! Question answering over a directory of office documents, with
//! citations that point back into the source files.
//!
//! DocChat scans an upload directory (`.docx`, `.xlsx`, `.csv`, `.txt`),
//! splits each file into overlapping chunks, embeds them, and publishes a
//! versioned vector index. A question retrieves the nearest chunks, which
//! are handed to a text generator as the only permitted context. Each
//! citation is a `(source_id, ordinal)` address; its text is re-derived
//! from the source on demand, and the source can be rendered as HTML with
//! the cited chunk highlighted.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ Upload dir   │──▶│ Extract +    │──▶│ Embed + publish│
//! │ docx/xlsx/.. │   │ chunk        │   │ index version  │
//! └──────────────┘   └──────────────┘   └───────┬────────┘
//!                                               │
//!              ┌────────────────────────────────┤
//!              ▼                                ▼
//!        ┌──────────┐                    ┌─────────────┐
//!        │ ask      │                    │ locate/view │
//!        │ top-k+LLM│                    │ highlight   │
//!        └──────────┘                    └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Text extraction from docx, xlsx, csv, txt |
//! | [`document_store`] | Upload directory scan and chunking |
//! | [`index_store`] | Versioned on-disk index, atomic swap |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Text generation providers |
//! | [`locator`] | Chunk text recovery from `(source_id, ordinal)` |
//! | [`answer`] | Question answering and the latest-answer slot |
//! | [`render`] | HTML rendering of sources |
//! | [`export`] | Latest answer as `summary.docx` |
//! | [`pipeline`] | End-to-end operations used by the CLI |
//!
//! Pure logic (chunking, vector index, retrieval, prompt, highlighting)
//! lives in the `docchat-core` crate.

pub mod answer;
pub mod config;
pub mod document_store;
pub mod embedding;
pub mod export;
pub mod extract;
pub mod generation;
mod http;
pub mod index_store;
pub mod locator;
pub mod pipeline;
pub mod render;
