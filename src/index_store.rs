//! Versioned on-disk index with atomic replacement.
//!
//! Layout under the index directory:
//!
//! ```text
//! <index_dir>/
//!   CURRENT                      name of the live version directory
//!   v-<timestamp>-<uuid>/
//!     manifest.json              params, entries, source fingerprints
//!     vectors.bin                entries.len() * dims little-endian f32
//!   latest_answer.txt            see `answer`
//! ```
//!
//! A build writes a fresh version directory and only then replaces
//! `CURRENT` (temp file + rename). Readers that resolve `CURRENT` before
//! the rename keep reading the previous version, which is retained; older
//! versions are pruned after each successful build. A build that fails at
//! any stage leaves `CURRENT` untouched.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use docchat_core::chunk::ChunkerConfig;
use docchat_core::embedding::{check_dims, decode_vectors, encode_vectors, Embedder};
use docchat_core::index::{IndexParams, VectorIndex};
use docchat_core::models::{ChunkRef, SourceChunk};
use docchat_core::{BuildStage, RagError, RagResult};
use serde::{Deserialize, Serialize};

use crate::document_store::ScannedSource;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

const CURRENT_FILE: &str = "CURRENT";
const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const VERSION_PREFIX: &str = "v-";

/// Fingerprint of a source at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_id: String,
    pub sha256: String,
    pub chunks: usize,
}

impl From<&ScannedSource> for SourceRecord {
    fn from(s: &ScannedSource) -> Self {
        Self {
            source_id: s.source_id.clone(),
            sha256: s.fingerprint.clone(),
            chunks: s.chunk_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub params: IndexParams,
    pub created_at: DateTime<Utc>,
    pub count: usize,
    pub entries: Vec<ChunkRef>,
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
}

impl Manifest {
    pub fn source(&self, source_id: &str) -> Option<&SourceRecord> {
        self.sources.iter().find(|s| s.source_id == source_id)
    }
}

/// An index loaded from disk together with its manifest metadata.
#[derive(Debug, Clone)]
pub struct StoredIndex {
    pub version: String,
    pub index: VectorIndex,
    pub created_at: DateTime<Utc>,
    pub sources: Vec<SourceRecord>,
}

impl StoredIndex {
    pub fn chunker(&self) -> ChunkerConfig {
        self.index.params().chunker
    }

    pub fn source(&self, source_id: &str) -> Option<&SourceRecord> {
        self.sources.iter().find(|s| s.source_id == source_id)
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub version: String,
    pub chunks: usize,
    pub sources: usize,
    pub dims: usize,
    pub model: String,
}

pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn location(&self) -> &Path {
        &self.dir
    }

    fn not_found(&self) -> RagError {
        RagError::IndexNotFound {
            location: self.dir.display().to_string(),
        }
    }

    /// Name of the live version, if an index has been built.
    pub fn current_version(&self) -> RagResult<Option<String>> {
        match fs::read_to_string(self.dir.join(CURRENT_FILE)) {
            Ok(s) => {
                let name = s.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RagError::CorruptIndex(format!(
                "cannot read {}: {}",
                self.dir.join(CURRENT_FILE).display(),
                e
            ))),
        }
    }

    /// Read only the live manifest (no vectors).
    pub fn manifest(&self) -> RagResult<(String, Manifest)> {
        let version = self.current_version()?.ok_or_else(|| self.not_found())?;
        let manifest = self.read_manifest(&version)?;
        Ok((version, manifest))
    }

    fn read_manifest(&self, version: &str) -> RagResult<Manifest> {
        let path = self.dir.join(version).join(MANIFEST_FILE);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                self.not_found()
            } else {
                RagError::CorruptIndex(format!("cannot read {}: {}", path.display(), e))
            }
        })?;
        let manifest: Manifest = serde_json::from_slice(&bytes)
            .map_err(|e| RagError::CorruptIndex(format!("malformed {}: {}", path.display(), e)))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(RagError::CorruptIndex(format!(
                "format version {} in {} is not supported (expected {})",
                manifest.format_version,
                path.display(),
                FORMAT_VERSION
            )));
        }
        Ok(manifest)
    }

    /// Load the live index.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotFound`] if no build has completed at this location.
    /// - [`RagError::CorruptIndex`] if the live version's files cannot be read back.
    pub fn load(&self) -> RagResult<StoredIndex> {
        let (version, manifest) = self.manifest()?;
        let path = self.dir.join(&version).join(VECTORS_FILE);
        let blob = fs::read(&path)
            .map_err(|e| RagError::CorruptIndex(format!("cannot read {}: {}", path.display(), e)))?;
        let vectors = decode_vectors(&blob).ok_or_else(|| {
            RagError::CorruptIndex(format!("{} is truncated ({} bytes)", path.display(), blob.len()))
        })?;
        let index = VectorIndex::from_parts(manifest.params, manifest.entries, vectors).map_err(|e| match e {
            RagError::CorruptIndex(msg) => RagError::CorruptIndex(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        tracing::debug!(version = %version, entries = index.len(), "loaded index");
        Ok(StoredIndex {
            version,
            index,
            created_at: manifest.created_at,
            sources: manifest.sources,
        })
    }

    /// Embed `chunks` and atomically publish them as the new live index.
    ///
    /// # Errors
    ///
    /// [`RagError::Build`] tagged with the failing stage. The previously
    /// published index, if any, stays live.
    pub async fn build(
        &self,
        chunks: &[SourceChunk],
        sources: &[ScannedSource],
        embedder: &dyn Embedder,
        chunker: ChunkerConfig,
        batch_size: usize,
    ) -> RagResult<BuildReport> {
        let index = embed_chunks(chunks, embedder, chunker, batch_size).await?;
        let records: Vec<SourceRecord> = sources.iter().map(SourceRecord::from).collect();
        let version = self.publish(&index, &records)?;
        Ok(BuildReport {
            version,
            chunks: index.len(),
            sources: records.len(),
            dims: index.params().dims,
            model: index.params().model.clone(),
        })
    }

    /// Persist `index` as a new version and make it live.
    pub fn publish(&self, index: &VectorIndex, sources: &[SourceRecord]) -> RagResult<String> {
        let persistence = |e: std::io::Error| RagError::build(BuildStage::Persistence, e.to_string());

        fs::create_dir_all(&self.dir).map_err(persistence)?;
        let previous = self.current_version().ok().flatten();

        let version = format!(
            "{}{}-{}",
            VERSION_PREFIX,
            Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
            uuid::Uuid::new_v4().simple()
        );
        let version_dir = self.dir.join(&version);

        let written = self.write_version(&version_dir, index, sources).and_then(|_| {
            write_atomic(&self.dir.join(CURRENT_FILE), version.as_bytes()).map_err(persistence)
        });
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_dir_all(&version_dir) {
                tracing::warn!(dir = %version_dir.display(), error = %cleanup, "failed to remove partial index");
            }
            return Err(e);
        }

        tracing::info!(version = %version, entries = index.len(), "published index");
        self.prune(&version, previous.as_deref());
        Ok(version)
    }

    fn write_version(
        &self,
        version_dir: &Path,
        index: &VectorIndex,
        sources: &[SourceRecord],
    ) -> RagResult<()> {
        let persistence = |e: std::io::Error| RagError::build(BuildStage::Persistence, e.to_string());

        fs::create_dir(version_dir).map_err(persistence)?;
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            params: index.params().clone(),
            created_at: Utc::now(),
            count: index.len(),
            entries: index.entries().to_vec(),
            sources: sources.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| RagError::build(BuildStage::Persistence, e.to_string()))?;
        fs::write(version_dir.join(VECTORS_FILE), encode_vectors(index.flat_vectors()))
            .map_err(persistence)?;
        fs::write(version_dir.join(MANIFEST_FILE), json).map_err(persistence)?;
        Ok(())
    }

    /// Remove every version except `current` and `previous`. Failures are
    /// logged only; a leftover directory is harmless.
    fn prune(&self, current: &str, previous: Option<&str>) {
        let keep: HashSet<&str> = [Some(current), previous].into_iter().flatten().collect();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "failed to list index versions");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(VERSION_PREFIX) || keep.contains(name.as_str()) {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => tracing::debug!(version = %name, "pruned old index version"),
                Err(e) => tracing::warn!(version = %name, error = %e, "failed to prune index version"),
            }
        }
    }
}

/// Embed chunks in batches into a fresh in-memory index.
pub async fn embed_chunks(
    chunks: &[SourceChunk],
    embedder: &dyn Embedder,
    chunker: ChunkerConfig,
    batch_size: usize,
) -> RagResult<VectorIndex> {
    if chunks.is_empty() {
        return Err(RagError::build(
            BuildStage::Persistence,
            "no chunks to index; nothing was written",
        ));
    }
    if batch_size == 0 {
        return Err(RagError::Config("batch_size must be > 0".into()));
    }

    let dims = embedder.dims();
    let mut index = VectorIndex::new(IndexParams::new(embedder.model_name(), dims, chunker));
    let embedding = |e: RagError| RagError::build(BuildStage::Embedding, e.to_string());

    for (n, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await.map_err(embedding)?;
        if vectors.len() != batch.len() {
            return Err(RagError::build(
                BuildStage::Embedding,
                format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                ),
            ));
        }
        check_dims(&vectors, dims).map_err(embedding)?;
        for (chunk, vector) in batch.iter().zip(&vectors) {
            index.insert(chunk.chunk_ref(), vector).map_err(embedding)?;
        }
        tracing::debug!(batch = n + 1, embedded = index.len(), total = chunks.len(), "embedded batch");
    }
    Ok(index)
}

/// Write `bytes` to `path` via a sibling temp file and rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp-{}", file_name, uuid::Uuid::new_v4().simple()));
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
