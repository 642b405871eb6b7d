//! On-disk layout for index snapshots.
//!
//! A collection lives at `<dir>/<collection>/index.json`: a manifest followed
//! by the embedded passages. Writes go to a temp file in the same directory
//! and are renamed into place, so a crash never leaves a half-written index.

use crate::snapshot::{IndexEntry, IndexSnapshot};
use crate::{IndexError, IndexResult, SimilarityMetric};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Version of the on-disk format.
pub const FORMAT_VERSION: u32 = 1;

const INDEX_FILE: &str = "index.json";

/// Metadata describing a persisted collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub collection: String,
    pub model: String,
    pub dimension: usize,
    pub metric: SimilarityMetric,
    pub passage_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

#[derive(Deserialize)]
struct ManifestOnly {
    manifest: IndexManifest,
}

impl IndexManifest {
    /// Read only the manifest of a persisted collection.
    pub fn read(dir: impl AsRef<Path>, collection: &str) -> IndexResult<Self> {
        let path = collection_path(&dir, collection);
        let bytes = std::fs::read(&path).map_err(|e| IndexError::NotFound {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice::<ManifestOnly>(&bytes)
            .map(|m| m.manifest)
            .map_err(|e| IndexError::NotFound {
                path,
                reason: format!("corrupt index file: {}", e),
            })
    }
}

/// Path of the index file for `collection` under `dir`.
pub fn collection_path(dir: impl AsRef<Path>, collection: &str) -> PathBuf {
    dir.as_ref().join(collection).join(INDEX_FILE)
}

impl IndexSnapshot {
    /// Write this snapshot as `collection` under `dir`.
    pub fn persist(&self, dir: impl AsRef<Path>, collection: &str) -> IndexResult<IndexManifest> {
        let path = collection_path(&dir, collection);
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.as_ref().to_path_buf());
        std::fs::create_dir_all(&parent)?;

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            collection: collection.to_string(),
            model: self.model.clone(),
            dimension: self.dimension,
            metric: self.metric,
            passage_count: self.entries.len(),
            created_at: Utc::now(),
        };

        let persisted = PersistedIndex {
            manifest: manifest.clone(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec(&persisted)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| IndexError::Io(e.error))?;

        tracing::info!(path = %path.display(), passages = manifest.passage_count, "index persisted");
        Ok(manifest)
    }

    /// Restore the snapshot persisted as `collection` under `dir`.
    ///
    /// A missing file and a corrupt one both yield [`IndexError::NotFound`].
    pub fn load(dir: impl AsRef<Path>, collection: &str) -> IndexResult<Self> {
        let path = collection_path(&dir, collection);
        let not_found = |reason: String| IndexError::NotFound {
            path: path.clone(),
            reason,
        };

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found("no persisted collection".to_string()))
            }
            Err(e) => return Err(not_found(format!("unreadable: {}", e))),
        };

        let persisted: PersistedIndex = serde_json::from_slice(&bytes)
            .map_err(|e| not_found(format!("corrupt index file: {}", e)))?;
        let manifest = persisted.manifest;

        if manifest.format_version != FORMAT_VERSION {
            return Err(not_found(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if manifest.passage_count != persisted.entries.len() {
            return Err(not_found(format!(
                "manifest lists {} passages, file holds {}",
                manifest.passage_count,
                persisted.entries.len()
            )));
        }
        if let Some(bad) = persisted
            .entries
            .iter()
            .find(|e| e.vector.len() != manifest.dimension)
        {
            return Err(not_found(format!(
                "vector of dimension {} in a {}-dimensional index",
                bad.vector.len(),
                manifest.dimension
            )));
        }

        tracing::info!(
            path = %path.display(),
            passages = manifest.passage_count,
            model = %manifest.model,
            "index loaded"
        );

        Ok(Self {
            entries: persisted.entries,
            dimension: manifest.dimension,
            metric: manifest.metric,
            model: manifest.model,
        })
    }

    /// Whether a collection has been persisted under `dir`.
    pub fn exists(dir: impl AsRef<Path>, collection: &str) -> bool {
        collection_path(dir, collection).is_file()
    }
}
