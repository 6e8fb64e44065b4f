//! On-disk snapshot of a built catalog index.
//!
//! Embedding a whole catalog is the expensive part of a rebuild. The snapshot
//! stores the vectors together with their records so a restart with an
//! unchanged corpus can skip straight to serving.

use crate::error::{AppError, Result};
use crate::index::{CatalogRecord, CatalogStore, IndexedCatalog, VectorIndex};
use ndarray::Array2;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Snapshot file format version. Increment when format changes.
const SNAPSHOT_VERSION: u32 = 1;

/// Magic bytes to identify valid snapshot files.
const SNAPSHOT_MAGIC: &[u8; 8] = b"SHELFIDX";

/// Magic, version, corpus hash, record count and dimension.
const HEADER_LEN: u64 = 8 + 4 + 32 + 8 + 8;

/// A persisted index with the metadata needed to validate it.
pub struct IndexSnapshot {
    pub version: u32,
    /// SHA256 over the embedder identity and every record
    pub corpus_hash: [u8; 32],
    pub num_records: usize,
    pub embedding_dim: usize,
    /// Row-major (num_records × embedding_dim)
    pub embeddings: Array2<f32>,
    pub records: Vec<CatalogRecord>,
}

impl IndexSnapshot {
    /// Hash a corpus for snapshot invalidation.
    ///
    /// Changing the embedder invalidates the snapshot as well, since vectors
    /// from different models are not comparable.
    pub fn compute_corpus_hash<'a>(
        embedder_id: &str,
        records: impl IntoIterator<Item = &'a CatalogRecord>,
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(embedder_id.as_bytes());
        hasher.update(b"\n");

        for record in records {
            // Serializing a plain struct of strings and numbers cannot fail.
            let bytes = serde_json::to_vec(record).unwrap_or_default();
            hasher.update(&bytes);
            hasher.update(b"\n");
        }

        hasher.finalize().into()
    }

    pub fn from_catalog(embedder_id: &str, catalog: &IndexedCatalog) -> Self {
        let records: Vec<CatalogRecord> = catalog.store().iter().cloned().collect();
        Self {
            version: SNAPSHOT_VERSION,
            corpus_hash: Self::compute_corpus_hash(embedder_id, &records),
            num_records: records.len(),
            embedding_dim: catalog.dimension(),
            embeddings: catalog.index().vectors().clone(),
            records,
        }
    }

    /// Rebuild the served structures from this snapshot.
    pub fn into_catalog(self) -> Result<IndexedCatalog> {
        IndexedCatalog::new(
            VectorIndex::new(self.embeddings)?,
            CatalogStore::new(self.records),
        )
    }

    /// Save snapshot to a binary file.
    ///
    /// The file is written next to its destination and renamed into place, so
    /// a crash mid-write never leaves a truncated snapshot behind.
    ///
    /// File format:
    /// - 8 bytes: magic "SHELFIDX"
    /// - 4 bytes: version (u32 LE)
    /// - 32 bytes: corpus_hash
    /// - 8 bytes: num_records (u64 LE)
    /// - 8 bytes: embedding_dim (u64 LE)
    /// - N bytes: embeddings data (f32 LE, row-major)
    /// - 8 bytes: records JSON length (u64 LE)
    /// - M bytes: records as a JSON array
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::SnapshotError(format!("Failed to create snapshot directory: {}", e))
            })?;
        }

        let tmp_path = path.with_extension("tmp");
        self.write_to(&tmp_path)?;
        fs::rename(&tmp_path, path).map_err(|e| {
            AppError::SnapshotError(format!("Failed to move snapshot into place: {}", e))
        })?;

        tracing::info!(
            path = %path.display(),
            num_records = self.num_records,
            embedding_dim = self.embedding_dim,
            "Index snapshot saved"
        );

        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let io_err = |e: std::io::Error| AppError::SnapshotError(format!("Write failed: {}", e));

        let file = File::create(path).map_err(|e| {
            AppError::SnapshotError(format!("Failed to create snapshot file: {}", e))
        })?;
        let mut writer = BufWriter::new(file);

        writer.write_all(SNAPSHOT_MAGIC).map_err(io_err)?;
        writer
            .write_all(&self.version.to_le_bytes())
            .map_err(io_err)?;
        writer.write_all(&self.corpus_hash).map_err(io_err)?;
        writer
            .write_all(&(self.num_records as u64).to_le_bytes())
            .map_err(io_err)?;
        writer
            .write_all(&(self.embedding_dim as u64).to_le_bytes())
            .map_err(io_err)?;

        // Row-major logical order, independent of memory layout
        for &val in self.embeddings.iter() {
            writer.write_all(&val.to_le_bytes()).map_err(io_err)?;
        }

        let records_json = serde_json::to_vec(&self.records).map_err(|e| {
            AppError::SnapshotError(format!("Failed to encode records: {}", e))
        })?;
        writer
            .write_all(&(records_json.len() as u64).to_le_bytes())
            .map_err(io_err)?;
        writer.write_all(&records_json).map_err(io_err)?;

        writer.flush().map_err(io_err)?;
        Ok(())
    }

    /// Load snapshot from a binary file.
    ///
    /// Returns None if the file doesn't exist or has an unknown magic/version.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Snapshot file does not exist");
            return Ok(None);
        }

        let file = File::open(path).map_err(|e| {
            AppError::SnapshotError(format!("Failed to open snapshot file: {}", e))
        })?;
        let file_len = file
            .metadata()
            .map_err(|e| AppError::SnapshotError(format!("Failed to stat snapshot file: {}", e)))?
            .len();
        let mut reader = BufReader::new(file);
        let io_err = |e: std::io::Error| AppError::SnapshotError(format!("Read failed: {}", e));

        let mut magic = [0u8; 8];
        if reader.read_exact(&mut magic).is_err() || &magic != SNAPSHOT_MAGIC {
            tracing::warn!(path = %path.display(), "Invalid snapshot magic, ignoring");
            return Ok(None);
        }

        let version = read_u32(&mut reader).map_err(io_err)?;
        if version != SNAPSHOT_VERSION {
            tracing::warn!(
                path = %path.display(),
                snapshot_version = version,
                expected_version = SNAPSHOT_VERSION,
                "Snapshot version mismatch, ignoring"
            );
            return Ok(None);
        }

        let mut corpus_hash = [0u8; 32];
        reader.read_exact(&mut corpus_hash).map_err(io_err)?;

        let num_records = read_u64(&mut reader).map_err(io_err)? as usize;
        let embedding_dim = read_u64(&mut reader).map_err(io_err)? as usize;

        // Declared sizes must fit in the file before anything is allocated
        let vectors_bytes = (num_records as u64)
            .checked_mul(embedding_dim as u64)
            .and_then(|n| n.checked_mul(4));
        let remaining = file_len.saturating_sub(HEADER_LEN);
        let total_floats = match vectors_bytes {
            Some(bytes) if bytes.saturating_add(8) <= remaining => {
                num_records * embedding_dim
            }
            _ => {
                tracing::warn!(
                    path = %path.display(),
                    num_records,
                    embedding_dim,
                    file_len,
                    "Snapshot header does not match file size, ignoring"
                );
                return Ok(None);
            }
        };
        let mut data = vec![0f32; total_floats];
        for val in &mut data {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes).map_err(io_err)?;
            *val = f32::from_le_bytes(bytes);
        }

        let embeddings =
            Array2::from_shape_vec((num_records, embedding_dim), data).map_err(|e| {
                AppError::SnapshotError(format!("Failed to reshape embeddings: {}", e))
            })?;

        let records_len = read_u64(&mut reader).map_err(io_err)?;
        if records_len > remaining - (total_floats as u64 * 4 + 8) {
            tracing::warn!(
                path = %path.display(),
                records_len,
                "Snapshot records section exceeds file size, ignoring"
            );
            return Ok(None);
        }
        let records_len = records_len as usize;
        let mut records_json = vec![0u8; records_len];
        reader.read_exact(&mut records_json).map_err(io_err)?;
        let records: Vec<CatalogRecord> = serde_json::from_slice(&records_json).map_err(|e| {
            AppError::SnapshotError(format!("Failed to decode records: {}", e))
        })?;

        if records.len() != num_records {
            return Err(AppError::SnapshotError(format!(
                "Snapshot header says {} records but {} were stored",
                num_records,
                records.len()
            )));
        }

        tracing::info!(
            path = %path.display(),
            num_records,
            embedding_dim,
            "Index snapshot loaded"
        );

        Ok(Some(Self {
            version,
            corpus_hash,
            num_records,
            embedding_dim,
            embeddings,
            records,
        }))
    }

    /// Check if snapshot matches the given corpus and embedder.
    pub fn is_valid_for(&self, embedder_id: &str, records: &[CatalogRecord]) -> bool {
        self.num_records == records.len()
            && self.corpus_hash == Self::compute_corpus_hash(embedder_id, records)
    }
}

fn read_u32(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(reader: &mut impl Read) -> std::io::Result<u64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

/// Try to load a snapshot that matches the current corpus.
///
/// Returns Some(catalog) on a valid hit, None on a miss. A corrupt file is
/// treated as a miss so startup falls back to a full rebuild.
pub fn try_load_snapshot(
    path: &Path,
    embedder_id: &str,
    records: &[CatalogRecord],
) -> Option<IndexedCatalog> {
    match IndexSnapshot::load(path) {
        Ok(Some(snapshot)) if snapshot.is_valid_for(embedder_id, records) => {
            match snapshot.into_catalog() {
                Ok(catalog) => {
                    tracing::info!("Using index snapshot (cache hit)");
                    Some(catalog)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Snapshot unusable, will rebuild");
                    None
                }
            }
        }
        Ok(Some(_)) => {
            tracing::info!("Snapshot stale (corpus or embedder changed), will rebuild");
            None
        }
        Ok(None) => {
            tracing::info!("No snapshot found, will build index");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read snapshot, will rebuild");
            None
        }
    }
}

/// Save a freshly built catalog as the new snapshot.
pub fn save_snapshot(path: &Path, embedder_id: &str, catalog: &IndexedCatalog) -> Result<()> {
    IndexSnapshot::from_catalog(embedder_id, catalog).save(path)
}
