// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact hashing and bundle packaging.

use crate::manifest::{BundleManifest, MANIFEST_FILE_NAME};
use farm_core::{ArtifactHandle, ArtifactId, ArtifactKind, JobState, ManifestEntry};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {artifact} failed verification: expected {expected}, got {actual}")]
    Corrupt {
        artifact: ArtifactId,
        expected: String,
        actual: String,
    },

    #[error("artifact {0} appears twice")]
    Duplicate(ArtifactId),

    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// A packaged job: manifest on disk, sources untouched.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub manifest: BundleManifest,
    pub manifest_path: PathBuf,
}

/// Build an [`ArtifactHandle`] for a finalized file: size plus SHA-256
/// over the final byte content.
pub fn artifact_from_file(kind: ArtifactKind, path: &Path) -> Result<ArtifactHandle, BundleError> {
    let (size_bytes, checksum) = hash_file(path)?;
    Ok(ArtifactHandle {
        id: ArtifactId::new(),
        kind,
        path: path.to_path_buf(),
        size_bytes,
        checksum,
    })
}

/// Package a job's captured artifacts and error log into a manifest.
///
/// Side-effect-free with respect to `JobState` and the artifact files;
/// the only write is `manifest.json` in `bundle_dir`. The bundle is
/// only returned once every checksum has been re-verified against the
/// files it describes.
pub fn package(
    state: &JobState,
    bundle_dir: &Path,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Result<Bundle, BundleError> {
    let mut entries: Vec<ManifestEntry> = Vec::with_capacity(state.artifacts.len());
    for handle in &state.artifacts {
        if entries.iter().any(|e| e.artifact_id == handle.id) {
            return Err(BundleError::Duplicate(handle.id.clone()));
        }
        entries.push(ManifestEntry::from(handle));
    }

    let manifest = BundleManifest {
        job_id: state.job_id.clone(),
        created_at,
        entries,
        error_log: state.error_log.clone(),
    };

    std::fs::create_dir_all(bundle_dir)
        .map_err(|source| BundleError::Io { path: bundle_dir.to_path_buf(), source })?;
    let manifest_path = bundle_dir.join(MANIFEST_FILE_NAME);
    let json = serde_json::to_vec_pretty(&manifest)?;
    std::fs::write(&manifest_path, json)
        .map_err(|source| BundleError::Io { path: manifest_path.clone(), source })?;

    let bundle = Bundle { manifest, manifest_path };
    verify(&bundle, &state.artifacts)?;
    tracing::info!(
        job = %state.job_id,
        artifacts = bundle.manifest.entries.len(),
        "bundle packaged and verified"
    );
    Ok(bundle)
}

/// Recompute every checksum and compare against the manifest.
///
/// Sources must never be deleted before this passes.
pub fn verify(bundle: &Bundle, artifacts: &[ArtifactHandle]) -> Result<(), BundleError> {
    for entry in &bundle.manifest.entries {
        let Some(handle) = artifacts.iter().find(|a| a.id == entry.artifact_id) else {
            return Err(BundleError::Corrupt {
                artifact: entry.artifact_id.clone(),
                expected: entry.checksum.clone(),
                actual: "<missing artifact>".to_string(),
            });
        };
        let (size, actual) = hash_file(&handle.path)?;
        if actual != entry.checksum || size != entry.size_bytes {
            return Err(BundleError::Corrupt {
                artifact: entry.artifact_id.clone(),
                expected: entry.checksum.clone(),
                actual,
            });
        }
    }
    Ok(())
}

/// Stream a file through SHA-256. Returns (size, lowercase hex digest).
fn hash_file(path: &Path) -> Result<(u64, String), BundleError> {
    let file = std::fs::File::open(path)
        .map_err(|source| BundleError::Io { path: path.to_path_buf(), source })?;
    let mut reader = std::io::BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size: u64 = 0;
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|source| BundleError::Io { path: path.to_path_buf(), source })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((size, format!("{:x}", hasher.finalize())))
}

#[cfg(test)]
#[path = "packager_tests.rs"]
mod tests;
