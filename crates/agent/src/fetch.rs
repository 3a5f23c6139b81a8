// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Package repository client.
//!
//! The package content is opaque to the agent: whatever the reference
//! resolves to is placed under the job's package directory and the
//! target runs with that directory as its working directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The reference does not resolve to a package. Permanent.
    #[error("package not found: {0}")]
    NotFound(String),

    /// Transfer-level failure. Transient; retried with backoff.
    #[error("package fetch failed: {0}")]
    Network(String),

    /// Local filesystem failure. Permanent for this job.
    #[error("package i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

/// `fetch(reference) -> local package` contract against the external
/// package repository.
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    /// Materialize the referenced package under `dest` and return the
    /// directory the target should run in.
    async fn fetch(&self, reference: &str, dest: &Path) -> Result<PathBuf, FetchError>;
}

/// Fetches `http(s)://` references from the package repository and
/// plain/`file:` references from a locally mounted one.
#[derive(Clone, Default)]
pub struct RepoFetcher {
    client: reqwest::Client,
}

impl RepoFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch_http(&self, reference: &str, dest: &Path) -> Result<PathBuf, FetchError> {
        let response = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(FetchError::NotFound(reference.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("{reference}: HTTP {status}")));
        }

        create_dir(dest)?;
        let file_name = reference
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("package.bin");
        let path = dest.join(file_name);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| FetchError::Io { path: path.clone(), source })?;

        let mut response = response;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|source| FetchError::Io { path: path.clone(), source })?;
        }
        file.flush().await.map_err(|source| FetchError::Io { path: path.clone(), source })?;

        tracing::info!(reference, path = %path.display(), "package downloaded");
        Ok(dest.to_path_buf())
    }

    fn fetch_local(&self, reference: &str, dest: &Path) -> Result<PathBuf, FetchError> {
        let src = PathBuf::from(reference.strip_prefix("file://").unwrap_or(reference));
        if !src.exists() {
            return Err(FetchError::NotFound(reference.to_string()));
        }

        create_dir(dest)?;
        if src.is_dir() {
            copy_tree(&src, dest)?;
        } else {
            let name = src.file_name().unwrap_or_else(|| std::ffi::OsStr::new("package.bin"));
            let to = dest.join(name);
            std::fs::copy(&src, &to).map_err(|source| FetchError::Io { path: to, source })?;
        }
        tracing::info!(reference, dest = %dest.display(), "package copied from repository");
        Ok(dest.to_path_buf())
    }
}

#[async_trait]
impl PackageFetcher for RepoFetcher {
    async fn fetch(&self, reference: &str, dest: &Path) -> Result<PathBuf, FetchError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            self.fetch_http(reference, dest).await
        } else {
            self.fetch_local(reference, dest)
        }
    }
}

fn create_dir(dir: &Path) -> Result<(), FetchError> {
    std::fs::create_dir_all(dir)
        .map_err(|source| FetchError::Io { path: dir.to_path_buf(), source })
}

/// Copy a directory tree, preserving layout.
fn copy_tree(src: &Path, dest: &Path) -> Result<(), FetchError> {
    let entries = std::fs::read_dir(src)
        .map_err(|source| FetchError::Io { path: src.to_path_buf(), source })?;
    for entry in entries {
        let entry = entry.map_err(|source| FetchError::Io { path: src.to_path_buf(), source })?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            create_dir(&to)?;
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)
                .map_err(|source| FetchError::Io { path: to.clone(), source })?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
