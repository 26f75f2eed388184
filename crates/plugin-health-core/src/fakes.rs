//! In-memory collaborators (testing only)
//!
//! Provide fixed catalogs, documentation indexes, working copies and
//! repository metadata so the engines can run without network access.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::catalog::{Catalog, CatalogSource, DocumentationIndex, DocumentationUrls};
use crate::error::{CatalogError, SourceError};
use crate::source::{Checkout, RepositoryHost, RepositoryInfo, SourceControl};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Returns the same catalog on every fetch, or fails when built with
/// [`StaticCatalogSource::failing`].
#[derive(Debug, Default)]
pub struct StaticCatalogSource {
    catalog: Option<Catalog>,
    fetches: AtomicUsize,
}

impl StaticCatalogSource {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Some(catalog),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch(&self) -> Result<Catalog, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.catalog.clone().ok_or_else(|| CatalogError::Http {
            url: "static://catalog".to_string(),
            detail: "unavailable".to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct StaticDocumentationIndex {
    urls: DocumentationUrls,
    fetches: AtomicUsize,
}

impl StaticDocumentationIndex {
    pub fn new(urls: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            urls: urls.into_iter().collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentationIndex for StaticDocumentationIndex {
    async fn fetch(&self) -> Result<DocumentationUrls, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.urls.clone())
    }
}

// ---------------------------------------------------------------------------
// Source control
// ---------------------------------------------------------------------------

/// Materialises a fixed set of files as the working copy of any URL.
#[derive(Debug)]
pub struct StaticSourceControl {
    files: Vec<(String, String)>,
    last_commit_at: DateTime<Utc>,
    fail: bool,
    checkouts: AtomicUsize,
}

impl Default for StaticSourceControl {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            last_commit_at: Utc::now(),
            fail: false,
            checkouts: AtomicUsize::new(0),
        }
    }
}

impl StaticSourceControl {
    /// Add a file at a `/`-separated path relative to the repository root.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    pub fn with_last_commit(mut self, at: DateTime<Utc>) -> Self {
        self.last_commit_at = at;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn checkouts(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceControl for StaticSourceControl {
    async fn checkout(&self, url: &str, dest: &Path) -> Result<Checkout, SourceError> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SourceError::Git {
                command: "clone".to_string(),
                detail: format!("repository '{url}' not found"),
            });
        }
        tokio::fs::create_dir_all(dest).await?;
        for (path, content) in &self.files {
            let target = path.split('/').fold(dest.to_path_buf(), |acc, part| acc.join(part));
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await?;
        }
        Ok(Checkout {
            root: dest.to_path_buf(),
            last_commit_at: self.last_commit_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Repository host
// ---------------------------------------------------------------------------

/// Repository metadata keyed by `owner/name`.
#[derive(Debug, Default, Clone)]
pub struct StaticHost {
    repositories: BTreeMap<String, RepositoryInfo>,
}

impl StaticHost {
    pub fn with_repository(mut self, full_name: &str, archived: bool) -> Self {
        self.repositories.insert(
            full_name.to_string(),
            RepositoryInfo {
                full_name: full_name.to_string(),
                archived,
                default_branch: Some("main".to_string()),
            },
        );
        self
    }
}

#[async_trait]
impl RepositoryHost for StaticHost {
    async fn repository(&self, full_name: &str) -> Result<Option<RepositoryInfo>, SourceError> {
        Ok(self.repositories.get(full_name).cloned())
    }
}
