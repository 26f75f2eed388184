use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use plugin_health_state::Plugin;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::catalog::{Catalog, DocumentationUrls};
use crate::error::ProbeError;
use crate::source::{Checkout, RepositoryHost, SourceControl};

/// Batch-wide inputs, fetched once and shared read-only by every plugin task.
#[derive(Clone)]
pub struct PassInputs {
    pub catalog: Arc<Catalog>,
    pub documentation: Arc<DocumentationUrls>,
    pub host: Arc<dyn RepositoryHost>,
}

enum CheckoutState {
    NotAttempted,
    Ready(Checkout),
    Unavailable(String),
}

/// Per-plugin scratch resources for one probe pass.
///
/// Owns a private temporary directory that holds the working copy. The
/// directory is removed when the context is closed or dropped.
pub struct ProbeContext {
    inputs: PassInputs,
    scratch: TempDir,
    checkout: CheckoutState,
}

impl ProbeContext {
    /// Create the scratch directory under `work_dir`, or the system temp
    /// directory when none is configured.
    pub fn new(inputs: PassInputs, work_dir: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("plugin-health-");
        let scratch = match work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self {
            inputs,
            scratch,
            checkout: CheckoutState::NotAttempted,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inputs.catalog
    }

    pub fn documentation(&self) -> &DocumentationUrls {
        &self.inputs.documentation
    }

    pub fn host(&self) -> &dyn RepositoryHost {
        self.inputs.host.as_ref()
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Clone the plugin repository on first use. Later calls are no-ops, so
    /// a failed clone is not retried within the same pass.
    pub async fn ensure_checkout(&mut self, plugin: &Plugin, source: &dyn SourceControl) {
        if !matches!(self.checkout, CheckoutState::NotAttempted) {
            return;
        }
        let Some(url) = plugin.scm.as_deref().filter(|s| !s.trim().is_empty()) else {
            self.checkout = CheckoutState::Unavailable(format!("{} has no SCM link", plugin.name));
            return;
        };

        let dest = self.scratch.path().join("repository");
        self.checkout = match source.checkout(url, &dest).await {
            Ok(checkout) => {
                debug!(plugin = %plugin.name, last_commit = %checkout.last_commit_at, "checkout ready");
                CheckoutState::Ready(checkout)
            }
            Err(e) => {
                warn!(plugin = %plugin.name, error = %e, "checkout failed");
                CheckoutState::Unavailable(e.to_string())
            }
        };
    }

    /// The working copy, or why there is none.
    pub fn checkout(&self) -> Result<&Checkout, ProbeError> {
        match &self.checkout {
            CheckoutState::Ready(checkout) => Ok(checkout),
            CheckoutState::Unavailable(reason) => Err(ProbeError::NoCheckout(reason.clone())),
            CheckoutState::NotAttempted => {
                Err(ProbeError::NoCheckout("checkout was not prepared".to_string()))
            }
        }
    }

    pub fn last_commit_at(&self) -> Option<DateTime<Utc>> {
        match &self.checkout {
            CheckoutState::Ready(checkout) => Some(checkout.last_commit_at),
            _ => None,
        }
    }

    /// Remove the scratch directory, logging rather than failing.
    pub fn close(self) {
        let path = self.scratch.path().to_path_buf();
        if let Err(e) = self.scratch.close() {
            warn!(path = %path.display(), error = %e, "failed to clean up probe context");
        }
    }
}
