//! Catalog ingestion: make every update-center plugin a tracked plugin.

use plugin_health_state::PluginStore;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::CatalogSource;
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Upsert every catalog entry. Stored detail maps are kept; plugins that
/// left the catalog are left untouched.
pub async fn sync_catalog(source: &dyn CatalogSource, store: &dyn PluginStore) -> Result<SyncSummary> {
    let catalog = source.fetch().await?;
    let mut summary = SyncSummary::default();

    for entry in catalog.plugins.values() {
        let (plugin, created) = match store.find_plugin(&entry.name).await {
            Ok(Some(mut existing)) => {
                entry.refresh(&mut existing);
                (existing, false)
            }
            Ok(None) => (entry.to_plugin(), true),
            Err(e) => {
                warn!(plugin = %entry.name, error = %e, "lookup failed during catalog sync");
                summary.failed += 1;
                continue;
            }
        };
        match store.save_plugin(&plugin).await {
            Ok(()) if created => summary.created += 1,
            Ok(()) => summary.updated += 1,
            Err(e) => {
                obs::emit_plugin_save_failed(&plugin.name, &e);
                METRICS.inc_save_failures();
                summary.failed += 1;
            }
        }
    }

    info!(
        event = "catalog.synced",
        created = summary.created,
        updated = summary.updated,
        failed = summary.failed,
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use plugin_health_state::fakes::MemoryPluginStore;
    use plugin_health_state::{Plugin, ProbeResult};

    use super::*;
    use crate::catalog::{Catalog, CatalogPlugin};
    use crate::error::HealthError;
    use crate::fakes::StaticCatalogSource;

    fn entry(name: &str, version: &str) -> CatalogPlugin {
        CatalogPlugin {
            name: name.to_string(),
            version: version.to_string(),
            scm: Some(format!("https://github.com/jenkinsci/{name}-plugin")),
            release_timestamp: None,
            labels: vec![],
            popularity: 0,
            required_core: None,
            default_branch: None,
            issue_trackers: vec![],
        }
    }

    #[tokio::test]
    async fn creates_and_refreshes_keeping_details() {
        let known = Plugin::new("mailer", "1.0", None, None)
            .merge(ProbeResult::success("scm", "valid", 1));
        let store = MemoryPluginStore::with_plugins([known]);
        let catalog = Catalog {
            plugins: [entry("mailer", "2.0"), entry("ant", "1.0")]
                .into_iter()
                .map(|e| (e.name.clone(), e))
                .collect(),
            ..Catalog::default()
        };

        let summary = sync_catalog(&StaticCatalogSource::new(catalog), &store)
            .await
            .unwrap();
        assert_eq!(summary, SyncSummary { created: 1, updated: 1, failed: 0 });

        let mailer = store.find_plugin("mailer").await.unwrap().unwrap();
        assert_eq!(mailer.version, "2.0");
        assert!(mailer.record("scm").is_some());
        assert!(store.find_plugin("ant").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unavailable_catalog_is_fatal() {
        let store = MemoryPluginStore::new();
        let err = sync_catalog(&StaticCatalogSource::failing(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::Catalog(_)));
    }
}
