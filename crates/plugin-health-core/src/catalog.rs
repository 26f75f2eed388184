//! Update-center catalog and documentation index.
//!
//! Both are fetched once per probe pass and shared read-only across every
//! plugin task.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plugin_health_state::Plugin;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CatalogError;

/// Plugin documentation URLs keyed by plugin name.
pub type DocumentationUrls = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTracker {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub view_url: Option<String>,
    #[serde(default)]
    pub report_url: Option<String>,
}

/// One plugin entry of the update-center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPlugin {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub scm: Option<String>,
    #[serde(default)]
    pub release_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub popularity: u64,
    #[serde(default)]
    pub required_core: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub issue_trackers: Vec<IssueTracker>,
}

impl CatalogPlugin {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// A new tracked plugin with an empty detail map.
    pub fn to_plugin(&self) -> Plugin {
        Plugin::new(
            self.name.clone(),
            self.version.clone(),
            self.scm.clone(),
            self.release_timestamp,
        )
    }

    /// Copy catalog-owned attributes onto an already tracked plugin.
    pub fn refresh(&self, plugin: &mut Plugin) {
        plugin.refresh(self.version.clone(), self.scm.clone(), self.release_timestamp);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deprecation {
    pub url: String,
}

/// Affected-version regular expression, compiled once when the catalog is
/// decoded. It must match the whole version string; an invalid pattern never
/// matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VersionPattern {
    source: String,
    compiled: Option<Regex>,
}

impl VersionPattern {
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, version: &str) -> bool {
        self.compiled.as_ref().is_some_and(|re| re.is_match(version))
    }
}

impl From<String> for VersionPattern {
    fn from(source: String) -> Self {
        let compiled = match Regex::new(&format!("^(?:{source})$")) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %source, error = %e, "invalid version pattern");
                None
            }
        };
        Self { source, compiled }
    }
}

impl From<&str> for VersionPattern {
    fn from(source: &str) -> Self {
        Self::from(source.to_string())
    }
}

impl From<VersionPattern> for String {
    fn from(pattern: VersionPattern) -> Self {
        pattern.source
    }
}

impl PartialEq for VersionPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for VersionPattern {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningVersion {
    #[serde(default)]
    pub last_version: Option<String>,
    pub pattern: VersionPattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityWarning {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub versions: Vec<WarningVersion>,
}

impl SecurityWarning {
    /// Whether `version` matches one of the affected version patterns.
    pub fn affects(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v.pattern.is_match(version))
    }
}

/// Immutable snapshot of the update-center.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub plugins: BTreeMap<String, CatalogPlugin>,
    #[serde(default)]
    pub deprecations: BTreeMap<String, Deprecation>,
    #[serde(default)]
    pub warnings: Vec<SecurityWarning>,
}

impl Catalog {
    pub fn plugin(&self, name: &str) -> Option<&CatalogPlugin> {
        self.plugins.get(name)
    }

    pub fn is_deprecated(&self, name: &str) -> bool {
        self.deprecations.contains_key(name)
            || self
                .plugin(name)
                .map(|p| p.has_label("deprecated"))
                .unwrap_or(false)
    }

    /// Plugin-type warnings for `name` affecting `version`.
    pub fn warnings_for(&self, name: &str, version: &str) -> Vec<&SecurityWarning> {
        self.warnings
            .iter()
            .filter(|w| w.kind == "plugin" && w.name == name && w.affects(version))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Injectable provider of the update-center snapshot.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<Catalog, CatalogError>;
}

/// Injectable provider of the documentation index.
#[async_trait]
pub trait DocumentationIndex: Send + Sync {
    async fn fetch(&self) -> Result<DocumentationUrls, CatalogError>;
}

async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, CatalogError> {
    debug!(url = %url, "fetching");
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| CatalogError::Http {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
    let body = response.text().await.map_err(|e| CatalogError::Http {
        url: url.to_string(),
        detail: e.to_string(),
    })?;
    serde_json::from_str(&body).map_err(|e| CatalogError::Decode {
        url: url.to_string(),
        detail: e.to_string(),
    })
}

/// Update-center served over HTTP.
pub struct HttpCatalogSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCatalogSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> Result<Catalog, CatalogError> {
        let catalog: Catalog = get_json(&self.client, &self.url).await?;
        debug!(plugins = catalog.plugins.len(), "catalog fetched");
        Ok(catalog)
    }
}

#[derive(Deserialize)]
struct Link {
    #[serde(default)]
    url: Option<String>,
}

/// Documentation index served over HTTP as `{name: {url}}`.
pub struct HttpDocumentationIndex {
    client: reqwest::Client,
    url: String,
}

impl HttpDocumentationIndex {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl DocumentationIndex for HttpDocumentationIndex {
    async fn fetch(&self) -> Result<DocumentationUrls, CatalogError> {
        let links: BTreeMap<String, Link> = get_json(&self.client, &self.url).await?;
        Ok(links
            .into_iter()
            .filter_map(|(name, link)| link.url.map(|url| (name, url)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPDATE_CENTER: &str = r#"{
        "connectionCheckUrl": "https://www.google.com/",
        "id": "default",
        "plugins": {
            "mailer": {
                "name": "mailer",
                "version": "1.2.3",
                "scm": "https://github.com/jenkinsci/mailer-plugin",
                "releaseTimestamp": "2023-01-12T12:36:22.00Z",
                "labels": ["adopt-this-plugin"],
                "popularity": 1200,
                "requiredCore": "2.361.4",
                "defaultBranch": "main",
                "issueTrackers": [{"type": "github", "viewUrl": "https://github.com/jenkinsci/mailer-plugin/issues", "reportUrl": null}]
            },
            "old": {
                "name": "old",
                "version": "0.1",
                "labels": ["deprecated"]
            }
        },
        "deprecations": {"ant": {"url": "https://wiki.example/ant"}},
        "warnings": [
            {"type": "plugin", "id": "SECURITY-1", "name": "mailer", "message": "XSS", "url": "https://sec.example/1",
             "versions": [{"lastVersion": "1.2.3", "pattern": "1[.]2[.][0-3]"}]},
            {"type": "core", "id": "SECURITY-2", "name": "core", "message": "", "url": "",
             "versions": [{"pattern": ".*"}]}
        ]
    }"#;

    fn catalog() -> Catalog {
        serde_json::from_str(UPDATE_CENTER).unwrap()
    }

    #[test]
    fn parses_update_center_shape() {
        let c = catalog();
        let mailer = c.plugin("mailer").unwrap();
        assert_eq!(mailer.version, "1.2.3");
        assert!(mailer.has_label("adopt-this-plugin"));
        assert_eq!(mailer.issue_trackers[0].kind, "github");
        assert!(mailer.release_timestamp.is_some());
        assert!(c.plugin("old").unwrap().scm.is_none());
    }

    #[test]
    fn deprecation_by_label_or_map() {
        let mut c = catalog();
        let ant = CatalogPlugin {
            name: "ant".into(),
            labels: vec![],
            ..c.plugin("old").unwrap().clone()
        };
        c.plugins.insert("ant".into(), ant);
        assert!(c.is_deprecated("old"));
        assert!(c.is_deprecated("ant"));
        assert!(!c.is_deprecated("mailer"));
    }

    #[test]
    fn warnings_match_whole_version() {
        let c = catalog();
        assert_eq!(c.warnings_for("mailer", "1.2.3").len(), 1);
        assert!(c.warnings_for("mailer", "1.2.4").is_empty());
        assert!(c.warnings_for("mailer", "11.2.3").is_empty());
        // core warnings never apply to plugins
        assert!(c.warnings_for("core", "1.0").is_empty());
    }

    #[test]
    fn invalid_pattern_never_matches() {
        let w = SecurityWarning {
            kind: "plugin".into(),
            id: "SECURITY-3".into(),
            name: "x".into(),
            message: String::new(),
            url: String::new(),
            versions: vec![WarningVersion {
                last_version: None,
                pattern: "(".into(),
            }],
        };
        assert!(!w.affects("1.0"));
        assert_eq!(w.versions[0].pattern.as_str(), "(");
    }

    #[test]
    fn patterns_compiled_at_decode_and_kept_on_encode() {
        let c = catalog();
        let pattern = &c.warnings[0].versions[0].pattern;
        assert!(pattern.is_match("1.2.0"));
        assert!(!pattern.is_match("1.2.9"));

        let json = serde_json::to_value(&c.warnings[0]).unwrap();
        assert_eq!(json["versions"][0]["pattern"], "1[.]2[.][0-3]");
    }

    #[test]
    fn catalog_entry_refreshes_plugin() {
        let c = catalog();
        let entry = c.plugin("mailer").unwrap();
        let mut plugin = Plugin::new("mailer", "1.0", None, None);
        entry.refresh(&mut plugin);
        assert_eq!(plugin.version, "1.2.3");
        assert_eq!(plugin.scm.as_deref(), Some("https://github.com/jenkinsci/mailer-plugin"));
        assert_eq!(entry.to_plugin().release_timestamp, entry.release_timestamp);
    }
}
