//! Probes about the plugin's hosted repository.

use std::sync::OnceLock;

use async_trait::async_trait;
use plugin_health_state::Plugin;
use regex::Regex;

use super::catalog_probes::PUBLICATION_KEY;
use super::{Finding, Probe, ProbeContext};
use crate::error::ProbeError;

pub const SCM_KEY: &str = "scm";
pub const SCM_VALID: &str = "The plugin SCM link is valid.";
pub const SCM_INVALID: &str = "The plugin SCM link is invalid.";
pub const SCM_NOT_GITHUB: &str = "SCM link doesn't match GitHub plugin repositories.";

pub const ARCHIVED_KEY: &str = "repository-archived";
pub const ARCHIVED: &str = "Repository is archived.";
pub const NOT_ARCHIVED: &str = "Repository is not archived.";

static SCM_PATTERN: OnceLock<Regex> = OnceLock::new();

fn scm_pattern() -> &'static Regex {
    SCM_PATTERN.get_or_init(|| {
        Regex::new(r"^https://(?P<server>[^/]+)/(?P<repo>jenkinsci/[^/#?]+)").expect("valid regex")
    })
}

/// `jenkinsci/<name>` for a GitHub plugin repository URL, `None` otherwise.
pub fn github_repository(scm: &str) -> Option<String> {
    let caps = scm_pattern().captures(scm.trim())?;
    if !caps["server"].eq_ignore_ascii_case("github.com") {
        return None;
    }
    let repo = &caps["repo"];
    Some(repo.strip_suffix(".git").unwrap_or(repo).to_string())
}

fn scm_link(plugin: &Plugin) -> Result<&str, ProbeError> {
    plugin
        .scm
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProbeError::Other(format!("{} has no SCM link", plugin.name)))
}

/// Validates the declared SCM link against the repository host.
pub struct ScmLinkProbe;

#[async_trait]
impl Probe for ScmLinkProbe {
    fn key(&self) -> &'static str {
        SCM_KEY
    }

    fn description(&self) -> &'static str {
        "Validates that the plugin SCM link points to an existing jenkinsci GitHub repository."
    }

    fn order(&self) -> i32 {
        2
    }

    fn requires_release(&self) -> bool {
        true
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[PUBLICATION_KEY]
    }

    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let scm = scm_link(plugin)?;
        let Some(repo) = github_repository(scm) else {
            return Ok(Finding::failure(SCM_NOT_GITHUB));
        };
        let exists = ctx.host().repository(&repo).await?.is_some();
        Ok(Finding::holds(exists, SCM_VALID, SCM_INVALID))
    }
}

pub struct RepositoryArchivedProbe;

#[async_trait]
impl Probe for RepositoryArchivedProbe {
    fn key(&self) -> &'static str {
        ARCHIVED_KEY
    }

    fn description(&self) -> &'static str {
        "Checks whether the plugin repository has been archived."
    }

    fn order(&self) -> i32 {
        3
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[SCM_KEY]
    }

    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let scm = scm_link(plugin)?;
        let repo = github_repository(scm)
            .ok_or_else(|| ProbeError::Other(format!("{scm} is not a GitHub repository")))?;
        let info = ctx
            .host()
            .repository(&repo)
            .await?
            .ok_or_else(|| ProbeError::Other(format!("repository {repo} not found")))?;
        Ok(Finding::holds(!info.archived, NOT_ARCHIVED, ARCHIVED))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::Catalog;
    use crate::fakes::StaticHost;
    use crate::probes::{execute, PassInputs};
    use plugin_health_state::{ProbeResult, ProbeStatus};

    #[test]
    fn scm_pattern_compiles() {
        assert!(scm_pattern().is_match("https://github.com/jenkinsci/x-plugin"));
    }

    #[test]
    fn github_repository_extraction() {
        assert_eq!(
            github_repository("https://github.com/jenkinsci/mailer-plugin").as_deref(),
            Some("jenkinsci/mailer-plugin")
        );
        assert_eq!(
            github_repository("https://github.com/jenkinsci/mailer-plugin.git").as_deref(),
            Some("jenkinsci/mailer-plugin")
        );
        assert_eq!(
            github_repository("https://github.com/jenkinsci/git-plugin/tree/main/sub").as_deref(),
            Some("jenkinsci/git-plugin")
        );
        assert!(github_repository("https://gitlab.com/jenkinsci/mailer-plugin").is_none());
        assert!(github_repository("https://github.com/someone/mailer-plugin").is_none());
        assert!(github_repository("not a url").is_none());
    }

    fn ctx(host: StaticHost) -> ProbeContext {
        ProbeContext::new(
            PassInputs {
                catalog: Arc::new(Catalog::default()),
                documentation: Arc::default(),
                host: Arc::new(host),
            },
            None,
        )
        .unwrap()
    }

    fn published(scm: Option<&str>) -> Plugin {
        Plugin::new("mailer", "1.0", scm.map(String::from), None)
            .merge(ProbeResult::success(PUBLICATION_KEY, "published", 1))
    }

    #[tokio::test]
    async fn scm_link_outcomes() {
        let ctx = ctx(StaticHost::default().with_repository("jenkinsci/mailer-plugin", false));
        let cases = [
            (Some("https://github.com/jenkinsci/mailer-plugin"), ProbeStatus::Success, SCM_VALID),
            (Some("https://github.com/jenkinsci/missing-plugin"), ProbeStatus::Failure, SCM_INVALID),
            (Some("https://svn.example.org/mailer"), ProbeStatus::Failure, SCM_NOT_GITHUB),
        ];
        for (scm, status, expected) in cases {
            let record = execute(&ScmLinkProbe, &published(scm), &ctx).await;
            assert_eq!(record.status, status, "scm {scm:?}");
            assert_eq!(record.message, expected, "scm {scm:?}");
        }
    }

    #[tokio::test]
    async fn scm_link_missing_is_error() {
        let ctx = ctx(StaticHost::default());
        let record = execute(&ScmLinkProbe, &published(None), &ctx).await;
        assert!(record.is_error());
    }

    #[tokio::test]
    async fn scm_requires_publication_record() {
        let ctx = ctx(StaticHost::default());
        let plugin = Plugin::new(
            "mailer",
            "1.0",
            Some("https://github.com/jenkinsci/mailer-plugin".into()),
            None,
        );
        let record = execute(&ScmLinkProbe, &plugin, &ctx).await;
        assert!(record.is_error());
        assert_eq!(
            record.message,
            "scm does not meet the criteria to be executed on mailer"
        );
    }

    #[tokio::test]
    async fn invalid_scm_blocks_archived_check() {
        let ctx = ctx(StaticHost::default().with_repository("jenkinsci/old-plugin", true));
        let plugin = Plugin::new(
            "p",
            "1.0",
            Some("https://github.com/jenkinsci/old-plugin".into()),
            None,
        )
        .merge(ProbeResult::failure(SCM_KEY, SCM_INVALID, 1));
        let record = execute(&RepositoryArchivedProbe, &plugin, &ctx).await;
        assert!(record.is_error());
        assert_eq!(
            record.message,
            "repository-archived does not meet the criteria to be executed on p"
        );
    }

    #[tokio::test]
    async fn archived_status() {
        let ctx = ctx(
            StaticHost::default()
                .with_repository("jenkinsci/old-plugin", true)
                .with_repository("jenkinsci/new-plugin", false),
        );
        for (repo, expected) in [
            ("old-plugin", Finding::failure(ARCHIVED)),
            ("new-plugin", Finding::success(NOT_ARCHIVED)),
        ] {
            let plugin = Plugin::new(
                "p",
                "1.0",
                Some(format!("https://github.com/jenkinsci/{repo}")),
                None,
            )
            .merge(ProbeResult::success(SCM_KEY, SCM_VALID, 1));
            assert_eq!(RepositoryArchivedProbe.apply(&plugin, &ctx).await.unwrap(), expected);
        }
    }
}
