use async_trait::async_trait;
use plugin_health_state::Plugin;

use super::scm::SCM_KEY;
use super::{Finding, Probe, ProbeContext};
use crate::error::ProbeError;

pub const DOCUMENTATION_KEY: &str = "documentation-migration";
pub const DOCUMENTATION_MIGRATED: &str = "Documentation is located in the plugin repository.";
pub const DOCUMENTATION_NOT_MIGRATED: &str =
    "Documentation is not located in the plugin repository.";
pub const DOCUMENTATION_NOT_LISTED: &str =
    "Plugin is not listed in documentation migration source.";

/// `url` points at `repository` itself or at a path below it.
fn inside_repository(url: &str, repository: &str) -> bool {
    url.strip_prefix(repository)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '#', '?']))
}

/// Whether the documentation URL published for the plugin lives inside its
/// own repository.
pub struct DocumentationMigrationProbe;

#[async_trait]
impl Probe for DocumentationMigrationProbe {
    fn key(&self) -> &'static str {
        DOCUMENTATION_KEY
    }

    fn description(&self) -> &'static str {
        "Checks whether the plugin documentation was migrated to its repository."
    }

    fn order(&self) -> i32 {
        3
    }

    fn requires_release(&self) -> bool {
        true
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[SCM_KEY]
    }

    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let index = ctx.documentation();
        if index.is_empty() {
            return Err(ProbeError::Other(
                "No link to documentation can be confirmed".to_string(),
            ));
        }
        let Some(url) = index.get(&plugin.name) else {
            return Ok(Finding::failure(DOCUMENTATION_NOT_LISTED));
        };
        let scm = plugin
            .scm
            .as_deref()
            .map(|s| s.trim().trim_end_matches('/'))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProbeError::Other(format!("{} has no SCM link", plugin.name)))?;

        Ok(Finding::holds(
            inside_repository(url.trim(), scm),
            DOCUMENTATION_MIGRATED,
            DOCUMENTATION_NOT_MIGRATED,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::Catalog;
    use crate::fakes::StaticHost;
    use crate::probes::PassInputs;

    fn ctx(urls: &[(&str, &str)]) -> ProbeContext {
        ProbeContext::new(
            PassInputs {
                catalog: Arc::new(Catalog::default()),
                documentation: Arc::new(
                    urls.iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                host: Arc::new(StaticHost::default()),
            },
            None,
        )
        .unwrap()
    }

    fn plugin(name: &str) -> Plugin {
        Plugin::new(
            name,
            "1.0",
            Some(format!("https://github.com/jenkinsci/{name}-plugin/")),
            None,
        )
    }

    #[tokio::test]
    async fn migrated_when_url_is_inside_repository() {
        let ctx = ctx(&[
            ("mailer", "https://github.com/jenkinsci/mailer-plugin/blob/main/README.md"),
            ("ant", "https://wiki.jenkins.io/display/JENKINS/Ant+Plugin"),
            ("git", "https://github.com/jenkinsci/git-plugin"),
        ]);
        assert_eq!(
            DocumentationMigrationProbe
                .apply(&plugin("mailer"), &ctx)
                .await
                .unwrap(),
            Finding::success(DOCUMENTATION_MIGRATED)
        );
        assert_eq!(
            DocumentationMigrationProbe
                .apply(&plugin("git"), &ctx)
                .await
                .unwrap(),
            Finding::success(DOCUMENTATION_MIGRATED)
        );
        assert_eq!(
            DocumentationMigrationProbe
                .apply(&plugin("ant"), &ctx)
                .await
                .unwrap(),
            Finding::failure(DOCUMENTATION_NOT_MIGRATED)
        );
    }

    #[tokio::test]
    async fn sibling_repository_is_not_a_migration() {
        let ctx = ctx(&[(
            "mailer",
            "https://github.com/jenkinsci/mailer-plugin-extras/blob/main/README.md",
        )]);
        assert_eq!(
            DocumentationMigrationProbe
                .apply(&plugin("mailer"), &ctx)
                .await
                .unwrap(),
            Finding::failure(DOCUMENTATION_NOT_MIGRATED)
        );
    }

    #[tokio::test]
    async fn unlisted_plugin_is_a_durable_failure() {
        let ctx = ctx(&[("ant", "https://wiki.jenkins.io/display/JENKINS/Ant+Plugin")]);
        assert_eq!(
            DocumentationMigrationProbe
                .apply(&plugin("mailer"), &ctx)
                .await
                .unwrap(),
            Finding::failure(DOCUMENTATION_NOT_LISTED)
        );
    }

    #[tokio::test]
    async fn empty_index_is_an_error() {
        let err = DocumentationMigrationProbe
            .apply(&plugin("mailer"), &ctx(&[]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No link to documentation"));
    }

    #[test]
    fn repository_boundary() {
        let repo = "https://github.com/jenkinsci/mailer";
        assert!(inside_repository(repo, repo));
        assert!(inside_repository("https://github.com/jenkinsci/mailer/tree/main/docs", repo));
        assert!(inside_repository("https://github.com/jenkinsci/mailer#readme", repo));
        assert!(!inside_repository("https://github.com/jenkinsci/mailer-extras/", repo));
    }
}
