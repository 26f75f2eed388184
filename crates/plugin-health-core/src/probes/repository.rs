//! Probes that inspect the plugin's working copy.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::SecondsFormat;
use plugin_health_state::Plugin;
use regex::Regex;
use tracing::warn;

use super::scm::SCM_KEY;
use super::{Finding, Probe, ProbeContext};
use crate::error::ProbeError;

pub const LAST_COMMIT_KEY: &str = "last-commit-date";

pub const JENKINSFILE_KEY: &str = "jenkinsfile";
pub const JENKINSFILE_FOUND: &str = "Jenkinsfile found";
pub const JENKINSFILE_MISSING: &str = "No Jenkinsfile found";

pub const CONTRIBUTING_KEY: &str = "contributing-guidelines";
pub const CONTRIBUTING_FOUND: &str = "Contributing guidelines found.";
pub const CONTRIBUTING_MISSING: &str = "No contributing guidelines found.";

pub const DEPENDABOT_KEY: &str = "dependabot";
pub const DEPENDABOT_CONFIGURED: &str = "Dependabot is configured.";
pub const DEPENDABOT_MISSING: &str = "Dependabot is not configured.";

pub const RENOVATE_KEY: &str = "renovate";
pub const RENOVATE_CONFIGURED: &str = "Renovate is configured.";
pub const RENOVATE_MISSING: &str = "Renovate is not configured.";

pub const JUNIT4_KEY: &str = "junit4-imports-ban";
pub const JUNIT4_BANNED: &str = "JUnit 4 imports are banned on the plugin.";
pub const JUNIT4_ALLOWED: &str = "ban-junit4-imports.skip property is not set or true on the plugin.";

pub const CD_KEY: &str = "continuous-delivery";
pub const CD_FOUND: &str = "JEP-229 workflow definition found.";
pub const CD_MISSING: &str = "Could not find JEP-229 workflow definition.";

const CD_WORKFLOW: &str = "jenkins-infra/github-reusable-workflows/.github/workflows/maven-cd.yml";
const CONTRIBUTING_FILES: [&str; 2] = ["contributing.md", "contributing.adoc"];
const CONTRIBUTING_DEPTH: usize = 2;
const RENOVATE_FILES: [&str; 4] = ["renovate.json", "renovate.json5", ".renovaterc", ".renovaterc.json"];

static JUNIT4_SKIP: OnceLock<Regex> = OnceLock::new();

fn junit4_skip_property() -> &'static Regex {
    JUNIT4_SKIP.get_or_init(|| {
        Regex::new(r"<ban-junit4-imports\.skip>\s*([^<\s]*)\s*</ban-junit4-imports\.skip>")
            .expect("valid regex")
    })
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
}

/// Committer date of the checked-out HEAD.
pub struct LastCommitDateProbe;

#[async_trait]
impl Probe for LastCommitDateProbe {
    fn key(&self) -> &'static str {
        LAST_COMMIT_KEY
    }

    fn description(&self) -> &'static str {
        "Registers the date of the last commit on the plugin repository."
    }

    fn order(&self) -> i32 {
        3
    }

    fn needs_checkout(&self) -> bool {
        true
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[SCM_KEY]
    }

    async fn apply(&self, _plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let checkout = ctx.checkout()?;
        Ok(Finding::success(
            checkout
                .last_commit_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        ))
    }
}

pub struct JenkinsfileProbe;

#[async_trait]
impl Probe for JenkinsfileProbe {
    fn key(&self) -> &'static str {
        JENKINSFILE_KEY
    }

    fn description(&self) -> &'static str {
        "Checks whether a Jenkinsfile sits at the repository root."
    }

    fn order(&self) -> i32 {
        4
    }

    fn is_source_related(&self) -> bool {
        true
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[SCM_KEY]
    }

    async fn apply(&self, _plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let root = &ctx.checkout()?.root;
        Ok(Finding::holds(
            is_file(&root.join("Jenkinsfile")).await,
            JENKINSFILE_FOUND,
            JENKINSFILE_MISSING,
        ))
    }
}

/// Looks for `CONTRIBUTING.md` or `CONTRIBUTING.adoc`, any case, at most two
/// levels below the root.
pub struct ContributingGuidelinesProbe;

impl ContributingGuidelinesProbe {
    async fn find(root: &Path) -> std::io::Result<bool> {
        let mut pending: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 1)];
        while let Some((dir, depth)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_lowercase();
                let kind = entry.file_type().await?;
                if kind.is_dir() {
                    if depth < CONTRIBUTING_DEPTH && name != ".git" {
                        pending.push((entry.path(), depth + 1));
                    }
                } else if CONTRIBUTING_FILES.contains(&name.as_str()) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl Probe for ContributingGuidelinesProbe {
    fn key(&self) -> &'static str {
        CONTRIBUTING_KEY
    }

    fn description(&self) -> &'static str {
        "Validates the existence of a CONTRIBUTING.md or CONTRIBUTING.adoc file in the repository."
    }

    fn order(&self) -> i32 {
        4
    }

    fn is_source_related(&self) -> bool {
        true
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[SCM_KEY]
    }

    async fn apply(&self, _plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let root = &ctx.checkout()?.root;
        Ok(Finding::holds(
            Self::find(root).await?,
            CONTRIBUTING_FOUND,
            CONTRIBUTING_MISSING,
        ))
    }
}

pub struct DependabotProbe;

#[async_trait]
impl Probe for DependabotProbe {
    fn key(&self) -> &'static str {
        DEPENDABOT_KEY
    }

    fn description(&self) -> &'static str {
        "Checks if dependabot is configured on the plugin repository."
    }

    fn order(&self) -> i32 {
        4
    }

    fn is_source_related(&self) -> bool {
        true
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[SCM_KEY]
    }

    async fn apply(&self, _plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let github = ctx.checkout()?.root.join(".github");
        for name in ["dependabot.yml", "dependabot.yaml"] {
            if is_file(&github.join(name)).await {
                return Ok(Finding::success(DEPENDABOT_CONFIGURED));
            }
        }
        Ok(Finding::failure(DEPENDABOT_MISSING))
    }
}

/// Renovate reads its configuration from the repository root or `.github/`.
pub struct RenovateProbe;

#[async_trait]
impl Probe for RenovateProbe {
    fn key(&self) -> &'static str {
        RENOVATE_KEY
    }

    fn description(&self) -> &'static str {
        "Checks if Renovate is configured on the plugin repository."
    }

    fn order(&self) -> i32 {
        4
    }

    fn is_source_related(&self) -> bool {
        true
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[SCM_KEY]
    }

    async fn apply(&self, _plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let root = &ctx.checkout()?.root;
        for dir in [root.clone(), root.join(".github")] {
            for name in RENOVATE_FILES {
                if is_file(&dir.join(name)).await {
                    return Ok(Finding::success(RENOVATE_CONFIGURED));
                }
            }
        }
        Ok(Finding::failure(RENOVATE_MISSING))
    }
}

/// Reads the `ban-junit4-imports.skip` Maven property from the root POM.
/// Imports are only banned when the property is explicitly `false`.
pub struct Junit4BanProbe;

#[async_trait]
impl Probe for Junit4BanProbe {
    fn key(&self) -> &'static str {
        JUNIT4_KEY
    }

    fn description(&self) -> &'static str {
        "Checks whether the plugin build bans JUnit 4 imports."
    }

    fn order(&self) -> i32 {
        4
    }

    fn is_source_related(&self) -> bool {
        true
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[SCM_KEY]
    }

    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let pom = ctx.checkout()?.root.join("pom.xml");
        let raw = match tokio::fs::read_to_string(&pom).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProbeError::Other(format!("{} has no pom.xml", plugin.name)));
            }
            Err(e) => return Err(e.into()),
        };
        let skipped = junit4_skip_property()
            .captures(&raw)
            .map_or(true, |caps| !caps[1].eq_ignore_ascii_case("false"));
        Ok(Finding::holds(!skipped, JUNIT4_BANNED, JUNIT4_ALLOWED))
    }
}

/// Detects the JEP-229 continuous delivery reusable workflow.
pub struct ContinuousDeliveryProbe;

impl ContinuousDeliveryProbe {
    fn uses_cd_workflow(workflow: &serde_yaml::Value) -> bool {
        let Some(jobs) = workflow.get("jobs").and_then(|j| j.as_mapping()) else {
            return false;
        };
        jobs.values()
            .filter_map(|job| job.get("uses").and_then(|u| u.as_str()))
            .any(|uses| uses.starts_with(CD_WORKFLOW))
    }
}

#[async_trait]
impl Probe for ContinuousDeliveryProbe {
    fn key(&self) -> &'static str {
        CD_KEY
    }

    fn description(&self) -> &'static str {
        "Checks if JEP-229 (Continuous Delivery) has been activated on the plugin."
    }

    fn order(&self) -> i32 {
        4
    }

    fn is_source_related(&self) -> bool {
        true
    }

    fn requirements(&self) -> &'static [&'static str] {
        &[SCM_KEY]
    }

    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let workflows = ctx.checkout()?.root.join(".github").join("workflows");
        let mut entries = match tokio::fs::read_dir(&workflows).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Finding::failure(CD_MISSING));
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_yaml(&path) || !entry.file_type().await?.is_file() {
                continue;
            }
            let raw = tokio::fs::read_to_string(&path).await?;
            match serde_yaml::from_str::<serde_yaml::Value>(&raw) {
                Ok(workflow) if Self::uses_cd_workflow(&workflow) => {
                    return Ok(Finding::success(CD_FOUND));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(plugin = %plugin.name, file = %path.display(), error = %e, "unreadable workflow");
                }
            }
        }
        Ok(Finding::failure(CD_MISSING))
    }
}
