//! Probes answered from the update-center snapshot alone.

use async_trait::async_trait;
use plugin_health_state::Plugin;

use super::{Finding, Probe, ProbeContext};
use crate::catalog::CatalogPlugin;
use crate::error::ProbeError;

pub const ADOPTION_KEY: &str = "up-for-adoption";
pub const UP_FOR_ADOPTION: &str = "This plugin is up for adoption.";
pub const NOT_UP_FOR_ADOPTION: &str = "This plugin is not up for adoption.";

pub const DEPRECATION_KEY: &str = "deprecation";
pub const DEPRECATED: &str = "This plugin is marked as deprecated.";
pub const NOT_DEPRECATED: &str = "This plugin is NOT deprecated.";

pub const PUBLICATION_KEY: &str = "update-center-plugin-publication";
pub const PUBLISHED: &str = "This plugin is still actively published by the update-center.";
pub const NOT_PUBLISHED: &str = "This plugin's publication has been stopped by the update-center.";

pub const SECURITY_KEY: &str = "security-warnings";
pub const NO_KNOWN_VULNERABILITY: &str = "Plugin is not affected by a known security vulnerability.";
pub const VULNERABLE_PREFIX: &str = "Plugin is affected by a security vulnerability:";

const ADOPTION_LABEL: &str = "adopt-this-plugin";

fn catalog_entry<'a>(plugin: &Plugin, ctx: &'a ProbeContext) -> Result<&'a CatalogPlugin, ProbeError> {
    ctx.catalog()
        .plugin(&plugin.name)
        .ok_or_else(|| ProbeError::NotInCatalog(plugin.name.clone()))
}

/// Whether the maintainers are looking for someone to take over.
pub struct UpForAdoptionProbe;

#[async_trait]
impl Probe for UpForAdoptionProbe {
    fn key(&self) -> &'static str {
        ADOPTION_KEY
    }

    fn description(&self) -> &'static str {
        "Detects whether the plugin is marked as up for adoption."
    }

    fn order(&self) -> i32 {
        1
    }

    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let entry = catalog_entry(plugin, ctx)?;
        Ok(Finding::holds(
            !entry.has_label(ADOPTION_LABEL),
            NOT_UP_FOR_ADOPTION,
            UP_FOR_ADOPTION,
        ))
    }
}

pub struct DeprecationProbe;

#[async_trait]
impl Probe for DeprecationProbe {
    fn key(&self) -> &'static str {
        DEPRECATION_KEY
    }

    fn description(&self) -> &'static str {
        "Detects whether the plugin is deprecated, by label or by deprecation notice."
    }

    fn order(&self) -> i32 {
        1
    }

    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        catalog_entry(plugin, ctx)?;
        Ok(Finding::holds(
            !ctx.catalog().is_deprecated(&plugin.name),
            NOT_DEPRECATED,
            DEPRECATED,
        ))
    }
}

/// A plugin dropped from the update-center is still tracked, so absence is a
/// finding rather than a failure here.
pub struct PublicationProbe;

#[async_trait]
impl Probe for PublicationProbe {
    fn key(&self) -> &'static str {
        PUBLICATION_KEY
    }

    fn description(&self) -> &'static str {
        "Checks whether the update-center still distributes the plugin."
    }

    fn order(&self) -> i32 {
        1
    }

    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        Ok(Finding::holds(
            ctx.catalog().plugin(&plugin.name).is_some(),
            PUBLISHED,
            NOT_PUBLISHED,
        ))
    }
}

pub struct SecurityWarningsProbe;

#[async_trait]
impl Probe for SecurityWarningsProbe {
    fn key(&self) -> &'static str {
        SECURITY_KEY
    }

    fn description(&self) -> &'static str {
        "Matches the latest plugin version against published security warnings."
    }

    fn order(&self) -> i32 {
        1
    }

    async fn apply(&self, plugin: &Plugin, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        let warnings = ctx.catalog().warnings_for(&plugin.name, &plugin.version);
        if warnings.is_empty() {
            return Ok(Finding::success(NO_KNOWN_VULNERABILITY));
        }
        let ids: Vec<&str> = warnings.iter().map(|w| w.id.as_str()).collect();
        Ok(Finding::failure(format!("{VULNERABLE_PREFIX} {}", ids.join(", "))))
    }
}
