//! The built-in scorings.

use chrono::{DateTime, Duration, Utc};
use plugin_health_state::ProbeResult;

use super::{unexpected, Component, RuleScoring, Verdict};
use crate::error::ScoringError;
use crate::probes::catalog_probes::{
    ADOPTION_KEY, DEPRECATED, DEPRECATION_KEY, NOT_DEPRECATED, NOT_PUBLISHED, NOT_UP_FOR_ADOPTION,
    NO_KNOWN_VULNERABILITY, PUBLICATION_KEY, PUBLISHED, SECURITY_KEY, UP_FOR_ADOPTION,
    VULNERABLE_PREFIX,
};
use crate::probes::documentation::{
    DOCUMENTATION_KEY, DOCUMENTATION_MIGRATED, DOCUMENTATION_NOT_LISTED, DOCUMENTATION_NOT_MIGRATED,
};
use crate::probes::repository::{
    CD_FOUND, CD_KEY, CD_MISSING, CONTRIBUTING_FOUND, CONTRIBUTING_KEY, CONTRIBUTING_MISSING,
    DEPENDABOT_CONFIGURED, DEPENDABOT_KEY, DEPENDABOT_MISSING, JENKINSFILE_FOUND,
    JENKINSFILE_KEY, JENKINSFILE_MISSING, JUNIT4_ALLOWED, JUNIT4_BANNED, JUNIT4_KEY,
    LAST_COMMIT_KEY, RENOVATE_CONFIGURED, RENOVATE_KEY, RENOVATE_MISSING,
};
use crate::probes::scm::{ARCHIVED, ARCHIVED_KEY, NOT_ARCHIVED};

pub const ADOPTION: &str = "adoption";
pub const DEPRECATION: &str = "deprecation";
pub const PUBLICATION: &str = "update-center-plugin-publication";
pub const SECURITY: &str = "security";
pub const DOCUMENTATION: &str = "documentation";
pub const REPOSITORY_CONFIGURATION: &str = "repository-configuration";
pub const JUNIT4_BAN: &str = "junit4-ban";

// ---------------------------------------------------------------------------
// Adoption
// ---------------------------------------------------------------------------

fn not_up_for_adoption(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        NOT_UP_FOR_ADOPTION => Ok(Verdict::pass("The plugin is not marked as up for adoption.")),
        UP_FOR_ADOPTION => Ok(Verdict::fail("The plugin is marked as up for adoption.")
            .with_resolution(
                "See how to adopt a plugin",
                "https://www.jenkins.io/doc/developer/plugin-governance/adopt-a-plugin/",
            )),
        _ => Err(unexpected(record)),
    }
}

/// Score for a commit made `age` ago.
pub fn commit_age_value(age: Duration) -> u8 {
    if age <= Duration::days(6 * 30) {
        100
    } else if age <= Duration::days(365) {
        75
    } else if age <= Duration::days(2 * 365) {
        25
    } else {
        0
    }
}

fn recent_commit(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    let committed = DateTime::parse_from_rfc3339(record.message.trim())
        .map_err(|e| ScoringError::MalformedRecord {
            probe: record.id.clone(),
            detail: e.to_string(),
        })?
        .with_timezone(&Utc);
    let value = commit_age_value(Utc::now() - committed);
    let reason = match value {
        100 => "At least one commit happened in the last 6 months.",
        75 => "At least one commit happened in the last year.",
        25 => "At least one commit happened in the last 2 years.",
        _ => "No commit in the last 2 years.",
    };
    Ok(Verdict::new(value, reason))
}

pub fn adoption() -> RuleScoring {
    RuleScoring {
        key: ADOPTION,
        description: "Scores plugin based on its adoption status and the freshness of its last commit.",
        weight: 0.8,
        version: 1,
        components: vec![
            Component {
                probes: &[ADOPTION_KEY],
                weight: 1.0,
                evaluate: not_up_for_adoption,
            },
            Component {
                probes: &[LAST_COMMIT_KEY],
                weight: 0.5,
                evaluate: recent_commit,
            },
        ],
    }
}

// ---------------------------------------------------------------------------
// Catalog-only scorings
// ---------------------------------------------------------------------------

fn not_deprecated(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        NOT_DEPRECATED => Ok(Verdict::pass("Plugin is not marked as deprecated.")),
        DEPRECATED => Ok(Verdict::fail("Plugin is marked as deprecated.")),
        _ => Err(unexpected(record)),
    }
}

pub fn deprecation() -> RuleScoring {
    RuleScoring {
        key: DEPRECATION,
        description: "Scores plugin based on its deprecation status.",
        weight: 0.8,
        version: 1,
        components: vec![Component {
            probes: &[DEPRECATION_KEY],
            weight: 1.0,
            evaluate: not_deprecated,
        }],
    }
}

fn still_published(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        PUBLISHED => Ok(Verdict::pass("The plugin appears in the update-center.")),
        NOT_PUBLISHED => Ok(Verdict::fail("The plugin is not part of the update-center.")),
        _ => Err(unexpected(record)),
    }
}

pub fn publication() -> RuleScoring {
    RuleScoring {
        key: PUBLICATION,
        description: "Scores a plugin based on its presence or not in the update-center.",
        weight: 1.0,
        version: 1,
        components: vec![Component {
            probes: &[PUBLICATION_KEY],
            weight: 1.0,
            evaluate: still_published,
        }],
    }
}

fn no_known_vulnerability(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    let message = record.message.as_str();
    if message == NO_KNOWN_VULNERABILITY {
        Ok(Verdict::pass("No known security vulnerability affects the latest release."))
    } else if let Some(ids) = message.strip_prefix(VULNERABLE_PREFIX) {
        Ok(Verdict::fail(format!("The latest release is affected by {}.", ids.trim()))
            .with_resolution("See the security advisories", "https://www.jenkins.io/security/advisories/"))
    } else {
        Err(unexpected(record))
    }
}

pub fn security() -> RuleScoring {
    RuleScoring {
        key: SECURITY,
        description: "Scores plugin based on current and active security warnings.",
        weight: 1.0,
        version: 1,
        components: vec![Component {
            probes: &[SECURITY_KEY],
            weight: 1.0,
            evaluate: no_known_vulnerability,
        }],
    }
}

// ---------------------------------------------------------------------------
// Repository-backed scorings
// ---------------------------------------------------------------------------

fn documentation_migrated(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        DOCUMENTATION_MIGRATED => Ok(Verdict::pass("Documentation is in plugin repository.")),
        DOCUMENTATION_NOT_LISTED => Ok(Verdict::fail(
            "Plugin is not listed in the documentation migration source.",
        )),
        DOCUMENTATION_NOT_MIGRATED => Ok(Verdict::fail(
            "Documentation should be migrated in plugin repository.",
        )
        .with_resolution(
            "See how to migrate the documentation",
            "https://www.jenkins.io/doc/developer/tutorial-improve/migrate-documentation-to-github/",
        )),
        _ => Err(unexpected(record)),
    }
}

fn contributing_guide(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        CONTRIBUTING_FOUND => Ok(Verdict::pass("Plugin seems to have a dedicated contributing guide.")),
        CONTRIBUTING_MISSING => Ok(Verdict::fail("The plugin relies on the global contributing guide.")
            .with_resolution(
                "See why and how to add a contributing guide",
                "https://www.jenkins.io/doc/developer/tutorial-improve/add-a-contributing-guide/",
            )),
        _ => Err(unexpected(record)),
    }
}

pub fn documentation() -> RuleScoring {
    RuleScoring {
        key: DOCUMENTATION,
        description: "Validates that the plugin has a specific contributing guide and a documentation.",
        weight: 0.5,
        version: 1,
        components: vec![
            Component {
                probes: &[DOCUMENTATION_KEY],
                weight: 1.0,
                evaluate: documentation_migrated,
            },
            Component {
                probes: &[CONTRIBUTING_KEY],
                weight: 0.5,
                evaluate: contributing_guide,
            },
        ],
    }
}

fn jenkinsfile(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        JENKINSFILE_FOUND => Ok(Verdict::pass("The plugin is built on ci.jenkins.io.")),
        JENKINSFILE_MISSING => Ok(Verdict::fail("The plugin has no Jenkinsfile.").with_resolution(
            "See how to build a plugin on ci.jenkins.io",
            "https://www.jenkins.io/doc/developer/tutorial-improve/add-a-jenkinsfile/",
        )),
        _ => Err(unexpected(record)),
    }
}

fn dependency_bot(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        DEPENDABOT_CONFIGURED => Ok(Verdict::pass("Dependencies are kept up to date by Dependabot.")),
        RENOVATE_CONFIGURED => Ok(Verdict::pass("Dependencies are kept up to date by Renovate.")),
        DEPENDABOT_MISSING | RENOVATE_MISSING => Ok(Verdict::fail("No automated dependency updates.").with_resolution(
            "See how to automate dependency updates",
            "https://www.jenkins.io/doc/developer/tutorial-improve/automate-dependency-update-checks/",
        )),
        _ => Err(unexpected(record)),
    }
}

fn continuous_delivery(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        CD_FOUND => Ok(Verdict::pass("Releases are published by continuous delivery.")),
        CD_MISSING => Ok(Verdict::fail("Releases are not published by continuous delivery.")
            .with_resolution(
                "See how to enable continuous delivery",
                "https://www.jenkins.io/doc/developer/publishing/releasing-cd/",
            )),
        _ => Err(unexpected(record)),
    }
}

fn not_archived(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        NOT_ARCHIVED => Ok(Verdict::pass("The repository is active.")),
        ARCHIVED => Ok(Verdict::fail("The repository is archived.")),
        _ => Err(unexpected(record)),
    }
}

pub fn repository_configuration() -> RuleScoring {
    RuleScoring {
        key: REPOSITORY_CONFIGURATION,
        description: "Scores the build, dependency and release tooling configured in the repository.",
        weight: 0.5,
        version: 1,
        components: vec![
            Component {
                probes: &[JENKINSFILE_KEY],
                weight: 0.65,
                evaluate: jenkinsfile,
            },
            Component {
                probes: &[DEPENDABOT_KEY, RENOVATE_KEY],
                weight: 0.15,
                evaluate: dependency_bot,
            },
            Component {
                probes: &[CD_KEY],
                weight: 0.2,
                evaluate: continuous_delivery,
            },
            Component {
                probes: &[ARCHIVED_KEY],
                weight: 0.5,
                evaluate: not_archived,
            },
        ],
    }
}

// ---------------------------------------------------------------------------
// Informational
// ---------------------------------------------------------------------------

fn junit4_banned(record: &ProbeResult) -> Result<Verdict, ScoringError> {
    match record.message.as_str() {
        JUNIT4_BANNED => Ok(Verdict::pass("JUnit4 imports are banned on the plugin.")),
        JUNIT4_ALLOWED => Ok(Verdict::fail(JUNIT4_ALLOWED).with_resolution(
            "How to set up JUnit 4 import ban",
            "https://github.com/jenkinsci/plugin-pom/pull/1178",
        )),
        _ => Err(unexpected(record)),
    }
}

/// Reported with the other results but weighted 0, so it never moves the
/// plugin's score.
pub fn junit4_ban() -> RuleScoring {
    RuleScoring {
        key: JUNIT4_BAN,
        description: "Shows if the plugin bans JUnit 4 imports. Not used in general plugin score, just for information.",
        weight: 0.0,
        version: 1,
        components: vec![Component {
            probes: &[JUNIT4_KEY],
            weight: 1.0,
            evaluate: junit4_banned,
        }],
    }
}

#[cfg(test)]
mod tests {
    use chrono::SecondsFormat;
    use plugin_health_state::Plugin;

    use super::*;
    use crate::scoring::Scoring;

    fn plugin(records: &[(&str, &str)]) -> Plugin {
        records.iter().fold(Plugin::new("mailer", "1.0", None, None), |p, (k, m)| {
            p.merge(ProbeResult::success(*k, *m, 1))
        })
    }

    fn days_ago(days: i64) -> String {
        (Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    #[test]
    fn commit_age_brackets() {
        assert_eq!(commit_age_value(Duration::days(10)), 100);
        assert_eq!(commit_age_value(Duration::days(180)), 100);
        assert_eq!(commit_age_value(Duration::days(181)), 75);
        assert_eq!(commit_age_value(Duration::days(365)), 75);
        assert_eq!(commit_age_value(Duration::days(500)), 25);
        assert_eq!(commit_age_value(Duration::days(1000)), 0);
    }

    #[test]
    fn adoption_combines_label_and_commit_age() {
        let healthy = plugin(&[(ADOPTION_KEY, NOT_UP_FOR_ADOPTION), (LAST_COMMIT_KEY, days_ago(5).as_str())]);
        assert_eq!(adoption().apply(&healthy).unwrap().value(), 100.0);

        // (0 * 1.0 + 75 * 0.5) / 1.5
        let orphaned = plugin(&[(ADOPTION_KEY, UP_FOR_ADOPTION), (LAST_COMMIT_KEY, days_ago(300).as_str())]);
        assert_eq!(adoption().apply(&orphaned).unwrap().value(), 25.0);
    }

    #[test]
    fn adoption_rejects_unparseable_date() {
        let p = plugin(&[(ADOPTION_KEY, NOT_UP_FOR_ADOPTION), (LAST_COMMIT_KEY, "last tuesday")]);
        assert!(matches!(
            adoption().apply(&p),
            Err(ScoringError::MalformedRecord { probe, .. }) if probe == LAST_COMMIT_KEY
        ));
    }

    #[test]
    fn catalog_scorings() {
        assert_eq!(deprecation().apply(&plugin(&[(DEPRECATION_KEY, NOT_DEPRECATED)])).unwrap().value(), 100.0);
        assert_eq!(deprecation().apply(&plugin(&[(DEPRECATION_KEY, DEPRECATED)])).unwrap().value(), 0.0);
        assert_eq!(publication().apply(&plugin(&[(PUBLICATION_KEY, PUBLISHED)])).unwrap().value(), 100.0);
        assert_eq!(publication().apply(&plugin(&[(PUBLICATION_KEY, NOT_PUBLISHED)])).unwrap().value(), 0.0);
    }

    #[test]
    fn security_reads_warning_ids() {
        let ok = plugin(&[(SECURITY_KEY, NO_KNOWN_VULNERABILITY)]);
        assert_eq!(security().apply(&ok).unwrap().value(), 100.0);

        let message = format!("{VULNERABLE_PREFIX} SECURITY-1, SECURITY-2");
        let bad = plugin(&[(SECURITY_KEY, message.as_str())]);
        let result = security().apply(&bad).unwrap();
        assert_eq!(result.value(), 0.0);
        assert_eq!(
            result.components()[0].reasons,
            vec!["The latest release is affected by SECURITY-1, SECURITY-2.".to_string()]
        );
        assert_eq!(result.components()[0].resolutions.len(), 1);
    }

    #[test]
    fn documentation_weights() {
        // (100 * 1.0 + 0 * 0.5) / 1.5
        let p = plugin(&[
            (DOCUMENTATION_KEY, DOCUMENTATION_MIGRATED),
            (CONTRIBUTING_KEY, CONTRIBUTING_MISSING),
        ]);
        let result = documentation().apply(&p).unwrap();
        assert_eq!(result.value(), 67.0);
        assert_eq!(result.weight(), 0.5);
    }

    #[test]
    fn repository_configuration_weights() {
        // (100 * .65 + 0 * .15 + 100 * .2 + 100 * .5) / 1.5 = 90
        let p = plugin(&[
            (JENKINSFILE_KEY, JENKINSFILE_FOUND),
            (DEPENDABOT_KEY, DEPENDABOT_MISSING),
            (CD_KEY, CD_FOUND),
            (ARCHIVED_KEY, NOT_ARCHIVED),
        ]);
        assert_eq!(repository_configuration().apply(&p).unwrap().value(), 90.0);
    }

    fn with_dependency_bots(bots: &[(&str, &str)]) -> f32 {
        let mut records = vec![
            (JENKINSFILE_KEY, JENKINSFILE_FOUND),
            (CD_KEY, CD_FOUND),
            (ARCHIVED_KEY, NOT_ARCHIVED),
        ];
        records.extend_from_slice(bots);
        repository_configuration().apply(&plugin(&records)).unwrap().value()
    }

    #[test]
    fn renovate_satisfies_dependency_component() {
        assert_eq!(with_dependency_bots(&[(DEPENDABOT_KEY, DEPENDABOT_MISSING), (RENOVATE_KEY, RENOVATE_CONFIGURED)]), 100.0);
        assert_eq!(with_dependency_bots(&[(RENOVATE_KEY, RENOVATE_CONFIGURED)]), 100.0);
        assert_eq!(with_dependency_bots(&[(DEPENDABOT_KEY, DEPENDABOT_CONFIGURED), (RENOVATE_KEY, RENOVATE_MISSING)]), 100.0);
        assert_eq!(with_dependency_bots(&[(DEPENDABOT_KEY, DEPENDABOT_MISSING), (RENOVATE_KEY, RENOVATE_MISSING)]), 90.0);
    }

    #[test]
    fn junit4_ban_is_informational() {
        let banned = junit4_ban().apply(&plugin(&[(JUNIT4_KEY, JUNIT4_BANNED)])).unwrap();
        assert_eq!(banned.value(), 100.0);
        assert_eq!(banned.weight(), 0.0);
        let allowed = junit4_ban().apply(&plugin(&[(JUNIT4_KEY, JUNIT4_ALLOWED)])).unwrap();
        assert_eq!(allowed.value(), 0.0);
        assert_eq!(allowed.components()[0].resolutions.len(), 1);
    }

    #[test]
    fn unlisted_documentation_fails_component() {
        let p = plugin(&[
            (DOCUMENTATION_KEY, DOCUMENTATION_NOT_LISTED),
            (CONTRIBUTING_KEY, CONTRIBUTING_FOUND),
        ]);
        // (0 * 1.0 + 100 * 0.5) / 1.5
        assert_eq!(documentation().apply(&p).unwrap().value(), 33.0);
    }

    #[test]
    fn nothing_executed_scores_zero() {
        let empty = plugin(&[]);
        for scoring in [
            adoption(),
            deprecation(),
            publication(),
            security(),
            documentation(),
            repository_configuration(),
            junit4_ban(),
        ] {
            let result = scoring.apply(&empty).unwrap();
            assert_eq!(result.value(), 0.0, "{}", scoring.key());
            assert!(result
                .components()
                .iter()
                .all(|c| c.reasons[0].ends_with("has not been executed.")));
        }
    }
}
