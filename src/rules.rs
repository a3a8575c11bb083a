// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version-gated build rules.
//!
//! Which configure flags, make targets, system packages, and patches apply
//! to an Emacs release depends on where that release falls in Emacs's
//! history. Instead of hard coding a chain of version checks, emacsbuild
//! describes each decision as a __rule__: a half-open range of releases
//! paired with the changes it makes to the __build plan__.
//!
//! # Rule Evaluation
//!
//! Rules are evaluated in declaration order against a fresh build plan
//! seeded from the build settings. Every rule whose range contains the
//! target release is merged into the plan:
//!
//! - Listings (configure arguments, packages, patches) are appended. Entries
//!   already present are not duplicated.
//! - Single values (make arguments, exclude list, system library bundling)
//!   are replaced. Thus, later rules win.
//!
//! # See Also
//!
//! - [`BuildConfig`](crate::config::BuildConfig)

use crate::{
    config::{BuildSettings, ConfigError},
    version::Version,
};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, instrument};

/// Half-open range of releases.
///
/// Contains every release `v` such that `since <= v < until`. A missing
/// bound leaves that side of the range open.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct VersionRange {
    /// Inclusive lower bound.
    pub since: Option<Version>,

    /// Exclusive upper bound.
    pub until: Option<Version>,
}

impl VersionRange {
    /// Construct new version range.
    pub fn new(since: Option<Version>, until: Option<Version>) -> Self {
        Self { since, until }
    }

    /// Check if release falls inside of range.
    pub fn contains(&self, version: &Version) -> bool {
        match (&self.since, &self.until) {
            (Some(since), Some(until)) => version.is_between(since, until),
            (Some(since), None) => since <= version,
            (None, Some(until)) => version < until,
            (None, None) => true,
        }
    }
}

impl Display for VersionRange {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if let Some(since) = &self.since {
            write!(fmt, "{since}")?;
        }
        fmt.write_str("..")?;
        if let Some(until) = &self.until {
            write!(fmt, "{until}")?;
        }

        Ok(())
    }
}

/// Version-gated change to a build plan.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Rule {
    /// Brief description of what the rule is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// First release the rule applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<Version>,

    /// First release the rule no longer applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<Version>,

    /// Arguments to append to configure script invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configure_args: Vec<String>,

    /// Arguments to replace make invocation arguments with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_args: Option<Vec<String>>,

    /// System packages the release needs to build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,

    /// Glob patterns of patch files to apply, relative to patch directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,

    /// Exclude list for image packaging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_list: Option<String>,

    /// Whether system shared libraries should be bundled into the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_system_libs: Option<bool>,
}

impl Rule {
    /// Range of releases rule applies to.
    pub fn range(&self) -> VersionRange {
        VersionRange::new(self.since.clone(), self.until.clone())
    }

    /// Check if rule applies to release.
    pub fn applies_to(&self, version: &Version) -> bool {
        self.range().contains(version)
    }
}

/// Everything needed to build one Emacs release.
///
/// Acts as a builder. Start with [`BuildPlan::new`] and merge in rules with
/// [`BuildPlan::apply`], or let [`BuildPlan::from_rules`] do both.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct BuildPlan {
    /// Release being built.
    pub version: Version,

    /// Arguments passed to configure script.
    pub configure_args: Vec<String>,

    /// Arguments passed to make.
    pub make_args: Vec<String>,

    /// System packages the release needs to build.
    pub packages: Vec<String>,

    /// Glob patterns of patch files to apply.
    pub patches: Vec<String>,

    /// Exclude list for image packaging.
    pub exclude_list: String,

    /// Whether system shared libraries should be bundled into the image.
    pub bundle_system_libs: bool,
}

impl BuildPlan {
    /// Construct new build plan seeded from build settings.
    ///
    /// The install prefix always comes first in the configure arguments.
    pub fn new(version: Version, settings: &BuildSettings) -> Self {
        let mut configure_args = vec![format!("--prefix={}", settings.prefix)];
        extend_unique(&mut configure_args, &settings.configure_args);

        Self {
            version,
            configure_args,
            make_args: settings.make_args.clone(),
            packages: Vec::new(),
            patches: Vec::new(),
            exclude_list: settings.exclude_list.clone(),
            bundle_system_libs: false,
        }
    }

    /// Construct build plan by applying every matching rule in order.
    #[instrument(skip_all, fields(version = %version), level = "debug")]
    pub fn from_rules(version: Version, settings: &BuildSettings, rules: &[Rule]) -> Self {
        let mut plan = Self::new(version, settings);
        for rule in rules {
            if rule.applies_to(&plan.version) {
                debug!(
                    "apply rule {} ({})",
                    rule.range(),
                    rule.description.as_deref().unwrap_or("no description")
                );
                plan.apply(rule);
            }
        }

        plan
    }

    /// Merge rule into build plan.
    ///
    /// Does not check if rule applies to the plan's release.
    pub fn apply(&mut self, rule: &Rule) -> &mut Self {
        extend_unique(&mut self.configure_args, &rule.configure_args);
        extend_unique(&mut self.packages, &rule.packages);
        extend_unique(&mut self.patches, &rule.patches);

        if let Some(make_args) = &rule.make_args {
            self.make_args = make_args.clone();
        }

        if let Some(exclude_list) = &rule.exclude_list {
            self.exclude_list = exclude_list.clone();
        }

        if let Some(bundle) = rule.bundle_system_libs {
            self.bundle_system_libs = bundle;
        }

        self
    }
}

impl Display for BuildPlan {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn extend_unique(list: &mut Vec<String>, entries: &[String]) {
    for entry in entries {
        if !list.contains(entry) {
            list.push(entry.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn version(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test_case(Some("25"), Some("26"), "25.3", true; "inside")]
    #[test_case(Some("25"), Some("26"), "26", false; "upper bound exclusive")]
    #[test_case(Some("25"), Some("26"), "25", true; "lower bound inclusive")]
    #[test_case(Some("27"), None, "30.1", true; "open upper bound")]
    #[test_case(Some("27"), None, "27pre", false; "pre-release below lower bound")]
    #[test_case(None, Some("25"), "24.5", true; "open lower bound")]
    #[test_case(None, None, "1", true; "unbounded")]
    #[test]
    fn version_range_contains(
        since: Option<&str>,
        until: Option<&str>,
        target: &str,
        expect: bool,
    ) {
        let range = VersionRange::new(since.map(version), until.map(version));
        pretty_assertions::assert_eq!(range.contains(&version(target)), expect);
    }

    #[test]
    fn version_range_display() {
        let range = VersionRange::new(Some(version("26")), Some(version("30")));
        assert_eq!(range.to_string(), "26..30");
        let range = VersionRange::new(Some(version("28")), None);
        assert_eq!(range.to_string(), "28..");
        assert_eq!(VersionRange::default().to_string(), "..");
    }

    #[test]
    fn apply_merges_listings_and_replaces_values() {
        let settings = BuildSettings::default();
        let mut plan = BuildPlan::new(version("28.2"), &settings);

        plan.apply(&Rule {
            configure_args: strings(&["--with-modules", "--with-xft"]),
            packages: strings(&["libgccjit-10-dev"]),
            make_args: Some(strings(&["bootstrap"])),
            ..Default::default()
        })
        .apply(&Rule {
            packages: strings(&["libgccjit-10-dev", "libjansson4"]),
            make_args: Some(strings(&["NATIVE_FULL_AOT=1", "bootstrap"])),
            exclude_list: Some("package/excludelist_26-29".into()),
            bundle_system_libs: Some(true),
            ..Default::default()
        });

        assert_eq!(
            plan.configure_args,
            strings(&[
                "--prefix=/app",
                "--with-x-toolkit=gtk3",
                "--with-xft",
                "--with-modules",
            ])
        );
        assert_eq!(plan.packages, strings(&["libgccjit-10-dev", "libjansson4"]));
        assert_eq!(plan.make_args, strings(&["NATIVE_FULL_AOT=1", "bootstrap"]));
        assert_eq!(plan.exclude_list, "package/excludelist_26-29");
        assert!(plan.bundle_system_libs);
    }

    #[test]
    fn later_rules_win() {
        let settings = BuildSettings::default();
        let rules = vec![
            Rule {
                since: Some(version("25")),
                exclude_list: Some("first".into()),
                ..Default::default()
            },
            Rule {
                since: Some(version("26")),
                exclude_list: Some("second".into()),
                ..Default::default()
            },
            Rule {
                since: Some(version("27")),
                exclude_list: Some("never".into()),
                ..Default::default()
            },
        ];

        let plan = BuildPlan::from_rules(version("26.3"), &settings, &rules);
        assert_eq!(plan.exclude_list, "second");
    }

    #[test]
    fn builtin_rules_for_native_compilation_release() -> anyhow::Result<()> {
        let config = BuildConfig::builtin()?;
        let result = config.plan(version("28.2"));
        let expect = BuildPlan {
            version: version("28.2"),
            configure_args: strings(&[
                "--prefix=/app",
                "--with-x-toolkit=gtk3",
                "--with-xft",
                "--without-selinux",
                "--with-modules",
                "--with-cairo",
                "--with-harfbuzz",
                "--with-native-compilation",
            ]),
            make_args: strings(&["NATIVE_FULL_AOT=1", "bootstrap"]),
            packages: strings(&["libjansson4"]),
            patches: Vec::new(),
            exclude_list: "package/excludelist_26-29".into(),
            bundle_system_libs: false,
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test_case("23.4", &[], "package/excludelist_empty", true; "emacs 23")]
    #[test_case("24.5", &["--without-selinux"], "package/excludelist_empty", true; "emacs 24")]
    #[test_case("25.3", &["--without-selinux", "--with-modules"], "package/excludelist_25", false; "emacs 25")]
    #[test_case("26.3", &["--without-selinux", "--with-modules"], "package/excludelist_26-29", false; "emacs 26")]
    #[test]
    fn builtin_rules_for_older_releases(
        target: &str,
        extra: &[&str],
        exclude_list: &str,
        bundle: bool,
    ) -> anyhow::Result<()> {
        let config = BuildConfig::builtin()?;
        let plan = config.plan(version(target));

        let mut expect = strings(&["--prefix=/app", "--with-x-toolkit=gtk3", "--with-xft"]);
        expect.extend(strings(extra));
        pretty_assertions::assert_eq!(plan.configure_args, expect);
        assert!(plan.make_args.is_empty());
        assert!(plan.packages.is_empty());
        pretty_assertions::assert_eq!(plan.exclude_list, exclude_list);
        pretty_assertions::assert_eq!(plan.bundle_system_libs, bundle);

        Ok(())
    }

    #[test]
    fn builtin_rules_past_last_exclude_list() -> anyhow::Result<()> {
        let config = BuildConfig::builtin()?;
        let plan = config.plan(version("30.1"));
        assert_eq!(plan.exclude_list, "package/excludelist_empty");
        assert_eq!(plan.packages, strings(&["libjansson4"]));
        assert!(plan
            .configure_args
            .contains(&"--with-native-compilation".to_string()));

        Ok(())
    }
}
