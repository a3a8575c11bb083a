// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that emacsbuild uses to
//! simplify the process of serialization and deserialization. File I/O is
//! left to the caller to figure out.

use crate::{
    rules::{BuildPlan, Rule},
    version::Version,
};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Configuration used when the user does not supply one.
///
/// Encodes the feature flags, packages, and exclude lists that each Emacs
/// release line needs to produce a portable image.
pub const DEFAULT_CONFIG: &str = r#"[settings]
mirror = "http://ftpmirror.gnu.org/emacs"
prefix = "/app"
configure_args = [
    "--with-x-toolkit=gtk3",
    "--with-xft",
]
make_args = []
exclude_list = "package/excludelist_empty"
patch_dir = "patches"

[settings.snapshot]
version = "31.0.50"
rev = "master"
url = "https://github.com/emacs-mirror/emacs/archive/{rev}.tar.gz"

[[rule]]
description = "disable SELinux support"
since = "24"
configure_args = ["--without-selinux"]

[[rule]]
description = "dynamic modules"
since = "25"
configure_args = ["--with-modules"]

[[rule]]
description = "cairo and harfbuzz rendering"
since = "27"
configure_args = [
    "--with-cairo",
    "--with-harfbuzz",
]
packages = ["libjansson4"]

[[rule]]
description = "ahead of time native compilation"
since = "28"
configure_args = ["--with-native-compilation"]
make_args = [
    "NATIVE_FULL_AOT=1",
    "bootstrap",
]

[[rule]]
description = "bundle system shared libraries"
since = "23"
until = "25"
bundle_system_libs = true

[[rule]]
description = "exclude list for Emacs 25"
since = "25"
until = "26"
exclude_list = "package/excludelist_25"

[[rule]]
description = "exclude list for Emacs 26 through 29"
since = "26"
until = "30"
exclude_list = "package/excludelist_26-29"
"#;

/// Build configuration layout.
///
/// # General Layout
///
/// A build configuration is composed of two basic parts: settings and rules.
/// The settings section defines what every build starts out with, e.g.,
/// where to download source tarballs from, and what to pass to the configure
/// script no matter the release. The rule section lists version-gated
/// changes applied on top of those settings for a given release.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Settings shared by every build.
    #[serde(default)]
    pub settings: BuildSettings,

    /// Version-gated rules, applied in order.
    #[serde(rename = "rule", default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

impl BuildConfig {
    /// Load built-in configuration.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Deserialize`] if built-in configuration is
    ///   malformed.
    pub fn builtin() -> Result<Self> {
        DEFAULT_CONFIG.parse()
    }

    /// Determine build plan of target release.
    pub fn plan(&self, version: Version) -> BuildPlan {
        BuildPlan::from_rules(version, &self.settings, &self.rules)
    }
}

impl FromStr for BuildConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: BuildConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on path fields.
        config.settings.patch_dir = config.settings.patch_dir.expand()?;
        config.settings.work_dir = config
            .settings
            .work_dir
            .map(|work_dir| work_dir.expand())
            .transpose()?;

        Ok(config)
    }
}

impl Display for BuildConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Build settings.
///
/// Standard settings to use for any given release.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Base URL of mirror to download release tarballs from.
    pub mirror: String,

    /// Installation prefix passed to configure script.
    pub prefix: String,

    /// Arguments passed to configure script for every release.
    pub configure_args: Vec<String>,

    /// Arguments passed to make for every release.
    pub make_args: Vec<String>,

    /// Exclude list for image packaging when no rule picks one.
    pub exclude_list: String,

    /// Directory that patch patterns are relative to.
    pub patch_dir: ConfigPath,

    /// Directory to download and build releases in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<ConfigPath>,

    /// Development snapshot to build when "snapshot" is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotSettings>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            mirror: "http://ftpmirror.gnu.org/emacs".into(),
            prefix: "/app".into(),
            configure_args: vec!["--with-x-toolkit=gtk3".into(), "--with-xft".into()],
            make_args: Vec::new(),
            exclude_list: "package/excludelist_empty".into(),
            patch_dir: ConfigPath::new("patches"),
            work_dir: None,
            snapshot: None,
        }
    }
}

/// Development snapshot settings.
///
/// Snapshots have no release number of their own. Thus, the user must state
/// which version number the snapshot should be treated as for rule
/// evaluation.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SnapshotSettings {
    /// Version number snapshot stands for, e.g., "31.0.50".
    pub version: Version,

    /// Revision of snapshot, e.g., branch name or commit hash.
    pub rev: String,

    /// Source archive URL, where "{rev}" is replaced with the revision.
    pub url: String,
}

impl SnapshotSettings {
    /// Source archive URL with revision filled in.
    pub fn archive_url(&self) -> String {
        self.url.replace("{rev}", &self.rev)
    }
}

/// Path given through configuration file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ConfigPath(PathBuf);

impl ConfigPath {
    /// Construct new configuration path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat configuration path as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }

    /// Perform shell expansion on path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if a variable cannot be
    ///   expanded.
    pub fn expand(&self) -> Result<Self> {
        Ok(Self::new(
            shellexpand::full(self.to_string().as_str())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        ))
    }
}

impl Display for ConfigPath {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_path().to_string_lossy().as_ref())
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
