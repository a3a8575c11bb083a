// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Emacs build pipeline.
//!
//! Turns a [`BuildPlan`] into the sequence of external commands that fetch,
//! patch, configure, and compile one Emacs release:
//!
//! 1. Download the source archive with `wget`.
//! 2. Extract it with `tar`.
//! 3. Apply every patch the plan selects with `patch -p1`.
//! 4. Run `autogen.sh` for development snapshots, since they do not ship a
//!    generated configure script.
//! 5. Run the configure script with the plan's arguments.
//! 6. Run `make` with the plan's arguments.
//! 7. Optionally run `make install`.
//!
//! Each step runs to completion before the next one starts. The first step
//! that fails stops the build.
//!
//! # Snapshots
//!
//! Requesting "snapshot" instead of a release number builds a development
//! snapshot as described by [`SnapshotSettings`]. The snapshot is treated
//! as the version number it is configured with for rule evaluation.

pub mod runner;

pub use runner::{DryRunner, Runner, SubprocessRunner};

use crate::{
    config::{BuildSettings, SnapshotSettings},
    rules::BuildPlan,
    version::{ParseError, Version},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::ExitStatus,
};
use tracing::{info, instrument, warn};

/// Release name that selects the configured development snapshot.
pub const SNAPSHOT: &str = "snapshot";

/// Release that should be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    version: Version,
    source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Release { mirror: String },
    Snapshot { rev: String, url: String },
}

impl ReleaseTarget {
    /// Resolve requested release name.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError::NoSnapshot`] if "snapshot" is requested without
    ///   snapshot settings.
    /// - Return [`BuildError::Version`] if release name is not a valid
    ///   version string.
    pub fn resolve(requested: impl AsRef<str>, settings: &BuildSettings) -> Result<Self> {
        if requested.as_ref() == SNAPSHOT {
            let snapshot = settings.snapshot.as_ref().ok_or(BuildError::NoSnapshot)?;
            return Ok(Self {
                version: snapshot.version.clone(),
                source: Source::Snapshot {
                    rev: snapshot.rev.clone(),
                    url: snapshot.archive_url(),
                },
            });
        }

        Ok(Self {
            version: Version::parse(requested.as_ref())?,
            source: Source::Release {
                mirror: settings.mirror.trim_end_matches('/').to_owned(),
            },
        })
    }

    /// Version number used for rule evaluation.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Check if target is a development snapshot.
    pub fn is_snapshot(&self) -> bool {
        matches!(self.source, Source::Snapshot { .. })
    }

    /// Human readable release label, e.g., "29.4" or "31.0.50-master".
    pub fn label(&self) -> String {
        match &self.source {
            Source::Release { .. } => self.version.to_string(),
            Source::Snapshot { rev, .. } => format!("{}-{rev}", self.version),
        }
    }

    /// URL of source archive.
    pub fn archive_url(&self) -> String {
        match &self.source {
            Source::Release { mirror } => format!("{mirror}/{}", self.archive_name()),
            Source::Snapshot { url, .. } => url.clone(),
        }
    }

    /// File name of downloaded source archive.
    pub fn archive_name(&self) -> String {
        format!("{}.tar.gz", self.source_dir_name())
    }

    /// Name of directory the source archive extracts into.
    pub fn source_dir_name(&self) -> String {
        match &self.source {
            Source::Release { .. } => format!("emacs-{}", self.version),
            Source::Snapshot { rev, .. } => format!("emacs-{rev}"),
        }
    }
}

/// External command to run as part of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Short name of step for progress reporting.
    pub label: String,

    /// Program to execute.
    pub program: String,

    /// Arguments to pass to program.
    pub args: Vec<String>,

    /// Working directory to execute program in.
    pub cwd: PathBuf,
}

impl Step {
    /// Construct new step without arguments.
    pub fn new(label: impl Into<String>, program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    /// Append arguments to step.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Display for Step {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(fmt, " {arg:?}")?;
            } else {
                write!(fmt, " {arg}")?;
            }
        }

        Ok(())
    }
}

/// Build of one Emacs release.
#[derive(Debug)]
pub struct Build<R = SubprocessRunner>
where
    R: Runner,
{
    target: ReleaseTarget,
    plan: BuildPlan,
    work_dir: PathBuf,
    patch_dir: PathBuf,
    runner: R,
}

impl<R> Build<R>
where
    R: Runner,
{
    /// Construct new build.
    ///
    /// Patch patterns are resolved relative to "patches" unless told
    /// otherwise through [`Build::with_patch_dir`].
    pub fn new(target: ReleaseTarget, plan: BuildPlan, work_dir: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            target,
            plan,
            work_dir: work_dir.into(),
            patch_dir: PathBuf::from("patches"),
            runner,
        }
    }

    /// Set directory patch patterns are relative to.
    pub fn with_patch_dir(mut self, patch_dir: impl Into<PathBuf>) -> Self {
        self.patch_dir = patch_dir.into();
        self
    }

    /// Runner executing build steps.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Directory release sources are extracted into.
    pub fn source_dir(&self) -> PathBuf {
        self.work_dir.join(self.target.source_dir_name())
    }

    /// Resolve patch patterns of build plan into absolute patch file paths.
    ///
    /// Matches of each pattern are sorted. Files matched by more than one
    /// pattern are only applied once, in the position of their first match.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError::PatchPattern`] if a pattern is malformed.
    /// - Return [`BuildError::PatchGlob`] if a match cannot be read.
    /// - Return [`BuildError::PatchPath`] if a match cannot be made absolute.
    pub fn resolve_patches(&self) -> Result<Vec<PathBuf>> {
        let mut resolved = Vec::new();
        for pattern in &self.plan.patches {
            let full = self.patch_dir.join(pattern);
            let mut matches = glob::glob(full.to_string_lossy().as_ref())?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if matches.is_empty() {
                warn!("patch pattern {pattern:?} matches nothing in {:?}", self.patch_dir.display());
                continue;
            }

            matches.sort();
            for path in matches {
                let path = std::path::absolute(&path)
                    .map_err(|source| BuildError::PatchPath { source, path })?;
                if !resolved.contains(&path) {
                    resolved.push(path);
                }
            }
        }

        Ok(resolved)
    }

    /// Lay out every step of build in order.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError`] if patch patterns cannot be resolved.
    pub fn steps(&self, install: bool) -> Result<Vec<Step>> {
        let source_dir = self.source_dir();
        let archive = self.target.archive_name();
        let mut steps = vec![
            Step::new("download", "wget", &self.work_dir).args([
                "-c".to_string(),
                self.target.archive_url(),
                "-O".to_string(),
                archive.clone(),
            ]),
            Step::new("extract", "tar", &self.work_dir).args(["xf".to_string(), archive]),
        ];

        for patch in self.resolve_patches()? {
            let name = patch
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            steps.push(
                Step::new(format!("patch {name}"), "patch", &source_dir)
                    .args(["-p1".to_string(), "-i".to_string(), path_arg(&patch)]),
            );
        }

        if self.target.is_snapshot() {
            steps.push(Step::new("autogen", "./autogen.sh", &source_dir));
        }

        steps.push(Step::new("configure", "./configure", &source_dir).args(&self.plan.configure_args));
        steps.push(Step::new("make", "make", &source_dir).args(&self.plan.make_args));

        if install {
            steps.push(Step::new("install", "make", &source_dir).args(["install"]));
        }

        Ok(steps)
    }

    /// Run every step of build in order.
    ///
    /// System packages named by the build plan are only reported, never
    /// installed.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError`] if steps cannot be laid out, or if any step
    ///   fails. Nothing after the failed step is run.
    #[instrument(skip(self), fields(release = %self.target.label()))]
    pub async fn run(&self, install: bool) -> Result<()> {
        mkdirp::mkdirp(&self.work_dir).map_err(|source| BuildError::CreateDir {
            source,
            path: self.work_dir.clone(),
        })?;

        if self.target.version().is_prerelease() {
            warn!("release {} is a pre-release", self.target.label());
        }

        if !self.plan.packages.is_empty() {
            warn!(
                "release {} needs system packages: {}",
                self.target.label(),
                self.plan.packages.join(" ")
            );
        }

        let steps = self.steps(install)?;
        let total = steps.len();
        for (idx, step) in steps.iter().enumerate() {
            info!("[{}/{total}] {}", idx + 1, step.label);
            self.runner.run(step).await?;
        }

        info!(
            "built Emacs {} in {:?}",
            self.target.label(),
            self.source_dir().display()
        );

        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Build error types.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Requested release is not a valid version.
    #[error(transparent)]
    Version(#[from] ParseError),

    /// Snapshot requested without snapshot settings.
    #[error("cannot build {SNAPSHOT:?} without snapshot settings")]
    NoSnapshot,

    /// Patch pattern is malformed.
    #[error(transparent)]
    PatchPattern(#[from] glob::PatternError),

    /// Patch pattern match cannot be read.
    #[error(transparent)]
    PatchGlob(#[from] glob::GlobError),

    /// Patch path cannot be made absolute.
    #[error("failed to resolve patch path {:?}", path.display())]
    PatchPath {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directory for step cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Program cannot be executed, or its output cannot be forwarded.
    #[error("command {program:?} failed")]
    Syscall {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// Program exited unsuccessfully.
    #[error("step {label:?} failed: {status}")]
    StepFailed { label: String, status: ExitStatus },

    /// Style template cannot be set for progress spinner.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, write};

    fn release_build(requested: &str, runner: DryRunner) -> anyhow::Result<Build<DryRunner>> {
        let config = BuildConfig::builtin()?;
        let target = ReleaseTarget::resolve(requested, &config.settings)?;
        let plan = config.plan(target.version().clone());
        Ok(Build::new(target, plan, "/tmp/emacsbuild", runner))
    }

    #[test]
    fn resolve_release() -> anyhow::Result<()> {
        let settings = BuildSettings {
            mirror: "https://ftp.gnu.org/gnu/emacs/".into(),
            ..Default::default()
        };
        let target = ReleaseTarget::resolve("29.4", &settings)?;

        assert!(!target.is_snapshot());
        assert_eq!(target.label(), "29.4");
        assert_eq!(target.archive_name(), "emacs-29.4.tar.gz");
        assert_eq!(target.source_dir_name(), "emacs-29.4");
        assert_eq!(
            target.archive_url(),
            "https://ftp.gnu.org/gnu/emacs/emacs-29.4.tar.gz"
        );

        Ok(())
    }

    #[test]
    fn resolve_snapshot() -> anyhow::Result<()> {
        let settings = BuildSettings {
            snapshot: Some(SnapshotSettings {
                version: "30.0.50".parse()?,
                rev: "a1b2c3d".into(),
                url: "https://github.com/emacs-mirror/emacs/archive/{rev}.tar.gz".into(),
            }),
            ..Default::default()
        };
        let target = ReleaseTarget::resolve(SNAPSHOT, &settings)?;

        assert!(target.is_snapshot());
        assert_eq!(target.version(), &Version::parse("30.0.50")?);
        assert_eq!(target.label(), "30.0.50-a1b2c3d");
        assert_eq!(target.source_dir_name(), "emacs-a1b2c3d");
        assert_eq!(
            target.archive_url(),
            "https://github.com/emacs-mirror/emacs/archive/a1b2c3d.tar.gz"
        );

        Ok(())
    }

    #[test]
    fn resolve_rejects_bad_requests() {
        let settings = BuildSettings::default();
        assert!(matches!(
            ReleaseTarget::resolve(SNAPSHOT, &settings),
            Err(BuildError::NoSnapshot)
        ));
        assert!(matches!(
            ReleaseTarget::resolve("latest", &settings),
            Err(BuildError::Version(ParseError::LeadingNonDigit { .. }))
        ));
    }

    #[test]
    fn step_display_quotes_whitespace() {
        let step = Step::new("configure", "./configure", "/tmp")
            .args(["--prefix=/app", "CFLAGS=-O2 -g", ""]);
        assert_eq!(step.to_string(), r#"./configure --prefix=/app "CFLAGS=-O2 -g" """#);
    }

    #[test]
    fn release_steps() -> anyhow::Result<()> {
        let build = release_build("26.3", DryRunner::new())?;
        let result = build
            .steps(true)?
            .iter()
            .map(|step| (step.label.clone(), step.to_string(), step.cwd.clone()))
            .collect::<Vec<_>>();

        let work_dir = PathBuf::from("/tmp/emacsbuild");
        let source_dir = work_dir.join("emacs-26.3");
        let expect = vec![
            (
                "download".to_string(),
                "wget -c http://ftpmirror.gnu.org/emacs/emacs-26.3.tar.gz -O emacs-26.3.tar.gz"
                    .to_string(),
                work_dir.clone(),
            ),
            (
                "extract".to_string(),
                "tar xf emacs-26.3.tar.gz".to_string(),
                work_dir.clone(),
            ),
            (
                "configure".to_string(),
                "./configure --prefix=/app --with-x-toolkit=gtk3 --with-xft --without-selinux --with-modules"
                    .to_string(),
                source_dir.clone(),
            ),
            ("make".to_string(), "make".to_string(), source_dir.clone()),
            ("install".to_string(), "make install".to_string(), source_dir),
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn snapshot_steps_run_autogen() -> anyhow::Result<()> {
        let build = release_build(SNAPSHOT, DryRunner::new())?;
        let labels = build
            .steps(false)?
            .into_iter()
            .map(|step| step.label)
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["download", "extract", "autogen", "configure", "make"]);
        assert_eq!(build.source_dir(), PathBuf::from("/tmp/emacsbuild/emacs-master"));

        Ok(())
    }

    #[sealed_test]
    fn resolve_patches_in_order_without_duplicates() -> anyhow::Result<()> {
        create_dir_all("patches/emacs-25")?;
        write("patches/emacs-25/0002-fix-build.patch", "")?;
        write("patches/emacs-25/0001-fix-fonts.patch", "")?;
        write("patches/common.patch", "")?;

        let config = BuildConfig::builtin()?;
        let target = ReleaseTarget::resolve("25.3", &config.settings)?;
        let mut plan = config.plan(target.version().clone());
        plan.patches = vec![
            "common.patch".into(),
            "emacs-25/*.patch".into(),
            "emacs-25/0001-fix-fonts.patch".into(),
            "emacs-26/*.patch".into(),
        ];
        let build = Build::new(target, plan, "/tmp/emacsbuild", DryRunner::new());

        let cwd = std::env::current_dir()?;
        let result = build.resolve_patches()?;
        let expect = vec![
            cwd.join("patches/common.patch"),
            cwd.join("patches/emacs-25/0001-fix-fonts.patch"),
            cwd.join("patches/emacs-25/0002-fix-build.patch"),
        ];
        assert_eq!(result, expect);

        let steps = build.steps(false)?;
        assert_eq!(steps[2].label, "patch common.patch");
        assert_eq!(steps[2].cwd, PathBuf::from("/tmp/emacsbuild/emacs-25.3"));
        assert_eq!(
            steps[2].args,
            vec!["-p1".to_string(), "-i".to_string(), path_arg(&expect[0])]
        );

        Ok(())
    }

    #[tokio::test]
    async fn dry_run_records_every_step() -> anyhow::Result<()> {
        let build = release_build("28.2", DryRunner::new())?;
        build.run(false).await?;

        let result = build.runner().recorded();
        let expect = build.steps(false)?;
        assert_eq!(result, expect);
        assert_eq!(
            result.last().map(ToString::to_string),
            Some("make NATIVE_FULL_AOT=1 bootstrap".to_string())
        );

        Ok(())
    }
}
