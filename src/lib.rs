// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build Emacs releases the way each release line needs to be built.
//!
//! At its core, emacsbuild is a version comparison engine that follows
//! Emacs's own rules for ordering version strings. Pre-release qualifiers
//! like "alpha", "beta", "pre", and "rc" sort below the release they precede,
//! so "27.0.50" < "27.1rc1" < "27.1" < "27.1.1".
//!
//! On top of that engine sits a set of version-gated __rules__ that decide
//! which configure flags, make targets, system packages, patches, and
//! packaging exclude lists a given release needs. Evaluating those rules
//! produces a __build plan__, which can then be carried out as a sequence
//! of external commands.
//!
//! # See Also
//!
//! - [`version`]
//! - [`rules`]
//! - [`build`]

pub mod build;
pub mod config;
pub mod path;
pub mod rules;
pub mod version;

pub use build::{Build, BuildError, ReleaseTarget, Step};
pub use config::{BuildConfig, BuildSettings, ConfigError};
pub use rules::{BuildPlan, Rule, VersionRange};
pub use version::{version_between, version_eq, version_le, version_lt, ParseError, Version};
