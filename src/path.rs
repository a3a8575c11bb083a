// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for files that emacsbuild reads or
//! writes outside of the current working directory.

use std::path::PathBuf;

/// Determine default absolute path to configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/emacsbuild/config.toml` as
/// the default absolute path for the configuration file. Does not check if
/// the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("emacsbuild").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to work directory.
///
/// Uses XDG Base Directory path `$XDG_CACHE_HOME/emacsbuild` as the default
/// place to download and build releases in. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_work_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|path| path.join("emacsbuild"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[cfg(target_os = "linux")]
    #[sealed_test(env = [("XDG_CONFIG_HOME", "/home/blah/.config"), ("XDG_CACHE_HOME", "/home/blah/.cache")])]
    fn xdg_paths() -> anyhow::Result<()> {
        assert_eq!(
            default_config_path()?,
            PathBuf::from("/home/blah/.config/emacsbuild/config.toml")
        );
        assert_eq!(default_work_dir()?, PathBuf::from("/home/blah/.cache/emacsbuild"));

        Ok(())
    }
}
