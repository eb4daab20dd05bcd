// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations for the deployment directory, the settings
//! file, and the global secret file. None of these functions check that the
//! returned path actually exists.

use std::path::PathBuf;

/// Determine default absolute path to the deployment directory.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/dockhand/deployments`. Every
/// application gets a `<name>.json` metadata file and a `<name>/` working
/// directory in here.
///
/// # Errors
///
/// - Return [`NoWayHome`] if the data directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_deployments_dir() -> Result<PathBuf> {
    data_dir().map(|path| path.join("deployments"))
}

/// Determine default absolute path to the global secret file.
///
/// # Errors
///
/// - Return [`NoWayHome`] if the data directory cannot be determined.
pub fn default_secrets_file() -> Result<PathBuf> {
    data_dir().map(|path| path.join("secrets.toml"))
}

/// Determine default absolute path to the settings file.
///
/// Uses `$XDG_CONFIG_HOME/dockhand/settings.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if the config directory cannot be determined.
pub fn default_settings_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dockhand").join("settings.toml"))
        .ok_or(NoWayHome)
}

fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("dockhand"))
        .ok_or(NoWayHome)
}

/// No way to determine user's data or config directory.
///
/// # See Also
///
/// - [`dirs::data_dir`](https://docs.rs/dirs/latest/dirs/fn.data_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's data or config directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[cfg(target_os = "linux")]
    #[sealed_test(env = [("XDG_DATA_HOME", "/srv/data"), ("XDG_CONFIG_HOME", "/srv/config")])]
    fn default_paths_follow_xdg() -> anyhow::Result<()> {
        assert_eq!(
            default_deployments_dir()?,
            PathBuf::from("/srv/data/dockhand/deployments")
        );
        assert_eq!(
            default_secrets_file()?,
            PathBuf::from("/srv/data/dockhand/secrets.toml")
        );
        assert_eq!(
            default_settings_file()?,
            PathBuf::from("/srv/config/dockhand/settings.toml")
        );

        Ok(())
    }
}
