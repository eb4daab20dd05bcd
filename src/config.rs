// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that dockhand reads at startup to
//! simplify the process of serialization and deserialization. Every field has
//! a default, so an empty or missing settings file is valid. File I/O is left
//! to [`Settings::load`].

use crate::path::{default_deployments_dir, default_secrets_file};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Settings file layout.
///
/// # General Layout
///
/// Settings are split into four tables: `deployments` locates the directory
/// holding metadata files and working copies, `runtime` configures how the
/// container runtime is invoked and how managed containers are named and
/// labeled, `git` supplies optional credentials for private remotes, and
/// `secrets` locates the global secret file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub deployments: DeploymentSettings,
    pub runtime: RuntimeSettings,
    pub git: GitSettings,
    pub secrets: SecretSettings,
}

impl Settings {
    /// Load settings from file at target path.
    ///
    /// A missing settings file is not an error, defaults are used instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is malformed.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => {
                debug!("load settings from {:?}", path.display());
                data.parse()
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no settings at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.into(),
            }),
        }
    }

    /// Image tag prefix used for every managed application.
    pub fn image_namespace(&self) -> &str {
        &self.runtime.image_namespace
    }

    /// Ownership label attached to every managed container.
    pub fn owner_label(&self) -> &str {
        &self.runtime.owner_label
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.deployments.directory = expand_path(&settings.deployments.directory)?;
        settings.secrets.file = expand_path(&settings.secrets.file)?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Location of deployment metadata and working copies.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentSettings {
    /// Directory holding `<name>.json` records and `<name>/` working directories.
    pub directory: PathBuf,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            directory: default_deployments_dir().unwrap_or_else(|_| PathBuf::from("deployments")),
        }
    }
}

/// Container runtime invocation settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Runtime binary to execute.
    pub program: String,

    /// Prefix of every image tag, i.e., `<namespace>/<name>:latest`.
    pub image_namespace: String,

    /// Label marking containers as managed by dockhand.
    pub owner_label: String,

    /// Number of log lines to fetch.
    pub log_tail: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            program: "docker".into(),
            image_namespace: "dockhand".into(),
            owner_label: "managed-by=dockhand".into(),
            log_tail: 100,
        }
    }
}

/// Optional plaintext credentials for private remotes.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitSettings {
    pub username: Option<String>,
    pub token: Option<String>,
}

/// Location of global secrets.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretSettings {
    pub file: PathBuf,
}

impl Default for SecretSettings {
    fn default() -> Self {
        Self {
            file: default_secrets_file().unwrap_or_else(|_| PathBuf::from("secrets.toml")),
        }
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings from {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

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
