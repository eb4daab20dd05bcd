// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Global secrets.
//!
//! Secrets are plain key-value pairs shared by every deployment. They are
//! merged into each deployment's environment, but never override a value the
//! deployment request supplied itself.
//!
//! The secret file is a TOML document with a single flat table:
//!
//! ```toml
//! [secrets]
//! DATABASE_URL = "postgres://localhost/app"
//! SENTRY_DSN = "https://key@sentry.example/1"
//! ```

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    io::ErrorKind,
    path::PathBuf,
};
use tracing::{debug, instrument};

/// Durable map of global secrets.
#[derive(Debug, Clone)]
pub struct SecretStore {
    path: PathBuf,
}

impl SecretStore {
    /// Open secret store at target file.
    ///
    /// The file does not need to exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load every secret.
    ///
    /// A missing secret file is treated as having no secrets at all.
    ///
    /// # Errors
    ///
    /// - Return [`SecretError::Read`] if secret file cannot be read.
    /// - Return [`SecretError::Deserialize`] if secret file is malformed.
    pub fn all(&self) -> Result<BTreeMap<String, String>> {
        let data = match read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(SecretError::Read {
                    source: err,
                    path: self.path.clone(),
                })
            }
        };

        let file: SecretFile = toml::from_str(&data).map_err(|err| SecretError::Deserialize {
            source: err,
            path: self.path.clone(),
        })?;

        Ok(file.secrets)
    }

    /// Insert or replace secret.
    ///
    /// # Errors
    ///
    /// - Return [`SecretError`] if secret file cannot be loaded or saved.
    #[instrument(skip(self, value), level = "debug")]
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut secrets = self.all()?;
        secrets.insert(key.into(), value.into());
        self.save(secrets)
    }

    /// Remove secret, returning whether it existed.
    ///
    /// # Errors
    ///
    /// - Return [`SecretError`] if secret file cannot be loaded or saved.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut secrets = self.all()?;
        let existed = secrets.remove(key).is_some();
        if existed {
            self.save(secrets)?;
        }

        Ok(existed)
    }

    fn save(&self, secrets: BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            mkdirp::mkdirp(parent).map_err(|err| SecretError::Write {
                source: err,
                path: parent.into(),
            })?;
        }

        let data = toml::to_string_pretty(&SecretFile { secrets })?;
        write(&self.path, data).map_err(|err| SecretError::Write {
            source: err,
            path: self.path.clone(),
        })?;
        debug!("saved secrets to {:?}", self.path.display());

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct SecretFile {
    #[serde(default)]
    secrets: BTreeMap<String, String>,
}

/// Merge global secrets into request environment.
///
/// Request values always win. Secrets only fill keys the request left out.
pub fn merge_env(
    request: BTreeMap<String, String>,
    secrets: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = secrets;
    merged.extend(request);
    merged
}

/// Secret store error types.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// Secret file cannot be read.
    #[error("failed to read secrets {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Secret file or its parent directory cannot be written.
    #[error("failed to write secrets {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Secret file is malformed.
    #[error("malformed secrets {:?}", path.display())]
    Deserialize {
        #[source]
        source: toml::de::Error,
        path: PathBuf,
    },

    /// Secrets cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

/// Friendly result alias :3
pub type Result<T, E = SecretError> = std::result::Result<T, E>;
