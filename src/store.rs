// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment metadata store.
//!
//! Dockhand keeps a durable record of every deployed application that is
//! independent of the container runtime's own state. The runtime knows which
//! containers exist and how they are doing, but it cannot tell us which
//! environment values were injected. The metadata store fills that gap.
//!
//! # Store Layout
//!
//! The store is a single directory. Each application gets one JSON file named
//! after its sanitized name, e.g., `deployments/my-app.json`. The application's
//! working directory sits right next to it at `deployments/my-app/`, with the
//! repository checkout at `deployments/my-app/repo/`.
//!
//! Only the top-level of the store is evaluated when listing records.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, remove_dir_all, remove_file, rename, write},
    io::ErrorKind,
    path::PathBuf,
};
use tracing::{debug, instrument, warn};

/// Status recorded after a successful launch.
pub const STATUS_RUNNING: &str = "running";

/// Durable description of one deployed application.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentRecord {
    /// Application name as supplied by the user.
    pub app_name: String,

    /// Short identifier of last launched container.
    pub container_id: String,

    /// Port published by container, host and container side alike.
    pub port: u16,

    /// Last known status.
    pub status: String,

    /// Environment injected into container, excluding `PORT`.
    pub env: BTreeMap<String, String>,
}

/// Directory of deployment records and working directories.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: PathBuf,
}

impl MetadataStore {
    /// Open metadata store at target directory.
    ///
    /// Does not touch the file system. The directory is created lazily on
    /// first write.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path to metadata file of application.
    pub fn record_path(&self, sanitized: &str) -> PathBuf {
        self.root.join(format!("{sanitized}.json"))
    }

    /// Working directory of application.
    pub fn app_dir(&self, sanitized: &str) -> PathBuf {
        self.root.join(sanitized)
    }

    /// Repository checkout of application.
    pub fn repo_dir(&self, sanitized: &str) -> PathBuf {
        self.app_dir(sanitized).join("repo")
    }

    /// Create working directory of application.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateDir`] if directory cannot be created.
    pub fn ensure_app_dir(&self, sanitized: &str) -> Result<PathBuf> {
        let dir = self.app_dir(sanitized);
        mkdirp::mkdirp(&dir).map_err(|err| StoreError::CreateDir {
            source: err,
            path: dir.clone(),
        })?;
        Ok(dir)
    }

    /// Load record of application.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if application has no record.
    /// - Return [`StoreError::Read`] if record cannot be read.
    /// - Return [`StoreError::Deserialize`] if record is malformed.
    pub fn load(&self, sanitized: &str) -> Result<DeploymentRecord> {
        let path = self.record_path(sanitized);
        let data = read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StoreError::NotFound {
                name: sanitized.into(),
            },
            _ => StoreError::Read {
                source: err,
                path: path.clone(),
            },
        })?;

        serde_json::from_str(&data).map_err(|err| StoreError::Deserialize { source: err, path })
    }

    /// Persist record of application, replacing any previous record whole.
    ///
    /// Writes to a sibling temporary file first, then renames it over the
    /// record so readers never observe a half-written file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateDir`] if store directory cannot be created.
    /// - Return [`StoreError::Serialize`] if record cannot be serialized.
    /// - Return [`StoreError::Write`] if record cannot be written.
    #[instrument(skip(self, record), level = "debug")]
    pub fn save(&self, sanitized: &str, record: &DeploymentRecord) -> Result<()> {
        mkdirp::mkdirp(&self.root).map_err(|err| StoreError::CreateDir {
            source: err,
            path: self.root.clone(),
        })?;

        let path = self.record_path(sanitized);
        let data = serde_json::to_string_pretty(record).map_err(StoreError::Serialize)?;
        let staging = path.with_extension("json.tmp");
        write(&staging, data)
            .and_then(|_| rename(&staging, &path))
            .map_err(|err| StoreError::Write {
                source: err,
                path: path.clone(),
            })?;
        debug!("saved record {:?}", path.display());

        Ok(())
    }

    /// Remove record and working directory of application.
    ///
    /// Anything already gone is not an error.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Remove`] if existing files cannot be removed.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, sanitized: &str) -> Result<()> {
        let path = self.record_path(sanitized);
        match remove_file(&path) {
            Ok(()) => debug!("removed {:?}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no record at {:?}", path.display())
            }
            Err(err) => return Err(StoreError::Remove { source: err, path }),
        }

        let dir = self.app_dir(sanitized);
        match remove_dir_all(&dir) {
            Ok(()) => debug!("removed {:?}", dir.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no working directory at {:?}", dir.display())
            }
            Err(err) => return Err(StoreError::Remove { source: err, path: dir }),
        }

        Ok(())
    }

    /// List every readable record in store, ordered by file name.
    ///
    /// A missing store directory yields an empty listing. Malformed records
    /// are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Glob`] if store path cannot form a pattern.
    pub fn list(&self) -> Result<Vec<(String, DeploymentRecord)>> {
        let pattern = self
            .root
            .to_str()
            .map(|root| format!("{}/*.json", Pattern::escape(root)))
            .ok_or_else(|| StoreError::Glob(format!("{:?} is not valid UTF-8", self.root)))?;

        let mut paths: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|err| StoreError::Glob(err.to_string()))?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(sanitized) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            match self.load(sanitized) {
                Ok(record) => records.push((sanitized.to_string(), record)),
                Err(err) => warn!("skip record {:?}: {err}", path.display()),
            }
        }

        Ok(records)
    }
}

/// Metadata store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Application has no record.
    #[error("no deployment record for {name:?}")]
    NotFound { name: String },

    /// Store or working directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record cannot be read.
    #[error("failed to read record {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record cannot be written.
    #[error("failed to write record {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record or working directory cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record is malformed.
    #[error("malformed record {:?}", path.display())]
    Deserialize {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Record cannot be serialized.
    #[error(transparent)]
    Serialize(serde_json::Error),

    /// Store directory cannot be searched.
    #[error("cannot search store directory: {0}")]
    Glob(String),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
