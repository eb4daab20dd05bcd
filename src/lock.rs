// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-application mutual exclusion.
//!
//! Every operation that touches an application's container, working directory,
//! or metadata record must first hold that application's lock. Locks are keyed
//! by sanitized name, so operations on different applications never wait on
//! each other.
//!
//! A lock has two layers. Inside one process, waiters queue on an async mutex
//! from the lock table. Across processes, the holder also keeps an exclusive
//! `flock` on `<dir>/.<name>.lock`, so two `dockhand` invocations against the
//! same deployments directory exclude each other too. Table entries are
//! dropped again once nobody holds or waits for them.

use fs2::FileExt;
use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, instrument};

type Table = HashMap<String, Arc<AsyncMutex<()>>>;

/// Lock table keyed by sanitized application name.
#[derive(Debug)]
pub struct AppLocks {
    dir: PathBuf,
    table: Arc<Mutex<Table>>,
}

impl AppLocks {
    /// Construct empty lock table whose lock files live in target directory.
    ///
    /// The directory is created on first acquisition.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Path to lock file of target application.
    pub fn lock_path(&self, sanitized: &str) -> PathBuf {
        self.dir.join(format!(".{sanitized}.lock"))
    }

    /// Wait until the lock of target application is free, then take it.
    ///
    /// # Errors
    ///
    /// - Return [`LockError::CreateDir`] if lock directory cannot be created.
    /// - Return [`LockError::Open`] if lock file cannot be opened.
    /// - Return [`LockError::Lock`] if lock file cannot be locked.
    #[instrument(skip(self), level = "debug")]
    pub async fn acquire(&self, sanitized: &str) -> Result<AppGuard> {
        let local = self.slot(sanitized).lock_owned().await;
        let mut guard = AppGuard {
            file: None,
            local: Some(local),
            name: sanitized.to_string(),
            table: self.table.clone(),
        };

        // INVARIANT: Only the local holder ever waits on the lock file.
        let (dir, path) = (self.dir.clone(), self.lock_path(sanitized));
        let file = tokio::task::spawn_blocking(move || lock_file(&dir, &path)).await??;
        guard.file = Some(file);
        debug!("hold lock of {sanitized}");

        Ok(guard)
    }

    fn slot(&self, sanitized: &str) -> Arc<AsyncMutex<()>> {
        // INVARIANT: Table guard never lives across an await point.
        let mut table = self.table.lock().unwrap_or_else(|poison| poison.into_inner());
        table
            .entry(sanitized.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

fn lock_file(dir: &Path, path: &Path) -> Result<File> {
    mkdirp::mkdirp(dir).map_err(|err| LockError::CreateDir {
        source: err,
        path: dir.into(),
    })?;

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|err| LockError::Open {
            source: err,
            path: path.into(),
        })?;

    FileExt::lock_exclusive(&file).map_err(|err| LockError::Lock {
        source: err,
        path: path.into(),
    })?;

    Ok(file)
}

/// Held lock of one application. Released on drop.
#[derive(Debug)]
pub struct AppGuard {
    file: Option<File>,
    local: Option<OwnedMutexGuard<()>>,
    name: String,
    table: Arc<Mutex<Table>>,
}

impl Drop for AppGuard {
    fn drop(&mut self) {
        // INVARIANT: Closing the file releases the flock before local waiters wake.
        drop(self.file.take());
        drop(self.local.take());

        let mut table = self.table.lock().unwrap_or_else(|poison| poison.into_inner());
        if table
            .get(&self.name)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            table.remove(&self.name);
        }
    }
}

/// Lock error types.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Directory of lock files cannot be created.
    #[error("failed to create lock directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Lock file cannot be opened.
    #[error("failed to open lock file {:?}", path.display())]
    Open {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Lock file cannot be locked.
    #[error("failed to lock {:?}", path.display())]
    Lock {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Blocking lock task panicked or was cancelled.
    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),
}

/// Friendly result alias :3
pub type Result<T, E = LockError> = std::result::Result<T, E>;
