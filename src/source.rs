// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source acquisition.
//!
//! Obtain a working copy of a remote repository through libgit2. A fresh
//! destination gets a full clone. A destination that already is a working
//! copy gets fast-forwarded to the remote's tip of its current branch instead.
//! Histories that diverged are never merged: the acquisition simply fails and
//! leaves the working copy as it was.
//!
//! Nothing here is retried. Network failures, authentication failures, and
//! non-fast-forward updates all surface as [`AcquisitionError`].

use crate::config::GitSettings;

use auth_git2::GitAuthenticator;
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Config, FetchOptions, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument};

/// How a working copy was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// Fresh clone of remote.
    Cloned,

    /// Existing working copy moved forward to remote tip.
    FastForwarded,

    /// Existing working copy already matched remote tip.
    UpToDate,
}

/// Repository acquisition through libgit2.
#[derive(Debug, Clone)]
pub struct SourceAcquirer {
    credentials: GitSettings,
    bar: ProgressBar,
}

impl SourceAcquirer {
    /// Construct new source acquirer.
    ///
    /// Progress of object transfer is reported through the given progress
    /// bar. Use [`ProgressBar::hidden`] when nobody is watching.
    pub fn new(credentials: GitSettings, bar: ProgressBar) -> Self {
        Self { credentials, bar }
    }

    /// Clone remote repository into destination, or fast-forward it if the
    /// destination is already a working copy.
    ///
    /// # Errors
    ///
    /// - Return [`AcquisitionError::Clone`] if cloning fails.
    /// - Return [`AcquisitionError::Fetch`] if fetching fails.
    /// - Return [`AcquisitionError::Diverged`] if fast-forward is impossible.
    /// - Return [`AcquisitionError::Git2`] for any other libgit2 failure.
    #[instrument(skip(self, url, dest), level = "debug")]
    pub fn acquire(&self, url: impl AsRef<str>, dest: impl AsRef<Path>) -> Result<Acquired> {
        let (url, dest) = (url.as_ref(), dest.as_ref());
        match Repository::open(dest) {
            Ok(repository) => {
                info!("pull {url} into {:?}", dest.display());
                self.fast_forward(&repository, url)
            }
            Err(_) => {
                info!("clone {url} into {:?}", dest.display());
                self.clone_fresh(url, dest)?;
                Ok(Acquired::Cloned)
            }
        }
    }

    fn clone_fresh(&self, url: &str, dest: &Path) -> Result<Repository> {
        self.style_bar(url)?;
        let authenticator = self.authenticator();
        let config = Config::open_default()?;
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(self.callbacks(&authenticator, &config));

        let repository = RepoBuilder::new()
            .fetch_options(fo)
            .clone(url, dest)
            .map_err(|err| AcquisitionError::Clone {
                source: err,
                url: url.into(),
                dest: dest.into(),
            })?;

        Ok(repository)
    }

    fn fast_forward(&self, repository: &Repository, url: &str) -> Result<Acquired> {
        let head = repository.head()?;
        let branch = head
            .shorthand()
            .ok_or_else(|| git2::Error::from_str("HEAD is not a valid UTF-8 branch"))?
            .to_string();
        let refname = head
            .name()
            .ok_or_else(|| git2::Error::from_str("HEAD has no valid UTF-8 name"))?
            .to_string();
        drop(head);

        self.style_bar(url)?;
        let authenticator = self.authenticator();
        let config = Config::open_default()?;
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(self.callbacks(&authenticator, &config));

        // INVARIANT: Always fetch from the URL this acquisition was asked for.
        let current = repository.find_remote("origin")?.url().map(str::to_string);
        if current.as_deref() != Some(url) {
            info!("point origin of {branch} at {url}");
            repository.remote_set_url("origin", url)?;
        }

        let mut remote = repository.find_remote("origin")?;
        remote
            .fetch(&[branch.as_str()], Some(&mut fo), None)
            .map_err(|err| AcquisitionError::Fetch {
                source: err,
                url: url.into(),
            })?;

        let fetch_head = repository.find_reference("FETCH_HEAD")?;
        let fetch_commit = repository.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = repository.merge_analysis(&[&fetch_commit])?;

        if analysis.is_up_to_date() {
            debug!("{branch} already up to date");
            return Ok(Acquired::UpToDate);
        }

        if !analysis.is_fast_forward() {
            return Err(AcquisitionError::Diverged {
                branch,
                path: repository.workdir().unwrap_or(repository.path()).into(),
            });
        }

        // INVARIANT: Move branch first, then make the working tree follow it.
        let mut reference = repository.find_reference(&refname)?;
        reference.set_target(fetch_commit.id(), "dockhand: fast-forward")?;
        repository.set_head(&refname)?;
        repository.checkout_head(Some(CheckoutBuilder::default().force()))?;
        debug!("fast-forward {branch} to {}", fetch_commit.id());

        Ok(Acquired::FastForwarded)
    }

    fn authenticator(&self) -> GitAuthenticator {
        let authenticator = GitAuthenticator::default().try_password_prompt(0);
        match (&self.credentials.username, &self.credentials.token) {
            (Some(username), Some(token)) => {
                authenticator.add_plaintext_credentials("*", username, token)
            }
            (None, Some(token)) => authenticator.add_plaintext_credentials("*", "git", token),
            _ => authenticator,
        }
    }

    fn callbacks<'a>(
        &'a self,
        authenticator: &'a GitAuthenticator,
        config: &'a Config,
    ) -> RemoteCallbacks<'a> {
        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(config));
        rc.transfer_progress(move |progress| {
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                self.bar.set_length(progress.total_objects() as u64);
                self.bar.set_position(progress.received_objects() as u64);
            }
            true
        });
        rc
    }

    fn style_bar(&self, url: &str) -> Result<()> {
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        self.bar.set_style(style);
        self.bar.set_message(url.to_string());
        Ok(())
    }
}

/// Check if repository at target path tracks a file.
///
/// Paths are relative to the repository's working tree. Anything that is not
/// a readable repository is treated as tracking nothing.
pub fn is_tracked(repo_dir: impl AsRef<Path>, file: impl AsRef<Path>) -> bool {
    Repository::open(repo_dir.as_ref())
        .and_then(|repository| repository.index())
        .map(|index| index.get_path(file.as_ref(), 0).is_some())
        .unwrap_or(false)
}

/// Source acquisition error types.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// Clone of remote failed, e.g., network or authentication failure.
    #[error("failed to clone {url} into {:?}", dest.display())]
    Clone {
        #[source]
        source: git2::Error,
        url: String,
        dest: PathBuf,
    },

    /// Fetching updates from remote failed.
    #[error("failed to fetch updates from {url}")]
    Fetch {
        #[source]
        source: git2::Error,
        url: String,
    },

    /// Local branch cannot be fast-forwarded onto remote branch.
    #[error("branch {branch} in {:?} diverged from remote, cannot fast-forward", path.display())]
    Diverged { branch: String, path: PathBuf },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = AcquisitionError> = std::result::Result<T, E>;
