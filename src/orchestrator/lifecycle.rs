// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Lifecycle operations on deployed applications.
//!
//! Every operation takes the name as the user typed it and sanitizes it
//! before use.

use super::{Error, Orchestrator, Result};
use crate::{
    naming::AppName,
    runtime::ContainerRuntime,
    store::{DeploymentRecord, StoreError, STATUS_RUNNING},
};

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Stop,
    Start,
    Restart,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Restart => "restart",
        }
    }
}

impl Display for Action {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.verb())
    }
}

impl<R> Orchestrator<R>
where
    R: ContainerRuntime,
{
    /// Stop container of application.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Lifecycle`] carrying runtime output on failure.
    pub async fn stop(&self, app_name: &str) -> Result<()> {
        self.control(app_name, Action::Stop).await
    }

    /// Start stopped container of application.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Lifecycle`] carrying runtime output on failure.
    pub async fn start(&self, app_name: &str) -> Result<()> {
        self.control(app_name, Action::Start).await
    }

    /// Restart container of application.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Lifecycle`] carrying runtime output on failure.
    pub async fn restart(&self, app_name: &str) -> Result<()> {
        self.control(app_name, Action::Restart).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn control(&self, app_name: &str, action: Action) -> Result<()> {
        let name = AppName::new(app_name)?;
        let _guard = self.locks.acquire(name.sanitized()).await?;

        info!("{action} {name}");
        let container = name.container_name();
        let result = match action {
            Action::Stop => self.runtime.stop(container).await,
            Action::Start => self.runtime.start(container).await,
            Action::Restart => self.runtime.restart(container).await,
        };

        result.map_err(|err| Error::Lifecycle {
            source: err,
            action: action.verb(),
            name: name.sanitized().into(),
        })
    }

    /// Delete application entirely.
    ///
    /// Stops and force-removes its container, then removes its deployment
    /// record and working directory. A container that is already gone is not
    /// an error, so deleting half-deleted applications works.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Store`] if record or working directory cannot be
    ///   removed.
    #[instrument(skip(self), level = "debug")]
    pub async fn delete(&self, app_name: &str) -> Result<()> {
        let name = AppName::new(app_name)?;
        let _guard = self.locks.acquire(name.sanitized()).await?;

        info!("delete {name}");
        let container = name.container_name();
        if let Err(err) = self.runtime.stop(container).await {
            warn!("ignore failed stop of {container}: {err}");
        }
        if let Err(err) = self.runtime.remove(container, true).await {
            warn!("ignore failed removal of {container}: {err}");
        }

        self.store.remove(name.sanitized())?;

        Ok(())
    }

    /// Fetch recent combined output of application's container.
    ///
    /// Takes no lock.
    ///
    /// # Errors
    ///
    /// - Return [`Error::LogRetrieval`] if container does not exist or the
    ///   runtime fails.
    pub async fn logs(&self, app_name: &str) -> Result<String> {
        let name = AppName::new(app_name)?;
        self.runtime
            .logs(name.container_name(), self.settings.runtime.log_tail)
            .await
            .map_err(|err| Error::LogRetrieval {
                source: err,
                name: name.sanitized().into(),
            })
    }

    /// Replace environment of deployed application and relaunch it.
    ///
    /// The new environment replaces the old one whole. It is persisted before
    /// the relaunch, so a failed relaunch leaves the record describing the new
    /// environment. The old container is already stopped and removed by then,
    /// so nothing runs until the next successful deploy or update.
    ///
    /// Global secrets are not merged in here.
    ///
    /// # Errors
    ///
    /// - Return [`Error::NotFound`] if application has no deployment record.
    /// - Return [`Error::Launch`] if relaunch fails.
    /// - Return [`Error::Store`] if record cannot be read or written.
    #[instrument(skip(self, env), level = "debug")]
    pub async fn update_env(
        &self,
        app_name: &str,
        env: BTreeMap<String, String>,
    ) -> Result<DeploymentRecord> {
        let name = AppName::new(app_name)?;
        let _guard = self.locks.acquire(name.sanitized()).await?;

        let mut record = match self.store.load(name.sanitized()) {
            Ok(record) => record,
            Err(StoreError::NotFound { name }) => return Err(Error::NotFound { name }),
            Err(err) => return Err(err.into()),
        };

        info!("replace environment of {name} with {} entries", env.len());
        record.env = env;
        self.store.save(name.sanitized(), &record)?;

        let tag = name.image_tag(self.settings.image_namespace());
        record.container_id = self.launch(&name, &tag, record.port, &record.env).await?;
        record.status = STATUS_RUNNING.into();
        self.store.save(name.sanitized(), &record)?;

        Ok(record)
    }
}
