// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Registry of deployed applications.
//!
//! Listing is runtime-first. Managed containers are enumerated through their
//! ownership label, then each is overlaid with its deployment record. The
//! runtime is trusted for identifier and status, while the record is trusted
//! for port and environment. Containers without a record still show up, named
//! after the container and with the port parsed from the runtime's port
//! mapping.
//!
//! Applications whose container vanished do not appear in a runtime listing.
//! When the runtime itself cannot be queried, the deployment records are
//! listed as stored instead, and the listing says so.

use super::{Orchestrator, Result};
use crate::{
    runtime::{ContainerRuntime, RuntimeContainerView},
    store::{DeploymentRecord, StoreError},
};

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{instrument, warn};

/// Where a listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSource {
    /// Live runtime state overlaid with deployment records.
    Runtime,

    /// Deployment records alone, runtime was unreachable.
    Metadata,
}

/// One deployed application as seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppView {
    /// Sanitized name, i.e., container name.
    pub name: String,
    pub app_name: String,
    pub container_id: String,
    pub port: u16,
    pub status: String,
    pub env: BTreeMap<String, String>,

    /// Image reference, known only from the runtime.
    pub image: Option<String>,

    /// Running state, known only from the runtime.
    pub running: Option<bool>,
}

impl AppView {
    fn overlay(container: RuntimeContainerView, record: Option<DeploymentRecord>) -> Self {
        let record = record.unwrap_or_default();
        let app_name = if record.app_name.is_empty() {
            container.name.clone()
        } else {
            record.app_name
        };
        let port = match record.port {
            0 => container.host_port().unwrap_or(0),
            port => port,
        };

        Self {
            app_name,
            port,
            env: record.env,
            container_id: container.id,
            status: container.status,
            image: Some(container.image),
            running: Some(container.running),
            name: container.name,
        }
    }

    fn declared(name: String, record: DeploymentRecord) -> Self {
        Self {
            name,
            app_name: record.app_name,
            container_id: record.container_id,
            port: record.port,
            status: record.status,
            env: record.env,
            image: None,
            running: None,
        }
    }
}

/// Canonical list of deployed applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub source: ListingSource,
    pub apps: Vec<AppView>,
}

impl<R> Orchestrator<R>
where
    R: ContainerRuntime,
{
    /// List deployed applications.
    ///
    /// Never fails just because nothing is deployed, the listing is empty
    /// instead.
    ///
    /// # Errors
    ///
    /// - Return [`super::Error::Store`] if runtime is unreachable and the
    ///   store cannot be listed either.
    #[instrument(skip(self), level = "debug")]
    pub async fn list(&self) -> Result<Listing> {
        let containers = match self.runtime.list(self.settings.owner_label()).await {
            Ok(containers) => containers,
            Err(err) => {
                warn!("runtime unreachable, listing deployment records only: {err}");
                let apps = self
                    .store
                    .list()?
                    .into_iter()
                    .map(|(name, record)| AppView::declared(name, record))
                    .collect();

                return Ok(Listing {
                    source: ListingSource::Metadata,
                    apps,
                });
            }
        };

        let apps = containers
            .into_iter()
            .map(|container| {
                let record = match self.store.load(&container.name) {
                    Ok(record) => Some(record),
                    Err(StoreError::NotFound { .. }) => None,
                    Err(err) => {
                        warn!("ignore record of {}: {err}", container.name);
                        None
                    }
                };
                AppView::overlay(container, record)
            })
            .collect();

        Ok(Listing {
            source: ListingSource::Runtime,
            apps,
        })
    }
}
