// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment orchestration.
//!
//! The [`Orchestrator`] is the single service object of dockhand. It is
//! constructed once from [`Settings`] and owns everything the deployment
//! pipeline and the lifecycle operations need: the container runtime, the
//! metadata store, the secret store, the source acquirer, and the lock table.
//!
//! # Deployment Pipeline
//!
//! A git deployment runs through these steps in order:
//!
//! 1. Acquire source, i.e., clone or fast-forward the repository.
//! 2. Resolve framework and prepare the build context.
//! 3. Build image under `<namespace>/<name>:latest`.
//! 4. Launch container, replacing any previous one.
//! 5. Write deployment record.
//!
//! An image deployment replaces steps 1 to 3 with a pull of the requested
//! image that is then tagged as `<namespace>/<name>:latest`.
//!
//! Nothing is rolled back when a step fails. A freshly built image whose
//! launch failed stays around for inspection.
//!
//! # Exclusion
//!
//! Every operation that mutates an application holds that application's lock
//! for its whole duration. See [`crate::lock`].

mod lifecycle;
mod registry;
mod request;

pub use registry::{AppView, Listing, ListingSource};
pub use request::{DeployPlan, DeployRequest, DeployType, InvalidRequest, Origin};

use crate::{
    config::Settings,
    framework::Framework,
    lock::{AppLocks, LockError},
    naming::{AppName, EmptyName},
    recipe::{self, RecipeError},
    runtime::{short_id, ContainerRuntime, DockerCli, LaunchSpec, RuntimeError},
    secrets::{merge_env, SecretError, SecretStore},
    source::{is_tracked, AcquisitionError, SourceAcquirer},
    store::{DeploymentRecord, MetadataStore, StoreError, STATUS_RUNNING},
};

use indicatif::ProgressBar;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Deployment orchestrator.
#[derive(Debug)]
pub struct Orchestrator<R = DockerCli>
where
    R: ContainerRuntime,
{
    settings: Settings,
    runtime: R,
    store: MetadataStore,
    secrets: SecretStore,
    acquirer: SourceAcquirer,
    locks: AppLocks,
}

impl Orchestrator<DockerCli> {
    /// Construct orchestrator talking to the runtime binary named in settings.
    pub fn from_settings(settings: Settings, bar: ProgressBar) -> Self {
        let runtime = DockerCli::new(&settings.runtime.program);
        Self::new(settings, runtime, bar)
    }
}

impl<R> Orchestrator<R>
where
    R: ContainerRuntime,
{
    /// Construct new orchestrator.
    ///
    /// Clone and fetch progress is reported through the given progress bar.
    pub fn new(settings: Settings, runtime: R, bar: ProgressBar) -> Self {
        Self {
            store: MetadataStore::open(&settings.deployments.directory),
            secrets: SecretStore::open(&settings.secrets.file),
            acquirer: SourceAcquirer::new(settings.git.clone(), bar),
            locks: AppLocks::new(&settings.deployments.directory),
            runtime,
            settings,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    pub fn locks(&self) -> &AppLocks {
        &self.locks
    }

    /// Deploy application described by request.
    ///
    /// Global secrets are merged into the request environment, with request
    /// values taking precedence. The merged environment is what gets injected
    /// and recorded.
    ///
    /// # Errors
    ///
    /// - Return [`Error::InvalidRequest`] before anything runs if request is
    ///   malformed.
    /// - Return [`Error::Acquisition`] if repository cannot be cloned or
    ///   fast-forwarded.
    /// - Return [`Error::Build`] if image cannot be built, pulled, or tagged.
    /// - Return [`Error::Launch`] if container cannot be started.
    /// - Return [`Error::Lock`] if application lock cannot be taken.
    /// - Return [`Error::Store`] if deployment record cannot be written.
    #[instrument(skip(self, request), fields(app = %request.app_name), level = "debug")]
    pub async fn deploy(&self, request: DeployRequest) -> Result<DeploymentRecord> {
        let plan = request.validate()?;
        let name = plan.name;
        let _guard = self.locks.acquire(name.sanitized()).await?;

        let env = merge_env(plan.env, self.secrets.all()?);
        let tag = name.image_tag(self.settings.image_namespace());
        match plan.origin {
            Origin::Git {
                repo_url,
                framework,
            } => {
                info!(
                    "deploy {name} from {repo_url} ({})",
                    plan.category.as_deref().unwrap_or("uncategorized")
                );
                self.build_from_source(&name, &repo_url, framework, plan.port, &tag)
                    .await?;
            }
            Origin::Image { image_name } => {
                info!("deploy {name} from image {image_name}");
                self.adopt_image(&image_name, &tag).await?;
            }
        }

        let container_id = self.launch(&name, &tag, plan.port, &env).await?;
        let record = DeploymentRecord {
            app_name: name.raw().into(),
            container_id,
            port: plan.port,
            status: STATUS_RUNNING.into(),
            env,
        };
        self.store.save(name.sanitized(), &record)?;
        info!("deployed {name} on port {}", record.port);

        Ok(record)
    }

    async fn build_from_source(
        &self,
        name: &AppName,
        repo_url: &str,
        framework: Option<Framework>,
        port: u16,
        tag: &str,
    ) -> Result<()> {
        self.store.ensure_app_dir(name.sanitized())?;
        let repo_dir = self.store.repo_dir(name.sanitized());

        let acquirer = self.acquirer.clone();
        let (url, dest) = (repo_url.to_string(), repo_dir.clone());
        let acquired = tokio::task::spawn_blocking(move || acquirer.acquire(&url, &dest))
            .await?
            .map_err(|err| Error::Acquisition {
                source: err,
                name: name.sanitized().into(),
            })?;
        info!("source of {name} is {acquired:?}");

        let context = tokio::task::spawn_blocking(move || {
            let tracked = is_tracked(&repo_dir, recipe::RECIPE_FILE);
            let resolved = Framework::resolve(framework, &repo_dir);
            recipe::prepare(&repo_dir, resolved, framework.is_some(), tracked, port)
        })
        .await??;

        info!("build {tag} as {}", context.framework);
        self.runtime
            .build(tag, &context.dir)
            .await
            .map_err(|err| Error::Build {
                source: err,
                tag: tag.into(),
            })?;

        Ok(())
    }

    async fn adopt_image(&self, image: &str, tag: &str) -> Result<()> {
        info!("pull {image}");
        self.runtime.pull(image).await.map_err(|err| Error::Build {
            source: err,
            tag: image.into(),
        })?;
        self.runtime
            .tag(image, tag)
            .await
            .map_err(|err| Error::Build {
                source: err,
                tag: tag.into(),
            })?;

        Ok(())
    }

    /// Replace container of application with a fresh one.
    ///
    /// Stopping and removing the previous container is best effort. Returns
    /// the short identifier of the new container.
    async fn launch(
        &self,
        name: &AppName,
        tag: &str,
        port: u16,
        env: &BTreeMap<String, String>,
    ) -> Result<String> {
        let container = name.container_name();
        if let Err(err) = self.runtime.stop(container).await {
            warn!("ignore failed stop of previous {container}: {err}");
        }
        if let Err(err) = self.runtime.remove(container, false).await {
            warn!("ignore failed removal of previous {container}: {err}");
        }

        info!("launch {container} from {tag} on port {port}");
        let spec = LaunchSpec {
            image: tag.into(),
            name: container.into(),
            label: self.settings.owner_label().into(),
            port,
            env: env.clone(),
        };
        let output = self.runtime.run(&spec).await.map_err(|err| Error::Launch {
            source: err,
            name: container.into(),
        })?;

        Ok(short_id(output))
    }
}

/// Orchestration error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Deployment request is malformed.
    #[error("invalid deployment request")]
    InvalidRequest(#[from] InvalidRequest),

    /// Application name sanitizes down to nothing.
    #[error(transparent)]
    EmptyName(#[from] EmptyName),

    /// Source repository cannot be cloned or fast-forwarded.
    #[error("failed to acquire source of {name}")]
    Acquisition {
        #[source]
        source: AcquisitionError,
        name: String,
    },

    /// Image cannot be built, pulled, or tagged.
    #[error("failed to build image {tag}")]
    Build {
        #[source]
        source: RuntimeError,
        tag: String,
    },

    /// Container cannot be started.
    #[error("failed to launch container {name}")]
    Launch {
        #[source]
        source: RuntimeError,
        name: String,
    },

    /// Application was never deployed.
    #[error("application {name} is not deployed")]
    NotFound { name: String },

    /// Logs cannot be fetched.
    #[error("failed to fetch logs of {name}")]
    LogRetrieval {
        #[source]
        source: RuntimeError,
        name: String,
    },

    /// Stop, start, or restart failed.
    #[error("failed to {action} {name}")]
    Lifecycle {
        #[source]
        source: RuntimeError,
        action: &'static str,
        name: String,
    },

    /// Application lock cannot be taken.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Metadata store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Secret store failure.
    #[error(transparent)]
    Secrets(#[from] SecretError),

    /// Build context cannot be written.
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    /// Blocking task panicked or was cancelled.
    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
