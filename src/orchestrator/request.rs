// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment requests.
//!
//! A [`DeployRequest`] is what callers hand to the orchestrator. It mirrors
//! the loose request body an HTTP front end would receive, so every field may
//! be missing or blank. [`DeployRequest::validate`] turns it into a
//! [`DeployPlan`] that the pipeline can trust, and it does so before any
//! external process is started.

use crate::{
    framework::{Framework, UnknownFramework},
    naming::{AppName, EmptyName},
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the image of a deployment comes from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployType {
    /// Clone repository, generate recipe, build image.
    #[default]
    Git,

    /// Pull ready-made image.
    Image,
}

/// Raw deployment request.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeployRequest {
    pub app_name: String,
    pub deploy_type: DeployType,
    pub category: Option<String>,
    pub framework: Option<String>,
    #[serde(rename = "repoURL")]
    pub repo_url: Option<String>,
    pub image_name: Option<String>,
    pub port: u16,
    pub env: BTreeMap<String, String>,
}

impl DeployRequest {
    /// Check mandatory fields and resolve them into a deployment plan.
    ///
    /// A blank framework means "detect it". Blank strings everywhere else
    /// count as missing.
    ///
    /// # Errors
    ///
    /// - Return [`InvalidRequest`] describing the first problem found.
    pub fn validate(&self) -> Result<DeployPlan, InvalidRequest> {
        if self.app_name.trim().is_empty() {
            return Err(InvalidRequest::MissingName);
        }
        let name = AppName::new(self.app_name.as_str())?;

        if self.port == 0 {
            return Err(InvalidRequest::ZeroPort);
        }

        let origin = match self.deploy_type {
            DeployType::Git => {
                let repo_url = non_blank(&self.repo_url).ok_or(InvalidRequest::MissingRepoUrl)?;
                let framework = non_blank(&self.framework)
                    .map(|tag| tag.parse::<Framework>())
                    .transpose()?;
                Origin::Git {
                    repo_url: repo_url.into(),
                    framework,
                }
            }
            DeployType::Image => {
                let image_name =
                    non_blank(&self.image_name).ok_or(InvalidRequest::MissingImageName)?;
                Origin::Image {
                    image_name: image_name.into(),
                }
            }
        };

        Ok(DeployPlan {
            name,
            origin,
            category: non_blank(&self.category).map(Into::into),
            port: self.port,
            env: self.env.clone(),
        })
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Validated deployment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub name: AppName,
    pub origin: Origin,
    pub category: Option<String>,
    pub port: u16,
    pub env: BTreeMap<String, String>,
}

/// Source of image to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Git {
        repo_url: String,
        framework: Option<Framework>,
    },
    Image {
        image_name: String,
    },
}

/// Deployment request is rejected.
#[derive(Debug, thiserror::Error)]
pub enum InvalidRequest {
    #[error("application name is required")]
    MissingName,

    #[error(transparent)]
    EmptyName(#[from] EmptyName),

    #[error("repository URL is required for git deployments")]
    MissingRepoUrl,

    #[error("image name is required for image deployments")]
    MissingImageName,

    #[error("port must be nonzero")]
    ZeroPort,

    #[error(transparent)]
    UnknownFramework(#[from] UnknownFramework),
}
