// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Single-host application deployment.
//!
//! Dockhand turns a git repository or a container image into a supervised,
//! running container on the local host. It keeps a durable record of every
//! deployed application next to the container runtime's own state, and
//! reconciles the two whenever applications are listed.
//!
//! # Application Identity
//!
//! Applications are identified by their __sanitized name__, see
//! [`naming::sanitize`]. The container name, the image tag, the deployment
//! record, and the working directory of an application are all derived from
//! it, so redeploying the same application replaces everything in place.
//!
//! # Entry Point
//!
//! Everything starts at [`orchestrator::Orchestrator`], the service object
//! that runs the deployment pipeline and all lifecycle operations.

pub mod config;
pub mod framework;
pub mod lock;
pub mod naming;
pub mod orchestrator;
pub mod path;
pub mod recipe;
pub mod runtime;
pub mod secrets;
pub mod source;
pub mod store;
