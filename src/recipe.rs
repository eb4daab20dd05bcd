// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build recipe generation.
//!
//! A __build recipe__ is the Dockerfile handed to the image builder along
//! with the repository checkout acting as the build context. Each
//! [`Framework`] maps to one fixed template parameterized only by the target
//! port, so a recipe is a pure function of `(framework, port)`.
//!
//! # Overwrite Policy
//!
//! Repositories may ship their own Dockerfile. Generated recipes only replace
//! an existing one when:
//!
//! - No recipe file exists yet.
//! - Existing recipe is untracked by the repository, i.e., dockhand wrote it
//!   during an earlier deployment.
//! - Caller explicitly supplied a framework, signaling intent to replace.
//!
//! A user-authored, version-controlled recipe is never touched otherwise.

use crate::framework::Framework;

use std::{
    fs::{write, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Name of build recipe file inside build context.
pub const RECIPE_FILE: &str = "Dockerfile";

/// Name of ignore-list file inside build context.
pub const IGNORE_FILE: &str = ".dockerignore";

/// Build artifact directories excluded from build context.
pub const IGNORED_PATHS: [&str; 5] = ["node_modules", ".next", "dist", "build", ".git"];

/// Render build recipe for framework listening on target port.
pub fn render(framework: Framework, port: u16) -> String {
    match framework {
        Framework::Static => format!(
            "FROM pierotofy/static-base\n\
             COPY . /public\n\
             EXPOSE {port}\n\
             CMD [\"-p\", \"{port}\"]\n"
        ),
        Framework::Spa => format!(
            "FROM node:18-alpine\n\
             WORKDIR /app\n\
             COPY package*.json ./\n\
             RUN npm install\n\
             COPY . .\n\
             RUN npm run build\n\
             RUN npm install -g serve\n\
             EXPOSE {port}\n\
             CMD [\"serve\", \"-s\", \"dist\", \"-p\", \"{port}\"]\n"
        ),
        Framework::NextJs => format!(
            "FROM node:18-alpine\n\
             WORKDIR /app\n\
             RUN apk add --no-cache libc6-compat\n\
             COPY package*.json ./\n\
             RUN npm install\n\
             COPY . .\n\
             RUN npm run build\n\
             EXPOSE {port}\n\
             ENV PORT {port}\n\
             CMD [\"npm\", \"start\"]\n"
        ),
        Framework::NestJs => format!(
            "FROM node:18-alpine\n\
             WORKDIR /app\n\
             COPY package*.json ./\n\
             RUN npm install\n\
             COPY . .\n\
             RUN npm run build\n\
             EXPOSE {port}\n\
             CMD [\"npm\", \"run\", \"start:prod\"]\n"
        ),
        Framework::Node => format!(
            "FROM node:18-alpine\n\
             WORKDIR /app\n\
             COPY package*.json ./\n\
             RUN npm install\n\
             COPY . .\n\
             EXPOSE {port}\n\
             CMD [\"npm\", \"start\"]\n"
        ),
    }
}

/// Render ignore-list file content.
pub fn render_ignore_list() -> String {
    let mut out = IGNORED_PATHS.join("\n");
    out.push('\n');
    out
}

/// Decide whether generated recipe may replace whatever is on disk.
pub fn should_write(exists: bool, tracked: bool, explicit_framework: bool) -> bool {
    !exists || !tracked || explicit_framework
}

/// Outcome of preparing a build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Directory handed to the image builder.
    pub dir: PathBuf,

    /// Framework used to render the recipe.
    pub framework: Framework,

    /// Whether the recipe on disk was (re)written.
    pub recipe_written: bool,
}

/// Prepare repository checkout as a build context.
///
/// Writes the rendered recipe under the overwrite policy, and creates the
/// ignore-list file if it does not exist yet. The `tracked` flag states
/// whether the repository tracks its own recipe file.
///
/// # Errors
///
/// - Return [`RecipeError::Write`] if recipe or ignore-list cannot be written.
#[instrument(skip(dir), level = "debug")]
pub fn prepare(
    dir: impl AsRef<Path>,
    framework: Framework,
    explicit_framework: bool,
    tracked: bool,
    port: u16,
) -> Result<BuildContext> {
    let dir = dir.as_ref();
    let recipe_path = dir.join(RECIPE_FILE);
    let exists = recipe_path.exists();

    let recipe_written = should_write(exists, tracked, explicit_framework);
    if recipe_written {
        info!("generate {RECIPE_FILE} for framework {framework} on port {port}");
        write(&recipe_path, render(framework, port)).map_err(|err| RecipeError::Write {
            source: err,
            path: recipe_path.clone(),
        })?;
    } else {
        info!("keep repository-tracked {RECIPE_FILE}");
    }

    write_ignore_list_once(dir.join(IGNORE_FILE))?;

    Ok(BuildContext {
        dir: dir.into(),
        framework,
        recipe_written,
    })
}

fn write_ignore_list_once(path: PathBuf) -> Result<()> {
    // INVARIANT: Never clobber an existing ignore-list.
    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            debug!("{:?} already exists", path.display());
            return Ok(());
        }
        Err(err) => return Err(RecipeError::Write { source: err, path }),
    };

    file.write_all(render_ignore_list().as_bytes())
        .map_err(|err| RecipeError::Write { source: err, path })
}

/// Build recipe error types.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    /// Recipe or ignore-list file cannot be written.
    #[error("failed to write build context file {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RecipeError> = std::result::Result<T, E>;
