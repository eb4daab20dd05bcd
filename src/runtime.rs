// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Container runtime interaction.
//!
//! Everything dockhand does to containers and images goes through the
//! [`ContainerRuntime`] trait. The default implementation, [`DockerCli`],
//! shells out to the runtime's command line interface and waits for each
//! command to exit. No command has a timeout, and none is ever retried.
//!
//! The runtime's own view of containers, [`RuntimeContainerView`], is never
//! cached. Every query produces a fresh snapshot.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    ffi::OsStr,
    future::Future,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Length of short container identifiers.
pub const SHORT_ID_LEN: usize = 12;

/// Go template handed to `ps --format`.
pub const PS_FORMAT: &str = "{{.ID}}|{{.Names}}|{{.Image}}|{{.Status}}|{{.Ports}}|{{.State}}";

/// Layer of indirection for container runtime access.
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Build image with tag from build context directory.
    fn build(&self, tag: &str, context: &Path) -> impl Future<Output = Result<String>> + Send;

    /// Pull image from its registry.
    fn pull(&self, image: &str) -> impl Future<Output = Result<String>> + Send;

    /// Give existing image an additional tag.
    fn tag(&self, source: &str, target: &str) -> impl Future<Output = Result<()>> + Send;

    /// Stop container by name or identifier.
    fn stop(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Start stopped container by name or identifier.
    fn start(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Restart container by name or identifier.
    fn restart(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remove container by name or identifier.
    fn remove(&self, name: &str, force: bool) -> impl Future<Output = Result<()>> + Send;

    /// Run new detached container, returning the runtime's raw output.
    fn run(&self, spec: &LaunchSpec) -> impl Future<Output = Result<String>> + Send;

    /// List all containers carrying label, running or not.
    fn list(&self, label: &str) -> impl Future<Output = Result<Vec<RuntimeContainerView>>> + Send;

    /// Fetch last lines of combined output of container.
    fn logs(&self, name: &str, tail: usize) -> impl Future<Output = Result<String>> + Send;
}

/// Everything needed to run a managed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub image: String,
    pub name: String,
    pub label: String,
    pub port: u16,
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Expand into runtime arguments.
    ///
    /// Host port and container port are always equal. User environment comes
    /// first in key order, then `PORT=<port>` is appended unconditionally, so
    /// a user-supplied `PORT` is shadowed by the later declaration rather than
    /// removed.
    pub fn run_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            self.name.clone(),
            "--label".into(),
            self.label.clone(),
            "-p".into(),
            format!("{}:{}", self.port, self.port),
            "--restart".into(),
            "always".into(),
        ];

        for (key, value) in &self.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        args.push("-e".into());
        args.push(format!("PORT={}", self.port));
        args.push(self.image.clone());

        args
    }
}

/// Runtime's view of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeContainerView {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub ports: String,
    pub running: bool,
}

impl RuntimeContainerView {
    /// Parse one line produced with [`PS_FORMAT`].
    ///
    /// Returns `None` for blank or truncated lines.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 6 {
            return None;
        }

        Some(Self {
            id: parts[0].into(),
            name: parts[1].into(),
            image: parts[2].into(),
            status: parts[3].into(),
            ports: parts[4].into(),
            running: parts[5] == "running",
        })
    }

    /// Host port published by container, if any.
    ///
    /// Matches the first `:<port>->` in the port mapping string, e.g.,
    /// `0.0.0.0:3000->3000/tcp` yields 3000.
    pub fn host_port(&self) -> Option<u16> {
        static PUBLISHED: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r":(\d+)->").expect("valid published port pattern"));

        PUBLISHED
            .captures(&self.ports)
            .and_then(|captures| captures.get(1))
            .and_then(|port| port.as_str().parse().ok())
    }
}

/// Truncate runtime output to short container identifier.
pub fn short_id(output: impl AsRef<str>) -> String {
    output.as_ref().trim().chars().take(SHORT_ID_LEN).collect()
}

/// Container runtime access through its command line interface.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
}

impl DockerCli {
    /// Construct new runtime client executing target program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn call(&self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Result<Output> {
        syscall_non_interactive(&self.program, args).await
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerRuntime for DockerCli {
    #[instrument(skip(self), level = "debug")]
    async fn build(&self, tag: &str, context: &Path) -> Result<String> {
        let context = context.as_os_str();
        Ok(self
            .call([OsStr::new("build"), OsStr::new("-t"), OsStr::new(tag), context])
            .await?
            .combined())
    }

    #[instrument(skip(self), level = "debug")]
    async fn pull(&self, image: &str) -> Result<String> {
        Ok(self.call(["pull", image]).await?.combined())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.call(["tag", source, target]).await?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.call(["stop", name]).await?;
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.call(["start", name]).await?;
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.call(["restart", name]).await?;
        Ok(())
    }

    async fn remove(&self, name: &str, force: bool) -> Result<()> {
        if force {
            self.call(["rm", "-f", name]).await?;
        } else {
            self.call(["rm", name]).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, spec), fields(name = %spec.name), level = "debug")]
    async fn run(&self, spec: &LaunchSpec) -> Result<String> {
        Ok(self.call(spec.run_args()).await?.stdout)
    }

    async fn list(&self, label: &str) -> Result<Vec<RuntimeContainerView>> {
        let filter = format!("label={label}");
        let output = self
            .call(["ps", "-a", "--filter", filter.as_str(), "--format", PS_FORMAT])
            .await?;

        Ok(output
            .stdout
            .lines()
            .filter_map(RuntimeContainerView::parse_line)
            .collect())
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String> {
        let tail = tail.to_string();
        Ok(self
            .call(["logs", "--tail", tail.as_str(), name])
            .await?
            .combined())
    }
}

/// Captured output of finished command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// Join stdout and stderr together.
    pub fn combined(self) -> String {
        let mut message = self.stdout;
        message.push_str(&self.stderr);
        message
    }
}

async fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<Output> {
    let args: Vec<_> = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect();
    let command_line = render_command_line(cmd.as_ref(), &args);
    debug!("{command_line}");

    let output = Command::new(cmd.as_ref())
        .args(&args)
        .output()
        .await
        .map_err(|err| RuntimeError::Spawn {
            source: err,
            command: command_line.clone(),
        })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

    if !output.status.success() {
        let mut message = String::new();
        if !stdout.is_empty() {
            message.push_str(format!("stdout: {stdout}").as_str());
        }
        if !stderr.is_empty() {
            message.push_str(format!("stderr: {stderr}").as_str());
        }

        // INVARIANT: Chomp trailing newlines.
        let message = message.trim_end_matches(['\r', '\n']).to_string();

        return Err(RuntimeError::Failed {
            command: command_line,
            output: message,
        });
    }

    Ok(Output { stdout, stderr })
}

fn render_command_line(cmd: &OsStr, args: &[std::ffi::OsString]) -> String {
    let mut line = cmd.to_string_lossy().into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Container runtime error types.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Runtime binary cannot be executed at all.
    #[error("failed to execute {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Runtime command exited unsuccessfully.
    #[error("command {command:?} failed:\n{output}")]
    Failed { command: String, output: String },
}

/// Friendly result alias :3
pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;
