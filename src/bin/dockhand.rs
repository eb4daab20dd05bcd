// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dockhand::{
    config::Settings,
    orchestrator::{DeployRequest, DeployType, Listing, Orchestrator},
    path::default_settings_file,
};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use futures::future::try_join_all;
use indicatif::ProgressBar;
use std::{collections::BTreeMap, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "dockhand [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Use settings file at path instead of the default location.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => default_settings_file()?,
        };
        let settings = Settings::load(path)?;

        match self.command {
            Command::Deploy(opts) => run_deploy(settings, opts).await,
            Command::List => run_list(settings).await,
            Command::Stop(opts) => run_stop(settings, opts).await,
            Command::Start(opts) => run_start(settings, opts).await,
            Command::Restart(opts) => run_restart(settings, opts).await,
            Command::Delete(opts) => run_delete(settings, opts).await,
            Command::Logs(opts) => run_logs(settings, opts).await,
            Command::Env(opts) => run_env(settings, opts).await,
            Command::Secret(opts) => run_secret(settings, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Deploy application from git repository or container image.
    #[command(subcommand)]
    Deploy(DeployCommand),

    /// List deployed applications.
    #[command(override_usage = "dockhand list [options]")]
    List,

    /// Stop containers of applications.
    #[command(override_usage = "dockhand stop [options] <app_name>...")]
    Stop(AppsOptions),

    /// Start stopped containers of applications.
    #[command(override_usage = "dockhand start [options] <app_name>...")]
    Start(AppsOptions),

    /// Restart containers of applications.
    #[command(override_usage = "dockhand restart [options] <app_name>...")]
    Restart(AppsOptions),

    /// Delete applications with their containers, records, and working copies.
    #[command(override_usage = "dockhand delete [options] <app_name>...")]
    Delete(AppsOptions),

    /// Show recent output of application.
    #[command(override_usage = "dockhand logs [options] <app_name>")]
    Logs(LogsOptions),

    /// Replace environment of application and relaunch it.
    #[command(override_usage = "dockhand env [options] <app_name> [<KEY=VALUE>]...")]
    Env(EnvOptions),

    /// Manage global secrets injected into every deployment.
    #[command(subcommand)]
    Secret(SecretCommand),
}

#[derive(Debug, Clone, Subcommand)]
enum DeployCommand {
    /// Clone repository, build image, and launch it.
    #[command(override_usage = "dockhand deploy git [options] <app_name> <url>")]
    Git(GitDeployOptions),

    /// Pull container image and launch it.
    #[command(override_usage = "dockhand deploy image [options] <app_name> <image>")]
    Image(ImageDeployOptions),
}

#[derive(Args, Clone, Debug)]
struct SharedDeployOptions {
    /// Port published by container.
    #[arg(short, long, value_name = "port")]
    pub port: u16,

    /// Environment variable to inject into container.
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct GitDeployOptions {
    /// Name of application.
    #[arg(required = true, value_name = "app_name")]
    pub app_name: String,

    /// URL of repository to deploy.
    #[arg(required = true, value_name = "url")]
    pub url: String,

    /// Framework to build with instead of detecting it.
    #[arg(short, long, value_name = "html|react|nextjs|nestjs|express|nodejs")]
    pub framework: Option<String>,

    /// Free-form category of application, e.g., frontend or backend.
    #[arg(long, value_name = "category")]
    pub category: Option<String>,

    #[command(flatten)]
    pub shared: SharedDeployOptions,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ImageDeployOptions {
    /// Name of application.
    #[arg(required = true, value_name = "app_name")]
    pub app_name: String,

    /// Image reference to pull.
    #[arg(required = true, value_name = "image")]
    pub image: String,

    #[command(flatten)]
    pub shared: SharedDeployOptions,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AppsOptions {
    /// Names of applications.
    #[arg(required = true, value_name = "app_name")]
    pub app_names: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LogsOptions {
    /// Name of application.
    #[arg(required = true, value_name = "app_name")]
    pub app_name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct EnvOptions {
    /// Name of application.
    #[arg(required = true, value_name = "app_name")]
    pub app_name: String,

    /// New environment, replacing the old one entirely.
    #[arg(value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone, Subcommand)]
enum SecretCommand {
    /// Insert or replace secret.
    #[command(override_usage = "dockhand secret set [options] <key> <value>")]
    Set { key: String, value: String },

    /// Remove secrets.
    #[command(override_usage = "dockhand secret unset [options] <key>...")]
    Unset {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// List secret keys.
    #[command(override_usage = "dockhand secret list [options]")]
    List,
}

fn parse_env_pair(pair: &str) -> Result<(String, String), String> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.into(), value.into())),
        _ => Err(format!("expected KEY=VALUE, got {pair:?}")),
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn run_deploy(settings: Settings, cmd: DeployCommand) -> Result<()> {
    let request = match cmd {
        DeployCommand::Git(opts) => DeployRequest {
            app_name: opts.app_name,
            deploy_type: DeployType::Git,
            category: opts.category,
            framework: opts.framework,
            repo_url: Some(opts.url),
            port: opts.shared.port,
            env: opts.shared.env.into_iter().collect(),
            ..Default::default()
        },
        DeployCommand::Image(opts) => DeployRequest {
            app_name: opts.app_name,
            deploy_type: DeployType::Image,
            image_name: Some(opts.image),
            port: opts.shared.port,
            env: opts.shared.env.into_iter().collect(),
            ..Default::default()
        },
    };

    let bar = ProgressBar::new(0);
    let orchestrator = Orchestrator::from_settings(settings, bar.clone());
    let result = orchestrator.deploy(request).await;
    bar.finish_and_clear();

    let record = result?;
    println!("{} running as {} on port {}", record.app_name, record.container_id, record.port);

    Ok(())
}

async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings, ProgressBar::hidden());
    let listing = orchestrator.list().await?;
    print_listing(&listing);

    Ok(())
}

fn print_listing(listing: &Listing) {
    if listing.apps.is_empty() {
        info!("no applications deployed");
        return;
    }

    println!("{:<24} {:<14} {:<6} STATUS", "NAME", "CONTAINER", "PORT");
    for app in &listing.apps {
        println!(
            "{:<24} {:<14} {:<6} {}",
            app.app_name, app.container_id, app.port, app.status
        );
    }
}

async fn run_stop(settings: Settings, opts: AppsOptions) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings, ProgressBar::hidden());
    try_join_all(opts.app_names.iter().map(|name| orchestrator.stop(name))).await?;

    Ok(())
}

async fn run_start(settings: Settings, opts: AppsOptions) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings, ProgressBar::hidden());
    try_join_all(opts.app_names.iter().map(|name| orchestrator.start(name))).await?;

    Ok(())
}

async fn run_restart(settings: Settings, opts: AppsOptions) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings, ProgressBar::hidden());
    try_join_all(opts.app_names.iter().map(|name| orchestrator.restart(name))).await?;

    Ok(())
}

async fn run_delete(settings: Settings, opts: AppsOptions) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings, ProgressBar::hidden());
    try_join_all(opts.app_names.iter().map(|name| orchestrator.delete(name))).await?;

    Ok(())
}

async fn run_logs(settings: Settings, opts: LogsOptions) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings, ProgressBar::hidden());
    print!("{}", orchestrator.logs(&opts.app_name).await?);

    Ok(())
}

async fn run_env(settings: Settings, opts: EnvOptions) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings, ProgressBar::hidden());
    let env: BTreeMap<String, String> = opts.env.into_iter().collect();
    let record = orchestrator.update_env(&opts.app_name, env).await?;
    println!("{} relaunched as {}", record.app_name, record.container_id);

    Ok(())
}

fn run_secret(settings: Settings, cmd: SecretCommand) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings, ProgressBar::hidden());
    let secrets = orchestrator.secrets();
    match cmd {
        SecretCommand::Set { key, value } => secrets.set(&key, &value)?,
        SecretCommand::Unset { keys } => {
            for key in keys {
                if !secrets.remove(&key)? {
                    return Err(anyhow!("no secret named {key:?}"));
                }
            }
        }
        SecretCommand::List => {
            for key in secrets.all()?.keys() {
                println!("{key}");
            }
        }
    }

    Ok(())
}
