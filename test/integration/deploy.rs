// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{env, git_request, image_request, Call, Harness};

use dockhand::{
    framework::Framework,
    orchestrator::{DeployRequest, Error},
    recipe::{render, IGNORE_FILE, RECIPE_FILE},
    runtime::LaunchSpec,
};

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::fs::read_to_string;

const NEXT_MANIFEST: &str = r#"{"dependencies": {"next": "14.2.3", "react": "18.3.1"}}"#;

fn built_recipes(harness: &Harness) -> Vec<String> {
    harness
        .runtime()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Build { recipe, .. } => Some(recipe),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn deploy_static_site_from_git() -> Result<()> {
    let harness = Harness::new()?;
    let (_remote, url) = harness.remote("site", &[("index.html", "<h1>hello</h1>")])?;

    let record = harness
        .orchestrator
        .deploy(git_request("My App!", &url, 3000))
        .await?;
    assert_eq!(record.app_name, "My App!");
    assert_eq!(record.port, 3000);
    assert_eq!(record.status, "running");
    assert_eq!(record.container_id, "000000000001");

    let expect = vec![
        Call::Build {
            tag: "dockhand/my-app:latest".into(),
            recipe: render(Framework::Static, 3000),
        },
        Call::Stop("my-app".into()),
        Call::Remove {
            name: "my-app".into(),
            force: false,
        },
        Call::Run(LaunchSpec {
            image: "dockhand/my-app:latest".into(),
            name: "my-app".into(),
            label: "managed-by=dockhand".into(),
            port: 3000,
            env: env(&[]),
        }),
    ];
    assert_eq!(harness.runtime().calls(), expect);

    let repo_dir = harness.repo_dir("my-app");
    assert_eq!(
        read_to_string(repo_dir.join(IGNORE_FILE))?,
        "node_modules\n.next\ndist\nbuild\n.git\n"
    );
    assert_eq!(harness.orchestrator.store().load("my-app")?, record);

    Ok(())
}

#[tokio::test]
async fn detected_framework_builds_same_recipe_as_explicit_one() -> Result<()> {
    let harness = Harness::new()?;
    let (_remote, url) = harness.remote("next", &[("package.json", NEXT_MANIFEST)])?;

    let detected = DeployRequest {
        framework: Some(String::new()),
        ..git_request("detected", &url, 3000)
    };
    let explicit = DeployRequest {
        framework: Some("nextjs".into()),
        ..git_request("explicit", &url, 3000)
    };
    harness.orchestrator.deploy(detected).await?;
    harness.orchestrator.deploy(explicit).await?;

    let recipes = built_recipes(&harness);
    assert_eq!(recipes.len(), 2);
    assert_eq!(recipes[0], render(Framework::NextJs, 3000));
    assert_eq!(recipes[0], recipes[1]);

    Ok(())
}

#[tokio::test]
async fn tracked_recipe_kept_unless_framework_is_explicit() -> Result<()> {
    let harness = Harness::new()?;
    let (_remote, url) = harness.remote(
        "custom",
        &[
            ("package.json", r#"{"dependencies": {"express": "4.19.2"}}"#),
            (RECIPE_FILE, "FROM node:20\nCMD [\"node\", \"server.js\"]\n"),
        ],
    )?;

    harness
        .orchestrator
        .deploy(git_request("custom", &url, 4000))
        .await?;
    let redeploy = DeployRequest {
        framework: Some("express".into()),
        ..git_request("custom", &url, 4000)
    };
    harness.orchestrator.deploy(redeploy).await?;

    let recipes = built_recipes(&harness);
    assert_eq!(recipes[0], "FROM node:20\nCMD [\"node\", \"server.js\"]\n");
    assert_eq!(recipes[1], render(Framework::Node, 4000));

    Ok(())
}

#[tokio::test]
async fn redeploy_fast_forwards_working_copy() -> Result<()> {
    let harness = Harness::new()?;
    let (remote, url) = harness.remote("site", &[("index.html", "v1")])?;

    harness
        .orchestrator
        .deploy(git_request("site", &url, 8080))
        .await?;
    remote.stage_and_commit("about.html", "about")?;
    let record = harness
        .orchestrator
        .deploy(git_request("site", &url, 8080))
        .await?;

    let repo_dir = harness.repo_dir("site");
    assert_eq!(read_to_string(repo_dir.join("about.html"))?, "about");
    assert_eq!(read_to_string(repo_dir.join("index.html"))?, "v1");
    assert_eq!(record.container_id, "000000000002");

    Ok(())
}

#[tokio::test]
async fn request_env_wins_over_global_secrets() -> Result<()> {
    let harness = Harness::new()?;
    let secrets = harness.orchestrator.secrets();
    secrets.set("API_KEY", "from-secrets")?;
    secrets.set("DATABASE_URL", "postgres://db")?;

    let request = DeployRequest {
        env: env(&[("API_KEY", "from-request")]),
        ..image_request("api", "ghcr.io/acme/api:1.0", 9000)
    };
    let record = harness.orchestrator.deploy(request).await?;

    let expect = env(&[("API_KEY", "from-request"), ("DATABASE_URL", "postgres://db")]);
    assert_eq!(record.env, expect);
    assert_eq!(harness.runtime().last_run().map(|spec| spec.env), Some(expect));

    Ok(())
}

#[tokio::test]
async fn deploy_from_image_retags_under_app_name() -> Result<()> {
    let harness = Harness::new()?;

    harness
        .orchestrator
        .deploy(image_request("Edge Proxy", "nginx:1.27", 8080))
        .await?;

    let calls = harness.runtime().calls();
    assert_eq!(calls[0], Call::Pull("nginx:1.27".into()));
    assert_eq!(
        calls[1],
        Call::Tag {
            source: "nginx:1.27".into(),
            target: "dockhand/edge-proxy:latest".into(),
        }
    );
    let spec = harness.runtime().last_run().unwrap();
    assert_eq!(spec.image, "dockhand/edge-proxy:latest");
    assert_eq!(spec.name, "edge-proxy");

    Ok(())
}

#[tokio::test]
async fn invalid_request_runs_nothing() -> Result<()> {
    let harness = Harness::new()?;

    let zero_port = harness.orchestrator.deploy(image_request("api", "nginx", 0)).await;
    assert!(matches!(zero_port, Err(Error::InvalidRequest(_))));

    let unknown_framework = DeployRequest {
        framework: Some("rails".into()),
        ..git_request("api", "https://example.com/api.git", 3000)
    };
    let result = harness.orchestrator.deploy(unknown_framework).await;
    assert!(matches!(result, Err(Error::InvalidRequest(_))));

    assert_eq!(harness.runtime().calls(), Vec::new());
    assert_eq!(harness.orchestrator.store().list()?, Vec::new());

    Ok(())
}

#[tokio::test]
async fn unreachable_remote_is_acquisition_error() -> Result<()> {
    let harness = Harness::new()?;
    let missing = harness.root.path().join("remotes").join("nope.git");

    let result = harness
        .orchestrator
        .deploy(git_request("ghost", &missing.to_string_lossy(), 3000))
        .await;
    assert!(matches!(result, Err(Error::Acquisition { .. })));
    assert_eq!(harness.runtime().calls(), Vec::new());

    Ok(())
}

#[tokio::test]
async fn failed_build_writes_no_record() -> Result<()> {
    let harness = Harness::new()?;
    let (_remote, url) = harness.remote("site", &[("index.html", "hi")])?;
    harness.runtime().fail("build");

    let result = harness
        .orchestrator
        .deploy(git_request("site", &url, 3000))
        .await;
    assert!(matches!(result, Err(Error::Build { .. })));
    assert!(harness.runtime().last_run().is_none());
    assert!(harness.orchestrator.store().load("site").is_err());

    Ok(())
}

#[tokio::test]
async fn failed_pull_is_build_error() -> Result<()> {
    let harness = Harness::new()?;
    harness.runtime().fail("pull");

    let result = harness
        .orchestrator
        .deploy(image_request("api", "ghcr.io/acme/missing:0", 3000))
        .await;
    assert!(matches!(result, Err(Error::Build { .. })));

    harness.runtime().heal("pull");
    harness
        .orchestrator
        .deploy(image_request("api", "ghcr.io/acme/missing:0", 3000))
        .await?;

    Ok(())
}
