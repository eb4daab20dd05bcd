// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{env, image_request, Call, FakeRuntime, Harness};

use dockhand::orchestrator::{DeployRequest, Error};

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::{fs::write, time::Duration};

async fn deployed(harness: &Harness, app_name: &str, pairs: &[(&str, &str)]) -> Result<()> {
    let request = DeployRequest {
        env: env(pairs),
        ..image_request(app_name, "ghcr.io/acme/api:1.0", 3000)
    };
    harness.orchestrator.deploy(request).await?;
    harness.runtime().clear_calls();

    Ok(())
}

#[tokio::test]
async fn update_env_replaces_instead_of_merging() -> Result<()> {
    let harness = Harness::new()?;
    deployed(&harness, "api", &[("A", "1")]).await?;

    let record = harness
        .orchestrator
        .update_env("api", env(&[("B", "2")]))
        .await?;
    assert_eq!(record.env, env(&[("B", "2")]));
    assert_eq!(record.container_id, "000000000002");
    assert_eq!(harness.orchestrator.store().load("api")?, record);

    let spec = harness.runtime().last_run().unwrap();
    assert_eq!(spec.image, "dockhand/api:latest");
    assert_eq!(spec.port, 3000);
    assert_eq!(spec.env, env(&[("B", "2")]));

    Ok(())
}

#[tokio::test]
async fn update_env_of_unknown_app_is_not_found() -> Result<()> {
    let harness = Harness::new()?;

    let result = harness.orchestrator.update_env("ghost", env(&[])).await;
    assert!(matches!(result, Err(Error::NotFound { .. })));
    assert_eq!(harness.runtime().calls(), Vec::new());

    Ok(())
}

#[tokio::test]
async fn failed_relaunch_keeps_new_env_on_record() -> Result<()> {
    let harness = Harness::new()?;
    deployed(&harness, "api", &[("A", "1")]).await?;
    harness.runtime().fail("run");

    let result = harness
        .orchestrator
        .update_env("api", env(&[("B", "2")]))
        .await;
    assert!(matches!(result, Err(Error::Launch { .. })));

    let record = harness.orchestrator.store().load("api")?;
    assert_eq!(record.env, env(&[("B", "2")]));
    assert_eq!(record.container_id, "000000000001");
    assert!(harness.runtime().container("api").is_none());

    Ok(())
}

#[tokio::test]
async fn delete_tolerates_container_removed_out_of_band() -> Result<()> {
    let harness = Harness::new()?;
    deployed(&harness, "My App!", &[]).await?;
    let app_dir = harness.orchestrator.store().ensure_app_dir("my-app")?;
    write(app_dir.join("leftover.txt"), "bye")?;
    harness.runtime().forget("my-app");

    harness.orchestrator.delete("My App!").await?;

    let store = harness.orchestrator.store();
    assert!(!store.record_path("my-app").exists());
    assert!(!app_dir.exists());
    assert_eq!(
        harness.runtime().calls(),
        vec![
            Call::Stop("my-app".into()),
            Call::Remove {
                name: "my-app".into(),
                force: true,
            },
        ]
    );

    Ok(())
}

#[tokio::test]
async fn stop_start_restart_follow_container() -> Result<()> {
    let harness = Harness::new()?;
    deployed(&harness, "api", &[]).await?;

    harness.orchestrator.stop("api").await?;
    assert!(!harness.runtime().container("api").unwrap().running);

    harness.orchestrator.start("API").await?;
    assert!(harness.runtime().container("api").unwrap().running);

    harness.orchestrator.restart("api").await?;
    assert_eq!(
        harness.runtime().calls(),
        vec![
            Call::Stop("api".into()),
            Call::Start("api".into()),
            Call::Restart("api".into()),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn lifecycle_failure_is_reported() -> Result<()> {
    let harness = Harness::new()?;

    let result = harness.orchestrator.stop("ghost").await;
    match result {
        Err(Error::Lifecycle { action, name, .. }) => {
            assert_eq!(action, "stop");
            assert_eq!(name, "ghost");
        }
        other => panic!("expected lifecycle error, got {other:?}"),
    }

    let result = harness.orchestrator.restart("!!!").await;
    assert!(matches!(result, Err(Error::EmptyName(_))));

    Ok(())
}

#[tokio::test]
async fn logs_of_deployed_and_unknown_apps() -> Result<()> {
    let harness = Harness::new()?;
    deployed(&harness, "api", &[]).await?;

    assert_eq!(harness.orchestrator.logs("api").await?, "api listening\n");
    assert_eq!(
        harness.runtime().calls(),
        vec![Call::Logs {
            name: "api".into(),
            tail: 100,
        }]
    );

    let result = harness.orchestrator.logs("ghost").await;
    assert!(matches!(result, Err(Error::LogRetrieval { .. })));

    Ok(())
}

#[tokio::test]
async fn operations_on_same_app_never_interleave() -> Result<()> {
    let harness = Harness::with_runtime(FakeRuntime::with_delay(Duration::from_millis(20)))?;

    let (first, second) = tokio::join!(
        harness
            .orchestrator
            .deploy(image_request("api", "ghcr.io/acme/api:1", 3000)),
        harness
            .orchestrator
            .deploy(image_request("API", "ghcr.io/acme/api:2", 3000)),
    );
    first?;
    second?;

    let pulls: Vec<usize> = harness
        .runtime()
        .calls()
        .iter()
        .enumerate()
        .filter_map(|(at, call)| matches!(call, Call::Pull(_)).then_some(at))
        .collect();
    // Each deploy issues pull, tag, stop, rm, run back to back.
    assert_eq!(pulls, vec![0, 5]);

    Ok(())
}

#[tokio::test]
async fn operations_on_different_apps_run_concurrently() -> Result<()> {
    let harness = Harness::with_runtime(FakeRuntime::with_delay(Duration::from_millis(20)))?;

    let (first, second) = tokio::join!(
        harness
            .orchestrator
            .deploy(image_request("api", "ghcr.io/acme/api:1", 3000)),
        harness
            .orchestrator
            .deploy(image_request("web", "ghcr.io/acme/web:1", 8080)),
    );
    first?;
    second?;

    // Both pulls start before either deploy gets past its pull.
    let calls = harness.runtime().calls();
    assert!(calls[..2].contains(&Call::Pull("ghcr.io/acme/api:1".into())));
    assert!(calls[..2].contains(&Call::Pull("ghcr.io/acme/web:1".into())));

    Ok(())
}

#[tokio::test]
async fn separate_orchestrators_share_app_lock() -> Result<()> {
    let harness = Harness::new()?;
    let other = harness.sibling();
    let guard = harness.orchestrator.locks().acquire("api").await?;

    let deploy = other.deploy(image_request("API", "ghcr.io/acme/api:1", 3000));
    tokio::pin!(deploy);
    let blocked = tokio::time::timeout(Duration::from_millis(100), &mut deploy).await;
    assert!(blocked.is_err());
    assert_eq!(other.runtime().calls(), Vec::new());

    drop(guard);
    tokio::time::timeout(Duration::from_secs(5), deploy).await??;
    assert_eq!(harness.orchestrator.store().load("api")?.port, 3000);

    Ok(())
}
