// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{env, image_request, Call, Harness};

use dockhand::{
    orchestrator::{DeployRequest, ListingSource},
    runtime::RuntimeContainerView,
};

use anyhow::Result;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn nothing_deployed_lists_empty() -> Result<()> {
    let harness = Harness::new()?;

    let listing = harness.orchestrator.list().await?;
    assert_eq!(listing.source, ListingSource::Runtime);
    assert!(listing.apps.is_empty());
    assert_eq!(
        harness.runtime().calls(),
        vec![Call::List("managed-by=dockhand".into())]
    );

    Ok(())
}

#[tokio::test]
async fn nothing_deployed_and_runtime_down_lists_empty() -> Result<()> {
    let harness = Harness::new()?;
    harness.runtime().fail("ps");

    let listing = harness.orchestrator.list().await?;
    assert_eq!(listing.source, ListingSource::Metadata);
    assert!(listing.apps.is_empty());

    Ok(())
}

#[tokio::test]
async fn runtime_listing_overlays_records() -> Result<()> {
    let harness = Harness::new()?;
    let request = DeployRequest {
        env: env(&[("NODE_ENV", "production")]),
        ..image_request("My App!", "ghcr.io/acme/web:2", 3000)
    };
    harness.orchestrator.deploy(request).await?;
    harness.orchestrator.stop("my-app").await?;

    let listing = harness.orchestrator.list().await?;
    assert_eq!(listing.apps.len(), 1);

    let app = &listing.apps[0];
    assert_eq!(app.name, "my-app");
    assert_eq!(app.app_name, "My App!");
    assert_eq!(app.port, 3000);
    assert_eq!(app.env, env(&[("NODE_ENV", "production")]));
    assert_eq!(app.image.as_deref(), Some("dockhand/my-app:latest"));
    assert_eq!(app.running, Some(false));
    assert!(app.status.starts_with("Exited"));

    Ok(())
}

#[tokio::test]
async fn unrecorded_container_falls_back_to_runtime_view() -> Result<()> {
    let harness = Harness::new()?;
    harness.runtime().adopt(RuntimeContainerView {
        id: "9b8a7c6d5e4f".into(),
        name: "legacy".into(),
        image: "legacy:old".into(),
        status: "Up 3 days".into(),
        ports: "0.0.0.0:8081->8081/tcp, :::8081->8081/tcp".into(),
        running: true,
    });

    let listing = harness.orchestrator.list().await?;
    let app = &listing.apps[0];
    assert_eq!(app.app_name, "legacy");
    assert_eq!(app.container_id, "9b8a7c6d5e4f");
    assert_eq!(app.port, 8081);
    assert!(app.env.is_empty());

    Ok(())
}

#[tokio::test]
async fn orphaned_record_only_shows_without_runtime() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .orchestrator
        .deploy(image_request("api", "ghcr.io/acme/api:1", 9000))
        .await?;
    harness.runtime().forget("api");

    let listing = harness.orchestrator.list().await?;
    assert_eq!(listing.source, ListingSource::Runtime);
    assert!(listing.apps.is_empty());

    harness.runtime().fail("ps");
    let listing = harness.orchestrator.list().await?;
    assert_eq!(listing.source, ListingSource::Metadata);
    assert_eq!(listing.apps.len(), 1);

    let app = &listing.apps[0];
    assert_eq!(app.name, "api");
    assert_eq!(app.container_id, "000000000001");
    assert_eq!(app.status, "running");
    assert_eq!(app.port, 9000);
    assert_eq!(app.image, None);
    assert_eq!(app.running, None);

    Ok(())
}
