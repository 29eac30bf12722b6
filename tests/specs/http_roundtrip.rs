// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A live HTTP request journals its observations and can be listed,
//! loaded and replayed afterwards.

use crate::prelude::{base_url, launch, memory_app, stop};
use rondo_daemon::{ReplayPacifier, Response};
use std::collections::BTreeSet;
use std::sync::Arc;

#[tokio::test]
#[serial_test::serial]
async fn a_request_journals_its_observations() {
    let dir = tempfile::tempdir().unwrap();
    let data_file = dir.path().join("data.txt");
    tokio::fs::write(&data_file, b"file content").await.unwrap();

    let app = memory_app();
    let handler_path = data_file.clone();
    let id = app
        .web
        .event("localhost:0", "GET", "/read", move |world, _req| {
            let path = handler_path.clone();
            async move {
                world.tag(["fetched"]);
                let body = world.file(&path).read_bytes().await?;
                Ok(Response::bytes(body))
            }
        })
        .unwrap();

    let running = launch(&app).await;
    let response = reqwest::get(format!("{}/read", base_url(&app, "localhost:0")))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"file content");

    // the world is finalized before the response goes out, so the run
    // is already flushed
    let found = app
        .store()
        .listruns(&id, 0.0, f64::MAX, &BTreeSet::new())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].tags.contains("fetched"));

    let run = app.store().loadrun(&found[0].runid).await.unwrap();
    assert_eq!(run.data["*request-url*"].data, b"GET /read");
    assert_eq!(run.data["*request-body*"].data, b"");
    let file_key = std::fs::canonicalize(&data_file)
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert_eq!(run.data[&file_key].data, b"file content");

    // a replay serves the file read from the journal, not the disk
    tokio::fs::remove_file(&data_file).await.unwrap();
    let replayed = app
        .replay(&id, &found[0].runid, Arc::new(ReplayPacifier::new()))
        .await
        .unwrap()
        .expect("web replays return a response");
    assert_eq!(replayed.body_bytes(), Some(&b"file content"[..]));

    stop(&app, running).await;
}

#[tokio::test]
#[serial_test::serial]
async fn handler_errors_become_500_and_still_flush() {
    let app = memory_app();
    let id = app
        .web
        .event("localhost:0", "GET", "/boom", |_world, _req| async {
            Err("handler exploded".into())
        })
        .unwrap();

    let running = launch(&app).await;
    let response = reqwest::get(format!("{}/boom", base_url(&app, "localhost:0")))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);

    // the request observations were journaled before the handler ran
    let found = app
        .store()
        .listruns(&id, 0.0, f64::MAX, &BTreeSet::new())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let run = app.store().loadrun(&found[0].runid).await.unwrap();
    assert!(run.data.contains_key("*request-head*"));

    stop(&app, running).await;
}

#[tokio::test]
#[serial_test::serial]
async fn route_parameters_reach_the_handler_and_the_journal() {
    let app = memory_app();
    let id = app
        .web
        .event("localhost:0", "GET", "/hello/{name}", |_world, req| async move {
            let name = req.param("name").unwrap_or("?").to_string();
            Ok(Response::text(format!("hi {name}")))
        })
        .unwrap();

    let running = launch(&app).await;
    let body = reqwest::get(format!("{}/hello/ada", base_url(&app, "localhost:0")))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "hi ada");

    let found = app
        .store()
        .listruns(&id, 0.0, f64::MAX, &BTreeSet::new())
        .await
        .unwrap();
    let run = app.store().loadrun(&found[0].runid).await.unwrap();
    let matched: serde_json::Value =
        serde_json::from_slice(&run.data["*request-match*"].data).unwrap();
    assert_eq!(matched["name"], "ada");

    stop(&app, running).await;
}
