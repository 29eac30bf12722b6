// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred web handlers answer early and finish in the background.

use crate::prelude::{base_url, launch, memory_app, stop};
use rondo_daemon::Response;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::test]
#[serial_test::serial]
async fn the_response_is_sent_while_the_run_is_still_open() {
    let app = memory_app();
    let gate = Arc::new(Notify::new());

    let handler_gate = gate.clone();
    let id = app
        .web
        .event_deferred("localhost:0", "GET", "/defer", move |world, _req, responder| {
            let gate = handler_gate.clone();
            async move {
                responder.send(Response::text("early"));
                gate.notified().await;
                world.store().store(&world, "late-work", b"done".to_vec())?;
                Ok(())
            }
        })
        .unwrap();

    let running = launch(&app).await;
    let body = reqwest::get(format!("{}/defer", base_url(&app, "localhost:0")))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "early");

    // the handler's tail is still parked on the gate: nothing flushed
    let found = app
        .store()
        .listruns(&id, 0.0, f64::MAX, &BTreeSet::new())
        .await
        .unwrap();
    assert!(found.is_empty());

    gate.notify_one();
    let mut flushed = Vec::new();
    for _ in 0..200 {
        flushed = app
            .store()
            .listruns(&id, 0.0, f64::MAX, &BTreeSet::new())
            .await
            .unwrap();
        if !flushed.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(flushed.len(), 1);

    let run = app.store().loadrun(&flushed[0].runid).await.unwrap();
    assert_eq!(run.data["late-work"].data, b"done");

    stop(&app, running).await;
}

#[tokio::test]
#[serial_test::serial]
async fn a_handler_that_never_responds_is_a_500() {
    let app = memory_app();
    app.web
        .event_deferred("localhost:0", "GET", "/mute", |_world, _req, responder| async move {
            // dropped without sending
            drop(responder);
            Ok(())
        })
        .unwrap();

    let running = launch(&app).await;
    let response = reqwest::get(format!("{}/mute", base_url(&app, "localhost:0")))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);

    stop(&app, running).await;
}
