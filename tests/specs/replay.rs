// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repeated reads of one key replay the recorded writes in order.

use crate::prelude::memory_app;
use parking_lot::Mutex;
use rondo_daemon::ReplayPacifier;
use rondo_engine::{HandlerResult, RunPath};
use std::collections::BTreeSet;
use std::sync::Arc;

type ReadLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// Read, rewrite, read, rewrite, read: three distinct observations of
/// one path. Live, the writes land on disk between the reads; replayed,
/// the writes are suppressed and the reads come from the journal.
async fn triple_read(path: RunPath, log: ReadLog) -> HandlerResult<()> {
    log.lock().push(path.read_bytes().await?);
    path.write_bytes(b"second".to_vec()).await?;
    log.lock().push(path.read_bytes().await?);
    path.write_bytes(b"third".to_vec()).await?;
    log.lock().push(path.read_bytes().await?);
    Ok(())
}

#[tokio::test]
async fn triple_reads_replay_byte_identical_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let data_file = dir.path().join("counter.txt");
    tokio::fs::write(&data_file, b"first").await.unwrap();

    let app = memory_app();
    let live_log: ReadLog = Arc::new(Mutex::new(Vec::new()));
    let replay_log: ReadLog = Arc::new(Mutex::new(Vec::new()));

    // registered handler: what a replay will re-invoke
    let registered = replay_log.clone();
    let id = app
        .file
        .event(dir.path(), "counter.txt", move |_world, path| {
            triple_read(path, registered.clone())
        })
        .unwrap();

    // drive the live run directly, the way the watcher would
    let spawned = live_log.clone();
    let canonical = std::fs::canonicalize(&data_file).unwrap();
    let live_path = canonical.clone();
    app.runtime().spawn_run(id.clone(), move |world| {
        Box::pin(async move {
            let tracked = world.file(&live_path);
            world.store().store(
                &world,
                "*path*",
                live_path.to_string_lossy().into_owned().into_bytes(),
            )?;
            triple_read(tracked, spawned).await
        })
    });
    app.runtime().drain().await;

    let lived = live_log.lock().clone();
    assert_eq!(lived, [b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);

    // the journal holds the three reads under disambiguated keys
    let found = app
        .store()
        .listruns(&id, 0.0, f64::MAX, &BTreeSet::new())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let run = app.store().loadrun(&found[0].runid).await.unwrap();
    let key = canonical.to_string_lossy().into_owned();
    let keys: Vec<String> = run.data.keys().cloned().collect();
    assert_eq!(
        keys,
        [
            "*path*".to_string(),
            key.clone(),
            format!("{key} (0)"),
            format!("{key} (1)"),
        ]
    );

    // replaying returns the same three byte sequences, in order, and
    // leaves the (rewritten) file alone
    tokio::fs::write(&data_file, b"mutated since").await.unwrap();
    app.replay(&id, &found[0].runid, Arc::new(ReplayPacifier::new()))
        .await
        .unwrap();
    let replayed = replay_log.lock().clone();
    assert_eq!(replayed, lived);
    assert_eq!(
        tokio::fs::read(&data_file).await.unwrap(),
        b"mutated since".to_vec()
    );
}
