// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A small integrator wiring: one sqlite store, a couple of web routes,
//! a drop-directory watcher and a minutely heartbeat.
//!
//! Run with `--dry-run` to print the registered events and exit.

use rondo_core::Schedule;
use rondo_daemon::{App, Response, Store};
use rondo_storage::{RollOptions, SqliteBackend};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let backend = SqliteBackend::new("demo.sqlite").with_roll(RollOptions {
        nb_entries: Some(1000),
        old_entries: Some(Duration::from_secs(7 * 24 * 3600)),
    });
    let app = App::new(Store::new(backend));

    app.web.event("localhost:8080", "GET", "/hi", |world, req| async move {
        world.tag(["hi"]);
        if let Some(name) = req.param("name") {
            world.tag([name]);
        }
        Ok(Response::text("hello"))
    })?;

    app.web.event("localhost:8080", "GET", "/manifest", |world, _req| async move {
        let body = world.file("Cargo.toml").read_bytes().await?;
        Ok(Response::bytes(body))
    })?;

    // drop a file named `move.<anything>` whose first line is the
    // destination path
    app.file.event("./", "move.*", |world, file| async move {
        world.tag([format!("src:{file}")]);
        let content = file.read_text().await?;
        let target = content.lines().next().unwrap_or_default().trim().to_string();
        if target.is_empty() {
            return Err("no destination in drop file".into());
        }
        world.tag([format!("dst:{target}")]);
        tokio::fs::rename(file.path(), &target).await?;
        Ok(())
    })?;

    // every minute of every day
    app.cron.event(Schedule::builder().build()?, |_world| async {
        tracing::info!("beat");
        Ok(())
    })?;

    if std::env::args().any(|arg| arg == "--dry-run" || arg == "-h") {
        print!("{}", app.summary());
        eprintln!("Starting with no argument will listen for these events.");
        return Ok(());
    }

    app.run().await?;
    Ok(())
}
