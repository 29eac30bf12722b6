// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded sqlite backend.
//!
//! One connection guarded by an async mutex: `storerun` issues several
//! statements and must be atomic from the event loop's point of view, so
//! every operation holds the connection for its full duration.

use crate::{Backend, BackendError};
use async_trait::async_trait;
use rondo_core::{Clock, EventId, Run, RunEntry, RunId, RunSummary, SystemClock};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS event_runs (
    id    TEXT             NOT NULL, -- eg. "localhost:8080 GET /hi"
    runid TEXT PRIMARY KEY NOT NULL,
    ts    REAL             NOT NULL,
    tags  TEXT             NOT NULL) -- tab-separated, eg. "<TAB>t1<TAB>t2<TAB>"
STRICT, WITHOUT ROWID;
CREATE TABLE IF NOT EXISTS run_data (
    runid TEXT             NOT NULL, -- eg. "some-banana"
    key   TEXT             NOT NULL, -- eg. "*request-body*" or "/some/file"
    ts    REAL             NOT NULL,
    data  BLOB             NOT NULL,
    FOREIGN KEY(runid) REFERENCES event_runs(runid),
    PRIMARY KEY(runid, key))
STRICT, WITHOUT ROWID;
"#;

/// Retention policy applied after each `storerun`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollOptions {
    /// Keep at most this many runs; the newest survive.
    pub nb_entries: Option<u64>,
    /// Drop runs older than this.
    pub old_entries: Option<Duration>,
}

/// Embedded SQL backend persisting runs to a single sqlite file.
pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Option<SqliteConnection>>,
    roll: RollOptions,
}

impl SqliteBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Mutex::new(None),
            roll: RollOptions::default(),
        }
    }

    /// Apply a retention policy to this backend.
    pub fn with_roll(mut self, roll: RollOptions) -> Self {
        self.roll = roll;
        self
    }

    /// Delete entries older than the rolling threshold, if any applies.
    ///
    /// The threshold is the max over the configured options, so whichever
    /// deletes most prevails. No VACUUM: that would run far too often.
    async fn roll_vacuum(&self, conn: &mut SqliteConnection) -> Result<(), BackendError> {
        let mut delts = 0.0f64;

        if let Some(keep) = self.roll.nb_entries {
            // ts of the row that would be one past the keep limit
            let row: Option<(f64,)> =
                sqlx::query_as("SELECT ts FROM event_runs ORDER BY ts DESC LIMIT 1 OFFSET ?")
                    .bind(keep as i64)
                    .fetch_optional(&mut *conn)
                    .await?;
            if let Some((ts,)) = row {
                delts = delts.max(ts);
            }
        }

        if let Some(age) = self.roll.old_entries {
            delts = delts.max(SystemClock.now_ts() - age.as_secs_f64());
        }

        if delts > 0.0 {
            debug!(delts, "rolling out runs older than threshold");
            let mut tx = conn.begin().await?;
            sqlx::query("DELETE FROM event_runs WHERE ts <= ?")
                .bind(delts)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM run_data WHERE ts <= ?")
                .bind(delts)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        Ok(())
    }
}

/// Encode a tag set as the stored tab-separated string.
///
/// A run with no tags stores `"\t\t"`, never the empty string, so the
/// LIKE filter in `listruns` stays uniform.
fn to_tagstr(tags: &BTreeSet<String>) -> String {
    let joined = tags.iter().cloned().collect::<Vec<_>>().join("\t");
    format!("\t{joined}\t")
}

fn from_tagstr(tagstr: &str) -> BTreeSet<String> {
    if tagstr.len() > 2 {
        tagstr[1..tagstr.len() - 1]
            .split('\t')
            .map(str::to_string)
            .collect()
    } else {
        BTreeSet::new()
    }
}

/// Escape a tag for use as a LIKE operand, with `!` as the escape char.
fn escape_tag(tag: &str) -> String {
    tag.replace('!', "!!").replace('%', "!%").replace('_', "!_")
}

async fn set_case_sensitive_like(conn: &mut SqliteConnection) -> Result<(), BackendError> {
    sqlx::query("PRAGMA case_sensitive_like = true")
        .execute(conn)
        .await?;
    Ok(())
}

async fn create_schema(conn: &mut SqliteConnection) -> Result<(), BackendError> {
    sqlx::raw_sql(SCHEMA).execute(conn).await?;
    Ok(())
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn open(&self) -> Result<(), BackendError> {
        let mut conn = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .connect()
            .await?;
        // LIKE is case-insensitive by default; tag filtering wants equality
        // semantics (see `listruns`).
        set_case_sensitive_like(&mut conn).await?;
        create_schema(&mut conn).await?;
        *self.conn.lock().await = Some(conn);
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        todo!()
    }

    async fn storerun(&self, id: &EventId, runid: &RunId, run: Run) -> Result<(), BackendError> {
        todo!()
    }

    async fn loadrun(&self, runid: &RunId) -> Result<Run, BackendError> {
        todo!()
    }

    async fn listruns(
        &self,
        id: &EventId,
        min_ts: f64,
        max_ts: f64,
        any_tag: &BTreeSet<String>,
    ) -> Result<Vec<RunSummary>, BackendError> {
        todo!()
    }

    async fn knowntags(&self) -> Result<BTreeSet<String>, BackendError> {
        todo!()
    }

    async fn status(&self) -> Result<String, BackendError> {
        todo!()
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
