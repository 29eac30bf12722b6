// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run records: the journal a single handler execution accumulates.

use crate::id::RunId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

/// One journaled observation: when it was recorded and the raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub ts: f64,
    pub data: Vec<u8>,
}

/// A full run: creation time, identity, operator tags, and the
/// insertion-ordered journal of tracked I/O observations.
///
/// Insertion order is observable by replay, so `data` is an ordered map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub ts: f64,
    pub runid: RunId,
    pub tags: BTreeSet<String>,
    pub data: IndexMap<String, RunEntry>,
}

impl Run {
    pub fn new(runid: RunId, ts: f64) -> Self {
        Self {
            ts,
            runid,
            tags: BTreeSet::new(),
            data: IndexMap::new(),
        }
    }

    /// Record `data` under `key`, stamped with `ts`.
    ///
    /// A key written twice is stored under `"<key> (N)"` with N the
    /// smallest integer that makes the new key unique. Returns the key
    /// actually used.
    pub fn record(&mut self, key: &str, ts: f64, data: Vec<u8>) -> String {
        let actual = if self.data.contains_key(key) {
            let mut n = 0usize;
            loop {
                let candidate = format!("{key} ({n})");
                if !self.data.contains_key(&candidate) {
                    break candidate;
                }
                n += 1;
            }
        } else {
            key.to_string()
        };
        self.data.insert(actual.clone(), RunEntry { ts, data });
        actual
    }

    /// Summary form with payloads elided.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ts: self.ts,
            runid: self.runid.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Partial run returned by list operations: payloads elided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ts: f64,
    pub runid: RunId,
    pub tags: BTreeSet<String>,
}

/// Read cursor over a recorded run, mirroring [`Run::record`]'s key
/// disambiguation.
///
/// For each base key the cursor advances through `key`, `"key (0)"`,
/// `"key (1)"`, … picking the first candidate present in the run, so a
/// handler that reads the same key repeatedly replays the writes in the
/// order they were recorded.
#[derive(Debug, Default)]
pub struct ReplayCursor {
    positions: HashMap<String, usize>,
}

impl ReplayCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield the next recorded entry for `key`, or `None` when the run
    /// holds no further matching entry.
    pub fn next<'r>(&mut self, run: &'r Run, key: &str) -> Option<&'r RunEntry> {
        let mut idx = self.positions.get(key).copied().unwrap_or(0);
        // Minimal-N numbering is dense, so `run.data.len()` candidates
        // always cover every stored variant of `key`.
        while idx <= run.data.len() {
            let candidate = if idx == 0 {
                Cow::Borrowed(key)
            } else {
                Cow::Owned(format!("{key} ({})", idx - 1))
            };
            idx += 1;
            if let Some(entry) = run.data.get(candidate.as_ref()) {
                self.positions.insert(key.to_string(), idx);
                return Some(entry);
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
