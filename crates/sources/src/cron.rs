// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock event source.
//!
//! Each registered schedule contributes its next fire time; the dispatch
//! loop sleeps to the globally earliest one, spawns a run task per
//! schedule due at that instant, and repeats. A schedule whose next fire
//! time no longer exists is removed for good.

use crate::RegisterError;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rondo_core::{EventId, Schedule};
use rondo_engine::{BoxFuture, HandlerResult, Runtime, World};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// The stored shape of a cron handler.
pub type CronHandler = Arc<dyn Fn(World) -> BoxFuture<HandlerResult<()>> + Send + Sync>;

struct CronEvent {
    schedule: Schedule,
    handler: CronHandler,
}

#[derive(Clone)]
struct CronEntry {
    id: EventId,
    schedule: Schedule,
    handler: CronHandler,
}

/// Registry and dispatcher for schedule-driven events.
#[derive(Clone, Default)]
pub struct CronSource {
    events: Arc<Mutex<IndexMap<EventId, CronEvent>>>,
}

impl CronSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a schedule. The event id is the schedule's
    /// canonical stringification; registering it twice fails.
    pub fn event<F, Fut>(&self, schedule: Schedule, handler: F) -> Result<EventId, RegisterError>
    where
        F: Fn(World) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        let id = EventId::new(schedule.to_string());
        let mut events = self.events.lock();
        if events.contains_key(&id) {
            return Err(RegisterError::DuplicateEvent(id));
        }
        let handler: CronHandler = Arc::new(move |world| Box::pin(handler(world)));
        events.insert(id.clone(), CronEvent { schedule, handler });
        Ok(id)
    }

    /// Ids of every registered schedule, in registration order.
    pub fn ids(&self) -> Vec<EventId> {
        self.events.lock().keys().cloned().collect()
    }

    pub fn has(&self, id: &EventId) -> bool {
        self.events.lock().contains_key(id)
    }

    pub fn summary(&self) -> String {
        let events = self.events.lock();
        let mut text = String::new();
        for id in events.keys() {
            text.push_str(&format!("Cron {id}\n"));
        }
        text
    }

    /// Re-invoke the handler of `world.id()` against a recorded run.
    pub fn replay(&self, world: World) -> Option<BoxFuture<HandlerResult<()>>> {
        let handler = self.events.lock().get(world.id())?.handler.clone();
        Some(handler(world))
    }

    /// Dispatch loop; returns when every schedule is exhausted or the
    /// runtime is shut down.
    pub async fn run(&self, runtime: Runtime) {
        let mut entries: Vec<CronEntry> = self
            .events
            .lock()
            .iter()
            .map(|(id, event)| CronEntry {
                id: id.clone(),
                schedule: event.schedule.clone(),
                handler: event.handler.clone(),
            })
            .collect();
        if entries.is_empty() {
            return;
        }
        info!(schedules = entries.len(), "cron dispatch running");

        loop {
            if entries.is_empty() {
                info!("all schedules exhausted, cron dispatch over");
                return;
            }
            let now = chrono::Local::now().naive_local();
            let fire_times: Vec<Option<NaiveDateTime>> = entries
                .iter()
                .map(|entry| entry.schedule.next_from(now))
                .collect();

            if fire_times.iter().any(Option::is_none) {
                let mut keep = fire_times.iter().map(Option::is_some);
                entries.retain(|entry| {
                    let keep = keep.next().unwrap_or(false);
                    if !keep {
                        info!(id = %entry.id, "schedule will never fire again, removing");
                    }
                    keep
                });
                continue;
            }

            let Some(earliest) = fire_times.iter().flatten().min().copied() else {
                return;
            };
            let wait = (earliest - now).to_std().unwrap_or(Duration::ZERO);
            debug!(at = %earliest, "sleeping until next fire");
            tokio::select! {
                () = runtime.cancel_token().cancelled() => return,
                () = tokio::time::sleep(wait) => {}
            }

            // every schedule due at this instant fires its own run task
            for (entry, at) in entries.iter().zip(fire_times.iter().flatten()) {
                if *at != earliest {
                    continue;
                }
                info!(id = %entry.id, "cron fire");
                let handler = entry.handler.clone();
                runtime.spawn_run(entry.id.clone(), move |world| handler(world));
            }
        }
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
