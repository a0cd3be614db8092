// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Periodic status reports to the master.

use std::sync::{Arc, Weak};

use spartan_common::status::SpartanResult;
use spartan_proto::HeartbeatReq;
use tokio::time::MissedTickBehavior;

use crate::lifecycle::WorkerState;
use crate::worker::Worker;

impl Worker {
    /// Send one heartbeat. On success the reported changelog entries are
    /// cleared; on failure they stay for the next tick.
    pub async fn tick_once(&self) -> SpartanResult<()> {
        self.lifecycle().require(WorkerState::Ready)?;
        self.status().set_usage(self.usage.sample());
        let status = self.status().snapshot(self.kernels().remaining_tiles());
        let sent = status.new_tiles.clone();
        let worker_id = self.worker_id();

        match self
            .master()
            .heartbeat(HeartbeatReq {
                worker_id,
                worker_status: status,
            })
            .await
        {
            Ok(_) => {
                self.status().acknowledge(&sent);
                tracing::debug!(worker_id, new_tiles = sent.len(), "Heartbeat sent");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    worker_id,
                    pending = sent.len(),
                    error = %e,
                    "Heartbeat failed; changelog kept for next tick"
                );
                Err(e)
            }
        }
    }

    /// Start the reporter loop. It exits once the worker is stopped or
    /// dropped.
    pub(crate) fn spawn_heartbeat(self: &Arc<Self>) {
        let weak: Weak<Worker> = Arc::downgrade(self);
        let mut state_rx = self.lifecycle().subscribe();
        let period = self.config().heartbeat_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = state_rx.changed() => {
                        if changed.is_err() || *state_rx.borrow() == WorkerState::Stopped {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let Some(worker) = weak.upgrade() else {
                            break;
                        };
                        if worker.state() == WorkerState::Stopped {
                            break;
                        }
                        let _ = worker.tick_once().await;
                    }
                }
            }
            tracing::debug!("Heartbeat loop exited");
        });

        if let Some(previous) = self.heartbeat_task.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat_task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the reporter loop to finish.
    pub async fn join_heartbeat(&self) {
        let handle = self.heartbeat_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
