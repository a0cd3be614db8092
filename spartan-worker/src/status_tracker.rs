// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Worker status and the new-tile changelog reported in heartbeats.

use std::collections::HashSet;

use parking_lot::Mutex;
use spartan_common::id::TileId;
use spartan_proto::WorkerStatus;
use spartan_util::time::current_time_secs;

use crate::usage::ResourceUsage;

#[derive(Default)]
struct Inner {
    usage: ResourceUsage,
    new_tiles: Vec<TileId>,
    pending: HashSet<TileId>,
}

/// Usage figures plus the ids created since the last acknowledged
/// heartbeat, in creation order and without duplicates.
#[derive(Default)]
pub struct StatusTracker {
    inner: Mutex<Inner>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_new_tile(&self, id: TileId) {
        let mut inner = self.inner.lock();
        if inner.pending.insert(id) {
            inner.new_tiles.push(id);
        }
    }

    /// Drop unreported entries for destroyed tiles.
    pub fn forget_tiles(&self, ids: &[TileId]) {
        let mut inner = self.inner.lock();
        let mut removed = false;
        for id in ids {
            removed |= inner.pending.remove(id);
        }
        if removed {
            let Inner {
                new_tiles, pending, ..
            } = &mut *inner;
            new_tiles.retain(|id| pending.contains(id));
        }
    }

    pub fn set_usage(&self, usage: ResourceUsage) {
        self.inner.lock().usage = usage;
    }

    pub fn usage(&self) -> ResourceUsage {
        self.inner.lock().usage
    }

    /// Build the status to send. The changelog is left in place until
    /// [`acknowledge`](Self::acknowledge) is called with the sent ids.
    pub fn snapshot(&self, kernel_remain_tiles: Vec<TileId>) -> WorkerStatus {
        let inner = self.inner.lock();
        WorkerStatus {
            total_physical_memory: inner.usage.total_physical_memory,
            num_processors: inner.usage.num_processors,
            mem_usage: inner.usage.mem_usage,
            cpu_usage: inner.usage.cpu_usage,
            last_report_time: current_time_secs(),
            kernel_remain_tiles,
            new_tiles: inner.new_tiles.clone(),
        }
    }

    /// Remove exactly `sent` from the changelog. Entries appended after the
    /// snapshot survive.
    pub fn acknowledge(&self, sent: &[TileId]) {
        self.forget_tiles(sent);
    }

    pub fn pending_new_tiles(&self) -> Vec<TileId> {
        self.inner.lock().new_tiles.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().new_tiles.len()
    }
}
