// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Master worker manager: tracks registered workers and their heartbeats.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use spartan_common::id::WorkerId;
use spartan_common::status::{SpartanError, SpartanResult};
use spartan_proto::{HeartbeatReq, RegisterReq, WorkerStatus};
use spartan_util::time::current_time_ms;

use crate::ownership::TileOwnershipDirectory;

/// What the master knows about one worker.
#[derive(Debug, Clone)]
pub struct WorkerEntry {
    pub address: String,
    pub status: WorkerStatus,
    /// Wall-clock ms of the last register or heartbeat.
    pub last_seen_ms: u64,
    pub num_heartbeats: u64,
}

pub struct WorkerManager {
    /// Registered workers, keyed by assigned id.
    workers: RwLock<BTreeMap<WorkerId, WorkerEntry>>,
    ownership: Arc<TileOwnershipDirectory>,
}

impl WorkerManager {
    pub fn new(ownership: Arc<TileOwnershipDirectory>) -> Self {
        Self {
            workers: RwLock::new(BTreeMap::new()),
            ownership,
        }
    }

    /// Assign the next id in registration order.
    pub fn register(&self, req: RegisterReq) -> WorkerId {
        let mut workers = self.workers.write();
        let id = workers.len() as WorkerId;
        tracing::info!(worker_id = id, address = %req.host, "Worker registered");
        workers.insert(
            id,
            WorkerEntry {
                address: req.host,
                status: req.worker_status,
                last_seen_ms: current_time_ms(),
                num_heartbeats: 0,
            },
        );
        id
    }

    /// Record a heartbeat and apply its changelog to the ownership
    /// directory.
    pub fn heartbeat(&self, req: HeartbeatReq) -> SpartanResult<()> {
        let mut workers = self.workers.write();
        let entry = workers.get_mut(&req.worker_id).ok_or_else(|| {
            SpartanError::not_found(format!("heartbeat from unknown worker {}", req.worker_id))
        })?;
        for id in &req.worker_status.new_tiles {
            self.ownership.register_tile(*id, req.worker_id);
        }
        tracing::debug!(
            worker_id = req.worker_id,
            new_tiles = req.worker_status.new_tiles.len(),
            "Heartbeat received"
        );
        entry.status = req.worker_status;
        entry.last_seen_ms = current_time_ms();
        entry.num_heartbeats += 1;
        Ok(())
    }

    /// Address of every registered worker.
    pub fn peer_map(&self) -> BTreeMap<WorkerId, String> {
        self.workers
            .read()
            .iter()
            .map(|(id, entry)| (*id, entry.address.clone()))
            .collect()
    }

    pub fn address(&self, id: WorkerId) -> Option<String> {
        self.workers.read().get(&id).map(|e| e.address.clone())
    }

    pub fn get(&self, id: WorkerId) -> Option<WorkerEntry> {
        self.workers.read().get(&id).cloned()
    }

    pub fn num_workers(&self) -> usize {
        self.workers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spartan_common::id::TileId;

    fn manager() -> (WorkerManager, Arc<TileOwnershipDirectory>) {
        let ownership = Arc::new(TileOwnershipDirectory::new());
        (WorkerManager::new(Arc::clone(&ownership)), ownership)
    }

    fn register(mgr: &WorkerManager, host: &str) -> WorkerId {
        mgr.register(RegisterReq {
            host: host.to_string(),
            worker_status: WorkerStatus::default(),
        })
    }

    #[test]
    fn test_ids_in_registration_order() {
        let (mgr, _) = manager();
        assert_eq!(register(&mgr, "a:1"), 0);
        assert_eq!(register(&mgr, "b:2"), 1);
        assert_eq!(mgr.num_workers(), 2);
        let peers = mgr.peer_map();
        assert_eq!(peers.get(&1).map(String::as_str), Some("b:2"));
        assert_eq!(mgr.address(0).as_deref(), Some("a:1"));
        assert_eq!(mgr.address(5), None);
    }

    #[test]
    fn test_heartbeat_applies_changelog() {
        let (mgr, ownership) = manager();
        let id = register(&mgr, "a:1");
        let tile = TileId::new(id, 0);
        mgr.heartbeat(HeartbeatReq {
            worker_id: id,
            worker_status: WorkerStatus {
                new_tiles: vec![tile],
                ..Default::default()
            },
        })
        .unwrap();
        assert_eq!(ownership.owner(&tile), Some(id));
        assert_eq!(mgr.get(id).unwrap().num_heartbeats, 1);
    }

    #[test]
    fn test_heartbeat_from_unknown_worker() {
        let (mgr, _) = manager();
        let err = mgr
            .heartbeat(HeartbeatReq {
                worker_id: 3,
                worker_status: WorkerStatus::default(),
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
