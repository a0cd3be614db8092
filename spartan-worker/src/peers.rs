// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Peer address table and lazily opened peer clients.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use spartan_common::id::WorkerId;
use spartan_common::status::{SpartanError, SpartanResult};
use spartan_rpc::{PeerConnector, WorkerClient};

pub struct PeerRegistry {
    addresses: RwLock<BTreeMap<WorkerId, String>>,
    clients: DashMap<WorkerId, Arc<dyn WorkerClient>>,
    connector: Arc<dyn PeerConnector>,
}

impl PeerRegistry {
    pub fn new(connector: Arc<dyn PeerConnector>) -> Self {
        Self {
            addresses: RwLock::new(BTreeMap::new()),
            clients: DashMap::new(),
            connector,
        }
    }

    /// Install the address table received at initialize time.
    pub fn set_addresses(&self, peers: BTreeMap<WorkerId, String>) {
        *self.addresses.write() = peers;
        self.clients.clear();
    }

    pub fn address(&self, worker: WorkerId) -> Option<String> {
        self.addresses.read().get(&worker).cloned()
    }

    pub fn num_peers(&self) -> usize {
        self.addresses.read().len()
    }

    pub fn num_connected(&self) -> usize {
        self.clients.len()
    }

    /// Client for `worker`, connecting on first use.
    pub async fn client(&self, worker: WorkerId) -> SpartanResult<Arc<dyn WorkerClient>> {
        if let Some(client) = self.clients.get(&worker) {
            return Ok(Arc::clone(client.value()));
        }
        let address = self
            .address(worker)
            .ok_or_else(|| SpartanError::not_found(format!("no address for worker {worker}")))?;
        let client = self.connector.connect(worker, &address).await?;
        tracing::debug!(worker, %address, "Connected to peer");
        // Another caller may have raced us; keep whichever landed first.
        let entry = self.clients.entry(worker).or_insert(client);
        Ok(Arc::clone(entry.value()))
    }

    /// Drop the cached client so the next call reconnects.
    pub fn evict(&self, worker: WorkerId) {
        self.clients.remove(&worker);
    }
}
