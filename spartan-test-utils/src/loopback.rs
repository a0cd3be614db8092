// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! In-process transport for tests.
//!
//! Calls still pass through the real codec: typed clients encode the
//! request, the endpoint's handler table decodes it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use spartan_common::id::WorkerId;
use spartan_common::status::{SpartanError, SpartanResult};
use spartan_rpc::{PeerConnector, RpcEndpoint, WorkerClient, WorkerRpcClient};

/// Wraps an endpoint with a switch that simulates a network partition.
pub struct FlakyEndpoint {
    inner: Arc<dyn RpcEndpoint>,
    down: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyEndpoint {
    pub fn new(inner: Arc<dyn RpcEndpoint>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Calls attempted, including those rejected while down.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RpcEndpoint for FlakyEndpoint {
    async fn call(&self, method: &str, payload: Bytes) -> SpartanResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(SpartanError::remote_unreachable(format!(
                "endpoint down during {method}"
            )));
        }
        self.inner.call(method, payload).await
    }
}

/// Resolves peer addresses to in-process endpoints.
#[derive(Clone, Default)]
pub struct LoopbackConnector {
    endpoints: Arc<Mutex<HashMap<String, Arc<FlakyEndpoint>>>>,
    connects: Arc<AtomicUsize>,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `endpoint` reachable at `address`. Returns the switch for it.
    pub fn register(&self, address: &str, endpoint: Arc<dyn RpcEndpoint>) -> Arc<FlakyEndpoint> {
        let flaky = Arc::new(FlakyEndpoint::new(endpoint));
        self.endpoints
            .lock()
            .unwrap()
            .insert(address.to_string(), Arc::clone(&flaky));
        flaky
    }

    pub fn set_down(&self, address: &str, down: bool) {
        if let Some(endpoint) = self.endpoints.lock().unwrap().get(address) {
            endpoint.set_down(down);
        }
    }

    /// Number of successful `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// A typed client for `address`, bypassing the connect counter.
    pub fn client(&self, address: &str) -> Option<Arc<dyn WorkerClient>> {
        let endpoint = self.endpoints.lock().unwrap().get(address).cloned()?;
        Some(Arc::new(WorkerRpcClient::new(endpoint)))
    }
}

#[async_trait::async_trait]
impl PeerConnector for LoopbackConnector {
    async fn connect(
        &self,
        worker_id: WorkerId,
        address: &str,
    ) -> SpartanResult<Arc<dyn WorkerClient>> {
        let endpoint = self.endpoints.lock().unwrap().get(address).cloned();
        match endpoint {
            Some(endpoint) => {
                self.connects.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(WorkerRpcClient::new(endpoint)))
            }
            None => Err(SpartanError::remote_unreachable(format!(
                "no route to worker {worker_id} at {address}"
            ))),
        }
    }
}
