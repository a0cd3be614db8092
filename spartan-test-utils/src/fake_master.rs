// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! A fake master that records every request and can be told to fail.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use spartan_common::status::{SpartanError, SpartanResult};
use spartan_proto::{EmptyMessage, HeartbeatReq, RegisterReq, TileIdMessage, UpdateAndStealTileReq};
use spartan_rpc::MasterClient;

/// Captured master request.
#[derive(Debug, Clone)]
pub enum FakeMasterRequest {
    Register(RegisterReq),
    Heartbeat(HeartbeatReq),
    UpdateAndStealTile(UpdateAndStealTileReq),
}

type StealHandler =
    Box<dyn Fn(&UpdateAndStealTileReq) -> SpartanResult<TileIdMessage> + Send + Sync>;

#[derive(Default)]
struct Failures {
    register: usize,
    heartbeat: usize,
    heartbeat_down: bool,
}

/// Records requests in arrival order. Failed calls are recorded too.
///
/// By default every call succeeds and every steal is granted.
#[derive(Clone)]
pub struct FakeMasterClient {
    requests: Arc<Mutex<VecDeque<FakeMasterRequest>>>,
    failures: Arc<Mutex<Failures>>,
    steal_handler: Arc<Mutex<Option<StealHandler>>>,
}

impl FakeMasterClient {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(VecDeque::new())),
            failures: Arc::new(Mutex::new(Failures::default())),
            steal_handler: Arc::new(Mutex::new(None)),
        }
    }

    /// Fail the next `n` register calls with `RemoteUnreachable`.
    pub fn fail_next_registers(&self, n: usize) {
        self.failures.lock().unwrap().register = n;
    }

    /// Fail the next `n` heartbeat calls with `RemoteUnreachable`.
    pub fn fail_next_heartbeats(&self, n: usize) {
        self.failures.lock().unwrap().heartbeat = n;
    }

    /// Fail every heartbeat until cleared.
    pub fn set_heartbeat_down(&self, down: bool) {
        self.failures.lock().unwrap().heartbeat_down = down;
    }

    /// Replace the steal decision. The default grants every request.
    pub fn set_steal_handler<F>(&self, handler: F)
    where
        F: Fn(&UpdateAndStealTileReq) -> SpartanResult<TileIdMessage> + Send + Sync + 'static,
    {
        *self.steal_handler.lock().unwrap() = Some(Box::new(handler));
    }

    pub fn pop_request(&self) -> Option<FakeMasterRequest> {
        self.requests.lock().unwrap().pop_front()
    }

    pub fn num_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn registers(&self) -> Vec<RegisterReq> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                FakeMasterRequest::Register(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn heartbeats(&self) -> Vec<HeartbeatReq> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                FakeMasterRequest::Heartbeat(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn steals(&self) -> Vec<UpdateAndStealTileReq> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                FakeMasterRequest::UpdateAndStealTile(req) => Some(*req),
                _ => None,
            })
            .collect()
    }

    fn push(&self, request: FakeMasterRequest) {
        self.requests.lock().unwrap().push_back(request);
    }
}

impl Default for FakeMasterClient {
    fn default() -> Self {
        Self::new()
    }
}

fn take_failure(counter: &mut usize) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

#[async_trait::async_trait]
impl MasterClient for FakeMasterClient {
    async fn register(&self, req: RegisterReq) -> SpartanResult<EmptyMessage> {
        self.push(FakeMasterRequest::Register(req));
        if take_failure(&mut self.failures.lock().unwrap().register) {
            return Err(SpartanError::remote_unreachable("fake master: register failed"));
        }
        Ok(EmptyMessage)
    }

    async fn heartbeat(&self, req: HeartbeatReq) -> SpartanResult<EmptyMessage> {
        self.push(FakeMasterRequest::Heartbeat(req));
        let mut failures = self.failures.lock().unwrap();
        if failures.heartbeat_down || take_failure(&mut failures.heartbeat) {
            return Err(SpartanError::remote_unreachable("fake master: heartbeat failed"));
        }
        Ok(EmptyMessage)
    }

    async fn update_and_steal_tile(
        &self,
        req: UpdateAndStealTileReq,
    ) -> SpartanResult<TileIdMessage> {
        self.push(FakeMasterRequest::UpdateAndStealTile(req));
        match self.steal_handler.lock().unwrap().as_ref() {
            Some(handler) => handler(&req),
            None => Ok(TileIdMessage::new(req.new_tile_id)),
        }
    }
}
