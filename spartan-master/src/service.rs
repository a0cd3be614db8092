// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Master RPC surface, delegating to the worker manager and the ownership
//! directory.

use std::sync::Arc;

use bytes::Bytes;
use spartan_common::id::{TileId, WorkerId};
use spartan_common::status::{SpartanError, SpartanResult};
use spartan_proto::{
    EmptyMessage, HeartbeatReq, InitializeReq, Marshal, RegisterReq, TileIdMessage,
    UpdateAndStealTileReq,
};
use spartan_rpc::{MasterMethod, PeerConnector, RpcEndpoint};

use crate::ownership::TileOwnershipDirectory;
use crate::worker_manager::WorkerManager;

/// Where a tile currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLocation {
    pub id: TileId,
    pub owner: WorkerId,
    pub address: String,
}

pub struct MasterServiceImpl {
    pub worker_manager: WorkerManager,
    pub ownership: Arc<TileOwnershipDirectory>,
}

impl MasterServiceImpl {
    pub fn new() -> Self {
        let ownership = Arc::new(TileOwnershipDirectory::new());
        Self {
            worker_manager: WorkerManager::new(Arc::clone(&ownership)),
            ownership,
        }
    }

    pub async fn handle_register(&self, request: RegisterReq) -> SpartanResult<EmptyMessage> {
        self.worker_manager.register(request);
        Ok(EmptyMessage)
    }

    pub async fn handle_heartbeat(&self, request: HeartbeatReq) -> SpartanResult<EmptyMessage> {
        self.worker_manager.heartbeat(request)?;
        Ok(EmptyMessage)
    }

    pub async fn handle_update_and_steal_tile(
        &self,
        request: UpdateAndStealTileReq,
    ) -> SpartanResult<TileIdMessage> {
        let current = self.ownership.update_and_steal(
            request.worker_id,
            request.old_tile_id,
            request.new_tile_id,
        )?;
        Ok(TileIdMessage::new(current))
    }

    /// Send every registered worker its id and the full peer table.
    pub async fn initialize_workers(&self, connector: &dyn PeerConnector) -> SpartanResult<()> {
        let peers = self.worker_manager.peer_map();
        for (id, address) in &peers {
            let client = connector.connect(*id, address).await?;
            client
                .initialize(InitializeReq {
                    id: *id,
                    peers: peers.clone(),
                })
                .await?;
        }
        tracing::info!(num_workers = peers.len(), "Workers initialized");
        Ok(())
    }

    /// Resolve `id` through forwarding entries to its owner.
    pub fn locate(&self, id: &TileId) -> Option<TileLocation> {
        let (current, owner) = self.ownership.resolve(id)?;
        let address = self.worker_manager.address(owner)?;
        Some(TileLocation {
            id: current,
            owner,
            address,
        })
    }
}

impl Default for MasterServiceImpl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RpcEndpoint for MasterServiceImpl {
    async fn call(&self, method: &str, payload: Bytes) -> SpartanResult<Bytes> {
        let Some(method) = MasterMethod::from_str_name(method) else {
            return Err(SpartanError::invalid_argument(format!(
                "unknown master method {method:?}"
            )));
        };
        match method {
            MasterMethod::Register => {
                let reply = self.handle_register(RegisterReq::from_bytes(payload)?).await?;
                Ok(reply.to_bytes())
            }
            MasterMethod::Heartbeat => {
                let reply = self
                    .handle_heartbeat(HeartbeatReq::from_bytes(payload)?)
                    .await?;
                Ok(reply.to_bytes())
            }
            MasterMethod::UpdateAndStealTile => {
                let reply = self
                    .handle_update_and_steal_tile(UpdateAndStealTileReq::from_bytes(payload)?)
                    .await?;
                Ok(reply.to_bytes())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spartan_proto::WorkerStatus;

    #[tokio::test]
    async fn test_method_table() {
        let master = MasterServiceImpl::new();
        let req = RegisterReq {
            host: "w0".to_string(),
            worker_status: WorkerStatus::default(),
        };
        master.call("register", req.to_bytes()).await.unwrap();
        assert_eq!(master.worker_manager.num_workers(), 1);

        let err = master.call("bogus", Bytes::new()).await.unwrap_err();
        assert_eq!(err.code, spartan_common::status::StatusCode::InvalidArgument);

        let err = master
            .call("heartbeat", Bytes::from_static(&[1, 2]))
            .await
            .unwrap_err();
        assert!(err.is_serialization_error());
    }

    #[tokio::test]
    async fn test_locate_follows_steal() {
        let master = MasterServiceImpl::new();
        for host in ["a", "b"] {
            master
                .handle_register(RegisterReq {
                    host: host.to_string(),
                    worker_status: WorkerStatus::default(),
                })
                .await
                .unwrap();
        }
        let old = TileId::new(0, 3);
        let new = TileId::new(1, 7);
        master.ownership.register_tile(old, 0);
        let reply = master
            .handle_update_and_steal_tile(UpdateAndStealTileReq {
                worker_id: 1,
                old_tile_id: old,
                new_tile_id: new,
            })
            .await
            .unwrap();
        assert_eq!(reply.tile_id, new);
        assert_eq!(
            master.locate(&old),
            Some(TileLocation {
                id: new,
                owner: 1,
                address: "b".to_string(),
            })
        );
        assert_eq!(master.locate(&TileId::new(5, 5)), None);
    }
}
