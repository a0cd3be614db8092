// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! RPC plumbing for Spartan.
//!
//! The transport itself lives outside this workspace. What it must provide
//! is an [`traits::RpcEndpoint`]: one call in (method name plus encoded
//! request), one encoded reply out. Typed clients for the master and worker
//! services are layered on top of any endpoint.

pub mod client;
pub mod method;
pub mod traits;

pub use client::{CallStats, MasterRpcClient, RetryConfig, WorkerRpcClient};
pub use method::{MasterMethod, WorkerMethod};
pub use traits::{MasterClient, PeerConnector, RpcEndpoint, WorkerClient};
