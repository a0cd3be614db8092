// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Spartan tile worker.
//!
//! Holds a partition of a distributed array as tiles, serves region reads
//! and reducer updates, runs kernels through an external engine, reports
//! status to the master, and takes over tiles from peers on request.

pub mod bootstrap;
pub mod heartbeat;
pub mod kernel;
pub mod lifecycle;
pub mod peers;
pub mod region;
pub mod service;
pub mod status_tracker;
pub mod steal;
pub mod tile_store;
pub mod usage;
pub mod worker;

// Re-export primary types.
pub use bootstrap::start_worker;
pub use kernel::{KernelContext, KernelExecutor};
pub use lifecycle::WorkerState;
pub use service::WorkerServiceImpl;
pub use steal::StealOutcome;
pub use usage::{ResourceUsage, StaticUsageProvider, SystemUsageProvider, UsageProvider};
pub use worker::{Worker, WorkerOptions};
