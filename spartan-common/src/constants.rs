// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Constants shared by the worker and the master.

/// Local id value marking a `TileId` as unset.
pub const UNSET_LOCAL_ID: i32 = -1;

/// Worker index used before the master has assigned one.
pub const UNASSIGNED_WORKER_ID: i32 = -1;

/// Default heartbeat period (3 seconds).
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 3_000;

/// Prefix for environment variable config overrides.
pub const ENV_VAR_PREFIX: &str = "SPARTAN_";

/// Environment variable holding the log filter.
pub const ENV_VAR_LOG_LEVEL: &str = "SPARTAN_LOG_LEVEL";
