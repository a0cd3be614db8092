// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Shared test helpers for Spartan crates.

pub mod fake_master;
pub mod generators;
pub mod loopback;
pub mod wait;

pub use fake_master::{FakeMasterClient, FakeMasterRequest};
pub use loopback::{FlakyEndpoint, LoopbackConnector};
pub use wait::wait_for_condition;

/// Initialize tracing for tests.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
