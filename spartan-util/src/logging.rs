// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Logging setup for Spartan using the `tracing` ecosystem.

use std::path::Path;

use spartan_common::constants::ENV_VAR_LOG_LEVEL;
use tracing_subscriber::EnvFilter;

/// Initialize Spartan's logging system.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (SPARTAN_LOG_LEVEL, then RUST_LOG, then `verbosity`)
/// - Optional file output at `<log_dir>/<component>.log`
///
/// Returns `Ok(false)` if a global subscriber was already installed.
pub fn init_spartan_logging(
    component: &str,
    log_dir: Option<&Path>,
    verbosity: i32,
) -> std::io::Result<bool> {
    let filter = EnvFilter::try_from_env(ENV_VAR_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let installed = if let Some(dir) = log_dir {
        let log_file = dir.join(format!("{component}.log"));
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        subscriber
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .try_init()
            .is_ok()
    } else {
        subscriber.try_init().is_ok()
    };

    if installed {
        tracing::info!(component, "Spartan logging initialized");
    }
    Ok(installed)
}

fn level_for_verbosity(verbosity: i32) -> &'static str {
    match verbosity {
        i32::MIN..=0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
