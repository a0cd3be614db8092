// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Worker startup: logging, registration with the master, and waiting for
//! shutdown.

use std::path::Path;
use std::sync::Arc;

use spartan_common::status::{SpartanError, SpartanResult};
use spartan_proto::RegisterReq;
use spartan_rpc::RetryConfig;

use crate::lifecycle::WorkerState;
use crate::worker::{Worker, WorkerOptions};

impl Worker {
    /// Announce this worker to the master and move to `Registered`.
    ///
    /// Transport failures are retried with exponential backoff; any other
    /// master error is returned as is.
    pub async fn register_to_master(&self) -> SpartanResult<()> {
        self.lifecycle().require(WorkerState::Uninit)?;
        self.status().set_usage(self.usage.sample());

        let retry = RetryConfig::from_worker_config(self.config());
        let mut backoff = retry.backoff();
        let host = self.config().worker_address.clone();

        loop {
            let req = RegisterReq {
                host: host.clone(),
                worker_status: self.status().snapshot(Vec::new()),
            };
            match self.master().register(req).await {
                Ok(_) => break,
                Err(e) if e.is_remote_unreachable() => match backoff.next_delay_with_jitter() {
                    Some(delay) => {
                        tracing::warn!(
                            attempt = backoff.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Master unreachable; retrying registration"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(SpartanError::remote_unreachable(format!(
                            "registration failed after {} attempts: {}",
                            backoff.attempts(),
                            e.message
                        )));
                    }
                },
                Err(e) => return Err(e),
            }
        }

        self.lifecycle()
            .transition(WorkerState::Uninit, WorkerState::Registered)?;
        tracing::info!(
            address = %host,
            master = %self.config().master_address,
            "Registered with master"
        );
        Ok(())
    }

    /// Resolve once the worker is stopped and its heartbeat loop has exited.
    pub async fn wait_for_shutdown(&self) {
        self.lifecycle().wait_stopped().await;
        self.join_heartbeat().await;
    }
}

/// Build a worker from `options`, install logging, and register with the
/// master. The returned worker waits in `Registered` for `initialize`.
pub async fn start_worker(options: WorkerOptions) -> SpartanResult<Arc<Worker>> {
    let log_dir = options.config.log_dir.clone();
    // An unusable log directory is not fatal.
    if let Err(e) = spartan_util::logging::init_spartan_logging(
        "spartan_worker",
        log_dir.as_deref().map(Path::new),
        options.config.verbosity,
    ) {
        eprintln!("failed to initialize worker logging: {e}");
    }

    let worker = Worker::new(options)?;
    worker.register_to_master().await?;
    Ok(worker)
}
