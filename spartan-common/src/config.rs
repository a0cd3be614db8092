// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Worker configuration.
//!
//! A plain struct with defaults, supporting:
//! - JSON or base64-encoded JSON from the cluster launcher
//! - Environment variable overrides: `SPARTAN_<UPPER_SNAKE_CASE_NAME>`
//!
//! The configuration is supplied once at process start and handed to the
//! worker constructor; there is no process-wide singleton.

use std::time::Duration;

use crate::constants::{DEFAULT_HEARTBEAT_INTERVAL_MS, ENV_VAR_PREFIX};

/// Configuration consumed by worker bootstrap.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WorkerConfig {
    // ─── Addresses ────────────────────────────────────────────
    pub master_address: String,
    pub worker_address: String,

    // ─── Heartbeat ────────────────────────────────────────────
    pub heartbeat_interval_ms: u64,

    // ─── Registration retry ───────────────────────────────────
    pub register_max_attempts: u32,
    pub register_initial_backoff_ms: u64,
    pub register_max_backoff_ms: u64,

    // ─── Logging ──────────────────────────────────────────────
    pub log_dir: Option<String>,
    pub verbosity: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            master_address: "127.0.0.1:10000".to_string(),
            worker_address: "127.0.0.1:0".to_string(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            register_max_attempts: 5,
            register_initial_backoff_ms: 100,
            register_max_backoff_ms: 5_000,
            log_dir: None,
            verbosity: 0,
        }
    }
}

impl WorkerConfig {
    /// Parse from base64-encoded JSON (as sent by the launcher).
    pub fn from_base64_json(b64: &str) -> Result<Self, String> {
        let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, b64)
            .map_err(|e| format!("base64 decode error: {e}"))?;
        let json_str =
            String::from_utf8(decoded).map_err(|e| format!("UTF-8 decode error: {e}"))?;
        Self::from_json(&json_str)
    }

    /// Encode for a launched worker's command line; the inverse of
    /// [`from_base64_json`](Self::from_base64_json).
    pub fn to_base64_json(&self) -> Result<String, String> {
        let json = serde_json::to_string(self).map_err(|e| format!("JSON encode error: {e}"))?;
        Ok(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            json,
        ))
    }

    /// Parse from a JSON string. Unknown keys are ignored, missing keys keep
    /// their defaults, and environment overrides are applied last.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| format!("JSON parse error: {e}"))?;

        let mut config = Self::default();

        macro_rules! set_field {
            ($field:ident, u64) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_u64()) {
                    config.$field = v;
                }
            };
            ($field:ident, u32) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_u64()) {
                    config.$field = u32::try_from(v)
                        .map_err(|_| format!("{} out of range: {v}", stringify!($field)))?;
                }
            };
            ($field:ident, i32) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_i64()) {
                    config.$field = i32::try_from(v)
                        .map_err(|_| format!("{} out of range: {v}", stringify!($field)))?;
                }
            };
            ($field:ident, String) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_str()) {
                    config.$field = v.to_string();
                }
            };
            ($field:ident, Option<String>) => {
                if let Some(v) = map.get(stringify!($field)).and_then(|v| v.as_str()) {
                    config.$field = Some(v.to_string());
                }
            };
        }

        set_field!(master_address, String);
        set_field!(worker_address, String);
        set_field!(heartbeat_interval_ms, u64);
        set_field!(register_max_attempts, u32);
        set_field!(register_initial_backoff_ms, u64);
        set_field!(register_max_backoff_ms, u64);
        set_field!(log_dir, Option<String>);
        set_field!(verbosity, i32);

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides of the form `SPARTAN_<NAME>`.
    pub fn apply_env_overrides(&mut self) {
        macro_rules! env_override {
            ($field:ident, String) => {
                if let Some(val) = env_value(stringify!($field)) {
                    self.$field = val;
                }
            };
            ($field:ident, $ty:ty) => {
                if let Some(val) = env_value(stringify!($field)) {
                    match val.parse::<$ty>() {
                        Ok(v) => self.$field = v,
                        Err(_) => tracing::warn!(
                            field = stringify!($field),
                            value = %val,
                            "Ignoring unparsable config override"
                        ),
                    }
                }
            };
        }

        env_override!(master_address, String);
        env_override!(worker_address, String);
        env_override!(heartbeat_interval_ms, u64);
        env_override!(register_max_attempts, u32);
        env_override!(register_initial_backoff_ms, u64);
        env_override!(register_max_backoff_ms, u64);
        env_override!(verbosity, i32);
        if let Some(dir) = env_value("log_dir") {
            self.log_dir = Some(dir);
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.heartbeat_interval_ms == 0 {
            return Err("heartbeat_interval_ms must be positive".to_string());
        }
        if self.register_max_attempts == 0 {
            return Err("register_max_attempts must be positive".to_string());
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

fn env_value(field: &str) -> Option<String> {
    let key = format!("{ENV_VAR_PREFIX}{}", field.to_ascii_uppercase());
    std::env::var(key).ok()
}
