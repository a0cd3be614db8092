// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Spartan status/error types.
//!
//! Every fallible operation returns `Result<T, SpartanError>`. The error
//! carries a `StatusCode` so callers can branch on the failure class without
//! parsing messages.

use std::fmt;

/// Status codes for worker and master RPCs.
/// The discriminants are part of the wire contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum StatusCode {
    OK = 0,
    NotFound = 1,
    AlreadyExists = 2,
    ShapeError = 3,
    StateError = 4,
    RemoteUnreachable = 5,
    ExecutionError = 6,
    SerializationError = 7,
    InvalidArgument = 8,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OK => "OK",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::ShapeError => "ShapeError",
            Self::StateError => "StateError",
            Self::RemoteUnreachable => "RemoteUnreachable",
            Self::ExecutionError => "ExecutionError",
            Self::SerializationError => "SerializationError",
            Self::InvalidArgument => "InvalidArgument",
        }
    }

    /// Parse a status code from its string name.
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(Self::OK),
            "NotFound" => Some(Self::NotFound),
            "AlreadyExists" => Some(Self::AlreadyExists),
            "ShapeError" => Some(Self::ShapeError),
            "StateError" => Some(Self::StateError),
            "RemoteUnreachable" => Some(Self::RemoteUnreachable),
            "ExecutionError" => Some(Self::ExecutionError),
            "SerializationError" => Some(Self::SerializationError),
            "InvalidArgument" => Some(Self::InvalidArgument),
            _ => None,
        }
    }

    /// Parse a status code from its wire discriminant.
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(Self::OK),
            1 => Some(Self::NotFound),
            2 => Some(Self::AlreadyExists),
            3 => Some(Self::ShapeError),
            4 => Some(Self::StateError),
            5 => Some(Self::RemoteUnreachable),
            6 => Some(Self::ExecutionError),
            7 => Some(Self::SerializationError),
            8 => Some(Self::InvalidArgument),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The primary error type for Spartan operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct SpartanError {
    pub code: StatusCode,
    pub message: String,
}

impl SpartanError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, msg)
    }
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::AlreadyExists, msg)
    }
    pub fn shape_error(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::ShapeError, msg)
    }
    pub fn state_error(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::StateError, msg)
    }
    pub fn remote_unreachable(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::RemoteUnreachable, msg)
    }
    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::ExecutionError, msg)
    }
    pub fn serialization_error(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::SerializationError, msg)
    }
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, msg)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == StatusCode::NotFound
    }
    pub fn is_already_exists(&self) -> bool {
        self.code == StatusCode::AlreadyExists
    }
    pub fn is_shape_error(&self) -> bool {
        self.code == StatusCode::ShapeError
    }
    pub fn is_state_error(&self) -> bool {
        self.code == StatusCode::StateError
    }
    pub fn is_remote_unreachable(&self) -> bool {
        self.code == StatusCode::RemoteUnreachable
    }
    pub fn is_execution_error(&self) -> bool {
        self.code == StatusCode::ExecutionError
    }
    pub fn is_serialization_error(&self) -> bool {
        self.code == StatusCode::SerializationError
    }
}

/// Convenience type alias: `Result<T, SpartanError>`.
pub type SpartanResult<T> = Result<T, SpartanError>;
