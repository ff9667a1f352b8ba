// Error types and error handling module
// This file defines the error taxonomy for the session registry,
// config persistence and upstream credential validation
//
// Numan Thabit 2025 Nov

use std::time::Duration;
use thiserror::Error;

/// Caller errors raised by registry operations. All of them map to HTTP 400.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid session key format, must start with '{prefix}'")]
    InvalidFormat { prefix: &'static str },
    #[error("session key already exists")]
    Duplicate,
    #[error("index {index} out of range for pool of {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("no session with id {0}")]
    UnknownSession(u64),
    #[error("invalid session key or index")]
    InvalidReference,
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Failure to write the config document. The in-memory mutation stands.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_yaml::Error),
    #[error("failed to write config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("config write timed out after {0:?}")]
    Timeout(Duration),
    #[error("config write task failed: {0}")]
    Task(String),
}

/// Outcome of probing a credential against the upstream service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned http {0}")]
    Status(u16),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("no organization found for session")]
    NoOrganization,
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),
}
