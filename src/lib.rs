// Library root module for session-gateway
// This file defines the public API and module structure of the gateway
// control plane: session pool, request telemetry and the admin API
//
// Numan Thabit 2025 Nov

pub mod admin;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod registry;
pub mod telemetry;
pub mod transport;
