// Transport layer for calls leaving the gateway
//
// Numan Thabit 2025 Nov

pub mod upstream;

pub use upstream::{HttpOrgResolver, OrgResolver};
