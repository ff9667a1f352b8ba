// Session registry module - credential pool and config persistence
// This file wires the pool, masking and the durable config store
//
// Numan Thabit 2025 Nov

pub mod mask;
pub mod pool;
pub mod store;

pub use mask::mask_session_key;
pub use pool::{
    failover_budget_for, ConfigUpdate, Persisted, RegistryConfig, SessionEntry, SessionId,
    SessionRef, SessionRegistry, SessionView, TestOutcome, MAX_FAILOVER, SESSION_KEY_PREFIX,
};
pub use store::{ConfigStore, Snapshot, CONFIG_FILE_NAME};
