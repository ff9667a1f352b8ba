// Session pool registry
//
// Owns the ordered credential pool and the runtime tunables, enforces key
// format and uniqueness, and writes the config document back after every
// mutation without holding the pool lock during file I/O.
//
// Numan Thabit 2025 Nov

use crate::config::{AppConfig, SessionRecord, MIN_CHAT_HISTORY_LENGTH};
use crate::errors::{PersistError, RegistryError, UpstreamError};
use crate::metrics;
use crate::registry::mask::mask_session_key;
use crate::registry::store::{ConfigStore, Snapshot};
use crate::transport::upstream::OrgResolver;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Required prefix of every session key.
pub const SESSION_KEY_PREFIX: &str = "sk-ant-sid";
/// Upper bound on the failover budget.
pub const MAX_FAILOVER: usize = 5;

/// Failover budget for a pool of `pool_size` sessions.
pub fn failover_budget_for(pool_size: usize) -> usize {
    pool_size.min(MAX_FAILOVER)
}

/// Stable handle for a pool entry, unlike its positional index.
pub type SessionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub id: SessionId,
    pub session_key: String,
    pub org_id: Option<String>,
}

/// Masked view of an entry for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub index: usize,
    pub id: SessionId,
    pub session_key: String,
    pub org_id: String,
}

/// Runtime tunables editable through the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub max_chat_history_length: usize,
    pub chat_delete: bool,
    pub no_role_prefix: bool,
    pub prompt_disable_artifacts: bool,
    pub enable_mirror_api: bool,
    pub mirror_api_prefix: String,
}

impl RegistryConfig {
    fn from_app(cfg: &AppConfig) -> Self {
        Self {
            max_chat_history_length: cfg.max_chat_history_length,
            chat_delete: cfg.chat_delete,
            no_role_prefix: cfg.no_role_prefix,
            prompt_disable_artifacts: cfg.prompt_disable_artifacts,
            enable_mirror_api: cfg.enable_mirror_api,
            mirror_api_prefix: cfg.mirror_api_prefix.clone(),
        }
    }

    fn write_into(&self, cfg: &mut AppConfig) {
        cfg.max_chat_history_length = self.max_chat_history_length;
        cfg.chat_delete = self.chat_delete;
        cfg.no_role_prefix = self.no_role_prefix;
        cfg.prompt_disable_artifacts = self.prompt_disable_artifacts;
        cfg.enable_mirror_api = self.enable_mirror_api;
        cfg.mirror_api_prefix = self.mirror_api_prefix.clone();
    }
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    pub max_chat_history_length: Option<usize>,
    pub chat_delete: Option<bool>,
    pub no_role_prefix: Option<bool>,
    pub prompt_disable_artifacts: Option<bool>,
    pub enable_mirror_api: Option<bool>,
    pub mirror_api_prefix: Option<String>,
}

/// How a caller refers to the credential to test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRef {
    Key(String),
    Index(usize),
}

impl SessionRef {
    /// A non-empty key wins over the index.
    pub fn from_parts(session_key: Option<String>, index: Option<i64>) -> Option<Self> {
        match (session_key.filter(|k| !k.is_empty()), index) {
            (Some(key), _) => Some(Self::Key(key)),
            (None, Some(idx)) if idx >= 0 => Some(Self::Index(idx as usize)),
            _ => None,
        }
    }
}

/// Result of probing a credential upstream. Unreachable is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Valid { org_id: String },
    Unreachable { message: String },
}

/// Primary result of a mutation plus the separate result of writing it to disk.
#[derive(Debug)]
pub struct Persisted<T> {
    pub value: T,
    pub persist: Result<PathBuf, PersistError>,
}

impl<T> Persisted<T> {
    pub fn is_saved(&self) -> bool {
        self.persist.is_ok()
    }

    pub fn warning(&self) -> Option<String> {
        self.persist.as_ref().err().map(|e| e.to_string())
    }
}

struct PoolState {
    sessions: Vec<SessionEntry>,
    config: RegistryConfig,
    next_id: SessionId,
    generation: u64,
}

impl PoolState {
    fn push(&mut self, session_key: String, org_id: Option<String>) {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.push(SessionEntry {
            id,
            session_key,
            org_id: org_id.filter(|o| !o.is_empty()),
        });
    }

    fn position(&self, id: SessionId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    fn snapshot(&mut self, base: &AppConfig) -> Snapshot {
        self.generation += 1;
        let mut document = base.clone();
        document.sessions = self
            .sessions
            .iter()
            .map(|s| SessionRecord {
                session_key: s.session_key.clone(),
                org_id: s.org_id.clone().unwrap_or_default(),
            })
            .collect();
        self.config.write_into(&mut document);
        Snapshot {
            generation: self.generation,
            document,
        }
    }
}

/// Credential pool shared by the admin API and the proxy path
pub struct SessionRegistry {
    state: RwLock<PoolState>,
    /// Process settings that are persisted but never edited at runtime
    base: AppConfig,
    store: ConfigStore,
    resolver: Arc<dyn OrgResolver>,
    validate_timeout: Duration,
}

fn validate_format(session_key: &str) -> Result<(), RegistryError> {
    if session_key.starts_with(SESSION_KEY_PREFIX) {
        Ok(())
    } else {
        Err(RegistryError::InvalidFormat {
            prefix: SESSION_KEY_PREFIX,
        })
    }
}

impl SessionRegistry {
    /// Build from loaded config. Malformed or duplicate keys are dropped.
    pub fn new(config: AppConfig, store: ConfigStore, resolver: Arc<dyn OrgResolver>) -> Self {
        let mut state = PoolState {
            sessions: Vec::with_capacity(config.sessions.len()),
            config: RegistryConfig::from_app(&config),
            next_id: 1,
            generation: 0,
        };
        for record in &config.sessions {
            if validate_format(&record.session_key).is_err() {
                warn!(
                    session = %mask_session_key(&record.session_key),
                    "skipping session with invalid key format"
                );
                continue;
            }
            if state
                .sessions
                .iter()
                .any(|s| s.session_key == record.session_key)
            {
                warn!(
                    session = %mask_session_key(&record.session_key),
                    "skipping duplicate session"
                );
                continue;
            }
            state.push(record.session_key.clone(), Some(record.org_id.clone()));
        }
        metrics::SESSION_POOL_SIZE.set(state.sessions.len() as i64);
        info!(sessions = state.sessions.len(), "session registry loaded");

        let validate_timeout = config.upstream_timeout();
        Self {
            state: RwLock::new(state),
            base: AppConfig {
                sessions: Vec::new(),
                ..config
            },
            store,
            resolver,
            validate_timeout,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.base.models
    }

    pub fn address(&self) -> &str {
        &self.base.address
    }

    pub fn proxy(&self) -> Option<&str> {
        self.base.proxy()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of alternate sessions the proxy path may try.
    pub async fn failover_budget(&self) -> usize {
        failover_budget_for(self.len().await)
    }

    pub async fn list(&self) -> Vec<SessionView> {
        let state = self.state.read().await;
        state
            .sessions
            .iter()
            .enumerate()
            .map(|(index, s)| SessionView {
                index,
                id: s.id,
                session_key: mask_session_key(&s.session_key),
                org_id: s.org_id.clone().unwrap_or_default(),
            })
            .collect()
    }

    pub async fn config(&self) -> RegistryConfig {
        self.state.read().await.config.clone()
    }

    /// Unmasked entry at `index`, for the proxy path.
    pub async fn get(&self, index: usize) -> Option<SessionEntry> {
        self.state.read().await.sessions.get(index).cloned()
    }

    /// Append a session and return the new pool size.
    pub async fn add(
        &self,
        session_key: String,
        org_id: Option<String>,
    ) -> Result<Persisted<usize>, RegistryError> {
        validate_format(&session_key)?;
        let masked = mask_session_key(&session_key);
        let (size, snapshot) = {
            let mut state = self.state.write().await;
            if state.sessions.iter().any(|s| s.session_key == session_key) {
                return Err(RegistryError::Duplicate);
            }
            state.push(session_key, org_id);
            (state.sessions.len(), state.snapshot(&self.base))
        };
        metrics::SESSION_POOL_SIZE.set(size as i64);
        info!(session = %masked, sessions = size, "added session");

        let persist = self.store.write(snapshot).await;
        Ok(Persisted {
            value: size,
            persist,
        })
    }

    /// Remove the session at `index`; later entries shift down by one.
    pub async fn remove(&self, index: usize) -> Result<Persisted<usize>, RegistryError> {
        let (removed, size, snapshot) = {
            let mut state = self.state.write().await;
            let len = state.sessions.len();
            if index >= len {
                return Err(RegistryError::OutOfRange { index, len });
            }
            let removed = state.sessions.remove(index);
            (removed, state.sessions.len(), state.snapshot(&self.base))
        };
        self.finish_remove(removed, size, snapshot).await
    }

    pub async fn remove_by_id(&self, id: SessionId) -> Result<Persisted<usize>, RegistryError> {
        let (removed, size, snapshot) = {
            let mut state = self.state.write().await;
            let index = state
                .position(id)
                .ok_or(RegistryError::UnknownSession(id))?;
            let removed = state.sessions.remove(index);
            (removed, state.sessions.len(), state.snapshot(&self.base))
        };
        self.finish_remove(removed, size, snapshot).await
    }

    async fn finish_remove(
        &self,
        removed: SessionEntry,
        size: usize,
        snapshot: Snapshot,
    ) -> Result<Persisted<usize>, RegistryError> {
        metrics::SESSION_POOL_SIZE.set(size as i64);
        info!(
            session = %mask_session_key(&removed.session_key),
            sessions = size,
            "removed session"
        );
        let persist = self.store.write(snapshot).await;
        Ok(Persisted {
            value: size,
            persist,
        })
    }

    /// Check a credential upstream and fill in a missing org id on success.
    pub async fn test(&self, reference: SessionRef) -> Result<TestOutcome, RegistryError> {
        let (session_key, target) = {
            let state = self.state.read().await;
            match reference {
                SessionRef::Key(key) => {
                    let target = state
                        .sessions
                        .iter()
                        .find(|s| s.session_key == key)
                        .map(|s| s.id);
                    (key, target)
                }
                SessionRef::Index(index) => {
                    let entry = state
                        .sessions
                        .get(index)
                        .ok_or(RegistryError::InvalidReference)?;
                    (entry.session_key.clone(), Some(entry.id))
                }
            }
        };
        let masked = mask_session_key(&session_key);

        let lookup = self.resolver.resolve_org_id(&session_key, self.proxy());
        let org_id = match tokio::time::timeout(self.validate_timeout, lookup)
            .await
            .unwrap_or(Err(UpstreamError::Timeout(self.validate_timeout)))
        {
            Ok(org_id) => org_id,
            Err(err) => {
                warn!(session = %masked, error = %err, "session test failed");
                return Ok(TestOutcome::Unreachable {
                    message: format!("Failed to connect: {err}"),
                });
            }
        };
        info!(session = %masked, org_id = %org_id, "session test succeeded");

        if let Some(id) = target {
            let snapshot = {
                let mut state = self.state.write().await;
                let base = &self.base;
                match state.position(id) {
                    Some(pos) if state.sessions[pos].org_id.is_none() => {
                        state.sessions[pos].org_id = Some(org_id.clone());
                        Some(state.snapshot(base))
                    }
                    _ => None,
                }
            };
            if let Some(snapshot) = snapshot {
                if let Err(err) = self.store.write(snapshot).await {
                    warn!(session = %masked, error = %err, "org id recorded in memory only");
                }
            }
        }

        Ok(TestOutcome::Valid { org_id })
    }

    /// Apply a partial config update and return the effective config.
    pub async fn update_config(
        &self,
        update: ConfigUpdate,
    ) -> Result<Persisted<RegistryConfig>, RegistryError> {
        if let Some(len) = update.max_chat_history_length {
            if len < MIN_CHAT_HISTORY_LENGTH {
                return Err(RegistryError::InvalidValue {
                    field: "max_chat_history_length",
                    reason: format!("must be at least {MIN_CHAT_HISTORY_LENGTH}"),
                });
            }
        }
        let (effective, snapshot) = {
            let mut state = self.state.write().await;
            let cfg = &mut state.config;
            if let Some(v) = update.max_chat_history_length {
                cfg.max_chat_history_length = v;
            }
            if let Some(v) = update.chat_delete {
                cfg.chat_delete = v;
            }
            if let Some(v) = update.no_role_prefix {
                cfg.no_role_prefix = v;
            }
            if let Some(v) = update.prompt_disable_artifacts {
                cfg.prompt_disable_artifacts = v;
            }
            if let Some(v) = update.enable_mirror_api {
                cfg.enable_mirror_api = v;
            }
            if let Some(v) = update.mirror_api_prefix {
                cfg.mirror_api_prefix = v;
            }
            let effective = cfg.clone();
            (effective, state.snapshot(&self.base))
        };
        info!(config = ?effective, "config updated");

        let persist = self.store.write(snapshot).await;
        Ok(Persisted {
            value: effective,
            persist,
        })
    }

    /// Write the current state to disk.
    pub async fn persist(&self) -> Result<PathBuf, PersistError> {
        let snapshot = self.state.write().await.snapshot(&self.base);
        self.store.write(snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::store::CONFIG_FILE_NAME;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const KEY_A: &str = "sk-ant-REDACTED";
    const KEY_B: &str = "sk-ant-REDACTED";
    const KEY_C: &str = "sk-ant-REDACTED";

    struct FakeResolver {
        result: Result<String, ()>,
        calls: AtomicUsize,
    }

    impl FakeResolver {
        fn ok(org: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(org.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                result: Err(()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl OrgResolver for FakeResolver {
        async fn resolve_org_id(
            &self,
            _session_key: &str,
            _proxy: Option<&str>,
        ) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map_err(|_| UpstreamError::Status(403))
        }
    }

    fn registry_with(
        sessions: &[&str],
        resolver: Arc<dyn OrgResolver>,
    ) -> (SessionRegistry, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(None, dir.path(), Duration::from_secs(5));
        let config = AppConfig {
            sessions: sessions
                .iter()
                .map(|k| SessionRecord {
                    session_key: k.to_string(),
                    org_id: String::new(),
                })
                .collect(),
            ..AppConfig::default()
        };
        (SessionRegistry::new(config, store, resolver), dir)
    }

    fn registry(sessions: &[&str]) -> (SessionRegistry, TempDir) {
        registry_with(sessions, FakeResolver::ok("org-test"))
    }

    #[tokio::test]
    async fn failover_budget_tracks_pool_size() {
        let (reg, _dir) = registry(&[]);
        assert_eq!(reg.failover_budget().await, 0);
        for i in 0..7 {
            let key = format!("{SESSION_KEY_PREFIX}01-key{i:02}");
            let added = reg.add(key, None).await.unwrap();
            assert_eq!(added.value, i + 1);
            assert_eq!(reg.failover_budget().await, (i + 1).min(MAX_FAILOVER));
        }
        reg.remove(0).await.unwrap();
        reg.remove(0).await.unwrap();
        reg.remove(0).await.unwrap();
        assert_eq!(reg.failover_budget().await, 4);
    }

    #[tokio::test]
    async fn rejects_key_without_prefix() {
        let (reg, _dir) = registry(&[KEY_A]);
        let err = reg.add("sk-other-123".to_string(), None).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidFormat { .. }));
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn rejects_duplicate_key() {
        let (reg, _dir) = registry(&[KEY_A]);
        let err = reg.add(KEY_A.to_string(), None).await.unwrap_err();
        assert_eq!(err, RegistryError::Duplicate);
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn load_skips_invalid_and_duplicate_sessions() {
        let (reg, _dir) = registry(&[KEY_A, "bogus", KEY_A, KEY_B]);
        assert_eq!(reg.len().await, 2);
    }

    #[tokio::test]
    async fn remove_shifts_later_entries_down() {
        let (reg, _dir) = registry(&[KEY_A, KEY_B, KEY_C]);
        let before = reg.list().await;
        let removed = reg.remove(0).await.unwrap();
        assert_eq!(removed.value, 2);

        let after = reg.list().await;
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].id, before[1].id);
        assert_eq!(after[0].index, 0);
        assert_eq!(after[1].id, before[2].id);
        assert_eq!(after[1].index, 1);
    }

    #[tokio::test]
    async fn remove_out_of_range_fails() {
        let (reg, _dir) = registry(&[KEY_A]);
        assert_eq!(
            reg.remove(1).await.unwrap_err(),
            RegistryError::OutOfRange { index: 1, len: 1 }
        );
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn remove_by_id_survives_index_shift() {
        let (reg, _dir) = registry(&[KEY_A, KEY_B, KEY_C]);
        let id_c = reg.list().await[2].id;
        reg.remove(0).await.unwrap();
        reg.remove_by_id(id_c).await.unwrap();

        let left = reg.list().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].session_key, mask_session_key(KEY_B));
        assert_eq!(
            reg.remove_by_id(id_c).await.unwrap_err(),
            RegistryError::UnknownSession(id_c)
        );
    }

    #[tokio::test]
    async fn list_masks_keys() {
        let (reg, _dir) = registry(&[KEY_A]);
        let list = reg.list().await;
        assert_eq!(list[0].session_key, "sk-ant-sid...aaaaa");
        assert!(!list[0].session_key.contains(KEY_A));
    }

    #[tokio::test]
    async fn add_persists_document() {
        let (reg, dir) = registry(&[]);
        let added = reg
            .add(KEY_A.to_string(), Some("org-1".to_string()))
            .await
            .unwrap();
        assert!(added.is_saved());

        let saved = AppConfig::load(Some(&dir.path().join(CONFIG_FILE_NAME))).unwrap();
        assert_eq!(saved.sessions.len(), 1);
        assert_eq!(saved.sessions[0].session_key, KEY_A);
        assert_eq!(saved.sessions[0].org_id, "org-1");
    }

    #[tokio::test]
    async fn camel_case_document_survives_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            format!(
                "sessions:\n  - sessionKey: {KEY_A}\n    orgID: org-a\napiKey: secret-key\nchatDelete: false\nmaxChatHistoryLength: 4000\nmirrorApiPrefix: /mirror\n"
            ),
        )
        .unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        let store = ConfigStore::new(None, dir.path(), Duration::from_secs(5));
        let reg = SessionRegistry::new(config, store, FakeResolver::ok("org"));
        assert_eq!(reg.len().await, 1);

        let added = reg.add(KEY_B.to_string(), None).await.unwrap();
        assert!(added.is_saved());

        let saved = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(saved.api_key, "secret-key");
        assert!(!saved.chat_delete);
        assert_eq!(saved.max_chat_history_length, 4000);
        assert_eq!(saved.mirror_api_prefix, "/mirror");
        assert_eq!(saved.sessions.len(), 2);
        assert_eq!(saved.sessions[0].org_id, "org-a");
    }

    #[tokio::test]
    async fn persistence_failure_keeps_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(None, dir.path().join("gone"), Duration::from_secs(5));
        let reg = SessionRegistry::new(AppConfig::default(), store, FakeResolver::ok("org"));

        let added = reg.add(KEY_A.to_string(), None).await.unwrap();
        assert_eq!(added.value, 1);
        assert!(!added.is_saved());
        assert!(added.warning().is_some());
        assert_eq!(reg.len().await, 1);

        let updated = reg
            .update_config(ConfigUpdate {
                chat_delete: Some(false),
                ..ConfigUpdate::default()
            })
            .await
            .unwrap();
        assert!(!updated.value.chat_delete);
        assert!(updated.warning().is_some());
        assert!(!reg.config().await.chat_delete);
    }

    #[tokio::test]
    async fn partial_update_keeps_omitted_fields() {
        let (reg, _dir) = registry(&[]);
        let before = reg.config().await;
        let updated = reg
            .update_config(ConfigUpdate {
                max_chat_history_length: Some(2000),
                mirror_api_prefix: Some("/mirror".to_string()),
                ..ConfigUpdate::default()
            })
            .await
            .unwrap()
            .value;
        assert_eq!(updated.max_chat_history_length, 2000);
        assert_eq!(updated.mirror_api_prefix, "/mirror");
        assert_eq!(updated.chat_delete, before.chat_delete);
        assert_eq!(updated.no_role_prefix, before.no_role_prefix);
        assert_eq!(updated.enable_mirror_api, before.enable_mirror_api);
    }

    #[tokio::test]
    async fn history_floor_rejected_before_applying() {
        let (reg, _dir) = registry(&[]);
        let err = reg
            .update_config(ConfigUpdate {
                max_chat_history_length: Some(999),
                chat_delete: Some(false),
                ..ConfigUpdate::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidValue { .. }));
        assert!(reg.config().await.chat_delete);
    }

    #[tokio::test]
    async fn test_fills_missing_org_id_once() {
        let resolver = FakeResolver::ok("org-new");
        let (reg, _dir) = registry_with(&[KEY_A], resolver.clone());

        let outcome = reg.test(SessionRef::Index(0)).await.unwrap();
        assert_eq!(
            outcome,
            TestOutcome::Valid {
                org_id: "org-new".to_string()
            }
        );
        assert_eq!(reg.list().await[0].org_id, "org-new");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_does_not_overwrite_existing_org_id() {
        let (reg, _dir) = registry(&[]);
        reg.add(KEY_A.to_string(), Some("org-original".to_string()))
            .await
            .unwrap();
        reg.test(SessionRef::Key(KEY_A.to_string())).await.unwrap();
        assert_eq!(reg.list().await[0].org_id, "org-original");
    }

    #[tokio::test]
    async fn test_reports_unreachable_softly() {
        let (reg, _dir) = registry_with(&[KEY_A], FakeResolver::failing());
        let outcome = reg.test(SessionRef::Index(0)).await.unwrap();
        assert!(matches!(outcome, TestOutcome::Unreachable { .. }));
        assert_eq!(reg.list().await[0].org_id, "");
    }

    #[tokio::test]
    async fn test_with_unknown_reference_fails() {
        let (reg, _dir) = registry(&[KEY_A]);
        assert_eq!(
            reg.test(SessionRef::Index(3)).await.unwrap_err(),
            RegistryError::InvalidReference
        );
    }

    #[tokio::test]
    async fn persist_writes_current_state() {
        let (reg, dir) = registry(&[KEY_A, KEY_B]);
        let path = reg.persist().await.unwrap();
        assert_eq!(path, dir.path().join(CONFIG_FILE_NAME));

        let saved = AppConfig::load(Some(&path)).unwrap();
        let keys: Vec<_> = saved.sessions.iter().map(|s| s.session_key.as_str()).collect();
        assert_eq!(keys, vec![KEY_A, KEY_B]);
        assert_eq!(reg.get(1).await.unwrap().session_key, KEY_B);
        assert!(reg.get(2).await.is_none());
    }

    #[test]
    fn session_ref_prefers_key_over_index() {
        assert_eq!(
            SessionRef::from_parts(Some("k".to_string()), Some(2)),
            Some(SessionRef::Key("k".to_string()))
        );
        assert_eq!(
            SessionRef::from_parts(Some(String::new()), Some(2)),
            Some(SessionRef::Index(2))
        );
        assert_eq!(SessionRef::from_parts(None, Some(-1)), None);
        assert_eq!(SessionRef::from_parts(None, None), None);
    }
}
