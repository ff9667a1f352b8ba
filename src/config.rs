// Configuration management module
// This file handles loading and validation of the gateway configuration
// from the config.yaml document and environment variables
//
// Numan Thabit 2025 Nov

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Lowest accepted value for `max_chat_history_length`.
pub const MIN_CHAT_HISTORY_LENGTH: usize = 1000;

/// A credential as stored in the config document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(alias = "sessionKey", alias = "sessionkey")]
    pub session_key: String,
    #[serde(
        default,
        skip_serializing_if = "String::is_empty",
        alias = "orgID",
        alias = "orgId",
        alias = "orgid"
    )]
    pub org_id: String,
}

/// Full process configuration. The same shape is written back by the
/// registry when the session pool or tunables change.
///
/// Documents written by earlier gateway builds use camelCase keys; those are
/// accepted on load (also in the lowercased form some sources produce) and
/// rewritten in snake_case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sessions: Vec<SessionRecord>,
    /// Listen address for the admin API
    pub address: String,
    /// Bearer key checked by the (external) auth gate; persisted untouched
    #[serde(alias = "apiKey", alias = "apikey")]
    pub api_key: String,
    /// Optional outbound proxy for upstream calls
    pub proxy: Option<String>,
    #[serde(alias = "chatDelete", alias = "chatdelete")]
    pub chat_delete: bool,
    #[serde(alias = "maxChatHistoryLength", alias = "maxchathistorylength")]
    pub max_chat_history_length: usize,
    #[serde(alias = "noRolePrefix", alias = "noroleprefix")]
    pub no_role_prefix: bool,
    #[serde(alias = "promptDisableArtifacts", alias = "promptdisableartifacts")]
    pub prompt_disable_artifacts: bool,
    #[serde(alias = "enableMirrorApi", alias = "enablemirrorapi")]
    pub enable_mirror_api: bool,
    #[serde(alias = "mirrorApiPrefix", alias = "mirrorapiprefix")]
    pub mirror_api_prefix: String,
    /// Models advertised on the status endpoint
    pub models: Vec<String>,
    /// Capacity of the request telemetry buffer
    pub max_logs: usize,
    pub upstream_base_url: String,
    pub upstream_timeout_secs: u64,
    pub persist_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            address: "0.0.0.0:8080".to_string(),
            api_key: String::new(),
            proxy: None,
            chat_delete: true,
            max_chat_history_length: 10000,
            no_role_prefix: false,
            prompt_disable_artifacts: false,
            enable_mirror_api: false,
            mirror_api_prefix: String::new(),
            models: vec![
                "claude-3-7-sonnet-20250219".to_string(),
                "claude-sonnet-4-20250514".to_string(),
                "claude-opus-4-20250514".to_string(),
                "claude-sonnet-4-6-20260217".to_string(),
            ],
            max_logs: 10000,
            upstream_base_url: "https://claude.ai".to_string(),
            upstream_timeout_secs: 30,
            persist_timeout_secs: 5,
        }
    }
}

impl AppConfig {
    /// Load from `file` (if given and present) with `GATEWAY__*` environment
    /// variables layered on top.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let cfg = builder
            .add_source(config::Environment::with_prefix("GATEWAY").separator("__"))
            .build()?;
        let app: AppConfig = cfg.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chat_history_length < MIN_CHAT_HISTORY_LENGTH {
            bail!(
                "max_chat_history_length must be at least {MIN_CHAT_HISTORY_LENGTH}, got {}",
                self.max_chat_history_length
            );
        }
        if self.max_logs == 0 {
            bail!("max_logs must be greater than zero");
        }
        Url::parse(&self.upstream_base_url)
            .with_context(|| format!("invalid upstream_base_url: {}", self.upstream_base_url))?;
        if let Some(proxy) = self.proxy() {
            Url::parse(proxy).with_context(|| format!("invalid proxy url: {proxy}"))?;
        }
        Ok(())
    }

    /// Proxy setting, treating an empty string as unset.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref().filter(|p| !p.is_empty())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }
}
