// Upstream transport layer
// This file implements the credential check against the upstream web API:
// given a session key it resolves the account's organization id
//
// Numan Thabit 2025 Nov

use crate::errors::UpstreamError;
use reqwest::{header, Client, Proxy};
use serde::Deserialize;
use std::time::Duration;

/// Resolves the organization behind a session credential.
#[async_trait::async_trait]
pub trait OrgResolver: Send + Sync {
    async fn resolve_org_id(
        &self,
        session_key: &str,
        proxy: Option<&str>,
    ) -> Result<String, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct Organization {
    uuid: String,
}

/// Resolver backed by the upstream `/api/organizations` endpoint.
#[derive(Debug, Clone)]
pub struct HttpOrgResolver {
    base_url: String,
    timeout: Duration,
}

impl HttpOrgResolver {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/organizations", self.base_url)
    }

    fn client(&self, proxy: Option<&str>) -> Result<Client, UpstreamError> {
        let mut builder = Client::builder().timeout(self.timeout);
        if let Some(proxy) = proxy {
            let proxy =
                Proxy::all(proxy).map_err(|e| UpstreamError::Transport(format!("proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|e| UpstreamError::Transport(format!("client build: {e}")))
    }
}

#[async_trait::async_trait]
impl OrgResolver for HttpOrgResolver {
    async fn resolve_org_id(
        &self,
        session_key: &str,
        proxy: Option<&str>,
    ) -> Result<String, UpstreamError> {
        let resp = self
            .client(proxy)?
            .get(self.endpoint())
            .header(header::COOKIE, format!("sessionKey={session_key}"))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout(self.timeout)
                } else {
                    UpstreamError::Transport(format!("send: {e}"))
                }
            })?;
        if !resp.status().is_success() {
            return Err(UpstreamError::Status(resp.status().as_u16()));
        }
        let orgs: Vec<Organization> = resp
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(format!("organizations: {e}")))?;
        orgs.into_iter()
            .map(|org| org.uuid)
            .find(|uuid| !uuid.is_empty())
            .ok_or(UpstreamError::NoOrganization)
    }
}
