use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::AdminCredentials;
use crate::domain::DomainProfile;
use crate::error::Error;
use crate::host::Clock;
use crate::store::KeyValueStore;
use crate::transport::{ApiRequest, HttpTransport, Method};
use crate::types::AdminToken;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Caches the admin bearer token in the operator store.
///
/// The cached record survives page reloads and is reused while unexpired.
/// Refreshes are single-flight: concurrent callers that find the cache
/// stale wait on one login instead of issuing their own.
pub struct AdminCredentialCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    cache_key: String,
    login_path: String,
    credentials: AdminCredentials,
    ttl: Duration,
    refresh: Mutex<()>,
}

impl AdminCredentialCache {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        cache_key: impl Into<String>,
        login_path: impl Into<String>,
        credentials: AdminCredentials,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            cache_key: cache_key.into(),
            login_path: login_path.into(),
            credentials,
            ttl,
            refresh: Mutex::new(()),
        }
    }

    /// Return a usable admin token, logging in only when the cached one is
    /// missing or expired.
    ///
    /// # Errors
    ///
    /// - [`Error::Auth`] if the login endpoint answers non-2xx.
    /// - [`Error::MissingToken`] if it answers 2xx without `accessToken`.
    /// - [`Error::Validation`] if the login URL cannot be built.
    /// - Transport and store errors are propagated.
    pub async fn get_token<T: HttpTransport>(
        &self,
        transport: &T,
        profile: &DomainProfile,
    ) -> Result<String, Error> {
        if let Some(token) = self.cached() {
            tracing::debug!("Admin token cache hit");
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        // another caller may have refreshed while we waited
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let token = self.login(transport, profile).await?;
        let record = AdminToken::issued_at(token.clone(), self.clock.now(), self.ttl);
        let encoded = serde_json::to_string(&record)
            .map_err(|e| Error::Store(format!("encode admin token: {e}")))?;
        self.store.set(&self.cache_key, encoded)?;
        Ok(token)
    }

    /// Drop the cached token.
    pub fn invalidate(&self) {
        self.store.remove(&self.cache_key);
    }

    fn cached(&self) -> Option<String> {
        let raw = self.store.get(&self.cache_key)?;
        let record: AdminToken = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable admin token cache");
                return None;
            }
        };
        record
            .is_valid_at(self.clock.now())
            .then_some(record.token)
    }

    async fn login<T: HttpTransport>(
        &self,
        transport: &T,
        profile: &DomainProfile,
    ) -> Result<String, Error> {
        let url = crate::gateway::endpoint(&profile.api_base, &self.login_path)?;
        let body = serde_json::to_value(&self.credentials)
            .map_err(|e| Error::Validation(format!("encode credentials: {e}")))?;

        let response = transport
            .send(ApiRequest::new(Method::Post, url, body))
            .await?;
        if !response.is_success() {
            return Err(Error::Auth {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: LoginResponse = serde_json::from_str(&response.body)
            .map_err(|e| Error::Decode(format!("login response: {e}")))?;
        let token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingToken("admin login"))?;

        tracing::info!(email = %self.credentials.email(), "Admin login successful");
        Ok(token)
    }
}
