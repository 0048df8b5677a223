// src/session.rs
//! Login and logout: creating and destroying role-scoped credentials.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::app_log;
use crate::client::{ApiClients, TOKEN_ENDPOINT};
use crate::role::Role;
use crate::storage::{self, TokenStore, USER_ROLE_KEY};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
}

pub struct Session {
    clients: ApiClients,
}

impl Session {
    pub fn new(clients: ApiClients) -> Self {
        Self { clients }
    }

    pub fn clients(&self) -> &ApiClients {
        &self.clients
    }

    /// Authenticate against the token endpoint and persist the credential
    /// pair for `role`. Storage is untouched when the call fails.
    pub async fn login(&self, role: Role, username: &str, password: &str) -> Result<LoginResponse> {
        let payload = serde_json::to_value(LoginRequest { username, password })
            .context("Failed to serialize login request")?;

        let response = self
            .clients
            .public
            .post(TOKEN_ENDPOINT, payload)
            .await
            .with_context(|| format!("Login failed for {} as {}", username, role))?;

        let tokens: LoginResponse = response
            .json()
            .context("Failed to parse login response")?;

        self.persist_credentials(role, &tokens)
            .with_context(|| format!("Failed to store credentials for {}", role))?;
        self.clients.auth.set_role_context(Some(role));

        app_log!(info, "Logged in {} as {}", username, role);
        Ok(tokens)
    }

    /// Write the pair and the active role; on a failed write, restore the
    /// keys already written to their previous values.
    fn persist_credentials(&self, role: Role, tokens: &LoginResponse) -> Result<()> {
        let store = self.clients.auth.store();
        let writes = [
            (storage::access_token_key(role), tokens.access.as_str()),
            (storage::refresh_token_key(role), tokens.refresh.as_str()),
            (USER_ROLE_KEY.to_string(), role.as_str()),
        ];

        let mut written: Vec<(&str, Option<String>)> = Vec::new();
        for (key, value) in &writes {
            let previous = store.get(key);
            if let Err(e) = store.set(key, value) {
                for (key, previous) in written.iter().rev() {
                    let restored = match previous {
                        Some(value) => store.set(key, value),
                        None => store.remove(key),
                    };
                    if let Err(restore_err) = restored {
                        app_log!(warn, "Failed to restore {}: {:#}", key, restore_err);
                    }
                }
                return Err(e);
            }
            written.push((key.as_str(), previous));
        }
        Ok(())
    }

    /// Remove the role's credentials. The stored active role and the role
    /// context are cleared only when they name this role.
    pub fn logout(&self, role: Role) -> Result<()> {
        let store = self.clients.auth.store();
        store.remove(&storage::access_token_key(role))?;
        store.remove(&storage::refresh_token_key(role))?;

        if storage::stored_role(store.as_ref()) == Some(role) {
            store.remove(USER_ROLE_KEY)?;
        }
        if self.clients.auth.role_context().get() == Some(role) {
            self.clients.auth.set_role_context(None);
        }

        app_log!(info, "Logged out {}", role);
        Ok(())
    }

    pub fn is_authenticated(&self, role: Role) -> bool {
        self.clients
            .auth
            .store()
            .get(&storage::access_token_key(role))
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::HttpError;
    use crate::navigation::Location;
    use crate::storage::{MemoryStore, TokenStore};
    use crate::transport::{ApiRequest, ApiResponse, Transport, AUTHORIZATION};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    struct FixedTransport {
        status: u16,
        body: String,
        sent: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, _url: &str, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(ApiResponse {
                status: self.status,
                headers: BTreeMap::new(),
                body: self.body.clone(),
            })
        }
    }

    fn session(status: u16, body: serde_json::Value) -> (Session, MemoryStore, Arc<FixedTransport>) {
        let transport = Arc::new(FixedTransport {
            status,
            body: body.to_string(),
            sent: Mutex::new(Vec::new()),
        });
        let store = MemoryStore::new();
        let config = ClientConfig {
            environment: "test".to_string(),
            base_url: "http://api.test".to_string(),
            storage_path: "tokens.json".into(),
            login_route: "/login".to_string(),
            timeout_seconds: 5,
        };
        let clients = ApiClients::new(
            config,
            transport.clone(),
            Arc::new(store.clone()),
            Arc::new(Location::default()),
        );
        (Session::new(clients), store, transport)
    }

    #[tokio::test]
    async fn test_login_persists_credentials() {
        let (session, store, transport) = session(200, json!({"access": "A1", "refresh": "R1"}));
        store.set("recruiter_access_token", "stale").unwrap();

        session.login(Role::Jobseeker, "ada", "secret").await.unwrap();

        assert_eq!(store.get("jobseeker_access_token").as_deref(), Some("A1"));
        assert_eq!(store.get("jobseeker_refresh_token").as_deref(), Some("R1"));
        assert_eq!(store.get(USER_ROLE_KEY).as_deref(), Some("jobseeker"));
        assert_eq!(store.get("recruiter_access_token").as_deref(), Some("stale"));
        assert_eq!(session.clients().auth.role_context().get(), Some(Role::Jobseeker));
        assert!(session.is_authenticated(Role::Jobseeker));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].path, TOKEN_ENDPOINT);
        assert_eq!(sent[0].body, Some(json!({"username": "ada", "password": "secret"})));
        assert_eq!(sent[0].header(AUTHORIZATION), None);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_storage_untouched() {
        let (session, store, _) = session(401, json!({"detail": "No active account"}));

        let err = session.login(Role::Recruiter, "bob", "wrong").await.unwrap_err();

        let http = err.downcast_ref::<HttpError>().unwrap();
        assert!(http.is_unauthorized());
        assert_eq!(store.get("recruiter_access_token"), None);
        assert_eq!(store.get(USER_ROLE_KEY), None);
        assert!(!session.is_authenticated(Role::Recruiter));
    }

    /// Memory store whose writes to one key always fail.
    struct BrokenKeyStore {
        inner: MemoryStore,
        broken_key: &'static str,
    }

    impl TokenStore for BrokenKeyStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            if key == self.broken_key {
                anyhow::bail!("disk full");
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn test_login_with_failing_store_restores_previous_pair() {
        let transport = Arc::new(FixedTransport {
            status: 200,
            body: json!({"access": "A2", "refresh": "R2"}).to_string(),
            sent: Mutex::new(Vec::new()),
        });
        let inner = MemoryStore::new();
        inner.set("recruiter_access_token", "A1").unwrap();
        let store = BrokenKeyStore {
            inner: inner.clone(),
            broken_key: "recruiter_refresh_token",
        };
        let config = ClientConfig {
            environment: "test".to_string(),
            base_url: "http://api.test".to_string(),
            storage_path: "tokens.json".into(),
            login_route: "/login".to_string(),
            timeout_seconds: 5,
        };
        let session = Session::new(ApiClients::new(
            config,
            transport,
            Arc::new(store),
            Arc::new(Location::default()),
        ));

        assert!(session.login(Role::Recruiter, "bob", "pw").await.is_err());

        assert_eq!(inner.get("recruiter_access_token").as_deref(), Some("A1"));
        assert_eq!(inner.get("recruiter_refresh_token"), None);
        assert_eq!(inner.get(USER_ROLE_KEY), None);
        assert_eq!(session.clients().auth.role_context().get(), None);
    }

    #[test]
    fn test_logout_only_clears_matching_role() {
        let (session, store, _) = session(200, json!({}));
        store.set("jobseeker_access_token", "J1").unwrap();
        store.set("jobseeker_refresh_token", "JR").unwrap();
        store.set("recruiter_access_token", "R1").unwrap();
        store.set(USER_ROLE_KEY, "recruiter").unwrap();
        session.clients().auth.set_role_context(Some(Role::Recruiter));

        session.logout(Role::Jobseeker).unwrap();
        assert_eq!(store.get("jobseeker_access_token"), None);
        assert_eq!(store.get("jobseeker_refresh_token"), None);
        assert_eq!(store.get(USER_ROLE_KEY).as_deref(), Some("recruiter"));
        assert_eq!(session.clients().auth.role_context().get(), Some(Role::Recruiter));

        session.logout(Role::Recruiter).unwrap();
        assert_eq!(store.get("recruiter_access_token"), None);
        assert_eq!(store.get(USER_ROLE_KEY), None);
        assert_eq!(session.clients().auth.role_context().get(), None);
    }
}
