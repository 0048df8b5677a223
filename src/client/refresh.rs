// src/client/refresh.rs
use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;

use super::{send, ScopedClient, REFRESH_ENDPOINT};
use crate::app_log;
use crate::error::HttpError;
use crate::navigation::is_login_path;
use crate::role::Role;
use crate::storage::{self, GENERIC_REFRESH_KEY, USER_ROLE_KEY};
use crate::transport::{bearer, ApiRequest, AUTHORIZATION};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("no refresh token stored under {0}")]
    MissingRefreshToken(String),

    #[error("refresh request failed: {0}")]
    Request(#[from] HttpError),
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

impl ScopedClient {
    /// Exchange the stored refresh token for a new access token.
    ///
    /// The new token is persisted for `role` (when known) and becomes the
    /// client's default `Authorization` header.
    pub(super) async fn refresh_access_token(
        &self,
        role: Option<Role>,
    ) -> Result<String, RefreshError> {
        let refresh_key = match role {
            Some(role) => storage::refresh_token_key(role),
            None => GENERIC_REFRESH_KEY.to_string(),
        };

        let refresh_token = self
            .store
            .get(&refresh_key)
            .ok_or(RefreshError::MissingRefreshToken(refresh_key))?;

        let request = ApiRequest::new(Method::POST, REFRESH_ENDPOINT)
            .with_body(Some(serde_json::json!({ "refresh": refresh_token })));

        let response = send(&self.config, self.transport.as_ref(), &request).await?;
        let RefreshResponse { access } = response.json()?;

        if let Some(role) = role {
            if let Err(e) = self.store.set(&storage::access_token_key(role), &access) {
                app_log!(warn, "Failed to persist refreshed {} token: {:#}", role, e);
            }
        }
        self.set_default_header(AUTHORIZATION, bearer(&access));

        app_log!(
            info,
            "Refreshed access token for {}",
            role.map(|r| r.as_str()).unwrap_or("unknown role")
        );

        Ok(access)
    }

    /// Clear the role's credentials and send the caller to the login route.
    ///
    /// Both steps are skipped while already on a login route, so stale
    /// tokens survive a refresh failure that happens there.
    pub(super) fn handle_refresh_failure(&self, role: Option<Role>) {
        let current = self.navigator.current_path();
        if is_login_path(&current) {
            app_log!(warn, "Already on {}, leaving stored credentials in place", current);
            return;
        }

        let mut keys = vec![USER_ROLE_KEY.to_string()];
        if let Some(role) = role {
            keys.push(storage::access_token_key(role));
            keys.push(storage::refresh_token_key(role));
        }

        for key in &keys {
            if let Err(e) = self.store.remove(key) {
                app_log!(warn, "Failed to remove {}: {:#}", key, e);
            }
        }

        app_log!(warn, "Cleared credentials after failed refresh: {:?}", keys);
        self.navigator.redirect(&self.config.login_route);
    }
}
