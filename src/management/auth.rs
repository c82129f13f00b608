use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

use crate::{
    error::AuthError,
    info,
    management::store::{CredentialStore, REFRESH_TOKEN_KEY},
    spotify::auth::{BrowserOpener, OAuthClient},
    success,
    types::{Credential, TokenResponse},
    utils, warning,
};

/// Seconds taken off `expires_in` so a token is retired before the provider does.
const EXPIRY_SKEW_SECS: i64 = 240;
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

type PendingRefresh = Shared<BoxFuture<'static, Result<Credential, AuthError>>>;

/// Owns the access credential and every exchange with the token endpoint.
///
/// Cloning is cheap and every clone shares the same cache, store and
/// in-flight refresh. At most one refresh exchange runs at a time: callers
/// that need a token while one is in flight await that same exchange and
/// receive its credential or its failure.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    oauth: OAuthClient,
    store: Arc<dyn CredentialStore>,
    browser: Arc<dyn BrowserOpener>,
    access: Mutex<Option<Credential>>,
    pending: Mutex<Option<PendingRefresh>>,
    auth_state: Mutex<Option<String>>,
}

impl TokenManager {
    pub fn new(
        oauth: OAuthClient,
        store: Arc<dyn CredentialStore>,
        browser: Arc<dyn BrowserOpener>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                oauth,
                store,
                browser,
                access: Mutex::new(None),
                pending: Mutex::new(None),
                auth_state: Mutex::new(Some(utils::generate_state())),
            }),
        }
    }

    /// Returns the cached access credential while it is still valid,
    /// otherwise joins (or starts) a refresh and returns its result.
    pub async fn get_access_credential(&self) -> Result<Credential, AuthError> {
        self.join_or_start_refresh(true).await
    }

    /// Forces a refresh-token exchange, sharing one already in flight.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoRefreshCredential`] when nothing is stored. The
    ///   authorization URL is opened in the browser as a side effect.
    /// - [`AuthError::ProviderRejected`] when the token endpoint refuses the
    ///   refresh token. The stored refresh token is deleted.
    pub async fn refresh(&self) -> Result<Credential, AuthError> {
        self.join_or_start_refresh(false).await
    }

    /// Completes the authorization-code flow with the values from the redirect.
    ///
    /// The pending state is consumed only by a matching callback. On success
    /// the new refresh token replaces any stored one and the access token is
    /// cached.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        state: &str,
    ) -> Result<Credential, AuthError> {
        {
            let mut pending_state = self.inner.auth_state.lock().await;
            if pending_state.as_deref() == Some(state) {
                pending_state.take();
            } else {
                drop(pending_state);
                warning!("Authorization state does not match, discarding credentials");
                self.inner.clear().await;
                return Err(AuthError::StateMismatch);
            }
        }

        let response = match self.inner.oauth.exchange_code(code).await {
            Ok(response) => response,
            Err(err @ AuthError::ProviderRejected { .. }) => {
                self.inner.clear().await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let Some(refresh_token) = response.refresh_token.as_deref() else {
            return Err(AuthError::InvalidResponse(
                "code grant returned no refresh_token".to_string(),
            ));
        };
        self.inner
            .store
            .set(REFRESH_TOKEN_KEY, refresh_token)
            .await?;

        success!("Authorization complete, refresh token stored");
        Ok(self.inner.cache_access(&response).await)
    }

    /// Forgets both the stored refresh token and the cached access token.
    pub async fn logout(&self) -> Result<(), AuthError> {
        *self.inner.access.lock().await = None;
        self.inner.store.delete(REFRESH_TOKEN_KEY).await?;
        Ok(())
    }

    /// Marks `rejected` as known-invalid if it is still the cached credential.
    pub async fn invalidate(&self, rejected: &Credential) {
        let mut access = self.inner.access.lock().await;
        if access.as_ref().is_some_and(|c| c.value == rejected.value) {
            *access = None;
        }
    }

    pub async fn cached_access(&self) -> Option<Credential> {
        self.inner.access.lock().await.clone()
    }

    /// URL carrying the pending authorization state; a new state is minted
    /// if the previous one was already used.
    pub async fn authorization_url(&self) -> Result<String, AuthError> {
        self.inner.authorization_url().await
    }

    async fn join_or_start_refresh(&self, reuse_cached: bool) -> Result<Credential, AuthError> {
        let refresh = {
            let mut pending = self.inner.pending.lock().await;

            if reuse_cached {
                if let Some(credential) = self.inner.valid_access().await {
                    return Ok(credential);
                }
            }

            let in_flight = pending
                .as_ref()
                .filter(|p| p.peek().is_none())
                .cloned();
            match in_flight {
                Some(in_flight) => in_flight,
                None => {
                    let inner = Arc::clone(&self.inner);
                    let started = async move { inner.refresh_grant().await }
                        .boxed()
                        .shared();
                    *pending = Some(started.clone());
                    started
                }
            }
        };

        let result = refresh.clone().await;

        let mut pending = self.inner.pending.lock().await;
        if pending.as_ref().is_some_and(|p| p.ptr_eq(&refresh)) {
            *pending = None;
        }

        result
    }
}

impl Inner {
    async fn valid_access(&self) -> Option<Credential> {
        self.access
            .lock()
            .await
            .as_ref()
            .filter(|c| !c.is_expired())
            .cloned()
    }

    async fn refresh_grant(&self) -> Result<Credential, AuthError> {
        let Some(refresh_token) = self.store.get(REFRESH_TOKEN_KEY).await? else {
            self.request_authorization().await;
            return Err(AuthError::NoRefreshCredential);
        };

        info!("Refreshing access token...");
        match self.oauth.refresh(&refresh_token).await {
            Ok(response) => {
                if let Some(rotated) = response
                    .refresh_token
                    .as_deref()
                    .filter(|t| *t != refresh_token)
                {
                    self.store.set(REFRESH_TOKEN_KEY, rotated).await?;
                }
                Ok(self.cache_access(&response).await)
            }
            Err(err @ AuthError::ProviderRejected { .. }) => {
                warning!("Refresh token rejected, a new authorization is required");
                self.clear().await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn cache_access(&self, response: &TokenResponse) -> Credential {
        let lifetime = response
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .saturating_sub(EXPIRY_SKEW_SECS)
            .max(0);
        let credential = Credential::access(
            response.access_token.clone(),
            Some(Utc::now() + Duration::seconds(lifetime)),
        );

        *self.access.lock().await = Some(credential.clone());
        credential
    }

    async fn clear(&self) {
        *self.access.lock().await = None;
        if let Err(e) = self.store.delete(REFRESH_TOKEN_KEY).await {
            warning!("Failed to remove stored refresh token: {}", e);
        }
    }

    async fn authorization_url(&self) -> Result<String, AuthError> {
        let mut pending_state = self.auth_state.lock().await;
        let state = pending_state.get_or_insert_with(utils::generate_state);
        self.oauth.authorization_url(state)
    }

    async fn request_authorization(&self) {
        let url = match self.authorization_url().await {
            Ok(url) => url,
            Err(e) => {
                warning!("Cannot build authorization URL: {}", e);
                return;
            }
        };

        info!("No refresh token stored, opening browser for authorization");
        if let Err(e) = self.browser.open(&url) {
            warning!(
                "Failed to open browser ({}). Please navigate to the following URL manually:\n{}",
                e,
                url
            );
        }
    }
}
