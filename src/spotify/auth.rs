use reqwest::{Client, Url};

use crate::{config::OAuthConfig, error::AuthError, types::TokenResponse};

/// Opens a URL for the user to act on.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), String>;
}

/// Opens URLs in the user's default browser.
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), String> {
        webbrowser::open(url).map_err(|e| e.to_string())
    }
}

/// Wire calls against the provider's authorization and token endpoints.
///
/// Both grants authenticate the client with HTTP Basic auth built from the
/// registered client id and secret.
#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(http: Client, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    /// Builds the URL the user has to visit to grant access.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidEndpoint`] if the configured authorization
    /// endpoint is not a valid URL.
    pub fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("state", state),
            ("scope", self.config.scope.as_str()),
        ];
        if self.config.show_dialog {
            params.push(("show_dialog", "true"));
        }

        Url::parse_with_params(&self.config.auth_url, &params)
            .map(String::from)
            .map_err(|e| AuthError::InvalidEndpoint(format!("{}: {}", self.config.auth_url, e)))
    }

    /// Exchanges an authorization code delivered by the redirect.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
        ])
        .await
    }

    /// Trades a stored refresh token for a fresh access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let res = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AuthError::ProviderRejected {
                status: status.as_u16(),
                body,
            });
        }

        res.json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}
