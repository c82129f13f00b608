//! # CLI Module
//!
//! User-facing commands. Each command builds the runtime pieces from the
//! loaded [`Config`] and delegates to the sync engine, the scheduler or the
//! token manager.
//!
//! ## Commands
//!
//! - [`run`] - Scheduler loop: one cycle at startup, then one per interval
//! - [`sync_once`] - Exactly one cycle, then exit
//! - [`diff`] - Show what the next cycle would copy, without writing
//! - [`auth`] - Interactive authorization with the local callback listener
//! - [`logout`] - Forget stored and cached credentials
//!
//! ## Usage Patterns
//!
//! ```bash
//! lofisync auth      # Authorize once, stores the refresh token
//! lofisync diff      # Preview pending tracks
//! lofisync           # Keep the playlist in sync
//! ```

mod auth;
mod diff;
mod run;

use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;

use crate::{
    config::{Config, StoreBackend},
    management::{CredentialStore, FileCredentialStore, KeyringCredentialStore, TokenManager},
    spotify::{
        auth::{OAuthClient, SystemBrowser},
        client::{ApiClient, RetryPolicy},
    },
    sync::SyncEngine,
};

pub use auth::auth;
pub use auth::logout;
pub use diff::diff;
pub use run::run;
pub use run::sync_once;

/// Runtime pieces shared by every command.
pub struct App {
    pub tokens: TokenManager,
    pub engine: SyncEngine,
}

impl App {
    pub fn from_config(config: &Config) -> Self {
        let store: Arc<dyn CredentialStore> = match config.store {
            StoreBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
            StoreBackend::File => Arc::new(FileCredentialStore::new()),
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: &Config, store: Arc<dyn CredentialStore>) -> Self {
        let http = Client::new();
        let oauth = OAuthClient::new(http.clone(), config.oauth.clone());
        let tokens = TokenManager::new(oauth, store, Arc::new(SystemBrowser));
        let api = ApiClient::new(
            http,
            config.api_url.clone(),
            tokens.clone(),
            RetryPolicy::from(&config.retry),
        );

        Self {
            engine: SyncEngine::new(api, config),
            tokens,
        }
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}
