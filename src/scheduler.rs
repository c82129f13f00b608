//! The long-running loop.
//!
//! A cycle starts at launch and again `interval` after each cycle finishes,
//! so cycles never overlap. The callback listener is only open while a cycle
//! is waiting for the user to authorize, and is closed before any playlist
//! traffic starts.

use std::{net::SocketAddr, time::Duration};

use tokio::{
    sync::mpsc,
    time::{Instant, sleep, timeout_at},
};

use crate::{
    config::{Config, RetryConfig},
    error::{AuthError, SyncError},
    failure, info,
    management::TokenManager,
    server::{self, AuthOutcome, CallbackState, ListenerHandle},
    success,
    sync::SyncEngine,
    types::{Credential, SyncResult},
    warning,
};

/// Obtains an access token, retrying failed refreshes with a fixed delay.
///
/// [`AuthError::NoRefreshCredential`] is returned at once: only the user can
/// fix it. Other failures are retried until `retry.max_attempts` refreshes
/// have been tried.
pub async fn acquire_token(
    tokens: &TokenManager,
    retry: &RetryConfig,
) -> Result<Credential, AuthError> {
    let mut attempt: u32 = 1;
    loop {
        match tokens.get_access_credential().await {
            Ok(credential) => return Ok(credential),
            Err(AuthError::NoRefreshCredential) => return Err(AuthError::NoRefreshCredential),
            Err(e) if attempt < retry.max_attempts => {
                warning!(
                    "Token refresh failed (attempt {}/{}): {}",
                    attempt,
                    retry.max_attempts,
                    e
                );
                sleep(retry.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub struct Scheduler {
    engine: SyncEngine,
    tokens: TokenManager,
    server_addr: SocketAddr,
    interval: Duration,
    retry: RetryConfig,
    auth_timeout: Duration,
    listener: Option<ListenerHandle>,
    outcomes_tx: mpsc::UnboundedSender<AuthOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<AuthOutcome>,
}

impl Scheduler {
    pub fn new(engine: SyncEngine, tokens: TokenManager, config: &Config) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            tokens,
            server_addr: config.server_addr,
            interval: config.interval,
            retry: config.retry.clone(),
            auth_timeout: config.auth_timeout,
            listener: None,
            outcomes_tx,
            outcomes_rx,
        }
    }

    /// Runs cycles forever. A failed cycle is logged and the next one is
    /// scheduled as usual.
    pub async fn run(mut self) {
        if let Err(e) = self.open_listener().await {
            warning!("{}", e);
        }

        loop {
            self.run_cycle().await;
            info!("Next check in {} seconds", self.interval.as_secs());
            sleep(self.interval).await;
        }
    }

    /// Runs one cycle, waiting for authorization first if needed.
    /// Returns `None` when the cycle was abandoned.
    pub async fn run_cycle(&mut self) -> Option<SyncResult> {
        match self.cycle().await {
            Ok(result) => Some(result),
            Err(e) => {
                failure!("Cycle abandoned: {}", e);
                None
            }
        }
    }

    async fn cycle(&mut self) -> Result<SyncResult, SyncError> {
        // Outcomes left over from an earlier authorization round.
        while self.outcomes_rx.try_recv().is_ok() {}

        let acquired = acquire_token(&self.tokens, &self.retry).await;
        match acquired {
            Ok(_) => {}
            Err(AuthError::NoRefreshCredential) => {
                let waited = self.await_authorization().await;
                if let Err(e) = waited {
                    self.close_listener().await;
                    return Err(e);
                }
            }
            Err(e) => {
                self.close_listener().await;
                return Err(e.into());
            }
        }

        self.close_listener().await;
        self.engine.run_cycle().await
    }

    async fn await_authorization(&mut self) -> Result<(), SyncError> {
        self.open_listener().await?;
        info!(
            "Waiting up to {} seconds for authorization in the browser...",
            self.auth_timeout.as_secs()
        );

        let deadline = Instant::now() + self.auth_timeout;
        loop {
            match timeout_at(deadline, self.outcomes_rx.recv()).await {
                Ok(Some(Ok(_))) => {
                    success!("Authorized");
                    return Ok(());
                }
                Ok(Some(Err(AuthError::AuthorizationDenied(reason)))) => {
                    return Err(AuthError::AuthorizationDenied(reason).into());
                }
                Ok(Some(Err(e))) => warning!("Authorization attempt failed: {}", e),
                Ok(None) => {
                    return Err(SyncError::Listener("callback channel closed".to_string()));
                }
                Err(_) => return Err(AuthError::AuthorizationTimeout.into()),
            }
        }
    }

    async fn open_listener(&mut self) -> Result<(), SyncError> {
        if self.listener.is_some() {
            return Ok(());
        }

        let state = CallbackState {
            tokens: self.tokens.clone(),
            outcomes: self.outcomes_tx.clone(),
        };
        let handle = server::start_api_server(self.server_addr, state)
            .await
            .map_err(|e| SyncError::Listener(format!("{}: {}", self.server_addr, e)))?;
        self.listener = Some(handle);
        Ok(())
    }

    async fn close_listener(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.close().await;
        }
    }
}
