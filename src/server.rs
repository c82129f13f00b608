use std::net::SocketAddr;

use axum::{Extension, Router, routing::get};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    api, error::AuthError, info, management::TokenManager, types::Credential, warning,
};

/// Outcome of one redirect, forwarded to whoever is waiting for authorization.
pub type AuthOutcome = Result<Credential, AuthError>;

#[derive(Clone)]
pub struct CallbackState {
    pub tokens: TokenManager,
    pub outcomes: mpsc::UnboundedSender<AuthOutcome>,
}

pub fn router(state: CallbackState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback).layer(Extension(state)))
}

/// A running callback listener. The port is released by [`close`](Self::close).
pub struct ListenerHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn close(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warning!("Callback listener task ended abnormally: {}", e);
        }
        info!("Web server closed.");
    }
}

/// Binds `addr` and serves the callback routes until closed.
pub async fn start_api_server(
    addr: SocketAddr,
    state: CallbackState,
) -> std::io::Result<ListenerHandle> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let addr = listener.local_addr()?;
    let (shutdown, signal) = oneshot::channel::<()>();

    let app = router(state);
    let task = tokio::spawn(async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = signal.await;
        });
        if let Err(e) = serve.await {
            warning!("Callback listener failed: {}", e);
        }
    });

    info!("Web server listening on {}.", addr);
    Ok(ListenerHandle {
        addr,
        shutdown,
        task,
    })
}
