use tokio::{sync::mpsc, time::timeout};

use crate::{
    cli::{App, spinner},
    config::Config,
    error::AuthError,
    error,
    server::{self, CallbackState},
    spotify::auth::{BrowserOpener, SystemBrowser},
    success, warning,
};

/// Runs the authorization-code flow interactively and stores the refresh token.
pub async fn auth(config: Config) {
    let app = App::from_config(&config);
    let (outcomes, mut received) = mpsc::unbounded_channel();

    let listener = match server::start_api_server(
        config.server_addr,
        CallbackState {
            tokens: app.tokens.clone(),
            outcomes,
        },
    )
    .await
    {
        Ok(listener) => listener,
        Err(e) => error!(
            "Failed to start callback listener on {}: {}",
            config.server_addr, e
        ),
    };

    let url = match app.tokens.authorization_url().await {
        Ok(url) => url,
        Err(e) => error!("{}", e),
    };

    if SystemBrowser.open(&url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            url
        );
    }

    let pb = spinner("Waiting for authorization in the browser...");
    let outcome = timeout(config.auth_timeout, async {
        loop {
            match received.recv().await {
                Some(Ok(_)) => break Ok(()),
                Some(Err(AuthError::AuthorizationDenied(reason))) => {
                    break Err(AuthError::AuthorizationDenied(reason));
                }
                Some(Err(e)) => warning!("Authorization attempt failed: {}", e),
                None => break Err(AuthError::AuthorizationTimeout),
            }
        }
    })
    .await;
    pb.finish_and_clear();
    listener.close().await;

    match outcome {
        Ok(Ok(())) => success!("Authentication successful!"),
        Ok(Err(e)) => error!("Authentication failed: {}", e),
        Err(_) => error!("Authentication timed out."),
    }
}

pub async fn logout(config: Config) {
    let app = App::from_config(&config);
    match app.tokens.logout().await {
        Ok(()) => success!("Stored credentials removed"),
        Err(e) => error!("Failed to remove stored credentials: {}", e),
    }
}
