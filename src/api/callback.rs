use axum::{
    Extension,
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::{
    error::AuthError, server::CallbackState, types::CallbackParams, warning,
};

const SUCCESS_PAGE: &str =
    "<h2>Authentication successful.</h2><p>You can close this browser window.</p>";
const DECLINED_PAGE: &str = "<h4>Authorization was declined.</h4>";
const FAILED_PAGE: &str = "<h4>Login failed.</h4>";

pub async fn callback(
    Query(params): Query<CallbackParams>,
    Extension(state): Extension<CallbackState>,
) -> Response {
    if let Some(error) = params.error {
        warning!("Authorization failed: {}", error);
        let _ = state
            .outcomes
            .send(Err(AuthError::AuthorizationDenied(error)));
        return Html(DECLINED_PAGE).into_response();
    }

    let Some(code) = params.code else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let returned_state = params.state.unwrap_or_default();

    match state
        .tokens
        .exchange_authorization_code(&code, &returned_state)
        .await
    {
        Ok(credential) => {
            let _ = state.outcomes.send(Ok(credential));
            Html(SUCCESS_PAGE).into_response()
        }
        Err(e) => {
            warning!("Token exchange failed: {}", e);
            let _ = state.outcomes.send(Err(e));
            (StatusCode::BAD_REQUEST, Html(FAILED_PAGE)).into_response()
        }
    }
}
