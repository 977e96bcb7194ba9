use std::collections::HashMap;

use axum::{
    Extension,
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::{server::SharedCallbackState, success, types::AuthorizationEvent, warning};

/// Reads the fragment client-side and re-requests it as `/token?<fragment>`.
pub const BRIDGE_PAGE: &str =
    r#"<script>location.replace("token?" + location.hash.slice(1));</script>"#;

pub const CLOSE_PAGE: &str = "<script>close()</script>Thanks! You may now close this window.";

const FAILED_PAGE: &str = "<h4>Authorization failed.</h4><p>Check the terminal for details.</p>";

pub async fn redirect(Extension(shared_state): Extension<SharedCallbackState>) -> Html<&'static str> {
    shared_state.lock().await.bridge_served();
    Html(BRIDGE_PAGE)
}

pub async fn token(
    Query(params): Query<HashMap<String, String>>,
    Extension(shared_state): Extension<SharedCallbackState>,
) -> Response {
    capture(params, shared_state, "access_token", AuthorizationEvent::AccessToken).await
}

pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(shared_state): Extension<SharedCallbackState>,
) -> Response {
    capture(params, shared_state, "code", AuthorizationEvent::Code).await
}

async fn capture(
    params: HashMap<String, String>,
    shared_state: SharedCallbackState,
    field: &str,
    event: fn(String) -> AuthorizationEvent,
) -> Response {
    let outcome = match params.get(field).filter(|v| !v.is_empty()) {
        Some(value) => Ok(event(value.clone())),
        None => match params.get("error") {
            Some(error) => Err(error.clone()),
            None => return StatusCode::NOT_FOUND.into_response(),
        },
    };

    let mut state = shared_state.lock().await;
    if !state.state_matches(params.get("state").map(String::as_str)) {
        warning!("Ignoring authorization redirect with an unexpected state");
        return (StatusCode::BAD_REQUEST, Html("<h4>State mismatch.</h4>")).into_response();
    }

    let failed = outcome.is_err();
    if !state.deliver(outcome) {
        return StatusCode::NOT_FOUND.into_response();
    }

    if failed {
        Html(FAILED_PAGE).into_response()
    } else {
        success!("Received {} from Spotify", field.replace('_', " "));
        Html(CLOSE_PAGE).into_response()
    }
}
