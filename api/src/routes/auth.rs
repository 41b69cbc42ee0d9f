use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::session::{
    SESSION_COOKIE, User, cookie_value, create_session, end_session, expired_session_cookie,
    session_cookie, sweep_expired_sessions,
};
use crate::state::{AppState, Backend};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn login<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    if request.username.is_empty() {
        return Err(ApiError::Validation("username must not be empty".to_string()));
    }
    if request.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".to_string()));
    }

    let auth = &state.config.auth;
    if request.username != auth.username || request.password != auth.password {
        return Err(ApiError::Unauthorized("Invalid username or password"));
    }

    let user = User {
        username: auth.username.clone(),
        email: auth.email.clone(),
        role: "admin".to_string(),
    };
    match sweep_expired_sessions(&state.store).await {
        Ok(0) => {}
        Ok(removed) => debug!(removed, "removed expired sessions"),
        Err(e) => warn!("failed to sweep expired sessions: {e}"),
    }

    let token = create_session(&state.store, user.clone()).await?;
    info!(username = %user.username, "user logged in");

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie(&token, state.config.secure_cookies))]),
        Json(json!({ "success": true, "user": user })),
    ))
}

pub async fn logout<S: Backend, M: Mailer>(
    State(state): State<AppState<S, M>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE).filter(|t| !t.is_empty()) {
        end_session(&state.store, token).await?;
    }

    Ok((
        AppendHeaders([(SET_COOKIE, expired_session_cookie(state.config.secure_cookies))]),
        Json(json!({ "success": true })),
    ))
}
