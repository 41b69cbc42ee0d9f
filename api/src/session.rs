//! Login sessions, persisted in the record store under `session:<token>`.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use kvmail_store::RecordStore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::state::{AppState, Backend};

pub const SESSION_COOKIE: &str = "email-system-session";
pub const SESSION_PREFIX: &str = "session:";

const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    user: User,
    expires_at: DateTime<Utc>,
}

fn session_key(token: &str) -> String {
    format!("{SESSION_PREFIX}{token}")
}

/// Persist a new session for `user` and return its token.
pub async fn create_session<S: RecordStore>(
    store: &S,
    user: User,
) -> kvmail_store::Result<String> {
    let token = Uuid::new_v4().to_string();
    let record = SessionRecord {
        user,
        expires_at: Utc::now() + Duration::hours(SESSION_TTL_HOURS),
    };
    store
        .put(&session_key(&token), &serde_json::to_string(&record)?)
        .await?;
    Ok(token)
}

/// The user behind `token`, if the session exists and has not expired.
/// Expired and unreadable sessions are removed.
pub async fn load_session<S: RecordStore>(
    store: &S,
    token: &str,
) -> kvmail_store::Result<Option<User>> {
    let key = session_key(token);
    let Some(value) = store.get(&key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<SessionRecord>(&value) {
        Ok(record) if record.expires_at > Utc::now() => Ok(Some(record.user)),
        Ok(_) => {
            debug!("session expired");
            store.delete(&key).await?;
            Ok(None)
        }
        Err(e) => {
            debug!("dropping unreadable session: {e}");
            store.delete(&key).await?;
            Ok(None)
        }
    }
}

/// Remove every expired or unreadable session. Returns how many were removed.
pub async fn sweep_expired_sessions<S: RecordStore>(store: &S) -> kvmail_store::Result<usize> {
    let now = Utc::now();
    let mut removed = 0;

    for key in store.list(SESSION_PREFIX).await? {
        let Some(value) = store.get(&key).await? else {
            continue;
        };
        let expired = match serde_json::from_str::<SessionRecord>(&value) {
            Ok(record) => record.expires_at <= now,
            Err(_) => true,
        };
        if expired {
            store.delete(&key).await?;
            removed += 1;
        }
    }

    Ok(removed)
}

pub async fn end_session<S: RecordStore>(store: &S, token: &str) -> kvmail_store::Result<()> {
    store.delete(&session_key(token)).await
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        SESSION_TTL_HOURS * 60 * 60
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// The value of cookie `name` across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// The logged-in user. Rejects the request with 401 when there is no valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Backend, M: Mailer> FromRequestParts<AppState<S, M>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, M>,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, SESSION_COOKIE)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized("Unauthorized"))?
            .to_string();

        match load_session(&state.store, &token).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(ApiError::Unauthorized("Unauthorized")),
        }
    }
}
