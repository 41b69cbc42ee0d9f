pub mod attachments;
pub mod auth;
pub mod diagnostic;
pub mod emails;
pub mod settings;

use axum::http::HeaderMap;
use axum::http::header::HOST;

use crate::config::Config;

/// Origin used for absolute links: `PUBLIC_URL` when set, otherwise the request `Host`.
pub(crate) fn public_origin(config: &Config, headers: &HeaderMap) -> String {
    if let Some(url) = &config.public_url {
        return url.clone();
    }
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}
