//! The kvmail HTTP API: login sessions, email listing and sending,
//! attachments, preferences, and storage diagnostics.

pub mod config;
pub mod error;
pub mod mailer;
pub mod preferences;
pub mod routes;
pub mod session;
pub mod state;

pub use config::{Config, ConfigError, Credentials};
pub use error::ApiError;
pub use mailer::{Mailer, MailerError, OutgoingEmail, ResendMailer, SendReceipt};
pub use preferences::{Language, Preferences, Theme};
pub use session::{CurrentUser, User};
pub use state::{AppState, Backend};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use kvmail_store::MAX_ATTACHMENT_SIZE;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Room for multipart boundaries and headers around a maximum size attachment.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn router<S: Backend, M: Mailer>(state: AppState<S, M>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin, _request_head| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str.starts_with("http://localhost:")
        }))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/readyz", get(|| async { "OK" }))
        .route("/livez", get(|| async { "OK" }))
        .route("/api/login", post(routes::auth::login::<S, M>))
        .route("/api/logout", post(routes::auth::logout::<S, M>))
        .route("/api/send", post(routes::emails::send::<S, M>))
        .route("/api/emails", get(routes::emails::list::<S, M>))
        .route("/api/emails/{id}", get(routes::emails::get::<S, M>))
        .route("/api/attachments", get(routes::attachments::list::<S, M>))
        .route(
            "/api/attachments/upload",
            post(routes::attachments::upload::<S, M>),
        )
        .route(
            "/api/attachments/{id}",
            get(routes::attachments::download::<S, M>)
                .delete(routes::attachments::delete::<S, M>),
        )
        .route(
            "/api/settings",
            get(routes::settings::get).post(routes::settings::save),
        )
        .route("/api/diagnostic/env", get(routes::diagnostic::env::<S, M>))
        .route(
            "/api/diagnostic/upload-test",
            post(routes::diagnostic::upload_test::<S, M>),
        )
        .layer(DefaultBodyLimit::max(
            MAX_ATTACHMENT_SIZE as usize + MULTIPART_OVERHEAD,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<S: Backend, M: Mailer>(
    listener: TcpListener,
    state: AppState<S, M>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server shutdown complete");
    Ok(())
}
