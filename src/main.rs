use kvmail_api::{AppState, Backend, Config, ResendMailer};
use kvmail_smtp::{RepositoryPersistor, SmtpConfig};
use kvmail_store::{EmailRepository, MemoryStore, PgStore};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Resolves once the shutdown flag flips, or the sender is gone.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopping| *stopping).await;
}

/// Run the HTTP API and the SMTP receiver on one store until Ctrl+C.
async fn run<S: Backend>(
    store: S,
    config: Config,
    smtp_config: SmtpConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mailer = ResendMailer::new(config.resend_api_key.clone(), config.resend_api_url.clone());
    if config.resend_api_key.is_none() {
        warn!("RESEND_API_KEY is not set, sending mail will fail");
    }

    let http_listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let smtp_listener = TcpListener::bind(smtp_config.bind_addr()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let persistor = RepositoryPersistor::new(EmailRepository::new(store.clone()));
    let smtp_task = tokio::spawn(kvmail_smtp::serve(
        smtp_listener,
        persistor,
        smtp_config.hostname,
        wait_for_shutdown(shutdown_rx.clone()),
    ));

    let state = AppState::new(store, mailer, config);
    let http_task = tokio::spawn(kvmail_api::serve(
        http_listener,
        state,
        wait_for_shutdown(shutdown_rx),
    ));

    info!("press Ctrl+C to stop the server");
    if let Err(e) = signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {e}");
    }
    info!("shutting down");
    let _ = shutdown_tx.send(true);

    if let Err(e) = smtp_task.await {
        error!("SMTP server task failed: {e}");
    }
    match http_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server failed: {e}"),
        Err(e) => error!("HTTP server task failed: {e}"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kvmail=info,kvmail_api=info,kvmail_smtp=info,kvmail_store=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let smtp_config = SmtpConfig::from_env()?;

    match config.database_url.clone() {
        Some(url) => run(PgStore::connect(&url).await?, config, smtp_config).await,
        None => {
            warn!("DATABASE_URL is not set, using the in-memory store");
            run(MemoryStore::new(), config, smtp_config).await
        }
    }
}
