use kvmail_api::{AppState, Backend, Config, ResendMailer, serve};
use kvmail_store::{MemoryStore, PgStore};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn run<S: Backend>(store: S, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mailer = ResendMailer::new(config.resend_api_key.clone(), config.resend_api_url.clone());
    if config.resend_api_key.is_none() {
        warn!("RESEND_API_KEY is not set, sending mail will fail");
    }

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!(backend = store.backend(), "press Ctrl+C to stop the server");

    serve(listener, AppState::new(store, mailer, config), async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
        }
    })
    .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvmail_api=info,kvmail_store=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    match config.database_url.clone() {
        Some(url) => run(PgStore::connect(&url).await?, config).await,
        None => {
            warn!("DATABASE_URL is not set, using the in-memory store");
            run(MemoryStore::new(), config).await
        }
    }
}
