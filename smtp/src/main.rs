use kvmail_smtp::{RepositoryPersistor, SmtpConfig, serve};
use kvmail_store::{EmailRepository, PgStore};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvmail_smtp=info,kvmail_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let config = SmtpConfig::from_env()?;

    let store = PgStore::connect(&db_url).await?;
    let persistor = RepositoryPersistor::new(EmailRepository::new(store));

    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("press Ctrl+C to stop the server");

    serve(listener, persistor, config.hostname, async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
        }
    })
    .await;

    Ok(())
}
