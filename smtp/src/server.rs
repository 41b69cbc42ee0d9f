use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::handler::SmtpHandler;
use crate::persistor::SmtpPersistor;

/// How long open sessions get to finish once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept SMTP sessions on `listener` until `shutdown` resolves, then wait
/// for open sessions to finish.
pub async fn serve<P: SmtpPersistor>(
    listener: TcpListener,
    persistor: P,
    hostname: String,
    shutdown: impl Future<Output = ()>,
) {
    let active_connections: Sessions = Arc::new(RwLock::new(HashMap::new()));

    if let Ok(addr) = listener.local_addr() {
        info!("SMTP listening on {addr}");
    }

    let accept_task = tokio::spawn(accept_loop(
        listener,
        persistor,
        hostname,
        active_connections.clone(),
    ));

    shutdown.await;
    info!("shutting down SMTP server");
    accept_task.abort();

    // Take the handles out first: finishing sessions remove themselves from the map.
    let handles: Vec<_> = active_connections.write().await.drain().collect();
    for (addr, mut handle) in handles {
        match tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await {
            Ok(Err(e)) => warn!("error joining session {addr}: {e:?}"),
            Ok(Ok(())) => {}
            Err(_) => {
                warn!("session {addr} did not finish in time");
                handle.abort();
            }
        }
    }

    info!("SMTP server shutdown complete");
}

/// Live sessions by peer address.
type Sessions = Arc<RwLock<HashMap<SocketAddr, JoinHandle<()>>>>;

async fn accept_loop<P: SmtpPersistor>(
    listener: TcpListener,
    persistor: P,
    hostname: String,
    active_connections: Sessions,
) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                debug!("accepted connection from {addr}");
                let (read_stream, write_stream) = socket.into_split();
                let handler = SmtpHandler::new(write_stream, persistor.clone(), hostname.clone());

                // Hold the lock across spawn so the session cannot remove
                // itself before its handle is inserted.
                let mut active = active_connections.write().await;
                let connections = active_connections.clone();
                let handle = tokio::spawn(async move {
                    handler.handle(read_stream).await;
                    debug!("connection from {addr} closed");
                    connections.write().await.remove(&addr);
                });
                active.insert(addr, handle);
            }
            Err(e) => {
                warn!("failed to accept connection: {e}");
            }
        }
    }
}
