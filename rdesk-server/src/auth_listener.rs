//! Auth channel accept loop: bounds concurrent in-flight connections with a
//! semaphore and hands each accepted stream to
//! [`rdesk_core::auth_service::handle_connection`].

use std::sync::Arc;

use anyhow::Result;
use rdesk_core::auth_service::{self, auth_semaphore};
use rdesk_core::{ConnectionLog, Shutdown, UserStore};
use tokio::net::TcpListener;
use tokio::sync::{RwLock, Semaphore};
use tracing::{info, warn};

pub async fn run(
    listener: TcpListener,
    max_auth_connections: usize,
    store: Arc<RwLock<UserStore>>,
    connection_log: Arc<ConnectionLog>,
    shutdown: Shutdown,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "auth channel listening");
    let permits: Arc<Semaphore> = auth_semaphore(max_auth_connections);

    loop {
        let (stream, peer) = match shutdown.accept(&listener).await {
            None => return Ok(()),
            Some(Ok(pair)) => pair,
            Some(Err(err)) => {
                warn!(%err, "failed to accept auth connection");
                continue;
            }
        };

        let permit = match permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                // At capacity: the connection is accepted but immediately
                // dropped rather than queued indefinitely, so a client sees
                // a reset instead of hanging forever.
                warn!(%peer, "auth channel at capacity, refusing connection");
                continue;
            }
        };

        let store = store.clone();
        let connection_log = connection_log.clone();

        tokio::spawn(async move {
            auth_service::handle_connection(stream, peer, store, connection_log).await;
            drop(permit);
        });
    }
}
