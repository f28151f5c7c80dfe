//! Process-wide shutdown signal shared by every worker loop (screen, input,
//! auth listeners): a shared cancellation flag that unwinds long-running
//! session tasks on SIGTERM.
//!
//! `rdesk_common::framing::read_exact_cancellable` takes the same
//! `Arc<AtomicBool>` this type wraps, so a single `Shutdown` threads
//! straight through into the lowest-level read loop without an extra
//! broadcast channel for the common case of "stop reading, this socket is
//! going away."

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tracing::info;

/// How often an otherwise-idle accept loop wakes up to check the shutdown
/// flag, so a listener with no incoming traffic still notices shutdown
/// within a bounded time (spec §5 "Cancellation").
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Accepts the next connection on `listener`, waking up every
    /// [`ACCEPT_POLL_INTERVAL`] to check for shutdown while idle. Returns
    /// `None` once shutdown has been triggered, so every channel's accept
    /// loop unblocks within a bounded time even with no incoming traffic.
    pub async fn accept(
        &self,
        listener: &TcpListener,
    ) -> Option<std::io::Result<(TcpStream, SocketAddr)>> {
        self.accept_with_interval(listener, ACCEPT_POLL_INTERVAL).await
    }

    async fn accept_with_interval(
        &self,
        listener: &TcpListener,
        interval: Duration,
    ) -> Option<std::io::Result<(TcpStream, SocketAddr)>> {
        loop {
            tokio::select! {
                result = listener.accept() => return Some(result),
                _ = tokio::time::sleep(interval) => {
                    if self.is_shutting_down() {
                        return None;
                    }
                }
            }
        }
    }

    /// Waits for Ctrl-C (or SIGTERM on unix) and flips the shared flag.
    /// Intended to be spawned once at process startup and raced against the
    /// listener tasks in `main`.
    pub async fn listen_for_signal(self) {
        #[cfg(unix)]
        {
            let mut term =
                signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = signal::ctrl_c() => {},
                _ = term.recv() => {},
            }
        }
        #[cfg(not(unix))]
        {
            let _ = signal::ctrl_c().await;
        }

        info!("shutdown signal received");
        self.trigger();
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_accept_unblocks_once_shutdown_is_triggered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = Shutdown::new();

        let shutdown2 = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown2.trigger();
        });

        let result = shutdown
            .accept_with_interval(&listener, Duration::from_millis(5))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn accept_returns_incoming_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();

        tokio::spawn(async move {
            let _ = TcpStream::connect(addr).await;
        });

        let result = shutdown
            .accept_with_interval(&listener, Duration::from_millis(5))
            .await;
        assert!(matches!(result, Some(Ok(_))));
    }
}
