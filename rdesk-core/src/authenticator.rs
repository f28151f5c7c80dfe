//! Channel handshake used by both the screen and input listeners before
//! handing a connection off to its channel-specific loop: read the token,
//! validate it, reply, then proceed.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rdesk_common::framing::{self, MAX_SMALL_FRAME};
use rdesk_common::HandshakeResponse;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::RwLock;
use tracing::debug;

use crate::connection_log::ConnectionLog;
use crate::store::{StoreUser, UserStore};

/// Performs the token handshake on a freshly accepted channel connection.
/// Reads one length-prefixed token frame, validates it against the store,
/// writes a `HandshakeResponse` frame, and returns the authenticated user
/// on success. On any failure (bad token, I/O error, oversized frame) this
/// returns `None` after writing a failure response if the write itself is
/// still possible; the caller is expected to drop the connection either way.
pub async fn authenticate_channel<S>(
    stream: &mut S,
    peer: SocketAddr,
    service: &str,
    store: &Arc<RwLock<UserStore>>,
    connection_log: &Arc<ConnectionLog>,
) -> Option<StoreUser>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let token = match framing::read_text_frame(stream, MAX_SMALL_FRAME, None::<&AtomicBool>).await
    {
        Ok(token) => token,
        Err(err) => {
            debug!(%peer, service, %err, "channel handshake aborted before a token arrived");
            return None;
        }
    };

    let result = store.write().await.validate_session(token.trim());

    match result {
        Ok(user) => {
            let response = HandshakeResponse {
                success: true,
                message: "ok".to_string(),
            };
            if write_handshake(stream, &response).await.is_err() {
                return None;
            }
            connection_log
                .record(service, &user.username, &peer.ip().to_string(), "connected")
                .await;
            Some(user)
        }
        Err(err) => {
            let response = HandshakeResponse {
                success: false,
                message: err.to_string(),
            };
            let _ = write_handshake(stream, &response).await;
            connection_log
                .record(service, "-", &peer.ip().to_string(), &format!("rejected: {err}"))
                .await;
            None
        }
    }
}

async fn write_handshake<S: AsyncWrite + Unpin>(
    stream: &mut S,
    response: &HandshakeResponse,
) -> Result<(), rdesk_common::ProtocolError> {
    let body = serde_json::to_string(response)
        .unwrap_or_else(|_| r#"{"success":false,"message":"internal error"}"#.to_string());
    framing::write_text_frame(stream, &body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use tokio::io::duplex;

    async fn store_with_alice() -> (Arc<RwLock<UserStore>>, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::mem::forget(dir);
        let mut store = UserStore::open(path, StdDuration::from_secs(86400)).unwrap();
        store
            .register_user("alice", "pw", "alice@example.com", None)
            .unwrap();
        let token = store.authenticate("alice", "pw").unwrap();
        (Arc::new(RwLock::new(store)), token)
    }

    #[tokio::test]
    async fn valid_token_authenticates_and_replies_success() {
        let (store, token) = store_with_alice().await;
        let log = Arc::new(ConnectionLog::new(tempfile::tempdir().unwrap().into_path()));
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let (mut client, mut server) = duplex(4096);
        framing::write_text_frame(&mut client, &token).await.unwrap();

        let user = authenticate_channel(&mut server, peer, "screen", &store, &log).await;
        assert_eq!(user.unwrap().username, "alice");

        let resp_text = framing::read_text_frame(&mut client, MAX_SMALL_FRAME, None)
            .await
            .unwrap();
        let resp: HandshakeResponse = serde_json::from_str(&resp_text).unwrap();
        assert!(resp.success);
    }

    #[tokio::test]
    async fn bogus_token_is_rejected() {
        let (store, _token) = store_with_alice().await;
        let log = Arc::new(ConnectionLog::new(tempfile::tempdir().unwrap().into_path()));
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let (mut client, mut server) = duplex(4096);
        framing::write_text_frame(&mut client, "not-a-real-token")
            .await
            .unwrap();

        let user = authenticate_channel(&mut server, peer, "input", &store, &log).await;
        assert!(user.is_none());

        let resp_text = framing::read_text_frame(&mut client, MAX_SMALL_FRAME, None)
            .await
            .unwrap();
        let resp: HandshakeResponse = serde_json::from_str(&resp_text).unwrap();
        assert!(!resp.success);
    }
}
