//! Screen channel client: token handshake, monitor-info ingest, then a
//! read-decode-deliver loop over the uniform 4-byte length-prefixed
//! framing this suite's server side uses.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rdesk_common::framing::{self, MAX_SMALL_FRAME};
use rdesk_common::{HandshakeResponse, MonitorInfo};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Receives decoded frames as they arrive. Implementations typically hand
/// the image off to a GUI toolkit's paint path.
pub trait FrameRenderer: Send + Sync {
    fn on_frame(&self, frame: &image::RgbImage);
}

/// The decoded-frame size cap: guards against a misbehaving/compromised
/// server asking the client to allocate unbounded memory for one frame.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Shared state the rest of the client can poll: the server's aspect
/// ratio, and the most recently decoded frame.
pub struct ScreenClientState {
    pub monitor_info: RwLock<Option<MonitorInfo>>,
    pub latest_frame: RwLock<Option<image::RgbImage>>,
    pub running: std::sync::atomic::AtomicBool,
}

impl ScreenClientState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            monitor_info: RwLock::new(None),
            latest_frame: RwLock::new(None),
            running: std::sync::atomic::AtomicBool::new(true),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn stop(&self) {
        self.running.store(false, std::sync::atomic::Ordering::Relaxed);
    }
}

/// Connects, performs the token handshake, reads the monitor-info frame,
/// then streams decoded frames to `renderer` until a read/decode error
/// ends the session, at which point the loop terminates and the client is
/// marked stopped.
pub async fn run(
    addr: SocketAddr,
    token: &str,
    state: Arc<ScreenClientState>,
    renderer: Arc<dyn FrameRenderer>,
    on_monitor_info: impl FnOnce(MonitorInfo),
) -> Result<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to screen channel at {addr}"))?;

    framing::write_text_frame(&mut stream, token)
        .await
        .context("failed to send handshake token")?;

    let handshake_text = framing::read_text_frame(&mut stream, MAX_SMALL_FRAME, None)
        .await
        .context("failed to read handshake response")?;
    let handshake: HandshakeResponse =
        serde_json::from_str(&handshake_text).context("malformed handshake response")?;
    if !handshake.success {
        state.stop();
        bail!("screen channel handshake rejected: {}", handshake.message);
    }

    let info_bytes = framing::read_frame(&mut stream, MAX_SMALL_FRAME, None)
        .await
        .context("failed to read monitor info")?;
    let monitor_info =
        MonitorInfo::from_bytes(&info_bytes).context("malformed monitor info payload")?;
    info!(width = monitor_info.width, height = monitor_info.height, "received monitor info");
    *state.monitor_info.write().await = Some(monitor_info);
    on_monitor_info(monitor_info);

    loop {
        let payload = match framing::read_frame(&mut stream, MAX_FRAME_BYTES, None).await {
            Ok(payload) => payload,
            Err(err) => {
                if err.is_clean_disconnect() {
                    debug!("screen channel closed by server");
                } else {
                    warn!(%err, "screen channel read failed");
                }
                break;
            }
        };

        match image::load_from_memory_with_format(&payload, image::ImageFormat::Jpeg) {
            Ok(image) => {
                let rgb = image.to_rgb8();
                renderer.on_frame(&rgb);
                *state.latest_frame.write().await = Some(rgb);
            }
            Err(err) => {
                error!(%err, "failed to decode frame, ending screen session");
                break;
            }
        }
    }

    state.stop();
    Ok(())
}
