//! Screen channel: capability traits for the two swappable pieces of the
//! capture pipeline (`ScreenSource`, `FrameEncoder`), default
//! implementations backed by `xcap`/`image`, and the per-connection accept
//! loop — emit monitor info, then stream JPEG frames.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rdesk_common::framing;
use rdesk_common::MonitorInfo;
use rdesk_core::authenticator::authenticate_channel;
use rdesk_core::{ConnectionLog, Shutdown, UserStore};
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Captures one still frame of a configured monitor as 8-bit RGB rows.
/// Implementations own whatever platform state (display handles, capture
/// sessions) the underlying OS API needs.
pub trait ScreenSource: Send {
    fn monitor_info(&mut self) -> Result<MonitorInfo>;
    fn capture(&mut self) -> Result<image::RgbImage>;
}

/// Encodes a captured frame for wire transmission.
pub trait FrameEncoder: Send {
    fn encode(&mut self, frame: &image::RgbImage) -> Result<Vec<u8>>;
}

/// JPEG quality used by [`JpegEncoder`].
const JPEG_QUALITY: u8 = 85;

/// `xcap`-backed monitor capture. `xcap::Monitor::all()` is re-queried on
/// every call to `monitor_info`/`capture` rather than cached, since
/// monitors can be hot-plugged between frames and this is a ~30 fps loop
/// where that cost is negligible next to the capture itself.
pub struct XcapScreenSource {
    monitor_index: usize,
}

impl XcapScreenSource {
    pub fn new(monitor_index: usize) -> Self {
        Self { monitor_index }
    }

    fn monitor(&self) -> Result<xcap::Monitor> {
        let monitors = xcap::Monitor::all().context("failed to enumerate monitors")?;
        monitors
            .into_iter()
            .nth(self.monitor_index)
            .with_context(|| format!("no monitor at index {}", self.monitor_index))
    }
}

impl ScreenSource for XcapScreenSource {
    fn monitor_info(&mut self) -> Result<MonitorInfo> {
        let monitor = self.monitor()?;
        Ok(MonitorInfo {
            width: monitor.width().context("monitor width unavailable")?,
            height: monitor.height().context("monitor height unavailable")?,
        })
    }

    fn capture(&mut self) -> Result<image::RgbImage> {
        let monitor = self.monitor()?;
        let image = monitor.capture_image().context("screen capture failed")?;
        // xcap yields RGBA; the wire format only carries 3 channels.
        Ok(image::DynamicImage::ImageRgba8(image).to_rgb8())
    }
}

/// JPEG encoder via the `image` crate, at a fixed quality. Frames are
/// never downsampled before encoding.
#[derive(Default)]
pub struct JpegEncoder;

impl FrameEncoder for JpegEncoder {
    fn encode(&mut self, frame: &image::RgbImage) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
        encoder
            .encode(
                frame.as_raw(),
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgb8,
            )
            .context("JPEG encoding failed")?;
        Ok(buf)
    }
}

/// Interval between captured frames.
pub struct ScreenChannelConfig {
    pub frame_interval: Duration,
    pub monitor_index: usize,
}

/// Runs the screen channel's accept loop until `shutdown` fires. Only one
/// session is ever active at a time: the next connection isn't accepted
/// until the current one's `handle_connection` call returns, mirroring the
/// original server's single `screen_client` instance field (spec §5
/// "Scheduling").
pub async fn run(
    listener: TcpListener,
    config: ScreenChannelConfig,
    store: Arc<RwLock<UserStore>>,
    connection_log: Arc<ConnectionLog>,
    shutdown: Shutdown,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "screen channel listening");
    loop {
        let (stream, peer) = match shutdown.accept(&listener).await {
            None => return Ok(()),
            Some(Ok(pair)) => pair,
            Some(Err(err)) => {
                warn!(%err, "failed to accept screen connection");
                continue;
            }
        };

        let cancel = shutdown.flag();
        handle_connection(
            stream,
            peer,
            config.monitor_index,
            config.frame_interval,
            store.clone(),
            connection_log.clone(),
            cancel,
        )
        .await;
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    monitor_index: usize,
    frame_interval: Duration,
    store: Arc<RwLock<UserStore>>,
    connection_log: Arc<ConnectionLog>,
    cancel: Arc<AtomicBool>,
) {
    let Some(user) =
        authenticate_channel(&mut stream, peer, "screen", &store, &connection_log).await
    else {
        return;
    };

    let mut source = XcapScreenSource::new(monitor_index);
    let mut encoder = JpegEncoder;

    let info = match source.monitor_info() {
        Ok(info) => info,
        Err(err) => {
            error!(%peer, %err, "failed to read monitor info");
            return;
        }
    };

    if let Err(err) = write_frame_checked(&mut stream, &info.to_bytes()).await {
        debug!(%peer, %err, "screen connection closed before monitor info was sent");
        return;
    }

    while !cancel.load(Ordering::Relaxed) {
        let frame = match source.capture() {
            Ok(frame) => frame,
            Err(err) => {
                error!(%peer, %err, "screen capture failed");
                break;
            }
        };
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let encoded = match encoder.encode(&frame) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(%peer, %err, "frame encoding failed");
                break;
            }
        };

        if let Err(err) = write_frame_checked(&mut stream, &encoded).await {
            if err.is_clean_disconnect() {
                debug!(%peer, user = %user.username, "screen client disconnected");
            } else {
                warn!(%peer, %err, "screen channel write failed");
            }
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(frame_interval) => {}
            _ = wait_for_cancel(&cancel) => break,
        }
    }

    connection_log
        .record("screen", &user.username, &peer.ip().to_string(), "disconnected")
        .await;
}

/// Polls `cancel` until it's set, so the inter-frame sleep above can be
/// raced against a shutdown request instead of blocking it out for the
/// full frame interval (spec §5 "Suspension points").
async fn wait_for_cancel(cancel: &AtomicBool) {
    while !cancel.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn write_frame_checked<W: AsyncWrite + Unpin>(
    stream: &mut W,
    payload: &[u8],
) -> Result<(), rdesk_common::ProtocolError> {
    framing::write_frame(stream, payload).await
}
