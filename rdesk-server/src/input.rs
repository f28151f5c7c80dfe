//! Input channel: the `InputSink` capability trait, a default `enigo`-backed
//! implementation, and the per-connection command loop, reusing
//! [`rdesk_common::InputCommand::parse`] for the textual decode.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rdesk_common::framing::{self, MAX_SMALL_FRAME};
use rdesk_common::{InputCommand, ProtocolError};
use rdesk_core::authenticator::authenticate_channel;
use rdesk_core::{ConnectionLog, Shutdown, UserStore};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Applies decoded input commands to the local input stack. Implementations
/// own whatever platform input-injection state the underlying OS API needs.
pub trait InputSink: Send {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn click(&mut self, x: i32, y: i32) -> Result<()>;
    fn right_click(&mut self, x: i32, y: i32) -> Result<()>;
    fn scroll(&mut self, dx: i32, dy: i32) -> Result<()>;
    fn key_press(&mut self, key: &str) -> Result<()>;
    fn key_release(&mut self, key: &str) -> Result<()>;
}

/// `enigo`-backed local input injection.
pub struct EnigoInputSink {
    enigo: enigo::Enigo,
}

impl EnigoInputSink {
    pub fn new() -> Result<Self> {
        let enigo = enigo::Enigo::new(&enigo::Settings::default())
            .map_err(|err| anyhow::anyhow!("failed to initialize input injection: {err}"))?;
        Ok(Self { enigo })
    }

    fn key_from_name(name: &str) -> enigo::Key {
        use enigo::Key;
        match name {
            "enter" | "return" => Key::Return,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "backspace" => Key::Backspace,
            "escape" | "esc" => Key::Escape,
            "shift" => Key::Shift,
            "ctrl" | "control" => Key::Control,
            "alt" => Key::Alt,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Unicode(c),
                    _ => Key::Unicode('\u{0}'),
                }
            }
        }
    }
}

impl InputSink for EnigoInputSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        use enigo::Mouse;
        self.enigo
            .move_mouse(x, y, enigo::Coordinate::Abs)
            .map_err(|err| anyhow::anyhow!("mouse move failed: {err}"))
    }

    fn click(&mut self, x: i32, y: i32) -> Result<()> {
        use enigo::{Button, Direction, Mouse};
        self.move_to(x, y)?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|err| anyhow::anyhow!("left click failed: {err}"))
    }

    fn right_click(&mut self, x: i32, y: i32) -> Result<()> {
        use enigo::{Button, Direction, Mouse};
        self.move_to(x, y)?;
        self.enigo
            .button(Button::Right, Direction::Click)
            .map_err(|err| anyhow::anyhow!("right click failed: {err}"))
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> Result<()> {
        use enigo::{Axis, Mouse};
        if dy != 0 {
            self.enigo
                .scroll(dy, Axis::Vertical)
                .map_err(|err| anyhow::anyhow!("vertical scroll failed: {err}"))?;
        }
        if dx != 0 {
            self.enigo
                .scroll(dx, Axis::Horizontal)
                .map_err(|err| anyhow::anyhow!("horizontal scroll failed: {err}"))?;
        }
        Ok(())
    }

    fn key_press(&mut self, key: &str) -> Result<()> {
        use enigo::{Direction, Keyboard};
        self.enigo
            .key(Self::key_from_name(key), Direction::Press)
            .map_err(|err| anyhow::anyhow!("key press failed: {err}"))
    }

    fn key_release(&mut self, key: &str) -> Result<()> {
        use enigo::{Direction, Keyboard};
        self.enigo
            .key(Self::key_from_name(key), Direction::Release)
            .map_err(|err| anyhow::anyhow!("key release failed: {err}"))
    }
}

/// Socket read timeout used to pulse a liveness check.
const COMMAND_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs the input channel's accept loop until `shutdown` fires. Only one
/// session is ever active at a time: the next connection isn't accepted
/// until the current one's `handle_connection` call returns, mirroring the
/// original server's single `mouse_client` instance field (spec §5
/// "Scheduling").
pub async fn run(
    listener: TcpListener,
    store: Arc<RwLock<UserStore>>,
    connection_log: Arc<ConnectionLog>,
    shutdown: Shutdown,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "input channel listening");
    loop {
        let (stream, peer) = match shutdown.accept(&listener).await {
            None => return Ok(()),
            Some(Ok(pair)) => pair,
            Some(Err(err)) => {
                warn!(%err, "failed to accept input connection");
                continue;
            }
        };

        let cancel = shutdown.flag();
        handle_connection(stream, peer, store.clone(), connection_log.clone(), cancel).await;
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    store: Arc<RwLock<UserStore>>,
    connection_log: Arc<ConnectionLog>,
    cancel: Arc<AtomicBool>,
) {
    let Some(user) =
        authenticate_channel(&mut stream, peer, "input", &store, &connection_log).await
    else {
        return;
    };

    let mut sink = match EnigoInputSink::new() {
        Ok(sink) => sink,
        Err(err) => {
            warn!(%peer, %err, "could not initialize input sink for this session");
            return;
        }
    };

    loop {
        let frame = timeout(
            COMMAND_READ_TIMEOUT,
            framing::read_text_frame(&mut stream, MAX_SMALL_FRAME, Some(cancel.as_ref())),
        )
        .await;

        let line = match frame {
            Ok(Ok(line)) => line,
            Ok(Err(err)) => {
                if matches!(err, ProtocolError::FrameTooLarge(_, _) | ProtocolError::EmptyFrame) {
                    warn!(%peer, %err, "input channel protocol violation, closing");
                } else {
                    debug!(%peer, %err, "input channel closed");
                }
                break;
            }
            Err(_) => {
                // Read timeout: a liveness pulse, not an error.
                if cancel.load(std::sync::atomic::Ordering::Relaxed) {
                    break;
                }
                continue;
            }
        };

        match InputCommand::parse(line.trim()) {
            Some(command) => apply(&mut sink, &command, peer),
            None => {
                debug!(%peer, command = %line, "dropping unrecognized input command");
            }
        }
    }

    connection_log
        .record("input", &user.username, &peer.ip().to_string(), "disconnected")
        .await;
}

fn apply(sink: &mut dyn InputSink, command: &InputCommand, peer: SocketAddr) {
    let result = match command {
        InputCommand::Move { x, y } => sink.move_to(*x, *y),
        InputCommand::Click { x, y } => sink.click(*x, *y),
        InputCommand::RightClick { x, y } => sink.right_click(*x, *y),
        InputCommand::Scroll { dx, dy } => sink.scroll(*dx, *dy),
        InputCommand::KeyPress { key } => sink.key_press(key),
        InputCommand::KeyRelease { key } => sink.key_release(key),
    };
    if let Err(err) = result {
        warn!(%peer, %err, ?command, "failed to apply input command");
    }
}
