//! Input client: a dedicated OS-thread pointer/key listener bridged into
//! the async runtime, the typing/command keyboard mode machine, the
//! held-key re-entrancy guard, and the outbound input-channel writer.
//! Coordinate translation is delegated to
//! `rdesk_common::coords::map_point`.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use rdesk_common::coords::{map_point, RemoteDisplay, Viewport};
use rdesk_common::framing::{self, MAX_SMALL_FRAME};
use rdesk_common::{HandshakeResponse, InputCommand};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default vertical offset applied to mapped pointer coordinates, chosen
/// to compensate for window chrome above the remote viewport.
const DEFAULT_UI_OFFSET_Y: i32 = -25;

/// Step size `u`/`d` adjust the offset by in command mode.
const UI_OFFSET_STEP: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyboardMode {
    Typing,
    Command,
}

/// Shared, externally observable client state: the keyboard mode, whether
/// events are currently forwarded, the vertical UI offset, the local
/// viewport (set by whatever renders the screen frames), and a short
/// human-readable status line (SPEC_FULL supplemented feature, grounded in
/// `original_source/pickle-client.py::show_status`).
pub struct InputClientState {
    forwarding_enabled: AtomicBool,
    quit_requested: AtomicBool,
    ui_offset_y: AtomicI32,
    mode: Mutex<KeyboardMode>,
    viewport: Mutex<Viewport>,
    display: Mutex<RemoteDisplay>,
    status: Mutex<String>,
}

impl InputClientState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            forwarding_enabled: AtomicBool::new(true),
            quit_requested: AtomicBool::new(false),
            ui_offset_y: AtomicI32::new(DEFAULT_UI_OFFSET_Y),
            mode: Mutex::new(KeyboardMode::Typing),
            viewport: Mutex::new(Viewport {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            }),
            display: Mutex::new(RemoteDisplay {
                width: 1,
                height: 1,
            }),
            status: Mutex::new(String::new()),
        })
    }

    /// Called by the screen client once the monitor-info frame arrives.
    pub fn set_display(&self, display: RemoteDisplay) {
        *self.display.lock().expect("display lock poisoned") = display;
    }

    /// Called by whatever renders the screen frames, whenever the visible
    /// viewport rectangle changes (window resize, layout change).
    pub fn set_viewport(&self, viewport: Viewport) {
        *self.viewport.lock().expect("viewport lock poisoned") = viewport;
    }

    /// The latest status line, for a status-overlay widget to poll.
    pub fn status(&self) -> String {
        self.status.lock().expect("status lock poisoned").clone()
    }

    fn set_status(&self, message: impl Into<String>) {
        *self.status.lock().expect("status lock poisoned") = message.into();
    }
}

/// One decoded local input event, normalized from whatever OS hook
/// produced it.
#[derive(Debug, Clone)]
enum LocalEvent {
    PointerMove { x: i32, y: i32 },
    LeftDown { x: i32, y: i32 },
    LeftUp { x: i32, y: i32 },
    RightDown { x: i32, y: i32 },
    RightUp { x: i32, y: i32 },
    Scroll { dx: i32, dy: i32 },
    KeyDown(String),
    KeyUp(String),
}

/// Normalizes an `rdev` key into a `char_<c>` / `key_<name>`
/// re-entrancy-guard key.
fn normalize_key(key: rdev::Key) -> String {
    use rdev::Key::*;
    match key {
        KeyA => "char_a".into(),
        KeyB => "char_b".into(),
        KeyC => "char_c".into(),
        KeyD => "char_d".into(),
        KeyE => "char_e".into(),
        KeyF => "char_f".into(),
        KeyG => "char_g".into(),
        KeyH => "char_h".into(),
        KeyI => "char_i".into(),
        KeyJ => "char_j".into(),
        KeyK => "char_k".into(),
        KeyL => "char_l".into(),
        KeyM => "char_m".into(),
        KeyN => "char_n".into(),
        KeyO => "char_o".into(),
        KeyP => "char_p".into(),
        KeyQ => "char_q".into(),
        KeyR => "char_r".into(),
        KeyS => "char_s".into(),
        KeyT => "char_t".into(),
        KeyU => "char_u".into(),
        KeyV => "char_v".into(),
        KeyW => "char_w".into(),
        KeyX => "char_x".into(),
        KeyY => "char_y".into(),
        KeyZ => "char_z".into(),
        Tab => "key_tab".into(),
        Return => "key_enter".into(),
        Space => "key_space".into(),
        Backspace => "key_backspace".into(),
        Escape => "key_escape".into(),
        ShiftLeft | ShiftRight => "key_shift".into(),
        ControlLeft | ControlRight => "key_ctrl".into(),
        Alt | AltGr => "key_alt".into(),
        other => format!("key_{other:?}").to_lowercase(),
    }
}

/// Strips the `char_`/`key_` normalization prefix back to the wire key
/// name the server's `InputCommand::parse` expects.
fn wire_key_name(normalized: &str) -> String {
    normalized
        .strip_prefix("char_")
        .or_else(|| normalized.strip_prefix("key_"))
        .unwrap_or(normalized)
        .to_string()
}

/// Spawns the OS-level listener thread and returns a channel of normalized
/// events. `rdev::listen` blocks its calling thread forever, so it runs on
/// a dedicated `std::thread` rather than `tokio::task::spawn_blocking`
/// (which is pooled and meant for bounded-duration work).
fn spawn_event_source() -> mpsc::UnboundedReceiver<LocalEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let mut last_pos = (0i32, 0i32);
        let callback = move |event: rdev::Event| {
            let translated = match event.event_type {
                rdev::EventType::MouseMove { x, y } => {
                    last_pos = (x as i32, y as i32);
                    Some(LocalEvent::PointerMove { x: x as i32, y: y as i32 })
                }
                rdev::EventType::ButtonPress(rdev::Button::Left) => {
                    Some(LocalEvent::LeftDown { x: last_pos.0, y: last_pos.1 })
                }
                rdev::EventType::ButtonRelease(rdev::Button::Left) => {
                    Some(LocalEvent::LeftUp { x: last_pos.0, y: last_pos.1 })
                }
                rdev::EventType::ButtonPress(rdev::Button::Right) => {
                    Some(LocalEvent::RightDown { x: last_pos.0, y: last_pos.1 })
                }
                rdev::EventType::ButtonRelease(rdev::Button::Right) => {
                    Some(LocalEvent::RightUp { x: last_pos.0, y: last_pos.1 })
                }
                rdev::EventType::Wheel { delta_x, delta_y } => Some(LocalEvent::Scroll {
                    dx: delta_x as i32,
                    dy: delta_y as i32,
                }),
                rdev::EventType::KeyPress(key) => Some(LocalEvent::KeyDown(normalize_key(key))),
                rdev::EventType::KeyRelease(key) => Some(LocalEvent::KeyUp(normalize_key(key))),
                _ => None,
            };
            if let Some(event) = translated {
                let _ = tx.send(event);
            }
        };
        if let Err(err) = rdev::listen(callback) {
            tracing::error!(?err, "local input listener stopped unexpectedly");
        }
    });

    rx
}

/// Connects, performs the token handshake, then runs the event loop until
/// the connection drops or a `q` command-mode key requests disconnect.
pub async fn run(addr: SocketAddr, token: &str, state: Arc<InputClientState>) -> Result<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to input channel at {addr}"))?;

    framing::write_text_frame(&mut stream, token)
        .await
        .context("failed to send handshake token")?;
    let handshake_text = framing::read_text_frame(&mut stream, MAX_SMALL_FRAME, None)
        .await
        .context("failed to read handshake response")?;
    let handshake: HandshakeResponse =
        serde_json::from_str(&handshake_text).context("malformed handshake response")?;
    if !handshake.success {
        bail!("input channel handshake rejected: {}", handshake.message);
    }
    info!("input channel connected");

    let mut events = spawn_event_source();
    let mut held_keys: HashSet<String> = HashSet::new();

    while let Some(event) = events.recv().await {
        if let Some(command) = process_event(event, &state, &mut held_keys) {
            if send_command(&mut stream, &command).await.is_err() {
                warn!("input channel write failed, ending session");
                break;
            }
        }
        if state.quit_requested.load(Ordering::Relaxed) {
            break;
        }
    }

    Ok(())
}

async fn send_command(stream: &mut TcpStream, command: &InputCommand) -> Result<()> {
    framing::write_text_frame(stream, &command.to_wire())
        .await
        .context("failed to write input command")
}

/// Applies one local event to the keyboard-mode state machine and, for
/// events that should reach the server, maps pointer coordinates and
/// returns the wire command to send. Consumes `q`/`c`/`u`/`d` locally in
/// command mode without ever producing a command.
fn process_event(
    event: LocalEvent,
    state: &InputClientState,
    held_keys: &mut HashSet<String>,
) -> Option<InputCommand> {
    let forwarding = state.forwarding_enabled.load(Ordering::Relaxed);

    match event {
        LocalEvent::PointerMove { x, y } => {
            if !forwarding {
                return None;
            }
            map_pointer(state, x, y).map(|(x, y)| InputCommand::Move { x, y })
        }
        LocalEvent::LeftDown { x, y } => {
            if !forwarding {
                return None;
            }
            map_pointer(state, x, y).map(|(x, y)| InputCommand::Click { x, y })
        }
        LocalEvent::LeftUp { .. } => None,
        LocalEvent::RightDown { x, y } => {
            if !forwarding {
                return None;
            }
            map_pointer(state, x, y).map(|(x, y)| InputCommand::RightClick { x, y })
        }
        LocalEvent::RightUp { .. } => None,
        LocalEvent::Scroll { dx, dy } => {
            if !forwarding {
                return None;
            }
            Some(InputCommand::Scroll { dx, dy })
        }
        LocalEvent::KeyDown(key) => handle_key_down(state, held_keys, key),
        LocalEvent::KeyUp(key) => handle_key_up(state, held_keys, key),
    }
}

fn map_pointer(state: &InputClientState, x: i32, y: i32) -> Option<(i32, i32)> {
    let viewport = *state.viewport.lock().expect("viewport lock poisoned");
    let display = *state.display.lock().expect("display lock poisoned");
    let ui_offset_y = state.ui_offset_y.load(Ordering::Relaxed);
    map_point(x as f64, y as f64, viewport, display, ui_offset_y)
}

fn handle_key_down(
    state: &InputClientState,
    held_keys: &mut HashSet<String>,
    key: String,
) -> Option<InputCommand> {
    if key == "key_tab" {
        toggle_mode(state);
        return None;
    }

    let mode = *state.mode.lock().expect("mode lock poisoned");
    if mode == KeyboardMode::Command {
        if let Some(command) = handle_command_mode_key(state, &key) {
            return command;
        }
    }

    if held_keys.contains(&key) {
        return None;
    }
    held_keys.insert(key.clone());

    if !state.forwarding_enabled.load(Ordering::Relaxed) {
        return None;
    }
    Some(InputCommand::KeyPress {
        key: wire_key_name(&key),
    })
}

fn handle_key_up(
    state: &InputClientState,
    held_keys: &mut HashSet<String>,
    key: String,
) -> Option<InputCommand> {
    if key == "key_tab" {
        return None;
    }
    held_keys.remove(&key);

    let mode = *state.mode.lock().expect("mode lock poisoned");
    if mode == KeyboardMode::Command && is_command_mode_key(&key) {
        return None;
    }

    if !state.forwarding_enabled.load(Ordering::Relaxed) {
        return None;
    }
    Some(InputCommand::KeyRelease {
        key: wire_key_name(&key),
    })
}

fn is_command_mode_key(key: &str) -> bool {
    matches!(key, "char_q" | "char_c" | "char_u" | "char_d")
}

/// Handles a command-mode key down. Returns `Some(None)` to indicate the
/// key was consumed locally (never forwarded); `None` to let the caller
/// fall through to normal forwarding.
fn handle_command_mode_key(state: &InputClientState, key: &str) -> Option<Option<InputCommand>> {
    match key {
        "char_q" => {
            state.set_status("Disconnecting...");
            state.quit_requested.store(true, Ordering::Relaxed);
            info!("received quit command, disconnecting");
            Some(None)
        }
        "char_c" => {
            let now = !state.forwarding_enabled.load(Ordering::Relaxed);
            state.forwarding_enabled.store(now, Ordering::Relaxed);
            state.set_status(if now { "Control enabled" } else { "Control disabled" });
            Some(None)
        }
        "char_u" => {
            let offset = state.ui_offset_y.fetch_sub(UI_OFFSET_STEP, Ordering::Relaxed)
                - UI_OFFSET_STEP;
            state.set_status(format!("Y offset: {offset}"));
            Some(None)
        }
        "char_d" => {
            let offset = state.ui_offset_y.fetch_add(UI_OFFSET_STEP, Ordering::Relaxed)
                + UI_OFFSET_STEP;
            state.set_status(format!("Y offset: {offset}"));
            Some(None)
        }
        _ => None,
    }
}

fn toggle_mode(state: &InputClientState) {
    let mut mode = state.mode.lock().expect("mode lock poisoned");
    *mode = match *mode {
        KeyboardMode::Typing => KeyboardMode::Command,
        KeyboardMode::Command => KeyboardMode::Typing,
    };
    debug!(?mode, "keyboard mode switched");
    state.set_status(format!("Mode: {mode:?}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_state() -> Arc<InputClientState> {
        let state = InputClientState::new();
        state.set_display(RemoteDisplay {
            width: 1920,
            height: 1080,
        });
        state.set_viewport(Viewport {
            x: 0.0,
            y: 0.0,
            width: 1920.0,
            height: 1080.0,
        });
        state
    }

    #[test]
    fn tab_toggles_mode_without_emitting_a_command() {
        let state = fresh_state();
        let mut held = HashSet::new();
        let cmd = process_event(LocalEvent::KeyDown("key_tab".into()), &state, &mut held);
        assert!(cmd.is_none());
        assert_eq!(*state.mode.lock().unwrap(), KeyboardMode::Command);
    }

    #[test]
    fn held_key_guard_suppresses_repeat_press() {
        let state = fresh_state();
        let mut held = HashSet::new();
        let first = process_event(LocalEvent::KeyDown("char_a".into()), &state, &mut held);
        let second = process_event(LocalEvent::KeyDown("char_a".into()), &state, &mut held);
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn command_mode_consumes_c_and_toggles_forwarding() {
        let state = fresh_state();
        let mut held = HashSet::new();
        process_event(LocalEvent::KeyDown("key_tab".into()), &state, &mut held);
        assert!(state.forwarding_enabled.load(Ordering::Relaxed));

        let cmd = process_event(LocalEvent::KeyDown("char_c".into()), &state, &mut held);
        assert!(cmd.is_none());
        assert!(!state.forwarding_enabled.load(Ordering::Relaxed));
    }

    #[test]
    fn command_mode_u_and_d_adjust_offset_by_five() {
        let state = fresh_state();
        let mut held = HashSet::new();
        process_event(LocalEvent::KeyDown("key_tab".into()), &state, &mut held);

        let before = state.ui_offset_y.load(Ordering::Relaxed);
        process_event(LocalEvent::KeyDown("char_u".into()), &state, &mut held);
        assert_eq!(state.ui_offset_y.load(Ordering::Relaxed), before - UI_OFFSET_STEP);

        process_event(LocalEvent::KeyDown("char_d".into()), &state, &mut held);
        assert_eq!(state.ui_offset_y.load(Ordering::Relaxed), before);
    }

    #[test]
    fn typing_mode_forwards_all_keys() {
        let state = fresh_state();
        let mut held = HashSet::new();
        let cmd = process_event(LocalEvent::KeyDown("char_a".into()), &state, &mut held);
        assert_eq!(
            cmd,
            Some(InputCommand::KeyPress { key: "a".to_string() })
        );
    }
}
