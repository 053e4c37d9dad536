//! Keyboard source.
//!
//! Key presses are broadcast as DOM-style codes (`ArrowUp`, ...) so each trial
//! subscribes on its own and stops seeing keys the moment it drops its
//! receiver. The terminal reader maps a few aliases onto those codes.

use reachgrid::input::Direction;
use reachgrid::protocol::{events, PLAYER_READY_MESSAGE};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::transport::Transport;

const KEY_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct Keyboard {
    tx: broadcast::Sender<String>,
}

impl Keyboard {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(KEY_BUFFER);
        Self { tx }
    }

    pub fn press(&self, code: impl Into<String>) {
        let code = code.into();
        if self.tx.send(code.clone()).is_err() {
            debug!("Key {} pressed with no listener", code);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    #[allow(dead_code)]
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCommand {
    Key(&'static str),
    Ready,
}

/// Parse one line typed on the terminal.
pub fn parse_terminal_line(line: &str) -> Option<TerminalCommand> {
    let word = line.trim();
    if let Some(d) = Direction::from_key_code(word) {
        return Some(TerminalCommand::Key(d.key_code()));
    }
    let dir = match word.to_ascii_lowercase().as_str() {
        "w" | "k" | "up" => Direction::Up,
        "s" | "j" | "down" => Direction::Down,
        "a" | "h" | "left" => Direction::Left,
        "d" | "l" | "right" => Direction::Right,
        "ready" | "r" => return Some(TerminalCommand::Ready),
        _ => return None,
    };
    Some(TerminalCommand::Key(dir.key_code()))
}

/// Act on one terminal line: press a key or announce readiness.
pub fn dispatch_line(
    line: &str,
    keyboard: &Keyboard,
    transport: &Transport,
) -> Option<TerminalCommand> {
    let command = parse_terminal_line(line);
    match &command {
        Some(TerminalCommand::Key(code)) => keyboard.press(*code),
        Some(TerminalCommand::Ready) => {
            info!("{}", PLAYER_READY_MESSAGE);
            transport.emit(events::PLAYER_READY, &PLAYER_READY_MESSAGE);
        }
        None => debug!("Ignoring input {:?}", line),
    }
    command
}

/// Read stdin line by line until EOF.
pub fn spawn_stdin_reader(keyboard: Keyboard, transport: Transport) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    dispatch_line(&line, &keyboard, &transport);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("stdin closed: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_arrow_codes() {
        assert_eq!(parse_terminal_line("w"), Some(TerminalCommand::Key("ArrowUp")));
        assert_eq!(parse_terminal_line(" Right "), Some(TerminalCommand::Key("ArrowRight")));
        assert_eq!(parse_terminal_line("j"), Some(TerminalCommand::Key("ArrowDown")));
        assert_eq!(parse_terminal_line("ArrowLeft"), Some(TerminalCommand::Key("ArrowLeft")));
        assert_eq!(parse_terminal_line("ready"), Some(TerminalCommand::Ready));
        assert_eq!(parse_terminal_line("x"), None);
        assert_eq!(parse_terminal_line(""), None);
    }

    #[tokio::test]
    async fn keys_reach_only_live_listeners() {
        let kb = Keyboard::new();
        kb.press("ArrowUp");

        let mut rx = kb.subscribe();
        kb.press("ArrowDown");
        assert_eq!(rx.recv().await.unwrap(), "ArrowDown");

        drop(rx);
        assert_eq!(kb.listener_count(), 0);
    }

    #[tokio::test]
    async fn ready_line_announces_the_player() {
        let (transport, mut peer) = Transport::in_memory();
        let kb = Keyboard::new();
        let mut rx = kb.subscribe();

        assert_eq!(dispatch_line("ready", &kb, &transport), Some(TerminalCommand::Ready));
        let env = peer.recv().await.unwrap();
        assert_eq!(env.event, "playerReady");
        assert_eq!(env.data, serde_json::json!("Player is ready!"));

        dispatch_line("d", &kb, &transport);
        assert_eq!(rx.recv().await.unwrap(), "ArrowRight");
        assert!(peer.try_recv().is_none(), "keys stay local");

        assert_eq!(dispatch_line("jump", &kb, &transport), None);
    }
}
