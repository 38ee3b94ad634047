//! WebSocket transport for native platforms.
//!
//! The socket lives on a background thread; the engine side only touches channels, so
//! `send` and `poll` never block the UI loop.

use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tungstenite::{Message, connect};
use url::Url;

use super::{BoardEvent, ConnectionState, Envelope, Transport};
use crate::error::{BoardError, BoardResult};

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Events from the WebSocket thread.
enum WsEvent {
    Connected,
    Text(String),
    Disconnected,
    Error(String),
}

/// Relay connection for one room.
pub struct WsTransport {
    state: ConnectionState,
    room_id: String,
    sender_id: String,
    cmd_tx: Option<Sender<WsCommand>>,
    event_rx: Option<Receiver<WsEvent>>,
    _thread: Option<JoinHandle<()>>,
}

impl WsTransport {
    /// Connect to the relay at `url` and join `room_id`. The join is queued and sent as
    /// soon as the socket opens.
    pub fn connect(url: &str, room_id: impl Into<String>, sender_id: impl Into<String>) -> BoardResult<Self> {
        let parsed = Url::parse(url).map_err(|e| BoardError::Transport(format!("Invalid URL: {e}")))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(BoardError::Transport(format!(
                "Invalid WebSocket URL scheme: {}",
                parsed.scheme()
            )));
        }

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<WsEvent>();
        let url = url.to_string();
        let handle = thread::spawn(move || run_socket(&url, cmd_rx, event_tx));

        let mut transport = Self {
            state: ConnectionState::Connecting,
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            cmd_tx: Some(cmd_tx),
            event_rx: Some(event_rx),
            _thread: Some(handle),
        };
        let join = Envelope::new(
            transport.room_id.clone(),
            transport.sender_id.clone(),
            BoardEvent::Join { name: None },
        );
        transport.send(&join);
        Ok(transport)
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Transport for WsTransport {
    fn send(&mut self, envelope: &Envelope) -> bool {
        let Some(tx) = self.cmd_tx.as_ref() else {
            return false;
        };
        match envelope.to_json() {
            Ok(text) => tx.send(WsCommand::Send(text)).is_ok(),
            Err(e) => {
                log::warn!("Failed to encode {}: {e}", envelope.event.name());
                false
            }
        }
    }

    fn poll(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        let Some(rx) = self.event_rx.as_ref() else {
            return out;
        };
        while let Ok(event) = rx.try_recv() {
            match event {
                WsEvent::Connected => self.state = ConnectionState::Connected,
                WsEvent::Disconnected => self.state = ConnectionState::Disconnected,
                WsEvent::Error(message) => {
                    log::warn!("Relay connection error: {message}");
                    self.state = ConnectionState::Error;
                }
                WsEvent::Text(text) => match Envelope::from_json(&text) {
                    Ok(env) => out.push(env),
                    Err(e) => log::warn!("Failed to parse relay message: {e}"),
                },
            }
        }
        out
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, event_tx: Sender<WsEvent>) {
    log::info!("WebSocket thread: connecting to {url}");
    let (mut socket, response) = match connect(url) {
        Ok(ok) => ok,
        Err(e) => {
            log::error!("WebSocket connection failed: {e}");
            let _ = event_tx.send(WsEvent::Error(format!("Connection failed: {e}")));
            return;
        }
    };
    log::info!("WebSocket connected, status: {}", response.status());
    let _ = event_tx.send(WsEvent::Connected);

    // Short read timeout so outgoing commands are serviced between reads
    match socket.get_mut() {
        tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => log::debug!("TLS or other stream - using default timeout handling"),
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(msg)) => {
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("WebSocket send error: {e}");
                    break;
                }
            }
            Ok(WsCommand::Close) => {
                log::info!("WebSocket close requested");
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => {
                let _ = event_tx.send(WsEvent::Text(txt));
            }
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                log::error!("WebSocket read error: {e}");
                break;
            }
        }
    }

    log::info!("WebSocket thread exiting");
    let _ = event_tx.send(WsEvent::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_websocket_scheme() {
        let err = WsTransport::connect("http://localhost:3030", "r", "s").err();
        assert!(matches!(err, Some(BoardError::Transport(_))));
    }
}
