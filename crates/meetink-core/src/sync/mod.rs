//! Collaboration transport.
//!
//! Peers exchange [`Envelope`]s through a room relay. The engine only needs a
//! [`Transport`] that can send an envelope and hand back whatever arrived since the last
//! poll; the in-process [`MemoryHub`] and the native WebSocket client both provide one.

pub mod protocol;

#[cfg(not(target_arch = "wasm32"))]
mod native;

#[cfg(not(target_arch = "wasm32"))]
pub use native::WsTransport;
pub use protocol::{BoardEvent, CursorUpdate, DrawBatch, Envelope, ItemUpdate};

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Sender id used for messages the relay emits itself.
pub const RELAY_SENDER: &str = "relay";

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// A room-scoped message channel.
///
/// Delivery is fire-and-forget: `send` reports whether the message was handed to the
/// channel, never whether a peer received it.
pub trait Transport {
    fn send(&mut self, envelope: &Envelope) -> bool;

    /// Envelopes received since the last call, oldest first. Never blocks.
    fn poll(&mut self) -> Vec<Envelope>;

    fn state(&self) -> ConnectionState {
        ConnectionState::Connected
    }
}

/// A transport that drops everything, for a board with no collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

impl Transport for OfflineTransport {
    fn send(&mut self, _envelope: &Envelope) -> bool {
        false
    }

    fn poll(&mut self) -> Vec<Envelope> {
        Vec::new()
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::Disconnected
    }
}

#[derive(Debug, Default)]
struct Peer {
    room: String,
    inbox: VecDeque<String>,
}

#[derive(Debug, Default)]
struct HubInner {
    peers: HashMap<String, Peer>,
    /// Deliver messages back to their sender too, as a room broadcast that includes the
    /// sender would.
    echo: bool,
}

impl HubInner {
    fn broadcast(&mut self, room: &str, from: &str, text: &str) -> usize {
        let echo = self.echo;
        let mut delivered = 0;
        for (id, peer) in self.peers.iter_mut() {
            if peer.room == room && (echo || id != from) {
                peer.inbox.push_back(text.to_string());
                delivered += 1;
            }
        }
        delivered
    }
}

/// In-process relay. Messages go through the JSON wire format so every peer sees exactly
/// what a network relay would deliver.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    inner: Rc<RefCell<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub that also delivers each message to its sender.
    pub fn with_echo() -> Self {
        let hub = Self::default();
        hub.inner.borrow_mut().echo = true;
        hub
    }

    /// Join `room` as `sender_id`.
    pub fn connect(&self, room: impl Into<String>, sender_id: impl Into<String>) -> MemoryTransport {
        let room = room.into();
        let sender_id = sender_id.into();
        self.inner.borrow_mut().peers.insert(
            sender_id.clone(),
            Peer {
                room: room.clone(),
                inbox: VecDeque::new(),
            },
        );
        log::debug!("{sender_id} joined in-memory room {room}");
        MemoryTransport {
            hub: self.inner.clone(),
            room,
            sender_id,
            connected: true,
        }
    }

    pub fn peer_count(&self, room: &str) -> usize {
        self.inner
            .borrow()
            .peers
            .values()
            .filter(|p| p.room == room)
            .count()
    }
}

/// One peer's connection to a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryTransport {
    hub: Rc<RefCell<HubInner>>,
    room: String,
    sender_id: String,
    connected: bool,
}

impl MemoryTransport {
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Leave the room; the remaining peers receive `user_left`.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        let mut hub = self.hub.borrow_mut();
        hub.peers.remove(&self.sender_id);
        let left = Envelope::new(
            self.room.clone(),
            RELAY_SENDER,
            BoardEvent::UserLeft {
                socket_id: self.sender_id.clone(),
            },
        );
        match left.to_json() {
            Ok(text) => {
                hub.broadcast(&self.room, RELAY_SENDER, &text);
            }
            Err(e) => log::warn!("Failed to encode user_left: {e}"),
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, envelope: &Envelope) -> bool {
        if !self.connected {
            return false;
        }
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Failed to encode {}: {e}", envelope.event.name());
                return false;
            }
        };
        self.hub
            .borrow_mut()
            .broadcast(&self.room, &self.sender_id, &text);
        true
    }

    fn poll(&mut self) -> Vec<Envelope> {
        let mut hub = self.hub.borrow_mut();
        let Some(peer) = hub.peers.get_mut(&self.sender_id) else {
            return Vec::new();
        };
        peer.inbox
            .drain(..)
            .filter_map(|text| match Envelope::from_json(&text) {
                Ok(env) => Some(env),
                Err(e) => {
                    log::warn!("Dropping malformed message: {e}");
                    None
                }
            })
            .collect()
    }

    fn state(&self) -> ConnectionState {
        if self.connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
