//! Room state shared by every connection.

use std::collections::HashMap;

use dashmap::DashMap;
use meetink_core::items::Item;
use meetink_core::sync::{BoardEvent, Envelope, RELAY_SENDER};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

/// A message on a room's broadcast channel, tagged with the socket it came from.
#[derive(Debug, Clone)]
pub struct Relayed {
    pub from: String,
    pub text: String,
}

/// Room state
struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<Relayed>,
    /// Socket id to the sender id the peer joined with
    peers: HashMap<String, String>,
    /// Authoritative item list, served to late joiners
    items: Vec<Item>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashMap::new(),
            items: Vec::new(),
        }
    }

    fn send(&self, from: &str, text: String) {
        // No receivers is fine
        let _ = self.tx.send(Relayed {
            from: from.to_string(),
            text,
        });
    }
}

/// Summary of a room for the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomInfo {
    pub room: String,
    pub peers: usize,
    pub items: usize,
}

/// Shared application state
#[derive(Default)]
pub struct AppState {
    rooms: DashMap<String, Room>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a socket to a room. Returns the room's receiver and the peer count after joining.
    pub fn join(&self, room_id: &str, socket_id: &str, sender_id: &str) -> (broadcast::Receiver<Relayed>, usize) {
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(Room::new);
        room.peers.insert(socket_id.to_string(), sender_id.to_string());
        (room.tx.subscribe(), room.peers.len())
    }

    /// Remove a socket from a room and tell the others. Returns the sender id it had joined
    /// with.
    pub fn leave(&self, room_id: &str, socket_id: &str) -> Option<String> {
        let mut room = self.rooms.get_mut(room_id)?;
        let sender_id = room.peers.remove(socket_id)?;

        let left = Envelope::new(
            room_id,
            RELAY_SENDER,
            BoardEvent::UserLeft {
                socket_id: sender_id.clone(),
            },
        );
        match left.to_json() {
            Ok(text) => room.send(RELAY_SENDER, text),
            Err(e) => warn!("Failed to encode user_left: {}", e),
        }

        // Rooms with content outlive their peers
        if room.peers.is_empty() && room.items.is_empty() {
            drop(room);
            self.rooms.remove(room_id);
            debug!("Room {} closed", room_id);
        }
        Some(sender_id)
    }

    /// Record a message in the room's item list and pass it on to the other peers.
    pub fn relay(&self, room_id: &str, socket_id: &str, envelope: &Envelope, text: String) {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            debug!("Dropping {} for unknown room {}", envelope.event.name(), room_id);
            return;
        };
        if envelope.event.is_mutation() && !envelope.event.apply_to(&mut room.items) {
            debug!("{} from {} changed nothing", envelope.event.name(), socket_id);
        }
        room.send(socket_id, text);
    }

    pub fn items(&self, room_id: &str) -> Vec<Item> {
        self.rooms
            .get(room_id)
            .map(|room| room.items.clone())
            .unwrap_or_default()
    }

    /// Forget a room's item list. Returns `true` if there was anything to forget.
    pub fn clear_items(&self, room_id: &str) -> bool {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let had_items = !room.items.is_empty();
        room.items.clear();
        if room.peers.is_empty() {
            drop(room);
            self.rooms.remove(room_id);
        }
        had_items
    }

    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.peers.len())
    }

    pub fn list(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self
            .rooms
            .iter()
            .map(|entry| RoomInfo {
                room: entry.key().clone(),
                peers: entry.peers.len(),
                items: entry.items.len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room.cmp(&b.room));
        rooms
    }
}
