//! Live-session registry and broadcast fan-out.
//!
//! Tracks the outbound channel and lobby ready flag for every connected
//! player. Delivery is best-effort: a handle whose writer task has gone
//! away is pruned during the broadcast and the remaining recipients still
//! get the packet.

use log::info;
use shared::{player_name, Packet};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Outbound side of one connected session.
#[derive(Debug)]
pub struct ClientHandle {
    pub sender: mpsc::UnboundedSender<Packet>,
    pub ready: bool,
}

/// Registry of connected sessions, keyed by player id.
///
/// Ids come from a monotonic counter and are never reused, so a stale
/// handle can never be confused with a later connection.
#[derive(Debug)]
pub struct ClientManager {
    clients: HashMap<u32, ClientHandle>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Register a new session, returning its id, or `None` at capacity.
    pub fn register(&mut self, sender: mpsc::UnboundedSender<Packet>) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }
        let id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(
            id,
            ClientHandle {
                sender,
                ready: false,
            },
        );
        info!("client {} registered", id);
        Some(id)
    }

    /// Drop a session. Returns true if it was still registered.
    pub fn remove(&mut self, id: u32) -> bool {
        if self.clients.remove(&id).is_some() {
            info!("client {} removed", id);
            true
        } else {
            false
        }
    }

    /// Flag a player ready (or not) for the next round. Returns false for
    /// an unknown id.
    pub fn set_ready(&mut self, id: u32, ready: bool) -> bool {
        if let Some(handle) = self.clients.get_mut(&id) {
            handle.ready = ready;
            true
        } else {
            false
        }
    }

    /// True when at least one player is registered and all of them are
    /// flagged ready.
    pub fn all_ready(&self) -> bool {
        !self.clients.is_empty() && self.clients.values().all(|handle| handle.ready)
    }

    /// Clear every ready flag, as happens when a round starts or ends.
    pub fn clear_ready(&mut self) {
        for handle in self.clients.values_mut() {
            handle.ready = false;
        }
    }

    /// Wire names of all registered players, in join order.
    pub fn roster(&self) -> Vec<String> {
        let mut ids: Vec<u32> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().map(player_name).collect()
    }

    /// Queue a packet to one session. Returns false (and prunes the handle)
    /// if its writer task is gone.
    pub fn send_to(&mut self, id: u32, packet: Packet) -> bool {
        let alive = match self.clients.get(&id) {
            Some(handle) => handle.sender.send(packet).is_ok(),
            None => return false,
        };
        if !alive {
            self.remove(id);
        }
        alive
    }

    /// Queue a packet to every registered session, pruning any handle whose
    /// channel is closed. At-most-once per recipient, never retried.
    pub fn broadcast(&mut self, packet: &Packet) {
        let dead: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, handle)| handle.sender.send(packet.clone()).is_err())
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            self.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
