//! Connected-client tracking for the request server
//!
//! This module keeps the server-side roster of connected clients:
//! - Binding each socket address to the player identity it announced
//! - Client capacity management
//! - Connection health monitoring and automatic cleanup
//!
//! Requests are only attributed to a player once their address has
//! connected; packets from unknown addresses carry no identity.

use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client and the identity bound to it
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Identity announced when the client connected
    pub player_id: PlayerId,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, player_id: PlayerId) -> Self {
        Self {
            id,
            addr,
            player_id,
            last_seen: Instant::now(),
        }
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Enforces the server's capacity limit and answers the one question the
/// request handlers care about: who is speaking from this address?
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Idle time after which a client is forgotten
    timeout: Duration,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    /// A reconnect from an address that is already known replaces the old entry.
    pub fn add_client(&mut self, addr: SocketAddr, player_id: PlayerId) -> Option<u32> {
        if let Some(existing_id) = self.find_client_by_addr(addr) {
            info!("Replacing client {} from {}", existing_id, addr);
            self.remove_client(&existing_id);
        }

        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!(
            "Client {} connected from {} as player {}",
            client_id, addr, player_id
        );
        self.clients
            .insert(client_id, Client::new(client_id, addr, player_id));

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} ({}) disconnected", client.id, client.player_id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Returns the identity bound to `addr` and marks the client as active.
    pub fn identify(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .values_mut()
            .find(|client| client.addr == addr)
            .map(|client| {
                client.last_seen = Instant::now();
                client.player_id.clone()
            })
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the list of removed client IDs.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timeout = self.timeout;
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
