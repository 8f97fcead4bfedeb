//! Server network layer handling UDP request/response traffic

use crate::client_manager::ClientManager;
use crate::engine::GameEngine;
use crate::error::EngineError;
use log::{debug, error, info, warn};
use shared::{
    decode_packet, encode_packet, Packet, PlayerId, Request, Response, WireError,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM: usize = 65_507;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Messages sent to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Main server coordinating networking and request dispatch
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    engine: Arc<GameEngine>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        engine: Arc<GameEngine>,
        max_clients: usize,
        client_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients, client_timeout))),
            engine,
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle that stops [`Server::run`] when sent [`ServerMessage::Shutdown`].
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = decode_packet(&buffer[..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            return;
        };

        tokio::spawn(async move {
            while let Some(OutboundMessage::SendPacket { packet, addr }) = outbound_rx.recv().await
            {
                if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Routes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                player_id,
            } => {
                info!(
                    "Client connecting from {} as {} (version: {})",
                    addr, player_id, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: format!(
                                "Unsupported protocol version {} (server speaks {})",
                                client_version, PROTOCOL_VERSION
                            ),
                        },
                        addr,
                    );
                    return;
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, player_id)
                };

                let response = match client_id {
                    Some(client_id) => Packet::Connected { client_id },
                    None => Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                };
                self.send_packet(response, addr);
            }

            Packet::Request {
                request_id,
                request,
            } => {
                let caller = {
                    let mut clients = self.clients.write().await;
                    clients.identify(addr)
                };
                let engine = Arc::clone(&self.engine);
                let outbound_tx = self.outbound_tx.clone();

                tokio::spawn(async move {
                    let result = handle_request(&engine, caller.as_ref(), request).await;
                    if let Err(e) = &result {
                        debug!("Request {} from {} failed: {}", request_id, addr, e);
                    }
                    let packet = Packet::Response { request_id, result };
                    if let Err(e) = outbound_tx.send(OutboundMessage::SendPacket { packet, addr }) {
                        error!("Failed to queue response for {}: {}", addr, e);
                    }
                });
            }

            Packet::Disconnect => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.remove_client(&client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::ClientTimeout { client_id }) => {
                    debug!("Client {} timed out", client_id);
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = encode_packet(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

/// Executes one request against the engine on behalf of `caller`.
pub async fn handle_request(
    engine: &GameEngine,
    caller: Option<&PlayerId>,
    request: Request,
) -> Result<Response, WireError> {
    dispatch(engine, caller, request).await.map_err(WireError::from)
}

async fn dispatch(
    engine: &GameEngine,
    caller: Option<&PlayerId>,
    request: Request,
) -> Result<Response, EngineError> {
    let response = match request {
        Request::CreateSession { display_name } => {
            let handle = engine.create_session(caller, &display_name).await?;
            Response::SessionCreated {
                session_id: handle.session_id,
                code: handle.code,
            }
        }
        Request::JoinSession { code, display_name } => {
            let receipt = engine.join_session(caller, &code, &display_name).await?;
            Response::SessionJoined {
                session_id: receipt.session_id,
                already_joined: receipt.already_joined,
            }
        }
        Request::StartSession { session_id } => {
            let receipt = engine.start_session(caller, &session_id).await?;
            Response::SessionStarted {
                player_count: receipt.player_count,
                first_president_id: receipt.first_president_id,
            }
        }
        Request::NominateChancellor {
            session_id,
            nominee_id,
        } => {
            let nominee_id = engine
                .nominate_chancellor(caller, &session_id, &nominee_id)
                .await?;
            Response::ChancellorNominated { nominee_id }
        }
        Request::CastVote { session_id, vote } => {
            let receipt = engine.cast_vote(caller, &session_id, vote).await?;
            Response::VoteRegistered {
                vote: receipt.vote,
                resolution: receipt.resolution,
            }
        }
        Request::DiscardPolicy { session_id, index } => {
            engine.discard_policy(caller, &session_id, index).await?;
            Response::PolicyDiscarded
        }
        Request::EnactPolicy { session_id, index } => {
            let outcome = engine.enact_policy(caller, &session_id, index).await?;
            Response::PolicyEnacted {
                enacted: outcome.enacted,
                power: outcome.power,
                winner: outcome.winner,
            }
        }
        Request::RequestVeto { session_id } => {
            engine.request_veto(caller, &session_id).await?;
            Response::VetoRequested
        }
        Request::RespondVeto { session_id, accept } => {
            let outcome = engine.respond_veto(caller, &session_id, accept).await?;
            Response::VetoResolved {
                accepted: outcome.accepted,
                chaos_policy: outcome.chaos_policy,
            }
        }
        Request::UseExecutivePower { session_id, target } => {
            let result = engine
                .use_executive_power(caller, &session_id, target.as_ref())
                .await?;
            Response::PowerUsed(result)
        }
        Request::ViewSession { session_id } => {
            let view = engine.view_session(caller, &session_id).await?;
            Response::Session(Box::new(view))
        }
        Request::ViewPrivate { session_id } => {
            let view = engine.view_private(caller, &session_id).await?;
            Response::Private {
                role: view.role,
                hand: view.hand,
            }
        }
    };
    Ok(response)
}
