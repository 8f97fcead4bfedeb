use log::{debug, info, warn};
use shared::{
    decode_packet, encode_packet, Packet, PlayerId, Request, Response, WireError, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

const RECV_BUFFER: usize = 65_507;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed packet: {0}")]
    Codec(#[from] bincode::Error),

    #[error("no answer from server within {0:?}")]
    Timeout(Duration),

    #[error("server refused the connection: {0}")]
    Rejected(String),

    /// The server processed the request and answered with an error.
    #[error("{0}")]
    Server(#[from] WireError),
}

/// Request/response client for the game server.
pub struct GameClient {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: u32,
    player_id: PlayerId,
    next_request_id: u32,
    timeout: Duration,
}

impl GameClient {
    /// Opens a socket and announces `player_id` to the server.
    pub async fn connect(
        server_addr: &str,
        player_id: PlayerId,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;

        info!("Connecting to {} as {}", server_addr, player_id);
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            player_id: player_id.clone(),
        };
        send_packet(&socket, &packet, server_addr).await?;

        let deadline = Instant::now() + timeout;
        let mut buffer = vec![0u8; RECV_BUFFER];
        loop {
            match recv_packet(&socket, &mut buffer, server_addr, deadline, timeout).await? {
                Packet::Connected { client_id } => {
                    info!("Connected! Client ID: {}", client_id);
                    return Ok(Self {
                        socket,
                        server_addr,
                        client_id,
                        player_id,
                        next_request_id: 1,
                        timeout,
                    });
                }
                Packet::Disconnected { reason } => return Err(ClientError::Rejected(reason)),
                other => debug!("Ignoring {:?} while connecting", other),
            }
        }
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// Sends one request and waits for its response. Stale responses are skipped.
    pub async fn request(&mut self, request: Request) -> Result<Response, ClientError> {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);

        let packet = Packet::Request {
            request_id,
            request,
        };
        send_packet(&self.socket, &packet, self.server_addr).await?;

        let deadline = Instant::now() + self.timeout;
        let mut buffer = vec![0u8; RECV_BUFFER];
        loop {
            let packet = recv_packet(
                &self.socket,
                &mut buffer,
                self.server_addr,
                deadline,
                self.timeout,
            )
            .await?;
            match packet {
                Packet::Response {
                    request_id: id,
                    result,
                } if id == request_id => return Ok(result?),
                Packet::Response { request_id: id, .. } => {
                    debug!("Dropping stale response {}", id);
                }
                Packet::Disconnected { reason } => return Err(ClientError::Rejected(reason)),
                other => warn!("Unexpected packet type: {:?}", other),
            }
        }
    }

    /// Tells the server to forget this client.
    pub async fn disconnect(self) -> Result<(), ClientError> {
        send_packet(&self.socket, &Packet::Disconnect, self.server_addr).await
    }
}

async fn send_packet(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), ClientError> {
    let data = encode_packet(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

async fn recv_packet(
    socket: &UdpSocket,
    buffer: &mut [u8],
    server_addr: SocketAddr,
    deadline: Instant,
    timeout: Duration,
) -> Result<Packet, ClientError> {
    loop {
        let (len, from) = timeout_at(deadline, socket.recv_from(buffer))
            .await
            .map_err(|_| ClientError::Timeout(timeout))??;
        if from != server_addr {
            warn!("Ignoring datagram from {}", from);
            continue;
        }
        match decode_packet(&buffer[..len]) {
            Ok(packet) => return Ok(packet),
            Err(e) => warn!("Failed to deserialize packet from server: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ErrorKind;

    #[test]
    fn test_server_errors_keep_kind_and_message() {
        let err: ClientError = WireError {
            kind: ErrorKind::AlreadyExists,
            message: "you have already voted".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "already-exists: you have already voted");
        assert!(matches!(err, ClientError::Server(ref e) if e.kind == ErrorKind::AlreadyExists));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_address() {
        let result = GameClient::connect("not an address", "p".into(), Duration::from_millis(10)).await;
        assert!(matches!(result, Err(ClientError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_connect_times_out_without_server() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap().to_string();

        let result = GameClient::connect(&addr, "p".into(), Duration::from_millis(50)).await;
        assert!(matches!(result, Err(ClientError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_connect_and_request_against_scripted_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let script = tokio::spawn(async move {
            let mut buffer = vec![0u8; RECV_BUFFER];
            let (len, peer) = server.recv_from(&mut buffer).await.unwrap();
            match decode_packet(&buffer[..len]).unwrap() {
                Packet::Connect { player_id, .. } => assert_eq!(player_id, PlayerId::from("p")),
                other => panic!("Expected Connect, got {:?}", other),
            }
            let reply = encode_packet(&Packet::Connected { client_id: 7 }).unwrap();
            server.send_to(&reply, peer).await.unwrap();

            let (len, peer) = server.recv_from(&mut buffer).await.unwrap();
            let request_id = match decode_packet(&buffer[..len]).unwrap() {
                Packet::Request { request_id, .. } => request_id,
                other => panic!("Expected Request, got {:?}", other),
            };
            let stale = Packet::Response {
                request_id: request_id + 100,
                result: Ok(Response::PolicyDiscarded),
            };
            server
                .send_to(&encode_packet(&stale).unwrap(), peer)
                .await
                .unwrap();
            let answer = Packet::Response {
                request_id,
                result: Ok(Response::VetoRequested),
            };
            server
                .send_to(&encode_packet(&answer).unwrap(), peer)
                .await
                .unwrap();
        });

        let mut client = GameClient::connect(&addr.to_string(), "p".into(), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(client.client_id(), 7);

        let response = client
            .request(Request::RequestVeto {
                session_id: "s".into(),
            })
            .await
            .unwrap();
        assert_eq!(response, Response::VetoRequested);
        script.await.unwrap();
    }
}
