//! # Game Client Library
//!
//! A thin async client for the game server. The server is authoritative for
//! every rule; the client only announces who it is, sends intents and reads
//! back results.
//!
//! ## Protocol
//!
//! All traffic is UDP carrying bincode-encoded [`shared::Packet`]s:
//!
//! 1. `Connect { client_version, player_id }` binds the player identity to the
//!    client's address. The server answers `Connected` or `Disconnected`.
//! 2. Each `Request { request_id, request }` is answered by a
//!    `Response { request_id, result }` carrying either the typed response or
//!    a [`shared::WireError`] with its error kind.
//!
//! A request that gets no answer before the client's timeout fails with
//! [`ClientError::Timeout`]; the caller decides whether to retry.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::GameClient;
//! use shared::{PlayerId, Request, Response};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = GameClient::connect(
//!         "127.0.0.1:8080",
//!         PlayerId::from("alice"),
//!         Duration::from_secs(2),
//!     )
//!     .await?;
//!
//!     let response = client
//!         .request(Request::CreateSession { display_name: "Alice".to_string() })
//!         .await?;
//!     if let Response::SessionCreated { code, .. } = response {
//!         println!("Share this room code: {}", code);
//!     }
//!     Ok(())
//! }
//! ```

pub mod network;

pub use network::{ClientError, GameClient};
