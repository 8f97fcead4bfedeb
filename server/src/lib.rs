//! # Game Server Library
//!
//! This library provides the authoritative server for a hidden-role party game
//! for 5 to 10 players. Clients only submit intents (nominate, vote, enact, ...)
//! and observe results; every rule is enforced here.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State Machine
//! The engine owns the phase cycle:
//!
//! ```text
//! nomination -> voting -> presidentDiscard -> chancellorEnact -> (executiveAction) -> nomination
//! ```
//!
//! with any phase able to end in `gameOver`.
//!
//! ### Atomic Operations
//! Every operation reads the session record, validates, mutates a private copy
//! and commits it with a compare-and-swap. A losing writer re-runs against the
//! fresh record, so a voting round is tallied exactly once even when the last
//! votes arrive at the same instant.
//!
//! ### Secret Knowledge
//! Roles are dealt once at game start. Each player's private view carries
//! exactly what their role is allowed to know and nothing more.
//!
//! ## Module Organization
//!
//! - `deck`: the 17-card policy deck and the shuffle every random choice uses
//! - `roles`: role distribution and knowledge derivation
//! - `votes`: vote collection and tallying
//! - `win`: win-condition evaluation
//! - `phases`: round endings, the election tracker and presidency rotation
//! - `legislative`: discard/enact, veto and executive powers
//! - `engine`: the public operations
//! - `session`, `store`: records and the atomic store they live in
//! - `client_manager`, `network`: the UDP front end
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::engine::GameEngine;
//! use server::network::Server;
//! use server::store::InMemorySessionStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(GameEngine::new(Arc::new(InMemorySessionStore::new())));
//!
//!     // Up to 64 clients, forgotten after 5 idle minutes
//!     let mut server = Server::new("127.0.0.1:8080", engine, 64, Duration::from_secs(300)).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod deck;
pub mod engine;
pub mod error;
pub mod legislative;
pub mod network;
pub mod phases;
pub mod roles;
pub mod session;
pub mod store;
pub mod utils;
pub mod votes;
pub mod win;
