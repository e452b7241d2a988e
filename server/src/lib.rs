//! # Treasure-Hunt Game Server Library
//!
//! Authoritative server for the multiplayer treasure-hunt game. The server
//! owns the single source of truth for the hidden treasure location, the
//! one-shot special cells and the turn order; clients submit guesses over a
//! persistent TCP connection and receive proximity hints, effect outcomes
//! and turn/game-over notifications.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The pure turn-and-resolution state machine: treasure placement, hint
//! computation, one-shot special effects, skip accumulation and the
//! bounded cyclic turn advancement. No I/O.
//!
//! ### Client Manager Module (`client_manager`)
//! The live-session registry: player id assignment, per-session outbound
//! queues, lobby ready flags, and best-effort broadcast with pruning of
//! dead sessions.
//!
//! ### Network Module (`network`)
//! TCP accept loop, per-connection read/write tasks, the newline-delimited
//! JSON framing, and the lobby -> playing -> round-over lifecycle. All
//! command handling runs under one lock spanning validation, mutation and
//! the derivation of outgoing packets.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("0.0.0.0:4000", ServerConfig::default()).await?;
//!     // Runs until the process is stopped; a listener failure is fatal.
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
