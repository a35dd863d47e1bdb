//! # Map Sync Client Library
//!
//! The client side of the real-time map engine. The server is authoritative;
//! the client predicts its own movement and mirrors everything else from the
//! events of the map it is on.
//!
//! ## Architecture Overview
//!
//! ### Optimistic Movement
//! A move is applied locally as soon as it is issued, with the same step,
//! bounds and collision rules the server validates with (`prediction`). The
//! server's confirmation only moves the character when the two disagree by
//! more than the snap threshold.
//!
//! ### Event Reconciliation
//! On joining a map the client receives a full snapshot, then keeps it
//! current from domain events (`reconcile`). Events carry resulting values,
//! so reapplying one is harmless; exact duplicates delivered close together
//! are dropped before they reach the state (`dedup`).
//!
//! ## Module Organization
//!
//! - `game`: the local character, its intents and incoming server packets
//! - `prediction`, `reconcile`, `dedup`: the pieces `game` is built from
//! - `network`: UDP transport, run on a background thread by the window
//! - `input`, `rendering`: macroquad front end
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGameState;
//! use client::network::spawn_background;
//! use shared::content::Catalog;
//! use shared::{now_millis, Balance, Packet, Vec2, PROTOCOL_VERSION};
//!
//! let network = spawn_background("127.0.0.1:8080", 0).unwrap();
//! network.send(Packet::Connect {
//!     client_version: PROTOCOL_VERSION,
//!     character_id: 1,
//!     name: "Aria".to_string(),
//! });
//!
//! let mut game = ClientGameState::new(Catalog::demo(), Balance::default());
//! loop {
//!     for packet in network.poll() {
//!         game.handle_packet(packet, now_millis());
//!     }
//!     if let Some(intent) = game.move_to(Vec2::new(400.0, 300.0)) {
//!         network.send(intent);
//!     }
//! }
//! ```

pub mod dedup;
pub mod game;
pub mod input;
pub mod network;
pub mod prediction;
pub mod reconcile;
pub mod rendering;
