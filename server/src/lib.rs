//! # Map Sync Server Library
//!
//! The authoritative side of the real-time map engine. The server owns every
//! character and monster, validates movement against the same collision
//! rules clients predict with, resolves combat, and pushes domain events to
//! everyone present on a map.
//!
//! ## Architecture
//!
//! ### Per-entity state
//! Characters and monsters each live behind their own lock (`store`). Work on
//! different entities runs in parallel; work on one entity is serialized.
//! Operations that touch a character and a monster lock the character first.
//!
//! ### Events while locked
//! Domain events are published while the entity lock that produced them is
//! held. Combined with one FIFO outbox per connection, every subscriber sees
//! an entity's events in the order they happened.
//!
//! ### Timers
//! Each pending respawn is its own task (`respawn`). Deadlines are absolute
//! timestamps so a restarted server can revive what elapsed while it was down.
//!
//! ## Module Organization
//!
//! - `entity`, `store`: character and monster records and their locks
//! - `movement`, `combat`: move validation, attack and heal resolution
//! - `broadcast`: per-map presence and event fan-out
//! - `respawn`: respawn timers, grouped per map
//! - `world`: the `GameWorld` facade tying the above together
//! - `persistence`: bincode world snapshots
//! - `client_manager`, `network`: UDP sessions, intent superseding, tick loop
//! - `config`: command line arguments
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::world::GameWorld;
//! use shared::content::Catalog;
//! use std::sync::Arc;
//! use tokio::runtime::Handle;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let world = Arc::new(GameWorld::new(
//!         Catalog::demo(),
//!         config.balance.clone(),
//!         Handle::current(),
//!     ));
//!     world.spawn_monsters();
//!
//!     let mut server = Server::new(config, world).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client_manager;
pub mod combat;
pub mod config;
pub mod entity;
pub mod movement;
pub mod network;
pub mod persistence;
pub mod respawn;
pub mod store;
pub mod world;
