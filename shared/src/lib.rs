//! Types and pure logic shared by the authoritative server and the client.
//!
//! Everything here must produce identical results on both sides: the
//! collision resolver runs on the client for prediction and on the server
//! for validation, and the wire protocol is decoded by both.

pub mod balance;
pub mod collision;
pub mod content;
pub mod error;
pub mod events;
pub mod protocol;
pub mod views;

pub use balance::Balance;
pub use collision::{collides, nearest_free_position, Circle, Vec2};
pub use error::{Conflict, GameError, GameResult, Missing, Resource};
pub use events::{DomainEvent, EntityRef, EventEnvelope, EventKind};
pub use protocol::Packet;
pub use views::{CharacterView, MapSnapshot, MonsterView};

pub type CharacterId = u32;
pub type MonsterId = u32;
pub type MapId = u32;
pub type SkillId = u32;
pub type ItemId = u32;

pub const PROTOCOL_VERSION: u32 = 1;

/// Radius used for any body whose size is not specified.
pub const DEFAULT_RADIUS: f32 = 30.0;
pub const CHARACTER_RADIUS: f32 = 20.0;
pub const ATTACK_RADIUS: f32 = 120.0;
pub const DAMAGE_VARIANCE: f32 = 0.1;
pub const EXPERIENCE_PER_LEVEL: u32 = 100;
pub const MAX_MOVE_DISTANCE: f32 = 400.0;
pub const CHARACTER_RESPAWN_MS: u64 = 5_000;
/// Longest character name, in bytes. Keeps a full map's join snapshot inside
/// one datagram.
pub const MAX_NAME_LEN: usize = 16;

/// Client-side window in which an identical event is treated as a duplicate.
pub const DEDUP_WINDOW_MS: u64 = 3_000;
/// Distance past which a server confirmation overrides the predicted position.
pub const SNAP_THRESHOLD: f32 = 5.0;
/// Speed (units per second) used to interpolate remote entity movement.
pub const INTERPOLATION_SPEED: f32 = 400.0;

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
