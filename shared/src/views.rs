//! Observable projections of entities, as clients see them.

use crate::collision::Vec2;
use crate::{CharacterId, MapId, MonsterId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterView {
    pub id: CharacterId,
    pub name: String,
    pub map_id: MapId,
    pub position: Vec2,
    pub level: u32,
    pub experience: u32,
    pub experience_to_level: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub mp: u32,
    pub max_mp: u32,
    pub attack: u32,
    pub defense: u32,
    pub gold: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterView {
    pub id: MonsterId,
    pub template_id: u32,
    pub name: String,
    pub map_id: MapId,
    pub position: Vec2,
    pub radius: f32,
    pub hp: u32,
    pub max_hp: u32,
    pub alive: bool,
    /// Unix milliseconds of the scheduled respawn while dead.
    pub respawn_at: Option<u64>,
}

/// Everything a client needs to render a map it has just joined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub map_id: MapId,
    /// Other characters present on the map, excluding the joiner.
    pub characters: Vec<CharacterView>,
    pub monsters: Vec<MonsterView>,
}
