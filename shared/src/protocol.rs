//! Wire protocol between client and server (bincode over UDP).

use crate::collision::Vec2;
use crate::error::GameError;
use crate::events::EventEnvelope;
use crate::views::{CharacterView, MapSnapshot};
use crate::{CharacterId, ItemId, MapId, MonsterId, SkillId};
use serde::{Deserialize, Serialize};

/// Rewards granted to the character that landed a killing blow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillReward {
    pub experience: u32,
    pub gold: u32,
    /// Rolled loot, handed to the inventory service.
    pub drops: Vec<ItemId>,
    pub levels_gained: u32,
}

/// Result of a successfully resolved attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub attacker_id: CharacterId,
    pub monster_id: MonsterId,
    pub skill_id: Option<SkillId>,
    pub damage: u32,
    pub monster_hp: u32,
    pub killed: bool,
    pub reward: Option<KillReward>,
    /// Damage the surviving monster dealt back to the attacker.
    pub retaliation: Option<u32>,
    /// The attacker after rewards, level-ups and retaliation.
    pub attacker: CharacterView,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Client to server. The character id in `Connect` has already been
    // authenticated by the surrounding request layer.
    Connect {
        client_version: u32,
        character_id: CharacterId,
        name: String,
    },
    MoveCharacter {
        sequence: u32,
        x: f32,
        y: f32,
    },
    Attack {
        sequence: u32,
        monster_id: MonsterId,
        skill_id: Option<SkillId>,
    },
    Heal {
        sequence: u32,
        skill_id: SkillId,
    },
    ChangeMap {
        target_map: MapId,
    },
    JoinMap {
        map_id: MapId,
    },
    LeaveMap {
        map_id: MapId,
    },
    Heartbeat,
    Disconnect,

    // Server to client.
    Connected {
        character: CharacterView,
    },
    MoveConfirmed {
        sequence: u32,
        position: Vec2,
    },
    AttackResolved {
        sequence: u32,
        outcome: AttackOutcome,
    },
    Healed {
        sequence: u32,
        character: CharacterView,
    },
    MapJoined {
        snapshot: MapSnapshot,
    },
    MapChanged {
        position: Vec2,
        snapshot: MapSnapshot,
    },
    CommandFailed {
        sequence: Option<u32>,
        error: GameError,
    },
    Event(EventEnvelope),
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// Sequence number of a client intent, if the packet is one.
    pub fn intent_sequence(&self) -> Option<u32> {
        match self {
            Packet::MoveCharacter { sequence, .. }
            | Packet::Attack { sequence, .. }
            | Packet::Heal { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }
}
