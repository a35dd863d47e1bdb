//! Domain events published on map channels.
//!
//! Each event carries the resulting observable values of the entity it is
//! about, never deltas, so a client that missed intermediate events converges
//! on the next one it receives.

use crate::collision::Vec2;
use crate::views::{CharacterView, MonsterView};
use crate::{CharacterId, MapId, MonsterId};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Character(CharacterId),
    Monster(MonsterId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    CharacterEntered,
    CharacterLeft,
    CharacterMoved,
    CharacterLeveled,
    CharacterDamaged,
    CharacterHealed,
    CharacterDied,
    CharacterRespawned,
    MonsterDamaged,
    MonsterKilled,
    MonsterRespawning,
    MonsterRespawned,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CharacterEntered => "character.entered",
            EventKind::CharacterLeft => "character.left",
            EventKind::CharacterMoved => "character.moved",
            EventKind::CharacterLeveled => "character.leveled",
            EventKind::CharacterDamaged => "character.damaged",
            EventKind::CharacterHealed => "character.healed",
            EventKind::CharacterDied => "character.died",
            EventKind::CharacterRespawned => "character.respawned",
            EventKind::MonsterDamaged => "monster.damaged",
            EventKind::MonsterKilled => "monster.killed",
            EventKind::MonsterRespawning => "monster.respawning",
            EventKind::MonsterRespawned => "monster.respawned",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    CharacterEntered(CharacterView),
    CharacterLeft {
        character_id: CharacterId,
    },
    CharacterMoved {
        character_id: CharacterId,
        position: Vec2,
    },
    CharacterLeveled {
        character_id: CharacterId,
        level: u32,
        hp: u32,
        max_hp: u32,
        mp: u32,
        max_mp: u32,
    },
    CharacterDamaged {
        character_id: CharacterId,
        source: Option<MonsterId>,
        damage: u32,
        hp: u32,
        max_hp: u32,
    },
    CharacterHealed {
        character_id: CharacterId,
        amount: u32,
        hp: u32,
        max_hp: u32,
        mp: u32,
    },
    CharacterDied {
        character_id: CharacterId,
        respawn_at: u64,
    },
    CharacterRespawned {
        character_id: CharacterId,
        position: Vec2,
        hp: u32,
        max_hp: u32,
        mp: u32,
        max_mp: u32,
    },
    MonsterDamaged {
        monster_id: MonsterId,
        attacker_id: CharacterId,
        damage: u32,
        hp: u32,
        max_hp: u32,
    },
    MonsterKilled {
        monster_id: MonsterId,
        killer_id: CharacterId,
    },
    MonsterRespawning {
        monster_id: MonsterId,
        respawn_at: u64,
    },
    MonsterRespawned(MonsterView),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::CharacterEntered(_) => EventKind::CharacterEntered,
            DomainEvent::CharacterLeft { .. } => EventKind::CharacterLeft,
            DomainEvent::CharacterMoved { .. } => EventKind::CharacterMoved,
            DomainEvent::CharacterLeveled { .. } => EventKind::CharacterLeveled,
            DomainEvent::CharacterDamaged { .. } => EventKind::CharacterDamaged,
            DomainEvent::CharacterHealed { .. } => EventKind::CharacterHealed,
            DomainEvent::CharacterDied { .. } => EventKind::CharacterDied,
            DomainEvent::CharacterRespawned { .. } => EventKind::CharacterRespawned,
            DomainEvent::MonsterDamaged { .. } => EventKind::MonsterDamaged,
            DomainEvent::MonsterKilled { .. } => EventKind::MonsterKilled,
            DomainEvent::MonsterRespawning { .. } => EventKind::MonsterRespawning,
            DomainEvent::MonsterRespawned(_) => EventKind::MonsterRespawned,
        }
    }

    /// The entity whose observable state this event describes.
    pub fn subject(&self) -> EntityRef {
        match self {
            DomainEvent::CharacterEntered(view) => EntityRef::Character(view.id),
            DomainEvent::CharacterLeft { character_id }
            | DomainEvent::CharacterMoved { character_id, .. }
            | DomainEvent::CharacterLeveled { character_id, .. }
            | DomainEvent::CharacterDamaged { character_id, .. }
            | DomainEvent::CharacterHealed { character_id, .. }
            | DomainEvent::CharacterDied { character_id, .. }
            | DomainEvent::CharacterRespawned { character_id, .. } => {
                EntityRef::Character(*character_id)
            }
            DomainEvent::MonsterDamaged { monster_id, .. }
            | DomainEvent::MonsterKilled { monster_id, .. }
            | DomainEvent::MonsterRespawning { monster_id, .. } => EntityRef::Monster(*monster_id),
            DomainEvent::MonsterRespawned(view) => EntityRef::Monster(view.id),
        }
    }

    /// Hash of the full event body. Two deliveries of the same event share a
    /// fingerprint; events with different resulting values do not.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match bincode::serialize(self) {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(_) => format!("{:?}", self).hash(&mut hasher),
        }
        hasher.finish()
    }

    pub fn dedup_key(&self) -> EventKey {
        EventKey {
            entity: self.subject(),
            kind: self.kind(),
            fingerprint: self.fingerprint(),
        }
    }
}

/// Identity of an event for duplicate suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub entity: EntityRef,
    pub kind: EventKind,
    pub fingerprint: u64,
}

/// An event as delivered on a map channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub map_id: MapId,
    /// Server clock (unix milliseconds) at publication.
    pub issued_at: u64,
    pub event: DomainEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn respawned(hp: u32) -> DomainEvent {
        DomainEvent::MonsterRespawned(MonsterView {
            id: 4,
            template_id: 1,
            name: "Slime".to_string(),
            map_id: 1,
            position: Vec2::new(10.0, 20.0),
            radius: 24.0,
            hp,
            max_hp: 30,
            alive: true,
            respawn_at: None,
        })
    }

    #[test]
    fn test_kind_names() {
        let event = DomainEvent::MonsterKilled {
            monster_id: 1,
            killer_id: 2,
        };
        assert_eq!(event.kind().as_str(), "monster.killed");
        assert_eq!(EventKind::CharacterEntered.to_string(), "character.entered");
    }

    #[test]
    fn test_subject() {
        assert_eq!(respawned(30).subject(), EntityRef::Monster(4));
        let moved = DomainEvent::CharacterMoved {
            character_id: 9,
            position: Vec2::ZERO,
        };
        assert_eq!(moved.subject(), EntityRef::Character(9));
    }

    #[test]
    fn test_fingerprint_tracks_body() {
        assert_eq!(respawned(30).fingerprint(), respawned(30).fingerprint());
        assert_ne!(respawned(30).fingerprint(), respawned(29).fingerprint());
        assert_eq!(respawned(30).dedup_key(), respawned(30).clone().dedup_key());
    }
}
