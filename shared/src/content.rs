//! Static game content: maps, monster templates, skills and equipment.
//!
//! Content is immutable at runtime and read by both sides: the server uses it
//! to spawn monsters and gate map transitions, the client to know obstacles
//! and skill costs.

use crate::collision::{Circle, Vec2};
use crate::{ItemId, MapId, SkillId};
use serde::{Deserialize, Serialize};

/// The four stats that equipment and levels modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub max_hp: u32,
    pub max_mp: u32,
    pub attack: u32,
    pub defense: u32,
}

impl Stats {
    pub const STARTING: Stats = Stats {
        max_hp: 100,
        max_mp: 50,
        attack: 10,
        defense: 2,
    };

    pub fn plus(&self, other: &Stats) -> Stats {
        Stats {
            max_hp: self.max_hp.saturating_add(other.max_hp),
            max_mp: self.max_mp.saturating_add(other.max_mp),
            attack: self.attack.saturating_add(other.attack),
            defense: self.defense.saturating_add(other.defense),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EquipSlot {
    Weapon,
    Armor,
    Helmet,
    Accessory,
}

/// An equipped item as reported by the inventory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub item_id: ItemId,
    pub slot: EquipSlot,
    pub bonus: Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootEntry {
    pub item_id: ItemId,
    /// Drop probability in [0, 1].
    pub chance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub id: u32,
    pub name: String,
    pub radius: f32,
    pub max_hp: u32,
    pub attack: u32,
    pub experience: u32,
    pub gold: u32,
    pub loot: Vec<LootEntry>,
    pub respawn_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SkillEffect {
    /// Damage dealt to the target: `base + per_level * level`.
    Strike { base: u32, per_level: u32 },
    /// Hp restored to the caster: `base + per_level * level`.
    Mend { base: u32, per_level: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub mp_cost: u32,
    pub min_level: u32,
    pub effect: SkillEffect,
}

impl Skill {
    /// Base magnitude of the effect for a caster of the given level.
    pub fn power(&self, level: u32) -> u32 {
        match self.effect {
            SkillEffect::Strike { base, per_level } | SkillEffect::Mend { base, per_level } => {
                base.saturating_add(per_level.saturating_mul(level))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleportLink {
    pub target_map: MapId,
    pub target: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterSpawn {
    pub template_id: u32,
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDefinition {
    pub id: MapId,
    pub name: String,
    pub width: f32,
    pub height: f32,
    /// Where characters appear when entering without a teleport link, and
    /// where they respawn.
    pub spawn: Vec2,
    pub min_level: u32,
    pub obstacles: Vec<Circle>,
    pub monster_spawns: Vec<MonsterSpawn>,
    pub teleports: Vec<TeleportLink>,
}

impl MapDefinition {
    /// Arrival point on this map when coming from `from`.
    pub fn arrival_from(&self, from: &MapDefinition) -> Vec2 {
        from.teleports
            .iter()
            .find(|link| link.target_map == self.id)
            .map(|link| link.target)
            .unwrap_or(self.spawn)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub maps: Vec<MapDefinition>,
    pub monsters: Vec<MonsterTemplate>,
    pub skills: Vec<Skill>,
}

impl Catalog {
    pub fn map(&self, id: MapId) -> Option<&MapDefinition> {
        self.maps.iter().find(|map| map.id == id)
    }

    pub fn monster(&self, id: u32) -> Option<&MonsterTemplate> {
        self.monsters.iter().find(|template| template.id == id)
    }

    pub fn skill(&self, id: SkillId) -> Option<&Skill> {
        self.skills.iter().find(|skill| skill.id == id)
    }

    pub fn starting_map(&self) -> Option<&MapDefinition> {
        self.maps.iter().min_by_key(|map| map.min_level)
    }

    /// The built-in world: a meadow open to everyone and a mine gated at
    /// level 3.
    pub fn demo() -> Self {
        let monsters = vec![
            MonsterTemplate {
                id: 1,
                name: "Slime".to_string(),
                radius: 24.0,
                max_hp: 30,
                attack: 4,
                experience: 25,
                gold: 5,
                loot: vec![LootEntry {
                    item_id: 100,
                    chance: 0.25,
                }],
                respawn_delay_ms: 10_000,
            },
            MonsterTemplate {
                id: 2,
                name: "Wolf".to_string(),
                radius: 30.0,
                max_hp: 60,
                attack: 8,
                experience: 50,
                gold: 12,
                loot: vec![
                    LootEntry {
                        item_id: 101,
                        chance: 0.3,
                    },
                    LootEntry {
                        item_id: 200,
                        chance: 0.05,
                    },
                ],
                respawn_delay_ms: 15_000,
            },
            MonsterTemplate {
                id: 3,
                name: "Stone Golem".to_string(),
                radius: 40.0,
                max_hp: 150,
                attack: 15,
                experience: 120,
                gold: 40,
                loot: vec![LootEntry {
                    item_id: 201,
                    chance: 0.1,
                }],
                respawn_delay_ms: 30_000,
            },
        ];

        let skills = vec![
            Skill {
                id: 1,
                name: "Power Strike".to_string(),
                mp_cost: 10,
                min_level: 1,
                effect: SkillEffect::Strike {
                    base: 15,
                    per_level: 3,
                },
            },
            Skill {
                id: 2,
                name: "Mend".to_string(),
                mp_cost: 8,
                min_level: 1,
                effect: SkillEffect::Mend {
                    base: 20,
                    per_level: 4,
                },
            },
            Skill {
                id: 3,
                name: "Cleave".to_string(),
                mp_cost: 20,
                min_level: 3,
                effect: SkillEffect::Strike {
                    base: 30,
                    per_level: 5,
                },
            },
        ];

        let meadow = MapDefinition {
            id: 1,
            name: "Greenfield Meadow".to_string(),
            width: 1600.0,
            height: 1200.0,
            spawn: Vec2::new(200.0, 200.0),
            min_level: 1,
            obstacles: vec![
                Circle::new(Vec2::new(600.0, 400.0), 50.0),
                Circle::new(Vec2::new(900.0, 700.0), 70.0),
                Circle::with_default_radius(Vec2::new(400.0, 900.0)),
            ],
            monster_spawns: vec![
                MonsterSpawn {
                    template_id: 1,
                    position: Vec2::new(450.0, 250.0),
                },
                MonsterSpawn {
                    template_id: 1,
                    position: Vec2::new(520.0, 600.0),
                },
                MonsterSpawn {
                    template_id: 1,
                    position: Vec2::new(300.0, 650.0),
                },
                MonsterSpawn {
                    template_id: 2,
                    position: Vec2::new(1100.0, 450.0),
                },
                MonsterSpawn {
                    template_id: 2,
                    position: Vec2::new(1250.0, 900.0),
                },
            ],
            teleports: vec![TeleportLink {
                target_map: 2,
                target: Vec2::new(150.0, 500.0),
            }],
        };

        let mine = MapDefinition {
            id: 2,
            name: "Old Mine".to_string(),
            width: 1200.0,
            height: 1000.0,
            spawn: Vec2::new(150.0, 500.0),
            min_level: 3,
            obstacles: vec![
                Circle::new(Vec2::new(500.0, 300.0), 80.0),
                Circle::new(Vec2::new(700.0, 700.0), 60.0),
            ],
            monster_spawns: vec![
                MonsterSpawn {
                    template_id: 3,
                    position: Vec2::new(800.0, 400.0),
                },
                MonsterSpawn {
                    template_id: 3,
                    position: Vec2::new(1000.0, 800.0),
                },
            ],
            teleports: vec![TeleportLink {
                target_map: 1,
                target: Vec2::new(1450.0, 1050.0),
            }],
        };

        Self {
            maps: vec![meadow, mine],
            monsters,
            skills,
        }
    }
}
