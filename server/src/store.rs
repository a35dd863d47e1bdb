//! Authoritative in-memory entity state.
//!
//! Every character and monster lives behind its own mutex, so operations on
//! different entities proceed in parallel while operations on the same entity
//! are serialized. When an operation needs both a character and a monster it
//! must lock the character first.

use crate::entity::{Character, Monster};
use dashmap::DashMap;
use parking_lot::Mutex;
use shared::{CharacterId, Circle, GameError, GameResult, MapId, Missing, MonsterId, MonsterView};
use std::sync::Arc;

pub type SharedCharacter = Arc<Mutex<Character>>;
pub type SharedMonster = Arc<Mutex<Monster>>;

#[derive(Default)]
pub struct EntityStore {
    characters: DashMap<CharacterId, SharedCharacter>,
    monsters: DashMap<MonsterId, SharedMonster>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a character record, replacing any previous one with that id.
    pub fn insert_character(&self, character: Character) -> SharedCharacter {
        let id = character.id;
        let shared = Arc::new(Mutex::new(character));
        self.characters.insert(id, Arc::clone(&shared));
        shared
    }

    pub fn insert_monster(&self, monster: Monster) -> SharedMonster {
        let id = monster.id;
        let shared = Arc::new(Mutex::new(monster));
        self.monsters.insert(id, Arc::clone(&shared));
        shared
    }

    pub fn character(&self, id: CharacterId) -> GameResult<SharedCharacter> {
        self.characters
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(GameError::NotFound(Missing::Character(id)))
    }

    pub fn monster(&self, id: MonsterId) -> GameResult<SharedMonster> {
        self.monsters
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(GameError::NotFound(Missing::Monster(id)))
    }

    pub fn contains_character(&self, id: CharacterId) -> bool {
        self.characters.contains_key(&id)
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    pub fn monster_count(&self) -> usize {
        self.monsters.len()
    }

    /// Handles of every monster, in id order.
    pub fn all_monsters(&self) -> Vec<SharedMonster> {
        let mut monsters: Vec<(MonsterId, SharedMonster)> = self
            .monsters
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        monsters.sort_unstable_by_key(|(id, _)| *id);
        monsters.into_iter().map(|(_, monster)| monster).collect()
    }

    pub fn all_characters(&self) -> Vec<SharedCharacter> {
        let mut characters: Vec<(CharacterId, SharedCharacter)> = self
            .characters
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        characters.sort_unstable_by_key(|(id, _)| *id);
        characters
            .into_iter()
            .map(|(_, character)| character)
            .collect()
    }

    pub fn monsters_on_map(&self, map_id: MapId) -> Vec<MonsterView> {
        self.all_monsters()
            .iter()
            .map(|monster| monster.lock().view())
            .filter(|view| view.map_id == map_id)
            .collect()
    }

    /// Circles of every alive monster on the map, as the server sees them now.
    /// Locks each monster briefly; callers may hold a character lock.
    pub fn monster_obstacles(&self, map_id: MapId) -> Vec<Circle> {
        self.all_monsters()
            .iter()
            .filter_map(|monster| {
                let monster = monster.lock();
                (monster.map_id == map_id && monster.is_alive()).then(|| monster.circle())
            })
            .collect()
    }

    pub fn next_monster_id(&self) -> MonsterId {
        self.monsters
            .iter()
            .map(|entry| *entry.key())
            .max()
            .map_or(1, |id| id + 1)
    }
}
