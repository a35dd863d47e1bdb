//! Authoritative character and monster records.

use serde::{Deserialize, Serialize};
use shared::content::{EquipSlot, Equipment, MonsterTemplate, Stats};
use shared::{
    Balance, CharacterId, CharacterView, Circle, Conflict, GameError, GameResult, MapId, Missing,
    MonsterId, MonsterView, Resource, Vec2,
};
use std::collections::BTreeMap;

/// Alive, or dead with a scheduled respawn (unix milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeState {
    Alive,
    Dead { respawn_at: u64 },
}

impl LifeState {
    pub fn respawn_at(&self) -> Option<u64> {
        match self {
            LifeState::Alive => None,
            LifeState::Dead { respawn_at } => Some(*respawn_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    /// Opaque reference to the owning account, managed elsewhere.
    pub account_id: u64,
    pub name: String,
    pub map_id: MapId,
    pub position: Vec2,
    pub level: u32,
    pub experience: u32,
    pub experience_to_level: u32,
    pub hp: u32,
    pub mp: u32,
    pub gold: u32,
    pub base: Stats,
    pub equipment: BTreeMap<EquipSlot, Equipment>,
    /// Base stats plus equipment bonuses. Derived; kept in sync by
    /// `recompute_stats`.
    pub effective: Stats,
    pub life: LifeState,
}

impl Character {
    pub fn new(
        id: CharacterId,
        account_id: u64,
        name: impl Into<String>,
        map_id: MapId,
        position: Vec2,
        balance: &Balance,
    ) -> Self {
        let base = Stats::STARTING;
        Self {
            id,
            account_id,
            name: name.into(),
            map_id,
            position,
            level: 1,
            experience: 0,
            experience_to_level: balance.experience_to_level(1),
            hp: base.max_hp,
            mp: base.max_mp,
            gold: 0,
            base,
            equipment: BTreeMap::new(),
            effective: base,
            life: LifeState::Alive,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life == LifeState::Alive
    }

    pub fn ensure_alive(&self) -> GameResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(GameError::InvalidState(Conflict::CharacterDead))
        }
    }

    pub fn max_hp(&self) -> u32 {
        self.effective.max_hp
    }

    pub fn max_mp(&self) -> u32 {
        self.effective.max_mp
    }

    pub fn view(&self) -> CharacterView {
        CharacterView {
            id: self.id,
            name: self.name.clone(),
            map_id: self.map_id,
            position: self.position,
            level: self.level,
            experience: self.experience,
            experience_to_level: self.experience_to_level,
            hp: self.hp,
            max_hp: self.max_hp(),
            mp: self.mp,
            max_mp: self.max_mp(),
            attack: self.effective.attack,
            defense: self.effective.defense,
            gold: self.gold,
            alive: self.is_alive(),
        }
    }

    /// Recomputes effective stats from base stats and equipment, clamping
    /// current hp/mp to the new maxima.
    pub fn recompute_stats(&mut self) {
        self.effective = self
            .equipment
            .values()
            .fold(self.base, |total, item| total.plus(&item.bonus));
        self.hp = self.hp.min(self.max_hp());
        self.mp = self.mp.min(self.max_mp());
    }

    pub fn equip(&mut self, item: Equipment) -> GameResult<()> {
        if self.equipment.contains_key(&item.slot) {
            return Err(GameError::InvalidState(Conflict::SlotOccupied(item.slot)));
        }
        self.equipment.insert(item.slot, item);
        self.recompute_stats();
        Ok(())
    }

    pub fn unequip(&mut self, slot: EquipSlot) -> GameResult<Equipment> {
        let item = self
            .equipment
            .remove(&slot)
            .ok_or(GameError::NotFound(Missing::Equipment(slot)))?;
        self.recompute_stats();
        Ok(item)
    }

    /// Adds experience and applies every level-up it pays for. Each level
    /// consumes its threshold, grows base stats, and the character ends fully
    /// restored. Returns the number of levels gained.
    pub fn gain_experience(&mut self, amount: u32, balance: &Balance) -> u32 {
        self.experience = self.experience.saturating_add(amount);

        let growth = Stats {
            max_hp: balance.growth.max_hp,
            max_mp: balance.growth.max_mp,
            attack: balance.growth.attack,
            defense: balance.growth.defense,
        };

        let mut gained = 0;
        while self.experience >= self.experience_to_level {
            self.experience -= self.experience_to_level;
            self.level += 1;
            self.base = self.base.plus(&growth);
            self.experience_to_level = balance.experience_to_level(self.level);
            gained += 1;
        }

        if gained > 0 {
            self.recompute_stats();
            self.hp = self.max_hp();
            self.mp = self.max_mp();
        }
        gained
    }

    pub fn spend_mp(&mut self, cost: u32) -> GameResult<()> {
        if cost > self.mp {
            return Err(GameError::InsufficientResource {
                resource: Resource::Mp,
                required: cost,
                available: self.mp,
            });
        }
        self.mp -= cost;
        Ok(())
    }

    /// Applies damage floored at zero and returns the remaining hp.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.hp = self.hp.saturating_sub(amount);
        self.hp
    }

    /// Restores hp up to the maximum and returns the amount actually healed.
    pub fn restore_hp(&mut self, amount: u32) -> u32 {
        let before = self.hp;
        self.hp = self.hp.saturating_add(amount).min(self.max_hp());
        self.hp - before
    }

    pub fn die(&mut self, respawn_at: u64) {
        self.hp = 0;
        self.life = LifeState::Dead { respawn_at };
    }

    pub fn revive(&mut self, position: Vec2) {
        self.life = LifeState::Alive;
        self.position = position;
        self.hp = self.max_hp();
        self.mp = self.max_mp();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monster {
    pub id: MonsterId,
    pub template_id: u32,
    pub name: String,
    pub map_id: MapId,
    /// Monsters do not wander; they stay on their spawn point.
    pub spawn: Vec2,
    pub radius: f32,
    pub max_hp: u32,
    pub hp: u32,
    pub life: LifeState,
}

impl Monster {
    pub fn new(id: MonsterId, map_id: MapId, template: &MonsterTemplate, spawn: Vec2) -> Self {
        Self {
            id,
            template_id: template.id,
            name: template.name.clone(),
            map_id,
            spawn,
            radius: template.radius,
            max_hp: template.max_hp.max(1),
            hp: template.max_hp.max(1),
            life: LifeState::Alive,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life == LifeState::Alive
    }

    pub fn circle(&self) -> Circle {
        Circle::new(self.spawn, self.radius)
    }

    /// Applies damage floored at zero and returns the remaining hp. Does not
    /// change the life state; the resolver decides what a zero means.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.hp = self.hp.saturating_sub(amount);
        self.hp
    }

    pub fn die(&mut self, respawn_at: u64) {
        self.hp = 0;
        self.life = LifeState::Dead { respawn_at };
    }

    /// Revives the monster if it is dead with the given respawn timestamp.
    /// Returns false for stale requests.
    pub fn revive(&mut self, expected_respawn_at: u64) -> bool {
        match self.life {
            LifeState::Dead { respawn_at } if respawn_at == expected_respawn_at => {
                self.hp = self.max_hp;
                self.life = LifeState::Alive;
                true
            }
            _ => false,
        }
    }

    pub fn view(&self) -> MonsterView {
        MonsterView {
            id: self.id,
            template_id: self.template_id,
            name: self.name.clone(),
            map_id: self.map_id,
            position: self.spawn,
            radius: self.radius,
            hp: self.hp,
            max_hp: self.max_hp,
            alive: self.is_alive(),
            respawn_at: self.life.respawn_at(),
        }
    }

    /// Dead with a timestamp and zero hp, or alive with positive hp.
    pub fn invariants_hold(&self) -> bool {
        match self.life {
            LifeState::Alive => self.hp > 0 && self.hp <= self.max_hp,
            LifeState::Dead { .. } => self.hp == 0,
        }
    }
}
