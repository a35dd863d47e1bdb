//! The authoritative game world.
//!
//! `GameWorld` ties the entity store, combat, movement, map channels and the
//! respawn scheduler together behind a transport-agnostic API. Every method
//! takes `&self`; concurrency is handled per entity inside.

use crate::broadcast::{MapChannels, Outbox};
use crate::combat::{resolve_attack, resolve_heal, CombatRules};
use crate::entity::{Character, LifeState, Monster};
use crate::movement::attempt_move;
use crate::persistence::WorldSnapshot;
use crate::respawn::RespawnScheduler;
use crate::store::{EntityStore, SharedCharacter, SharedMonster};
use log::{debug, info, warn};
use parking_lot::Mutex;
use shared::content::{Catalog, EquipSlot, Equipment, MapDefinition};
use shared::protocol::AttackOutcome;
use shared::{
    now_millis, Balance, CharacterId, CharacterView, Conflict, DomainEvent, GameError, GameResult,
    MapId, MapSnapshot, Missing, MonsterId, MonsterView, SkillId, Vec2, MAX_NAME_LEN,
};
use std::sync::Arc;
use tokio::runtime::Handle;

pub struct GameWorld {
    store: EntityStore,
    catalog: Arc<Catalog>,
    balance: Balance,
    channels: Arc<MapChannels>,
    scheduler: RespawnScheduler,
}

impl GameWorld {
    /// An empty world. Respawn timers run on `runtime`.
    pub fn new(catalog: Catalog, balance: Balance, runtime: Handle) -> Self {
        Self {
            store: EntityStore::new(),
            catalog: Arc::new(catalog),
            balance,
            channels: Arc::new(MapChannels::new()),
            scheduler: RespawnScheduler::new(runtime),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    pub fn channels(&self) -> &MapChannels {
        &self.channels
    }

    pub fn scheduler(&self) -> &RespawnScheduler {
        &self.scheduler
    }

    fn map(&self, map_id: MapId) -> GameResult<&MapDefinition> {
        self.catalog
            .map(map_id)
            .ok_or(GameError::NotFound(Missing::Map(map_id)))
    }

    fn rules(&self) -> CombatRules<'_> {
        CombatRules {
            catalog: &self.catalog,
            balance: &self.balance,
        }
    }

    /// Places one monster on every spawn point of every map.
    pub fn spawn_monsters(&self) -> usize {
        let mut spawned = 0;
        for map in &self.catalog.maps {
            for spawn in &map.monster_spawns {
                let Some(template) = self.catalog.monster(spawn.template_id) else {
                    warn!(
                        "Map {} references unknown monster template {}",
                        map.id, spawn.template_id
                    );
                    continue;
                };
                let id = self.store.next_monster_id();
                self.store
                    .insert_monster(Monster::new(id, map.id, template, spawn.position));
                spawned += 1;
            }
        }
        info!("Spawned {} monsters", spawned);
        spawned
    }

    /// Inserts a character record directly, bypassing connection handling.
    pub fn insert_character(&self, character: Character) -> CharacterView {
        let handle = self.store.insert_character(character);
        let view = handle.lock().view();
        view
    }

    pub fn insert_monster(&self, monster: Monster) -> MonsterView {
        let handle = self.store.insert_monster(monster);
        let view = handle.lock().view();
        view
    }

    pub fn character_view(&self, id: CharacterId) -> GameResult<CharacterView> {
        let handle = self.store.character(id)?;
        let view = handle.lock().view();
        Ok(view)
    }

    pub fn monster_view(&self, id: MonsterId) -> GameResult<MonsterView> {
        let handle = self.store.monster(id)?;
        let view = handle.lock().view();
        Ok(view)
    }

    /// Attaches a connection to its character, creating a fresh level 1
    /// character on the starting map the first time the id is seen, and joins
    /// the character's current map.
    pub fn connect_character(
        &self,
        id: CharacterId,
        name: &str,
        outbox: Outbox,
    ) -> GameResult<(CharacterView, MapSnapshot)> {
        if !self.store.contains_character(id) {
            let start = self
                .catalog
                .starting_map()
                .ok_or(GameError::NotFound(Missing::Map(0)))?;
            let name = display_name(id, name);
            let character = Character::new(
                id,
                u64::from(id),
                name.as_str(),
                start.id,
                start.spawn,
                &self.balance,
            );
            self.store.insert_character(character);
            info!("Created character {} ({}) on map {}", id, name, start.id);
        }

        let view = self.character_view(id)?;
        let snapshot = self.enter_map(view.clone(), outbox);
        info!("Character {} connected on map {}", id, view.map_id);
        Ok((view, snapshot))
    }

    /// Removes the character's presence. Its record stays for the next
    /// connection.
    pub fn disconnect_character(&self, id: CharacterId) -> GameResult<bool> {
        let handle = self.store.character(id)?;
        let map_id = handle.lock().map_id;
        let left = self.channels.leave(map_id, id);
        info!("Character {} disconnected", id);
        Ok(left)
    }

    // Must be called without holding any character lock.
    fn enter_map(&self, view: CharacterView, outbox: Outbox) -> MapSnapshot {
        let map_id = view.map_id;
        let viewer = view.id;
        let joined = self.channels.join(map_id, view, outbox);
        debug!(
            "Character {} sees {} others on map {}",
            viewer,
            joined.others.len(),
            map_id
        );
        self.snapshot_for(map_id, &joined.others)
    }

    fn snapshot_for(&self, map_id: MapId, others: &[CharacterId]) -> MapSnapshot {
        let characters = others
            .iter()
            .filter_map(|id| self.store.character(*id).ok())
            .map(|handle| handle.lock().view())
            .collect();

        MapSnapshot {
            map_id,
            characters,
            monsters: self.store.monsters_on_map(map_id),
        }
    }

    /// Presence on the character's current map. Joining a map the character
    /// is not on is rejected.
    pub fn join_map(
        &self,
        id: CharacterId,
        map_id: MapId,
        outbox: Outbox,
    ) -> GameResult<MapSnapshot> {
        self.map(map_id)?;
        let view = self.character_view(id)?;
        if view.map_id != map_id {
            return Err(GameError::InvalidState(Conflict::WrongMap {
                current: view.map_id,
                requested: map_id,
            }));
        }
        Ok(self.enter_map(view, outbox))
    }

    pub fn leave_map(&self, id: CharacterId, map_id: MapId) -> GameResult<bool> {
        self.store.character(id)?;
        Ok(self.channels.leave(map_id, id))
    }

    pub fn move_character(&self, id: CharacterId, x: f32, y: f32) -> GameResult<Vec2> {
        let handle = self.store.character(id)?;
        let mut character = handle.lock();
        let map = self.map(character.map_id)?;
        let monsters = self.store.monster_obstacles(map.id);

        let position = attempt_move(&mut character, map, &monsters, Vec2::new(x, y), &self.balance)?;
        debug!(
            "Character {} moved to ({:.1}, {:.1})",
            id, position.x, position.y
        );
        self.channels.publish(
            map.id,
            DomainEvent::CharacterMoved {
                character_id: id,
                position,
            },
            Some(id),
        );
        Ok(position)
    }

    pub fn attack(
        &self,
        id: CharacterId,
        monster_id: MonsterId,
        skill_id: Option<SkillId>,
    ) -> GameResult<AttackOutcome> {
        let character_handle = self.store.character(id)?;
        let mut character = character_handle.lock();
        character.ensure_alive()?;

        let monster_handle = self.store.monster(monster_id)?;
        let mut monster = monster_handle.lock();

        let resolution = resolve_attack(
            &self.rules(),
            &mut character,
            &mut monster,
            skill_id,
            now_millis(),
            &mut rand::thread_rng(),
        )?;

        let map_id = character.map_id;
        for event in resolution.events {
            self.channels.publish(map_id, event, None);
        }

        if let Some(respawn_at) = resolution.monster_respawn_at {
            self.schedule_monster_respawn(Arc::clone(&monster_handle), map_id, respawn_at);
        }
        if let Some(respawn_at) = resolution.character_respawn_at {
            self.schedule_character_respawn(Arc::clone(&character_handle), map_id, respawn_at);
        }

        Ok(resolution.outcome)
    }

    pub fn heal(&self, id: CharacterId, skill_id: SkillId) -> GameResult<CharacterView> {
        let handle = self.store.character(id)?;
        let mut character = handle.lock();
        let healed = resolve_heal(&self.rules(), &mut character, skill_id, &mut rand::thread_rng())?;
        debug!("Character {} healed for {}", id, healed.amount);
        self.channels.publish(character.map_id, healed.event, None);
        Ok(character.view())
    }

    /// Moves the character to another map: leaves the old channel, places the
    /// character at the arrival point and joins the new channel.
    pub fn change_map(
        &self,
        id: CharacterId,
        target_map: MapId,
        outbox: Outbox,
    ) -> GameResult<(Vec2, MapSnapshot)> {
        let target = self.map(target_map)?;
        let handle = self.store.character(id)?;

        let view = {
            let mut character = handle.lock();
            character.ensure_alive()?;
            if character.level < target.min_level {
                return Err(GameError::LevelTooLow {
                    required: target.min_level,
                    actual: character.level,
                });
            }

            let previous = character.map_id;
            if previous != target_map {
                character.position = self
                    .catalog
                    .map(previous)
                    .map_or(target.spawn, |from| target.arrival_from(from));
                character.map_id = target_map;
                self.channels.leave(previous, id);
                info!(
                    "Character {} changed map {} -> {}",
                    id, previous, target_map
                );
            }
            character.view()
        };

        let position = view.position;
        Ok((position, self.enter_map(view, outbox)))
    }

    pub fn equip(&self, id: CharacterId, item: Equipment) -> GameResult<CharacterView> {
        let handle = self.store.character(id)?;
        let mut character = handle.lock();
        character.equip(item)?;
        Ok(character.view())
    }

    pub fn unequip(&self, id: CharacterId, slot: EquipSlot) -> GameResult<(Equipment, CharacterView)> {
        let handle = self.store.character(id)?;
        let mut character = handle.lock();
        let item = character.unequip(slot)?;
        Ok((item, character.view()))
    }

    fn schedule_monster_respawn(&self, monster: SharedMonster, map_id: MapId, respawn_at: u64) {
        let channels = Arc::clone(&self.channels);
        self.scheduler.schedule(map_id, respawn_at, move || {
            revive_monster(&monster, &channels, respawn_at);
        });
    }

    fn schedule_character_respawn(
        &self,
        character: SharedCharacter,
        map_id: MapId,
        respawn_at: u64,
    ) {
        let channels = Arc::clone(&self.channels);
        let catalog = Arc::clone(&self.catalog);
        self.scheduler.schedule(map_id, respawn_at, move || {
            revive_character(&character, &catalog, &channels, respawn_at);
        });
    }

    /// Brings entities restored from a snapshot back in line with the clock:
    /// respawns that elapsed while the server was down happen now, the rest
    /// are scheduled. Returns how many entities were revived immediately.
    pub fn recover_respawns(&self, now: u64) -> usize {
        let mut revived = 0;

        for handle in self.store.all_monsters() {
            let pending = {
                let monster = handle.lock();
                monster.life.respawn_at().map(|at| (monster.map_id, at))
            };
            let Some((map_id, respawn_at)) = pending else {
                continue;
            };
            if respawn_at <= now {
                if revive_monster(&handle, &self.channels, respawn_at) {
                    revived += 1;
                }
            } else {
                self.schedule_monster_respawn(handle, map_id, respawn_at);
            }
        }

        for handle in self.store.all_characters() {
            let pending = {
                let character = handle.lock();
                character.life.respawn_at().map(|at| (character.map_id, at))
            };
            let Some((map_id, respawn_at)) = pending else {
                continue;
            };
            if respawn_at <= now {
                if revive_character(&handle, &self.catalog, &self.channels, respawn_at) {
                    revived += 1;
                }
            } else {
                self.schedule_character_respawn(handle, map_id, respawn_at);
            }
        }

        info!("Recovered respawns: {} revived on load", revived);
        revived
    }

    /// Cancels the map's pending respawns and drops its presence.
    pub fn unload_map(&self, map_id: MapId) -> usize {
        let cancelled = self.scheduler.cancel_map(map_id);
        let dropped = self.channels.unload(map_id);
        info!(
            "Unloaded map {}: {} timers cancelled, {} subscribers dropped",
            map_id, cancelled, dropped
        );
        cancelled
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            saved_at: now_millis(),
            characters: self
                .store
                .all_characters()
                .iter()
                .map(|handle| handle.lock().clone())
                .collect(),
            monsters: self
                .store
                .all_monsters()
                .iter()
                .map(|handle| handle.lock().clone())
                .collect(),
        }
    }

    /// Loads entities from a snapshot and recovers their respawns.
    pub fn restore(&self, snapshot: WorldSnapshot) -> usize {
        for character in snapshot.characters {
            self.store.insert_character(character);
        }
        for monster in snapshot.monsters {
            self.store.insert_monster(monster);
        }
        self.recover_respawns(now_millis())
    }

    pub fn character_count(&self) -> usize {
        self.store.character_count()
    }

    pub fn monster_count(&self) -> usize {
        self.store.monster_count()
    }
}

/// Trims the requested name and cuts it to `MAX_NAME_LEN` bytes on a char
/// boundary. Blank names get a generated one.
fn display_name(id: CharacterId, requested: &str) -> String {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return format!("Hero {}", id);
    }

    let mut end = trimmed.len().min(MAX_NAME_LEN);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    if end < trimmed.len() {
        debug!("Character {} name cut to {} bytes", id, end);
    }
    trimmed[..end].trim_end().to_string()
}

fn revive_monster(monster: &Mutex<Monster>, channels: &MapChannels, respawn_at: u64) -> bool {
    let mut monster = monster.lock();
    if !monster.revive(respawn_at) {
        debug!("Ignoring stale respawn for monster {}", monster.id);
        return false;
    }
    info!("{} {} respawned on map {}", monster.name, monster.id, monster.map_id);
    channels.publish(
        monster.map_id,
        DomainEvent::MonsterRespawned(monster.view()),
        None,
    );
    true
}

fn revive_character(
    character: &Mutex<Character>,
    catalog: &Catalog,
    channels: &MapChannels,
    respawn_at: u64,
) -> bool {
    let mut character = character.lock();
    if character.life != (LifeState::Dead { respawn_at }) {
        debug!("Ignoring stale respawn for character {}", character.id);
        return false;
    }

    let spawn = catalog
        .map(character.map_id)
        .map_or(character.position, |map| map.spawn);
    character.revive(spawn);
    info!("Character {} respawned on map {}", character.id, character.map_id);
    channels.publish(
        character.map_id,
        DomainEvent::CharacterRespawned {
            character_id: character.id,
            position: character.position,
            hp: character.hp,
            max_hp: character.max_hp(),
            mp: character.mp,
            max_mp: character.max_mp(),
        },
        None,
    );
    true
}
