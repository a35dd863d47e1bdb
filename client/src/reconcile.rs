//! The client's copy of everything on the current map except itself.
//!
//! Snapshots replace the copy wholesale; events then update it one entity
//! at a time. Events always carry resulting values, so applying the same
//! event twice leaves the same state as applying it once. Remote movement is
//! interpolated at a fixed speed instead of teleporting.

use shared::{
    CharacterId, CharacterView, Circle, DomainEvent, MapId, MapSnapshot, MonsterId, MonsterView,
    Vec2, INTERPOLATION_SPEED,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Motion {
    from: Vec2,
    to: Vec2,
    started_at: u64,
    duration_ms: u64,
}

impl Motion {
    fn at_rest(position: Vec2, now: u64) -> Self {
        Self {
            from: position,
            to: position,
            started_at: now,
            duration_ms: 0,
        }
    }

    fn position_at(&self, now: u64) -> Vec2 {
        if self.duration_ms == 0 {
            return self.to;
        }
        let elapsed = now.saturating_sub(self.started_at) as f32;
        self.from.lerp(self.to, elapsed / self.duration_ms as f32)
    }

    /// Starts a new leg from wherever the entity is drawn right now.
    fn retarget(&mut self, to: Vec2, now: u64) {
        let from = self.position_at(now);
        let distance = from.distance(to);
        self.from = from;
        self.to = to;
        self.started_at = now;
        self.duration_ms = (distance / INTERPOLATION_SPEED * 1000.0) as u64;
    }
}

#[derive(Debug, Clone)]
pub struct RemoteCharacter {
    pub view: CharacterView,
    motion: Motion,
}

impl RemoteCharacter {
    fn new(view: CharacterView, now: u64) -> Self {
        let motion = Motion::at_rest(view.position, now);
        Self { view, motion }
    }

    /// Interpolated position for rendering.
    pub fn position_at(&self, now: u64) -> Vec2 {
        self.motion.position_at(now)
    }
}

#[derive(Debug, Clone)]
pub struct RemoteMonster {
    pub view: MonsterView,
}

impl RemoteMonster {
    pub fn circle(&self) -> Circle {
        Circle::new(self.view.position, self.view.radius)
    }
}

#[derive(Debug, Default)]
pub struct RemoteWorld {
    map_id: MapId,
    characters: HashMap<CharacterId, RemoteCharacter>,
    monsters: HashMap<MonsterId, RemoteMonster>,
}

impl RemoteWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_id(&self) -> MapId {
        self.map_id
    }

    pub fn apply_snapshot(&mut self, snapshot: MapSnapshot, now: u64) {
        self.map_id = snapshot.map_id;
        self.characters = snapshot
            .characters
            .into_iter()
            .map(|view| (view.id, RemoteCharacter::new(view, now)))
            .collect();
        self.monsters = snapshot
            .monsters
            .into_iter()
            .map(|view| (view.id, RemoteMonster { view }))
            .collect();
    }

    pub fn clear(&mut self) {
        self.characters.clear();
        self.monsters.clear();
    }

    /// Applies an event about a remote entity. Returns false when the event
    /// refers to something this copy cannot place, e.g. damage to a monster
    /// it has never seen.
    pub fn apply_event(&mut self, event: &DomainEvent, now: u64) -> bool {
        match event {
            DomainEvent::CharacterEntered(view) => {
                match self.characters.get_mut(&view.id) {
                    Some(existing) => {
                        existing.motion = Motion::at_rest(view.position, now);
                        existing.view = view.clone();
                    }
                    None => {
                        self.characters
                            .insert(view.id, RemoteCharacter::new(view.clone(), now));
                    }
                }
                true
            }
            DomainEvent::CharacterLeft { character_id } => {
                self.characters.remove(character_id);
                true
            }
            DomainEvent::CharacterMoved {
                character_id,
                position,
            } => {
                match self.characters.get_mut(character_id) {
                    Some(character) => {
                        character.view.position = *position;
                        character.motion.retarget(*position, now);
                    }
                    None => {
                        // Moved before we saw it enter: show it until a
                        // snapshot fills in the rest.
                        let view = placeholder_character(*character_id, self.map_id, *position);
                        self.characters
                            .insert(*character_id, RemoteCharacter::new(view, now));
                    }
                }
                true
            }
            DomainEvent::CharacterLeveled {
                character_id,
                level,
                hp,
                max_hp,
                mp,
                max_mp,
            } => self.update_character(*character_id, |view| {
                view.level = *level;
                view.hp = *hp;
                view.max_hp = *max_hp;
                view.mp = *mp;
                view.max_mp = *max_mp;
            }),
            DomainEvent::CharacterDamaged {
                character_id,
                hp,
                max_hp,
                ..
            } => self.update_character(*character_id, |view| {
                view.hp = *hp;
                view.max_hp = *max_hp;
            }),
            DomainEvent::CharacterHealed {
                character_id,
                hp,
                max_hp,
                mp,
                ..
            } => self.update_character(*character_id, |view| {
                view.hp = *hp;
                view.max_hp = *max_hp;
                view.mp = *mp;
            }),
            DomainEvent::CharacterDied { character_id, .. } => {
                self.update_character(*character_id, |view| {
                    view.hp = 0;
                    view.alive = false;
                })
            }
            DomainEvent::CharacterRespawned {
                character_id,
                position,
                hp,
                max_hp,
                mp,
                max_mp,
            } => {
                let Some(character) = self.characters.get_mut(character_id) else {
                    return false;
                };
                character.view.position = *position;
                character.view.hp = *hp;
                character.view.max_hp = *max_hp;
                character.view.mp = *mp;
                character.view.max_mp = *max_mp;
                character.view.alive = true;
                character.motion = Motion::at_rest(*position, now);
                true
            }
            DomainEvent::MonsterDamaged {
                monster_id,
                hp,
                max_hp,
                ..
            } => self.update_monster(*monster_id, |view| {
                view.hp = *hp;
                view.max_hp = *max_hp;
            }),
            DomainEvent::MonsterKilled { monster_id, .. } => {
                self.update_monster(*monster_id, |view| {
                    view.hp = 0;
                    view.alive = false;
                })
            }
            DomainEvent::MonsterRespawning {
                monster_id,
                respawn_at,
            } => self.update_monster(*monster_id, |view| {
                view.alive = false;
                view.respawn_at = Some(*respawn_at);
            }),
            DomainEvent::MonsterRespawned(view) => {
                self.monsters
                    .insert(view.id, RemoteMonster { view: view.clone() });
                true
            }
        }
    }

    fn update_character(
        &mut self,
        id: CharacterId,
        update: impl FnOnce(&mut CharacterView),
    ) -> bool {
        match self.characters.get_mut(&id) {
            Some(character) => {
                update(&mut character.view);
                true
            }
            None => false,
        }
    }

    fn update_monster(&mut self, id: MonsterId, update: impl FnOnce(&mut MonsterView)) -> bool {
        match self.monsters.get_mut(&id) {
            Some(monster) => {
                update(&mut monster.view);
                true
            }
            None => false,
        }
    }

    pub fn character(&self, id: CharacterId) -> Option<&RemoteCharacter> {
        self.characters.get(&id)
    }

    pub fn monster(&self, id: MonsterId) -> Option<&RemoteMonster> {
        self.monsters.get(&id)
    }

    /// Characters sorted by id.
    pub fn characters(&self) -> Vec<&RemoteCharacter> {
        let mut characters: Vec<_> = self.characters.values().collect();
        characters.sort_by_key(|character| character.view.id);
        characters
    }

    /// Monsters sorted by id.
    pub fn monsters(&self) -> Vec<&RemoteMonster> {
        let mut monsters: Vec<_> = self.monsters.values().collect();
        monsters.sort_by_key(|monster| monster.view.id);
        monsters
    }

    /// Bodies of living monsters, for local collision prediction.
    pub fn monster_obstacles(&self) -> Vec<Circle> {
        self.monsters
            .values()
            .filter(|monster| monster.view.alive)
            .map(RemoteMonster::circle)
            .collect()
    }

    /// The living monster whose body contains `point`, if any.
    pub fn monster_at(&self, point: Vec2) -> Option<&RemoteMonster> {
        self.monsters().into_iter().find(|monster| {
            monster.view.alive && monster.view.position.distance(point) <= monster.view.radius
        })
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    pub fn monster_count(&self) -> usize {
        self.monsters.len()
    }
}

fn placeholder_character(id: CharacterId, map_id: MapId, position: Vec2) -> CharacterView {
    CharacterView {
        id,
        name: format!("#{}", id),
        map_id,
        position,
        level: 1,
        experience: 0,
        experience_to_level: 0,
        hp: 1,
        max_hp: 1,
        mp: 0,
        max_mp: 0,
        attack: 0,
        defense: 0,
        gold: 0,
        alive: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn character(id: CharacterId, x: f32, y: f32) -> CharacterView {
        CharacterView {
            id,
            name: format!("Hero{}", id),
            map_id: 1,
            position: Vec2::new(x, y),
            level: 1,
            experience: 0,
            experience_to_level: 100,
            hp: 100,
            max_hp: 100,
            mp: 50,
            max_mp: 50,
            attack: 10,
            defense: 2,
            gold: 0,
            alive: true,
        }
    }

    fn monster(id: MonsterId, hp: u32) -> MonsterView {
        MonsterView {
            id,
            template_id: 1,
            name: "Slime".to_string(),
            map_id: 1,
            position: Vec2::new(300.0, 300.0),
            radius: 24.0,
            hp,
            max_hp: 30,
            alive: hp > 0,
            respawn_at: None,
        }
    }

    fn world_with(characters: Vec<CharacterView>, monsters: Vec<MonsterView>) -> RemoteWorld {
        let mut world = RemoteWorld::new();
        world.apply_snapshot(
            MapSnapshot {
                map_id: 1,
                characters,
                monsters,
            },
            0,
        );
        world
    }

    #[test]
    fn test_snapshot_replaces_everything() {
        let mut world = world_with(vec![character(2, 0.0, 0.0)], vec![monster(1, 30)]);
        world.apply_snapshot(
            MapSnapshot {
                map_id: 2,
                characters: vec![character(3, 10.0, 10.0)],
                monsters: vec![],
            },
            100,
        );

        assert_eq!(world.map_id(), 2);
        assert!(world.character(2).is_none());
        assert!(world.character(3).is_some());
        assert_eq!(world.monster_count(), 0);
    }

    #[test]
    fn test_enter_and_leave() {
        let mut world = world_with(vec![], vec![]);
        assert!(world.apply_event(&DomainEvent::CharacterEntered(character(5, 1.0, 2.0)), 0));
        assert_eq!(world.character_count(), 1);

        assert!(world.apply_event(&DomainEvent::CharacterLeft { character_id: 5 }, 10));
        assert_eq!(world.character_count(), 0);
    }

    #[test]
    fn test_remote_move_interpolates() {
        let mut world = world_with(vec![character(2, 0.0, 0.0)], vec![]);
        world.apply_event(
            &DomainEvent::CharacterMoved {
                character_id: 2,
                position: Vec2::new(400.0, 0.0),
            },
            1_000,
        );

        let remote = world.character(2).unwrap();
        assert_approx_eq!(remote.position_at(1_000).x, 0.0);
        assert_approx_eq!(remote.position_at(1_500).x, 200.0, 1.0);
        assert_approx_eq!(remote.position_at(5_000).x, 400.0);
        assert_eq!(remote.view.position, Vec2::new(400.0, 0.0));
    }

    #[test]
    fn test_move_of_unknown_character_creates_it() {
        let mut world = world_with(vec![], vec![]);
        world.apply_event(
            &DomainEvent::CharacterMoved {
                character_id: 8,
                position: Vec2::new(50.0, 60.0),
            },
            0,
        );
        assert_eq!(world.character(8).unwrap().view.position, Vec2::new(50.0, 60.0));
    }

    #[test]
    fn test_monster_lifecycle() {
        let mut world = world_with(vec![], vec![monster(1, 30)]);

        world.apply_event(
            &DomainEvent::MonsterDamaged {
                monster_id: 1,
                attacker_id: 2,
                damage: 10,
                hp: 20,
                max_hp: 30,
            },
            0,
        );
        assert_eq!(world.monster(1).unwrap().view.hp, 20);

        world.apply_event(
            &DomainEvent::MonsterKilled {
                monster_id: 1,
                killer_id: 2,
            },
            10,
        );
        world.apply_event(
            &DomainEvent::MonsterRespawning {
                monster_id: 1,
                respawn_at: 10_000,
            },
            10,
        );
        let dead = &world.monster(1).unwrap().view;
        assert!(!dead.alive);
        assert_eq!(dead.respawn_at, Some(10_000));
        assert!(world.monster_obstacles().is_empty());

        world.apply_event(&DomainEvent::MonsterRespawned(monster(1, 30)), 10_000);
        let alive = &world.monster(1).unwrap().view;
        assert!(alive.alive);
        assert_eq!(alive.hp, 30);
        assert_eq!(alive.respawn_at, None);
        assert_eq!(world.monster_obstacles().len(), 1);
    }

    #[test]
    fn test_respawned_twice_equals_once() {
        let mut once = world_with(vec![], vec![monster(1, 0)]);
        let mut twice = world_with(vec![], vec![monster(1, 0)]);
        let event = DomainEvent::MonsterRespawned(monster(1, 30));

        once.apply_event(&event, 0);
        twice.apply_event(&event, 0);
        twice.apply_event(&event, 5);

        assert_eq!(once.monster(1).unwrap().view, twice.monster(1).unwrap().view);
        assert_eq!(once.monster_count(), twice.monster_count());
    }

    #[test]
    fn test_unknown_monster_damage_is_not_applied() {
        let mut world = world_with(vec![], vec![]);
        let applied = world.apply_event(
            &DomainEvent::MonsterDamaged {
                monster_id: 9,
                attacker_id: 1,
                damage: 1,
                hp: 1,
                max_hp: 2,
            },
            0,
        );
        assert!(!applied);
    }

    #[test]
    fn test_character_death_and_respawn() {
        let mut world = world_with(vec![character(2, 10.0, 10.0)], vec![]);
        world.apply_event(
            &DomainEvent::CharacterDied {
                character_id: 2,
                respawn_at: 5_000,
            },
            0,
        );
        assert!(!world.character(2).unwrap().view.alive);

        world.apply_event(
            &DomainEvent::CharacterRespawned {
                character_id: 2,
                position: Vec2::new(200.0, 200.0),
                hp: 100,
                max_hp: 100,
                mp: 50,
                max_mp: 50,
            },
            5_000,
        );
        let remote = world.character(2).unwrap();
        assert!(remote.view.alive);
        assert_eq!(remote.view.hp, 100);
        assert_eq!(remote.position_at(5_000), Vec2::new(200.0, 200.0));
    }

    #[test]
    fn test_monster_at_point() {
        let world = world_with(vec![], vec![monster(1, 30), monster(2, 0)]);
        assert_eq!(world.monster_at(Vec2::new(310.0, 300.0)).map(|m| m.view.id), Some(1));
        assert!(world.monster_at(Vec2::new(100.0, 100.0)).is_none());
    }
}
