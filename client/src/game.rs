//! Client-side game state: the local character, its predicted position and
//! the remote copy of the map it is on.

use crate::dedup::EventDeduplicator;
use crate::prediction::{Correction, MovementPredictor};
use crate::reconcile::RemoteWorld;
use log::{debug, info, warn};
use shared::content::{Catalog, MapDefinition, SkillEffect};
use shared::{
    Balance, CharacterView, DomainEvent, EntityRef, EventEnvelope, MapId, MonsterId, Packet,
    SkillId, Vec2,
};
use std::collections::VecDeque;

const LOG_LINES: usize = 6;

pub struct ClientGameState {
    catalog: Catalog,
    balance: Balance,
    character: Option<CharacterView>,
    predictor: MovementPredictor,
    remote: RemoteWorld,
    dedup: EventDeduplicator,
    next_sequence: u32,
    target: Option<MonsterId>,
    log: VecDeque<String>,
}

impl ClientGameState {
    pub fn new(catalog: Catalog, balance: Balance) -> Self {
        Self {
            catalog,
            balance,
            character: None,
            predictor: MovementPredictor::new(Vec2::ZERO),
            remote: RemoteWorld::new(),
            dedup: EventDeduplicator::default(),
            next_sequence: 1,
            target: None,
            log: VecDeque::with_capacity(LOG_LINES),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.character.is_some()
    }

    pub fn character(&self) -> Option<&CharacterView> {
        self.character.as_ref()
    }

    /// Where the local character is drawn: the predicted position.
    pub fn own_position(&self) -> Vec2 {
        self.predictor.position()
    }

    pub fn remote(&self) -> &RemoteWorld {
        &self.remote
    }

    pub fn map(&self) -> Option<&MapDefinition> {
        self.character
            .as_ref()
            .and_then(|character| self.catalog.map(character.map_id))
    }

    pub fn target(&self) -> Option<MonsterId> {
        self.target
    }

    pub fn log_lines(&self) -> impl Iterator<Item = &String> {
        self.log.iter()
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    fn next_sequence(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        sequence
    }

    fn own_id(&self) -> Option<u32> {
        self.character.as_ref().map(|character| character.id)
    }

    fn can_act(&self) -> bool {
        self.character.as_ref().is_some_and(|character| character.alive)
    }

    pub fn handle_packet(&mut self, packet: Packet, now: u64) {
        match packet {
            Packet::Connected { character } => {
                info!(
                    "Connected as {} (#{}) on map {}",
                    character.name, character.id, character.map_id
                );
                self.predictor.reset(character.position);
                self.character = Some(character);
            }

            Packet::MapJoined { snapshot } => {
                debug!(
                    "Joined map {}: {} characters, {} monsters",
                    snapshot.map_id,
                    snapshot.characters.len(),
                    snapshot.monsters.len()
                );
                self.remote.apply_snapshot(snapshot, now);
            }

            Packet::MapChanged { position, snapshot } => {
                let map_id = snapshot.map_id;
                if let Some(character) = self.character.as_mut() {
                    character.map_id = map_id;
                    character.position = position;
                }
                self.predictor.reset(position);
                self.target = None;
                self.remote.apply_snapshot(snapshot, now);
                self.push_log(format!("Entered map {}", map_id));
            }

            Packet::MoveConfirmed { sequence, position } => {
                match self.predictor.confirm(sequence, position) {
                    Correction::Snapped { from, to } => {
                        debug!(
                            "Move {} corrected by {:.1} units",
                            sequence,
                            from.distance(to)
                        );
                    }
                    Correction::Kept | Correction::Stale => {}
                }
                if let Some(character) = self.character.as_mut() {
                    character.position = self.predictor.position();
                }
            }

            Packet::AttackResolved { outcome, .. } => {
                let line = if outcome.killed {
                    match &outcome.reward {
                        Some(reward) => format!(
                            "Defeated monster #{}: +{} exp, +{} gold",
                            outcome.monster_id, reward.experience, reward.gold
                        ),
                        None => format!("Defeated monster #{}", outcome.monster_id),
                    }
                } else {
                    format!(
                        "Hit monster #{} for {} ({} hp left)",
                        outcome.monster_id, outcome.damage, outcome.monster_hp
                    )
                };
                self.push_log(line);
                if outcome.killed && self.target == Some(outcome.monster_id) {
                    self.target = None;
                }
                self.update_own(outcome.attacker);
            }

            Packet::Healed { character, .. } => {
                self.push_log(format!("Healed to {}/{} hp", character.hp, character.max_hp));
                self.update_own(character);
            }

            Packet::CommandFailed { sequence, error } => {
                if let Some(sequence) = sequence {
                    if self.predictor.reject(sequence) {
                        debug!("Move {} rejected, reverted prediction", sequence);
                    }
                }
                warn!("Command failed: {}", error);
                self.push_log(error.to_string());
            }

            Packet::Event(envelope) => {
                self.apply_event(&envelope, now);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.character = None;
                self.target = None;
                self.remote.clear();
                self.push_log(format!("Disconnected: {}", reason));
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Server views replace the local one but keep the predicted position.
    fn update_own(&mut self, mut view: CharacterView) {
        view.position = self.predictor.position();
        self.character = Some(view);
    }

    /// Applies an event from the map channel. Returns false when it was a
    /// duplicate, from another map, or about something not known locally.
    pub fn apply_event(&mut self, envelope: &EventEnvelope, now: u64) -> bool {
        if self.character.is_none() || envelope.map_id != self.remote.map_id() {
            return false;
        }
        if !self.dedup.should_apply(&envelope.event, now) {
            debug!("Dropped duplicate {}", envelope.event.kind());
            return false;
        }

        let own_id = self.own_id();
        let about_self = matches!(
            envelope.event.subject(),
            EntityRef::Character(id) if Some(id) == own_id
        );
        if about_self {
            return self.apply_own_event(&envelope.event);
        }

        self.remote.apply_event(&envelope.event, now)
    }

    fn apply_own_event(&mut self, event: &DomainEvent) -> bool {
        let Some(character) = self.character.as_mut() else {
            return false;
        };

        match event {
            // Presence and movement of ourselves are already known locally.
            DomainEvent::CharacterEntered(_)
            | DomainEvent::CharacterLeft { .. }
            | DomainEvent::CharacterMoved { .. } => return false,
            DomainEvent::CharacterLeveled {
                level,
                hp,
                max_hp,
                mp,
                max_mp,
                ..
            } => {
                character.level = *level;
                character.hp = *hp;
                character.max_hp = *max_hp;
                character.mp = *mp;
                character.max_mp = *max_mp;
                let line = format!("Reached level {}", level);
                self.push_log(line);
            }
            DomainEvent::CharacterDamaged { hp, max_hp, .. } => {
                character.hp = *hp;
                character.max_hp = *max_hp;
            }
            DomainEvent::CharacterHealed { hp, max_hp, mp, .. } => {
                character.hp = *hp;
                character.max_hp = *max_hp;
                character.mp = *mp;
            }
            DomainEvent::CharacterDied { .. } => {
                character.hp = 0;
                character.alive = false;
                self.target = None;
                self.push_log("You died".to_string());
            }
            DomainEvent::CharacterRespawned {
                position,
                hp,
                max_hp,
                mp,
                max_mp,
                ..
            } => {
                character.position = *position;
                character.hp = *hp;
                character.max_hp = *max_hp;
                character.mp = *mp;
                character.max_mp = *max_mp;
                character.alive = true;
                let position = *position;
                self.predictor.reset(position);
            }
            _ => return false,
        }
        true
    }

    /// Predicts a move towards `target` and returns the intent to send.
    pub fn move_to(&mut self, target: Vec2) -> Option<Packet> {
        if !self.can_act() {
            return None;
        }
        let map = self.map()?.clone();
        let obstacles = self.remote.monster_obstacles();
        let sequence = self.next_sequence();
        Some(
            self.predictor
                .predict(sequence, target, &map, &obstacles, &self.balance),
        )
    }

    pub fn attack(&mut self, monster_id: MonsterId, skill_id: Option<SkillId>) -> Option<Packet> {
        if !self.can_act() {
            return None;
        }
        self.target = Some(monster_id);
        Some(Packet::Attack {
            sequence: self.next_sequence(),
            monster_id,
            skill_id,
        })
    }

    /// A click attacks the living monster under it, otherwise moves there.
    pub fn click(&mut self, point: Vec2) -> Option<Packet> {
        let monster_id = self.remote.monster_at(point).map(|monster| monster.view.id);
        match monster_id {
            Some(monster_id) => self.attack(monster_id, None),
            None => self.move_to(point),
        }
    }

    /// Uses the first strike skill the character knows on the current target.
    pub fn strike(&mut self) -> Option<Packet> {
        let target = self.target?;
        let level = self.character.as_ref()?.level;
        let skill_id = self
            .catalog
            .skills
            .iter()
            .filter(|skill| skill.min_level <= level)
            .find(|skill| matches!(skill.effect, SkillEffect::Strike { .. }))
            .map(|skill| skill.id)?;
        self.attack(target, Some(skill_id))
    }

    pub fn mend(&mut self) -> Option<Packet> {
        if !self.can_act() {
            return None;
        }
        let skill_id = self
            .catalog
            .skills
            .iter()
            .find(|skill| matches!(skill.effect, SkillEffect::Mend { .. }))
            .map(|skill| skill.id)?;
        Some(Packet::Heal {
            sequence: self.next_sequence(),
            skill_id,
        })
    }

    /// Requests the map behind the current map's first teleport link.
    pub fn next_map(&self) -> Option<Packet> {
        if !self.can_act() {
            return None;
        }
        let target_map: MapId = self.map()?.teleports.first()?.target_map;
        Some(Packet::ChangeMap { target_map })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MapSnapshot, MonsterView};

    fn view(id: u32, position: Vec2) -> CharacterView {
        CharacterView {
            id,
            name: format!("Hero{}", id),
            map_id: 1,
            position,
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

    fn slime(id: u32, position: Vec2) -> MonsterView {
        MonsterView {
            id,
            template_id: 1,
            name: "Slime".to_string(),
            map_id: 1,
            position,
            radius: 24.0,
            hp: 30,
            max_hp: 30,
            alive: true,
            respawn_at: None,
        }
    }

    fn envelope(event: DomainEvent) -> EventEnvelope {
        EventEnvelope {
            map_id: 1,
            issued_at: 0,
            event,
        }
    }

    fn connected_state() -> ClientGameState {
        let mut game = ClientGameState::new(Catalog::demo(), Balance::default());
        game.handle_packet(
            Packet::Connected {
                character: view(1, Vec2::new(200.0, 200.0)),
            },
            0,
        );
        game.handle_packet(
            Packet::MapJoined {
                snapshot: MapSnapshot {
                    map_id: 1,
                    characters: vec![view(2, Vec2::new(800.0, 800.0))],
                    monsters: vec![slime(10, Vec2::new(250.0, 200.0))],
                },
            },
            0,
        );
        game
    }

    #[test]
    fn test_connect_and_join() {
        let game = connected_state();
        assert!(game.is_connected());
        assert_eq!(game.own_position(), Vec2::new(200.0, 200.0));
        assert_eq!(game.remote().character_count(), 1);
        assert_eq!(game.remote().monster_count(), 1);
    }

    #[test]
    fn test_reconnect_duplicate_self_entered_is_dropped() {
        let mut game = connected_state();
        let entered = envelope(DomainEvent::CharacterEntered(view(1, Vec2::new(200.0, 200.0))));

        assert!(!game.apply_event(&entered, 100));
        assert!(!game.apply_event(&entered, 200));
        assert_eq!(game.remote().character_count(), 1);
        assert!(game.remote().character(1).is_none());
    }

    #[test]
    fn test_duplicate_remote_event_is_dropped() {
        let mut game = connected_state();
        let entered = envelope(DomainEvent::CharacterEntered(view(3, Vec2::new(10.0, 10.0))));

        assert!(game.apply_event(&entered, 100));
        assert!(!game.apply_event(&entered, 150));
        assert_eq!(game.remote().character_count(), 2);
    }

    #[test]
    fn test_same_hit_after_heal_reaches_remote() {
        let mut game = connected_state();
        let hit = envelope(DomainEvent::CharacterDamaged {
            character_id: 2,
            source: Some(10),
            damage: 2,
            hp: 98,
            max_hp: 100,
        });
        let healed = envelope(DomainEvent::CharacterHealed {
            character_id: 2,
            amount: 2,
            hp: 100,
            max_hp: 100,
            mp: 45,
        });

        assert!(game.apply_event(&hit, 100));
        assert!(game.apply_event(&healed, 600));
        assert!(game.apply_event(&hit, 1_100));

        let remote = game.remote().character(2).unwrap();
        assert_eq!(remote.view.hp, 98);
    }

    #[test]
    fn test_event_for_other_map_is_ignored() {
        let mut game = connected_state();
        let mut other = envelope(DomainEvent::CharacterLeft { character_id: 2 });
        other.map_id = 2;

        assert!(!game.apply_event(&other, 0));
        assert_eq!(game.remote().character_count(), 1);
    }

    #[test]
    fn test_click_on_monster_attacks() {
        let mut game = connected_state();
        match game.click(Vec2::new(255.0, 205.0)) {
            Some(Packet::Attack {
                monster_id,
                skill_id,
                ..
            }) => {
                assert_eq!(monster_id, 10);
                assert_eq!(skill_id, None);
            }
            other => panic!("Expected attack, got {:?}", other),
        }
        assert_eq!(game.target(), Some(10));

        match game.strike() {
            Some(Packet::Attack { skill_id, .. }) => assert_eq!(skill_id, Some(1)),
            other => panic!("Expected skill attack, got {:?}", other),
        }
    }

    #[test]
    fn test_click_on_ground_predicts_move() {
        let mut game = connected_state();
        let packet = game.click(Vec2::new(200.0, 300.0));

        assert!(matches!(packet, Some(Packet::MoveCharacter { .. })));
        assert_eq!(game.own_position(), Vec2::new(200.0, 300.0));
    }

    #[test]
    fn test_sequences_increase_across_intent_kinds() {
        let mut game = connected_state();
        let first = game.move_to(Vec2::new(210.0, 300.0));
        let second = game.mend();
        let third = game.attack(10, None);

        let sequences: Vec<u32> = [first, second, third]
            .into_iter()
            .flatten()
            .filter_map(|packet| packet.intent_sequence())
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_death_blocks_intents_until_respawn() {
        let mut game = connected_state();
        assert!(game.apply_event(
            &envelope(DomainEvent::CharacterDied {
                character_id: 1,
                respawn_at: 5_000,
            }),
            0,
        ));
        assert!(game.move_to(Vec2::new(300.0, 300.0)).is_none());

        assert!(game.apply_event(
            &envelope(DomainEvent::CharacterRespawned {
                character_id: 1,
                position: Vec2::new(200.0, 200.0),
                hp: 100,
                max_hp: 100,
                mp: 50,
                max_mp: 50,
            }),
            5_000,
        ));
        assert!(game.character().unwrap().alive);
        assert!(game.move_to(Vec2::new(300.0, 300.0)).is_some());
    }

    #[test]
    fn test_map_change_resets_position() {
        let mut game = connected_state();
        assert!(matches!(
            game.next_map(),
            Some(Packet::ChangeMap { target_map: 2 })
        ));

        game.handle_packet(
            Packet::MapChanged {
                position: Vec2::new(150.0, 500.0),
                snapshot: MapSnapshot {
                    map_id: 2,
                    characters: vec![],
                    monsters: vec![],
                },
            },
            0,
        );

        assert_eq!(game.own_position(), Vec2::new(150.0, 500.0));
        assert_eq!(game.character().unwrap().map_id, 2);
        assert_eq!(game.remote().map_id(), 2);
        assert_eq!(game.remote().character_count(), 0);
    }

    #[test]
    fn test_rejected_move_reverts() {
        let mut game = connected_state();
        let packet = game.move_to(Vec2::new(200.0, 300.0)).unwrap();
        let sequence = packet.intent_sequence();

        game.handle_packet(
            Packet::CommandFailed {
                sequence,
                error: shared::GameError::InvalidState(shared::Conflict::CharacterDead),
            },
            0,
        );

        assert_eq!(game.own_position(), Vec2::new(200.0, 200.0));
    }
}
