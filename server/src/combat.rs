//! Attack and heal resolution.
//!
//! Resolution works on already-locked entities and never touches the
//! network: it validates, mutates, and reports the events and timers the
//! caller must publish and schedule. Any error leaves both entities as they
//! were.

use crate::entity::{Character, Monster};
use log::info;
use rand::Rng;
use shared::content::{Catalog, MonsterTemplate, Skill, SkillEffect};
use shared::protocol::{AttackOutcome, KillReward};
use shared::{
    Balance, Conflict, DomainEvent, GameError, GameResult, Missing, SkillId,
};

/// Read-only rules an attack is resolved against.
pub struct CombatRules<'a> {
    pub catalog: &'a Catalog,
    pub balance: &'a Balance,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: AttackOutcome,
    /// Events in publication order.
    pub events: Vec<DomainEvent>,
    /// Set when the monster died; the scheduler must revive it then.
    pub monster_respawn_at: Option<u64>,
    /// Set when retaliation killed the attacker.
    pub character_respawn_at: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct HealResolution {
    pub amount: u32,
    pub event: DomainEvent,
}

fn roll(rng: &mut impl Rng) -> f32 {
    rng.gen_range(-1.0..=1.0)
}

fn strike_skill<'a>(
    catalog: &'a Catalog,
    character: &Character,
    skill_id: SkillId,
) -> GameResult<&'a Skill> {
    let skill = catalog
        .skill(skill_id)
        .filter(|skill| matches!(skill.effect, SkillEffect::Strike { .. }))
        .ok_or(GameError::NotFound(Missing::Skill(skill_id)))?;
    check_level(skill, character)?;
    Ok(skill)
}

fn check_level(skill: &Skill, character: &Character) -> GameResult<()> {
    if character.level < skill.min_level {
        return Err(GameError::LevelTooLow {
            required: skill.min_level,
            actual: character.level,
        });
    }
    Ok(())
}

/// Resolves one attack of `character` against `monster`.
///
/// Checks run in a fixed order and the first failure wins: attacker alive,
/// target on the same map, target alive, skill known and usable, target in
/// range, enough mp. `now` is the server clock in unix milliseconds.
pub fn resolve_attack(
    rules: &CombatRules<'_>,
    character: &mut Character,
    monster: &mut Monster,
    skill_id: Option<SkillId>,
    now: u64,
    rng: &mut impl Rng,
) -> GameResult<Resolution> {
    character.ensure_alive()?;
    if monster.map_id != character.map_id {
        return Err(GameError::NotFound(Missing::Monster(monster.id)));
    }
    if !monster.is_alive() {
        return Err(GameError::InvalidState(Conflict::TargetAlreadyDead));
    }

    let skill = skill_id
        .map(|id| strike_skill(rules.catalog, character, id))
        .transpose()?;

    let distance = character.position.distance(monster.spawn);
    if distance > rules.balance.attack_radius {
        return Err(GameError::OutOfRange {
            distance,
            range: rules.balance.attack_radius,
        });
    }

    if let Some(skill) = skill {
        character.spend_mp(skill.mp_cost)?;
    }

    let template = rules
        .catalog
        .monster(monster.template_id)
        .cloned()
        .unwrap_or_else(|| fallback_template(monster));

    let base = skill.map_or(character.effective.attack, |skill| {
        skill.power(character.level)
    });
    let damage = rules.balance.vary(base, roll(rng));
    let remaining = monster.take_damage(damage);

    let mut events = Vec::new();
    let mut reward = None;
    let mut retaliation = None;
    let mut monster_respawn_at = None;
    let mut character_respawn_at = None;

    if remaining == 0 {
        let respawn_at = now + template.respawn_delay_ms;
        monster.die(respawn_at);
        monster_respawn_at = Some(respawn_at);
        events.push(DomainEvent::MonsterKilled {
            monster_id: monster.id,
            killer_id: character.id,
        });
        events.push(DomainEvent::MonsterRespawning {
            monster_id: monster.id,
            respawn_at,
        });

        let kill = grant_kill_reward(rules.balance, character, &template, rng);
        info!(
            "Character {} killed {} {} (+{} exp, +{} gold)",
            character.id, monster.name, monster.id, kill.experience, kill.gold
        );
        if kill.levels_gained > 0 {
            info!(
                "Character {} reached level {}",
                character.id, character.level
            );
            events.push(DomainEvent::CharacterLeveled {
                character_id: character.id,
                level: character.level,
                hp: character.hp,
                max_hp: character.max_hp(),
                mp: character.mp,
                max_mp: character.max_mp(),
            });
        }
        reward = Some(kill);
    } else {
        events.push(DomainEvent::MonsterDamaged {
            monster_id: monster.id,
            attacker_id: character.id,
            damage,
            hp: remaining,
            max_hp: monster.max_hp,
        });

        if template.attack > 0 {
            let hit = rules
                .balance
                .vary(template.attack, roll(rng))
                .saturating_sub(character.effective.defense)
                .max(1);
            let hp = character.take_damage(hit);
            retaliation = Some(hit);
            events.push(DomainEvent::CharacterDamaged {
                character_id: character.id,
                source: Some(monster.id),
                damage: hit,
                hp,
                max_hp: character.max_hp(),
            });

            if hp == 0 {
                let respawn_at = now + rules.balance.character_respawn_ms;
                character.die(respawn_at);
                character_respawn_at = Some(respawn_at);
                info!(
                    "Character {} was slain by {} {}",
                    character.id, monster.name, monster.id
                );
                events.push(DomainEvent::CharacterDied {
                    character_id: character.id,
                    respawn_at,
                });
            }
        }
    }

    Ok(Resolution {
        outcome: AttackOutcome {
            attacker_id: character.id,
            monster_id: monster.id,
            skill_id,
            damage,
            monster_hp: remaining,
            killed: remaining == 0,
            reward,
            retaliation,
            attacker: character.view(),
        },
        events,
        monster_respawn_at,
        character_respawn_at,
    })
}

fn grant_kill_reward(
    balance: &Balance,
    character: &mut Character,
    template: &MonsterTemplate,
    rng: &mut impl Rng,
) -> KillReward {
    character.gold = character.gold.saturating_add(template.gold);
    let levels_gained = character.gain_experience(template.experience, balance);
    let drops = template
        .loot
        .iter()
        .filter(|entry| rng.gen::<f32>() < entry.chance)
        .map(|entry| entry.item_id)
        .collect();

    KillReward {
        experience: template.experience,
        gold: template.gold,
        drops,
        levels_gained,
    }
}

// Monsters restored from a snapshot may reference a template that no longer
// exists; they still fight, they just give nothing.
fn fallback_template(monster: &Monster) -> MonsterTemplate {
    MonsterTemplate {
        id: monster.template_id,
        name: monster.name.clone(),
        radius: monster.radius,
        max_hp: monster.max_hp,
        attack: 0,
        experience: 0,
        gold: 0,
        loot: Vec::new(),
        respawn_delay_ms: 10_000,
    }
}

/// Casts a `Mend` skill on the character itself.
pub fn resolve_heal(
    rules: &CombatRules<'_>,
    character: &mut Character,
    skill_id: SkillId,
    rng: &mut impl Rng,
) -> GameResult<HealResolution> {
    character.ensure_alive()?;

    let skill = rules
        .catalog
        .skill(skill_id)
        .filter(|skill| matches!(skill.effect, SkillEffect::Mend { .. }))
        .ok_or(GameError::NotFound(Missing::Skill(skill_id)))?;
    check_level(skill, character)?;
    character.spend_mp(skill.mp_cost)?;

    let power = rules.balance.vary(skill.power(character.level), roll(rng));
    let amount = character.restore_hp(power);

    Ok(HealResolution {
        amount,
        event: DomainEvent::CharacterHealed {
            character_id: character.id,
            amount,
            hp: character.hp,
            max_hp: character.max_hp(),
            mp: character.mp,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::content::{EquipSlot, Equipment, Stats};
    use shared::{EventKind, Resource, Vec2};

    fn exact_balance() -> Balance {
        Balance {
            damage_variance: 0.0,
            ..Balance::default()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn slime_at(x: f32, y: f32, catalog: &Catalog) -> Monster {
        Monster::new(1, 1, catalog.monster(1).unwrap(), Vec2::new(x, y))
    }

    fn hero(balance: &Balance) -> Character {
        Character::new(1, 1, "Aria", 1, Vec2::new(100.0, 100.0), balance)
    }

    fn kinds(events: &[DomainEvent]) -> Vec<EventKind> {
        events.iter().map(DomainEvent::kind).collect()
    }

    #[test]
    fn test_basic_attack_kills_weak_monster() {
        let catalog = Catalog::demo();
        let balance = exact_balance();
        let rules = CombatRules {
            catalog: &catalog,
            balance: &balance,
        };
        let mut character = hero(&balance);
        let mut monster = slime_at(110.0, 100.0, &catalog);
        monster.hp = 10;

        let resolution =
            resolve_attack(&rules, &mut character, &mut monster, None, 1_000, &mut rng()).unwrap();

        assert_eq!(resolution.outcome.damage, 10);
        assert!(resolution.outcome.killed);
        assert_eq!(monster.hp, 0);
        assert!(!monster.is_alive());
        assert_eq!(resolution.monster_respawn_at, Some(11_000));
        assert_eq!(
            kinds(&resolution.events),
            vec![EventKind::MonsterKilled, EventKind::MonsterRespawning]
        );

        let reward = resolution.outcome.reward.unwrap();
        assert_eq!(reward.experience, 25);
        assert_eq!(character.experience, 25);
        assert_eq!(character.gold, 5);
        assert!(resolution.outcome.retaliation.is_none());
    }

    #[test]
    fn test_surviving_monster_retaliates() {
        let catalog = Catalog::demo();
        let balance = exact_balance();
        let rules = CombatRules {
            catalog: &catalog,
            balance: &balance,
        };
        let mut character = hero(&balance);
        let mut monster = slime_at(110.0, 100.0, &catalog);

        let resolution =
            resolve_attack(&rules, &mut character, &mut monster, None, 0, &mut rng()).unwrap();

        assert_eq!(monster.hp, 20);
        // Slime attack 4 minus defense 2.
        assert_eq!(resolution.outcome.retaliation, Some(2));
        assert_eq!(character.hp, 98);
        assert_eq!(
            kinds(&resolution.events),
            vec![EventKind::MonsterDamaged, EventKind::CharacterDamaged]
        );
    }

    #[test]
    fn test_retaliation_can_kill_attacker() {
        let catalog = Catalog::demo();
        let balance = exact_balance();
        let rules = CombatRules {
            catalog: &catalog,
            balance: &balance,
        };
        let mut character = hero(&balance);
        character.hp = 1;
        let mut monster = slime_at(110.0, 100.0, &catalog);

        let resolution =
            resolve_attack(&rules, &mut character, &mut monster, None, 500, &mut rng()).unwrap();

        assert!(!character.is_alive());
        assert_eq!(
            resolution.character_respawn_at,
            Some(500 + balance.character_respawn_ms)
        );
        assert_eq!(
            kinds(&resolution.events),
            vec![
                EventKind::MonsterDamaged,
                EventKind::CharacterDamaged,
                EventKind::CharacterDied
            ]
        );
    }

    #[test]
    fn test_kill_triggers_level_up() {
        let catalog = Catalog::demo();
        let balance = exact_balance();
        let rules = CombatRules {
            catalog: &catalog,
            balance: &balance,
        };
        let mut character = hero(&balance);
        character.experience = 90;
        character.hp = 10;
        let mut monster = slime_at(110.0, 100.0, &catalog);
        monster.hp = 1;

        let resolution =
            resolve_attack(&rules, &mut character, &mut monster, None, 0, &mut rng()).unwrap();

        assert_eq!(character.level, 2);
        assert_eq!(character.experience, 15);
        assert_eq!(character.hp, character.max_hp());
        assert_eq!(resolution.outcome.reward.unwrap().levels_gained, 1);
        assert_eq!(
            kinds(&resolution.events),
            vec![
                EventKind::MonsterKilled,
                EventKind::MonsterRespawning,
                EventKind::CharacterLeveled
            ]
        );
    }

    #[test]
    fn test_failure_order_and_no_mutation() {
        let catalog = Catalog::demo();
        let balance = exact_balance();
        let rules = CombatRules {
            catalog: &catalog,
            balance: &balance,
        };

        // Dead attacker is reported before a dead target.
        let mut character = hero(&balance);
        character.die(9);
        let mut monster = slime_at(110.0, 100.0, &catalog);
        monster.die(9);
        assert_eq!(
            resolve_attack(&rules, &mut character, &mut monster, None, 0, &mut rng()).unwrap_err(),
            GameError::InvalidState(Conflict::CharacterDead)
        );

        // Target on another map looks missing.
        let mut character = hero(&balance);
        let mut elsewhere = Monster::new(3, 2, catalog.monster(1).unwrap(), Vec2::new(110.0, 100.0));
        assert_eq!(
            resolve_attack(&rules, &mut character, &mut elsewhere, None, 0, &mut rng())
                .unwrap_err(),
            GameError::NotFound(Missing::Monster(3))
        );

        // Dead target before unknown skill.
        assert_eq!(
            resolve_attack(&rules, &mut character, &mut monster, Some(99), 0, &mut rng())
                .unwrap_err(),
            GameError::InvalidState(Conflict::TargetAlreadyDead)
        );

        // Unknown skill before range.
        let mut far = slime_at(900.0, 900.0, &catalog);
        assert_eq!(
            resolve_attack(&rules, &mut character, &mut far, Some(99), 0, &mut rng()).unwrap_err(),
            GameError::NotFound(Missing::Skill(99))
        );

        // Level gate before range.
        assert_eq!(
            resolve_attack(&rules, &mut character, &mut far, Some(3), 0, &mut rng()).unwrap_err(),
            GameError::LevelTooLow {
                required: 3,
                actual: 1
            }
        );

        // Range before mp.
        character.mp = 0;
        assert!(matches!(
            resolve_attack(&rules, &mut character, &mut far, Some(1), 0, &mut rng()),
            Err(GameError::OutOfRange { .. })
        ));

        let mut near = slime_at(110.0, 100.0, &catalog);
        assert!(matches!(
            resolve_attack(&rules, &mut character, &mut near, Some(1), 0, &mut rng()),
            Err(GameError::InsufficientResource {
                resource: Resource::Mp,
                ..
            })
        ));
        assert_eq!(near.hp, near.max_hp);
        assert_eq!(far.hp, far.max_hp);
        assert_eq!(character.hp, character.max_hp());
    }

    #[test]
    fn test_skill_damage_and_mp_cost() {
        let catalog = Catalog::demo();
        let balance = exact_balance();
        let rules = CombatRules {
            catalog: &catalog,
            balance: &balance,
        };
        let mut character = hero(&balance);
        let mut monster = Monster::new(2, 1, catalog.monster(2).unwrap(), Vec2::new(150.0, 100.0));

        let resolution =
            resolve_attack(&rules, &mut character, &mut monster, Some(1), 0, &mut rng()).unwrap();

        // Power Strike at level 1: 15 + 3.
        assert_eq!(resolution.outcome.damage, 18);
        assert_eq!(monster.hp, 42);
        assert_eq!(character.mp, character.max_mp() - 10);
    }

    #[test]
    fn test_heal_skill_cannot_attack() {
        let catalog = Catalog::demo();
        let balance = exact_balance();
        let rules = CombatRules {
            catalog: &catalog,
            balance: &balance,
        };
        let mut character = hero(&balance);
        let mut monster = slime_at(110.0, 100.0, &catalog);
        assert_eq!(
            resolve_attack(&rules, &mut character, &mut monster, Some(2), 0, &mut rng())
                .unwrap_err(),
            GameError::NotFound(Missing::Skill(2))
        );
    }

    #[test]
    fn test_damage_variance_stays_in_bounds() {
        let catalog = Catalog::demo();
        let balance = Balance {
            damage_variance: 0.1,
            ..Balance::default()
        };
        let rules = CombatRules {
            catalog: &catalog,
            balance: &balance,
        };
        let mut rng = rng();

        for _ in 0..200 {
            let mut character = hero(&balance);
            character.equip(Equipment {
                item_id: 7,
                slot: EquipSlot::Weapon,
                bonus: Stats {
                    attack: 90,
                    ..Stats::default()
                },
            })
            .unwrap();
            let mut monster = Monster::new(3, 1, catalog.monster(3).unwrap(), Vec2::new(150.0, 100.0));
            let resolution =
                resolve_attack(&rules, &mut character, &mut monster, None, 0, &mut rng).unwrap();
            assert!((90..=110).contains(&resolution.outcome.damage));
        }
    }

    #[test]
    fn test_heal_restores_and_spends_mp() {
        let catalog = Catalog::demo();
        let balance = exact_balance();
        let rules = CombatRules {
            catalog: &catalog,
            balance: &balance,
        };
        let mut character = hero(&balance);
        character.hp = 50;

        let healed = resolve_heal(&rules, &mut character, 2, &mut rng()).unwrap();

        assert_eq!(healed.amount, 24);
        assert_eq!(character.hp, 74);
        assert_eq!(character.mp, character.max_mp() - 8);
        assert_eq!(healed.event.kind(), EventKind::CharacterHealed);

        assert_eq!(
            resolve_heal(&rules, &mut character, 1, &mut rng()).unwrap_err(),
            GameError::NotFound(Missing::Skill(1))
        );
    }
}
