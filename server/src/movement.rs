//! Server-side move validation.

use crate::entity::Character;
use shared::content::MapDefinition;
use shared::{nearest_free_position, Balance, Circle, GameResult, Vec2};

/// Moves a character towards `target` and returns where it ended up.
///
/// The requested distance is capped at `max_move_distance`, the target is
/// kept inside the map and then resolved against the map's static obstacles
/// plus `monsters` (alive monsters on the same map).
pub fn attempt_move(
    character: &mut Character,
    map: &MapDefinition,
    monsters: &[Circle],
    target: Vec2,
    balance: &Balance,
) -> GameResult<Vec2> {
    character.ensure_alive()?;

    let from = character.position;
    let radius = balance.character_radius;
    let capped = from
        .step_towards(target, balance.max_move_distance)
        .clamp_to_bounds(map.width, map.height, radius);

    let mut obstacles = Vec::with_capacity(map.obstacles.len() + monsters.len());
    obstacles.extend_from_slice(&map.obstacles);
    obstacles.extend_from_slice(monsters);

    let resolved = nearest_free_position(radius, from, capped, &obstacles);
    character.position = resolved;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{collides, Conflict, GameError};

    fn open_map() -> MapDefinition {
        MapDefinition {
            id: 1,
            name: "Field".to_string(),
            width: 1000.0,
            height: 1000.0,
            spawn: Vec2::new(100.0, 100.0),
            min_level: 1,
            obstacles: vec![],
            monster_spawns: vec![],
            teleports: vec![],
        }
    }

    fn character_at(x: f32, y: f32) -> Character {
        Character::new(1, 1, "Aria", 1, Vec2::new(x, y), &Balance::default())
    }

    #[test]
    fn test_clear_path_reaches_target() {
        let mut character = character_at(100.0, 100.0);
        let position = attempt_move(
            &mut character,
            &open_map(),
            &[],
            Vec2::new(300.0, 250.0),
            &Balance::default(),
        )
        .unwrap();
        assert_eq!(position, Vec2::new(300.0, 250.0));
        assert_eq!(character.position, position);
    }

    #[test]
    fn test_distance_is_capped() {
        let balance = Balance::default();
        let mut character = character_at(100.0, 100.0);
        let position = attempt_move(
            &mut character,
            &open_map(),
            &[],
            Vec2::new(900.0, 100.0),
            &balance,
        )
        .unwrap();
        assert_approx_eq!(position.x, 100.0 + balance.max_move_distance, 1e-3);
        assert_approx_eq!(position.y, 100.0, 1e-3);
    }

    #[test]
    fn test_target_is_kept_inside_map() {
        let balance = Balance::default();
        let mut character = character_at(100.0, 100.0);
        let position =
            attempt_move(&mut character, &open_map(), &[], Vec2::new(-50.0, 100.0), &balance)
                .unwrap();
        assert_approx_eq!(position.x, balance.character_radius, 1e-3);
    }

    #[test]
    fn test_monster_blocks_path() {
        let balance = Balance::default();
        let monster = Circle::new(Vec2::new(300.0, 100.0), 30.0);
        let mut character = character_at(100.0, 100.0);

        let position = attempt_move(
            &mut character,
            &open_map(),
            &[monster],
            Vec2::new(450.0, 100.0),
            &balance,
        )
        .unwrap();

        assert!(position.x < 300.0);
        assert!(!collides(
            &Circle::new(position, balance.character_radius),
            &monster
        ));
    }

    #[test]
    fn test_dead_character_cannot_move() {
        let mut character = character_at(100.0, 100.0);
        character.die(1);
        let result = attempt_move(
            &mut character,
            &open_map(),
            &[],
            Vec2::new(200.0, 200.0),
            &Balance::default(),
        );
        assert_eq!(result, Err(GameError::InvalidState(Conflict::CharacterDead)));
        assert_eq!(character.position, Vec2::new(100.0, 100.0));
    }
}
