//! Optimistic movement for the local character.
//!
//! A move is applied locally the moment it is issued, using the same step,
//! bounds and collision rules the server validates with. When the server
//! confirms, the prediction is kept unless it drifted past the snap
//! threshold.

use log::debug;
use shared::content::MapDefinition;
use shared::{nearest_free_position, Balance, Circle, Packet, Vec2, SNAP_THRESHOLD};

/// What a confirmation did to the local position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// The prediction was close enough and stays.
    Kept,
    /// The prediction was off and was replaced by the server position.
    Snapped { from: Vec2, to: Vec2 },
    /// A newer move is in flight, so this confirmation is outdated.
    Stale,
}

#[derive(Debug, Clone)]
pub struct MovementPredictor {
    position: Vec2,
    confirmed: Vec2,
    latest_sequence: Option<u32>,
    snap_threshold: f32,
}

impl MovementPredictor {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            confirmed: position,
            latest_sequence: None,
            snap_threshold: SNAP_THRESHOLD,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn confirmed(&self) -> Vec2 {
        self.confirmed
    }

    pub fn latest_sequence(&self) -> Option<u32> {
        self.latest_sequence
    }

    pub fn has_unconfirmed_move(&self) -> bool {
        self.latest_sequence.is_some()
    }

    /// Places the character without prediction, e.g. after joining a map or
    /// respawning. Any in-flight move is forgotten.
    pub fn reset(&mut self, position: Vec2) {
        self.position = position;
        self.confirmed = position;
        self.latest_sequence = None;
    }

    /// Applies a move locally and returns the packet to send. The packet
    /// carries the corrected point, not the raw click.
    pub fn predict(
        &mut self,
        sequence: u32,
        target: Vec2,
        map: &MapDefinition,
        monsters: &[Circle],
        balance: &Balance,
    ) -> Packet {
        let radius = balance.character_radius;
        let stepped = self.position.step_towards(target, balance.max_move_distance);
        let bounded = stepped.clamp_to_bounds(map.width, map.height, radius);

        let mut obstacles = Vec::with_capacity(map.obstacles.len() + monsters.len());
        obstacles.extend_from_slice(&map.obstacles);
        obstacles.extend_from_slice(monsters);

        self.position = nearest_free_position(radius, self.position, bounded, &obstacles);
        self.latest_sequence = Some(sequence);

        Packet::MoveCharacter {
            sequence,
            x: self.position.x,
            y: self.position.y,
        }
    }

    /// Reconciles with the server's position for move `sequence`.
    pub fn confirm(&mut self, sequence: u32, position: Vec2) -> Correction {
        if let Some(latest) = self.latest_sequence {
            if sequence < latest {
                self.confirmed = position;
                return Correction::Stale;
            }
        }

        self.confirmed = position;
        self.latest_sequence = None;

        if self.position.distance(position) > self.snap_threshold {
            let from = self.position;
            self.position = position;
            debug!(
                "Snapped from ({:.1}, {:.1}) to ({:.1}, {:.1})",
                from.x, from.y, position.x, position.y
            );
            Correction::Snapped { from, to: position }
        } else {
            Correction::Kept
        }
    }

    /// The server refused move `sequence`. Only the latest move rolls the
    /// prediction back; an older refusal is already superseded.
    pub fn reject(&mut self, sequence: u32) -> bool {
        if self.latest_sequence != Some(sequence) {
            return false;
        }
        self.position = self.confirmed;
        self.latest_sequence = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::content::Catalog;

    fn open_map() -> MapDefinition {
        let mut map = Catalog::demo().maps[0].clone();
        map.obstacles.clear();
        map
    }

    #[test]
    fn test_prediction_applies_immediately() {
        let map = open_map();
        let mut predictor = MovementPredictor::new(Vec2::new(100.0, 100.0));

        let packet = predictor.predict(1, Vec2::new(200.0, 100.0), &map, &[], &Balance::default());

        assert_eq!(predictor.position(), Vec2::new(200.0, 100.0));
        assert_eq!(predictor.latest_sequence(), Some(1));
        match packet {
            Packet::MoveCharacter { sequence, x, y } => {
                assert_eq!(sequence, 1);
                assert_approx_eq!(x, 200.0);
                assert_approx_eq!(y, 100.0);
            }
            _ => panic!("Expected a move packet"),
        }
    }

    #[test]
    fn test_prediction_stops_at_monster() {
        let map = open_map();
        let monster = Circle::new(Vec2::new(300.0, 100.0), 30.0);
        let mut predictor = MovementPredictor::new(Vec2::new(100.0, 100.0));

        let packet =
            predictor.predict(1, Vec2::new(400.0, 100.0), &map, &[monster], &Balance::default());

        let position = predictor.position();
        assert!(position.x < 300.0 - 30.0 - 20.0 + 0.01);
        assert_approx_eq!(position.y, 100.0);
        match packet {
            Packet::MoveCharacter { x, y, .. } => assert_eq!(Vec2::new(x, y), position),
            _ => panic!("Expected a move packet"),
        }
    }

    #[test]
    fn test_small_drift_keeps_prediction() {
        let map = open_map();
        let mut predictor = MovementPredictor::new(Vec2::new(100.0, 100.0));
        predictor.predict(1, Vec2::new(200.0, 100.0), &map, &[], &Balance::default());

        let correction = predictor.confirm(1, Vec2::new(202.0, 101.0));

        assert_eq!(correction, Correction::Kept);
        assert_eq!(predictor.position(), Vec2::new(200.0, 100.0));
        assert!(!predictor.has_unconfirmed_move());
    }

    #[test]
    fn test_large_drift_snaps() {
        let map = open_map();
        let mut predictor = MovementPredictor::new(Vec2::new(100.0, 100.0));
        predictor.predict(1, Vec2::new(200.0, 100.0), &map, &[], &Balance::default());

        let correction = predictor.confirm(1, Vec2::new(150.0, 100.0));

        assert!(matches!(correction, Correction::Snapped { .. }));
        assert_eq!(predictor.position(), Vec2::new(150.0, 100.0));
    }

    #[test]
    fn test_stale_confirmation_is_ignored() {
        let map = open_map();
        let balance = Balance::default();
        let mut predictor = MovementPredictor::new(Vec2::new(100.0, 100.0));
        predictor.predict(1, Vec2::new(200.0, 100.0), &map, &[], &balance);
        predictor.predict(2, Vec2::new(300.0, 100.0), &map, &[], &balance);

        let correction = predictor.confirm(1, Vec2::new(200.0, 100.0));

        assert_eq!(correction, Correction::Stale);
        assert_eq!(predictor.position(), Vec2::new(300.0, 100.0));
        assert_eq!(predictor.latest_sequence(), Some(2));
    }

    #[test]
    fn test_rejected_latest_move_reverts() {
        let map = open_map();
        let mut predictor = MovementPredictor::new(Vec2::new(100.0, 100.0));
        predictor.predict(4, Vec2::new(200.0, 100.0), &map, &[], &Balance::default());

        assert!(!predictor.reject(3));
        assert!(predictor.reject(4));
        assert_eq!(predictor.position(), Vec2::new(100.0, 100.0));
    }
}
