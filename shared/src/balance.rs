//! Game-balance parameters.
//!
//! The shape of the rules (bounded damage variance, cascading level-ups,
//! per-level stat growth) is fixed in code; the numbers live here so the
//! server can be tuned from the command line.

use crate::{
    ATTACK_RADIUS, CHARACTER_RADIUS, CHARACTER_RESPAWN_MS, DAMAGE_VARIANCE, EXPERIENCE_PER_LEVEL,
    MAX_MOVE_DISTANCE,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Growth {
    pub max_hp: u32,
    pub max_mp: u32,
    pub attack: u32,
    pub defense: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Maximum center distance between attacker and target.
    pub attack_radius: f32,
    /// Fractional variance applied to every damage and heal roll.
    pub damage_variance: f32,
    /// Experience needed for the next level is `level * experience_per_level`.
    pub experience_per_level: u32,
    /// Base stat increase applied on each level-up.
    pub growth: Growth,
    /// Farthest a single move request may travel.
    pub max_move_distance: f32,
    pub character_radius: f32,
    pub character_respawn_ms: u64,
}

impl Default for Balance {
    fn default() -> Self {
        Self {
            attack_radius: ATTACK_RADIUS,
            damage_variance: DAMAGE_VARIANCE,
            experience_per_level: EXPERIENCE_PER_LEVEL,
            growth: Growth {
                max_hp: 20,
                max_mp: 10,
                attack: 2,
                defense: 1,
            },
            max_move_distance: MAX_MOVE_DISTANCE,
            character_radius: CHARACTER_RADIUS,
            character_respawn_ms: CHARACTER_RESPAWN_MS,
        }
    }
}

impl Balance {
    /// Experience required to advance from `level`. Never zero, so level-up
    /// cascades always consume experience.
    pub fn experience_to_level(&self, level: u32) -> u32 {
        level.max(1).saturating_mul(self.experience_per_level.max(1))
    }

    /// Applies the configured variance to `base` using a roll in [-1, 1].
    /// The result is rounded and never below 1.
    pub fn vary(&self, base: u32, roll: f32) -> u32 {
        let variance = self.damage_variance.max(0.0) * roll.clamp(-1.0, 1.0);
        let value = (base as f32 * (1.0 + variance)).round();
        value.max(1.0) as u32
    }
}
