//! Recoverable, user-facing failures of engine commands.
//!
//! Every variant is reported back to the originating client as
//! `Packet::CommandFailed`; no entity is mutated when one is returned.

use crate::{CharacterId, MapId, MonsterId, SkillId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::content::EquipSlot;

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("{0} not found")]
    NotFound(Missing),

    #[error("target out of range: distance {distance:.1}, range {range:.1}")]
    OutOfRange { distance: f32, range: f32 },

    #[error("insufficient {resource}: need {required}, have {available}")]
    InsufficientResource {
        resource: Resource,
        required: u32,
        available: u32,
    },

    #[error("invalid state: {0}")]
    InvalidState(Conflict),

    #[error("level {required} required, character is level {actual}")]
    LevelTooLow { required: u32, actual: u32 },
}

impl GameError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GameError::NotFound(_))
    }
}

/// The thing a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Missing {
    Character(CharacterId),
    Monster(MonsterId),
    Map(MapId),
    Skill(SkillId),
    Equipment(EquipSlot),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Character(id) => write!(f, "character {}", id),
            Missing::Monster(id) => write!(f, "target monster {}", id),
            Missing::Map(id) => write!(f, "map {}", id),
            Missing::Skill(id) => write!(f, "skill {}", id),
            Missing::Equipment(slot) => write!(f, "equipment in slot {:?}", slot),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    Mp,
    Gold,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Mp => write!(f, "mp"),
            Resource::Gold => write!(f, "gold"),
        }
    }
}

/// Why a command conflicts with the current entity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conflict {
    CharacterDead,
    TargetAlreadyDead,
    SlotOccupied(EquipSlot),
    /// Presence was requested on a map the character is not on.
    WrongMap { current: MapId, requested: MapId },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::CharacterDead => write!(f, "character is dead"),
            Conflict::TargetAlreadyDead => write!(f, "target is already dead"),
            Conflict::SlotOccupied(slot) => write!(f, "slot {:?} is already equipped", slot),
            Conflict::WrongMap { current, requested } => {
                write!(f, "character is on map {}, not map {}", current, requested)
            }
        }
    }
}
