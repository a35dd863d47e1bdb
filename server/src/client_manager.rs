//! Connection sessions and intent buffering.
//!
//! A session ties a UDP address to the character it controls and to the
//! outbox its writer task drains. Gameplay intents are not queued: each
//! session keeps only the newest move intent and the newest action intent
//! (attack or heal) received since the last tick, chosen by sequence number.
//! Older intents are superseded and never reach the world.

use crate::broadcast::Outbox;
use log::{debug, info};
use shared::{CharacterId, MonsterId, Packet, SkillId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Move {
        sequence: u32,
        x: f32,
        y: f32,
    },
    Attack {
        sequence: u32,
        monster_id: MonsterId,
        skill_id: Option<SkillId>,
    },
    Heal {
        sequence: u32,
        skill_id: SkillId,
    },
}

impl Intent {
    /// Extracts the intent carried by a client packet, if any.
    pub fn from_packet(packet: &Packet) -> Option<Intent> {
        match *packet {
            Packet::MoveCharacter { sequence, x, y } => Some(Intent::Move { sequence, x, y }),
            Packet::Attack {
                sequence,
                monster_id,
                skill_id,
            } => Some(Intent::Attack {
                sequence,
                monster_id,
                skill_id,
            }),
            Packet::Heal { sequence, skill_id } => Some(Intent::Heal { sequence, skill_id }),
            _ => None,
        }
    }

    pub fn sequence(&self) -> u32 {
        match self {
            Intent::Move { sequence, .. }
            | Intent::Attack { sequence, .. }
            | Intent::Heal { sequence, .. } => *sequence,
        }
    }

    fn is_move(&self) -> bool {
        matches!(self, Intent::Move { .. })
    }
}

#[derive(Debug)]
pub struct Session {
    pub character_id: CharacterId,
    pub addr: SocketAddr,
    pub last_seen: Instant,
    pub outbox: Outbox,
    pending_move: Option<Intent>,
    pending_action: Option<Intent>,
    /// Highest sequence already handed to the world; anything at or below it
    /// arrived too late.
    last_taken: u32,
}

impl Session {
    pub fn new(character_id: CharacterId, addr: SocketAddr, outbox: Outbox) -> Self {
        Self {
            character_id,
            addr,
            last_seen: Instant::now(),
            outbox,
            pending_move: None,
            pending_action: None,
            last_taken: 0,
        }
    }

    /// Buffers an intent unless a newer one of the same class is already
    /// waiting. Returns false when the intent was superseded or stale.
    pub fn offer(&mut self, intent: Intent) -> bool {
        self.last_seen = Instant::now();
        if intent.sequence() <= self.last_taken {
            return false;
        }

        let slot = if intent.is_move() {
            &mut self.pending_move
        } else {
            &mut self.pending_action
        };

        if slot.is_some_and(|current| current.sequence() >= intent.sequence()) {
            return false;
        }
        *slot = Some(intent);
        true
    }

    /// Takes the buffered intents in sequence order.
    pub fn take_intents(&mut self) -> Vec<Intent> {
        let mut intents: Vec<Intent> = self
            .pending_move
            .take()
            .into_iter()
            .chain(self.pending_action.take())
            .collect();
        intents.sort_by_key(Intent::sequence);
        if let Some(last) = intents.last() {
            self.last_taken = self.last_taken.max(last.sequence());
        }
        intents
    }

    pub fn has_pending(&self) -> bool {
        self.pending_move.is_some() || self.pending_action.is_some()
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Work for one session in one tick.
#[derive(Debug)]
pub struct TickBatch {
    pub character_id: CharacterId,
    pub outbox: Outbox,
    pub intents: Vec<Intent>,
}

pub struct ClientManager {
    sessions: HashMap<CharacterId, Session>,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            max_clients,
            timeout,
        }
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_clients
    }

    /// Registers a session. Returns `None` when the server is at capacity.
    /// An existing session for the same character is replaced and returned.
    pub fn add_session(
        &mut self,
        character_id: CharacterId,
        addr: SocketAddr,
        outbox: Outbox,
    ) -> Option<Option<Session>> {
        let replaced = self.sessions.remove(&character_id);
        if replaced.is_none() && self.is_full() {
            return None;
        }

        info!("Character {} connected from {}", character_id, addr);
        self.sessions
            .insert(character_id, Session::new(character_id, addr, outbox));
        Some(replaced)
    }

    pub fn remove_session(&mut self, character_id: CharacterId) -> Option<Session> {
        let session = self.sessions.remove(&character_id)?;
        info!("Character {} disconnected from {}", character_id, session.addr);
        Some(session)
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<CharacterId> {
        self.sessions
            .values()
            .find(|session| session.addr == addr)
            .map(|session| session.character_id)
    }

    pub fn session(&self, character_id: CharacterId) -> Option<&Session> {
        self.sessions.get(&character_id)
    }

    pub fn outbox(&self, character_id: CharacterId) -> Option<Outbox> {
        self.sessions
            .get(&character_id)
            .map(|session| session.outbox.clone())
    }

    pub fn touch(&mut self, character_id: CharacterId) {
        if let Some(session) = self.sessions.get_mut(&character_id) {
            session.last_seen = Instant::now();
        }
    }

    pub fn offer_intent(&mut self, character_id: CharacterId, intent: Intent) -> bool {
        let Some(session) = self.sessions.get_mut(&character_id) else {
            return false;
        };
        let accepted = session.offer(intent);
        if !accepted {
            debug!(
                "Dropped superseded intent {} from character {}",
                intent.sequence(),
                character_id
            );
        }
        accepted
    }

    /// Drains the buffered intents of every session that has any.
    pub fn take_tick_batches(&mut self) -> Vec<TickBatch> {
        let mut batches: Vec<TickBatch> = self
            .sessions
            .values_mut()
            .filter(|session| session.has_pending())
            .map(|session| TickBatch {
                character_id: session.character_id,
                outbox: session.outbox.clone(),
                intents: session.take_intents(),
            })
            .collect();
        batches.sort_by_key(|batch| batch.character_id);
        batches
    }

    /// Removes and returns every session silent for longer than the timeout.
    pub fn check_timeouts(&mut self) -> Vec<Session> {
        let timeout = self.timeout;
        let timed_out: Vec<CharacterId> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(timeout))
            .map(|session| session.character_id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|character_id| self.remove_session(character_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn outbox() -> Outbox {
        mpsc::unbounded_channel().0
    }

    fn move_to(sequence: u32, x: f32) -> Intent {
        Intent::Move { sequence, x, y: 0.0 }
    }

    #[test]
    fn test_intent_from_packet() {
        let packet = Packet::Attack {
            sequence: 4,
            monster_id: 9,
            skill_id: Some(1),
        };
        assert_eq!(
            Intent::from_packet(&packet),
            Some(Intent::Attack {
                sequence: 4,
                monster_id: 9,
                skill_id: Some(1)
            })
        );
        assert_eq!(Intent::from_packet(&Packet::Heartbeat), None);
    }

    #[test]
    fn test_newest_move_supersedes() {
        let mut session = Session::new(1, test_addr(), outbox());

        assert!(session.offer(move_to(1, 10.0)));
        assert!(session.offer(move_to(3, 30.0)));
        assert!(!session.offer(move_to(2, 20.0)));

        assert_eq!(session.take_intents(), vec![move_to(3, 30.0)]);
        assert!(!session.has_pending());
    }

    #[test]
    fn test_move_and_action_kept_separately() {
        let mut session = Session::new(1, test_addr(), outbox());
        let attack = Intent::Attack {
            sequence: 5,
            monster_id: 2,
            skill_id: None,
        };
        let heal = Intent::Heal {
            sequence: 6,
            skill_id: 2,
        };

        session.offer(attack);
        session.offer(move_to(7, 1.0));
        session.offer(heal);

        assert_eq!(session.take_intents(), vec![heal, move_to(7, 1.0)]);
    }

    #[test]
    fn test_late_intent_after_tick_is_stale() {
        let mut session = Session::new(1, test_addr(), outbox());
        session.offer(move_to(5, 1.0));
        session.take_intents();

        assert!(!session.offer(move_to(4, 2.0)));
        assert!(session.offer(move_to(6, 3.0)));
    }

    #[test]
    fn test_session_timeout() {
        let mut session = Session::new(1, test_addr(), outbox());
        assert!(!session.is_timed_out(Duration::from_secs(1)));

        session.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(session.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_session_capacity() {
        let mut manager = ClientManager::new(1, Duration::from_secs(5));

        assert!(matches!(manager.add_session(1, test_addr(), outbox()), Some(None)));
        assert!(manager.add_session(2, test_addr2(), outbox()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_reconnect_replaces_session() {
        let mut manager = ClientManager::new(1, Duration::from_secs(5));
        manager.add_session(1, test_addr(), outbox());

        let replaced = manager.add_session(1, test_addr2(), outbox());
        let old = replaced.flatten().unwrap();
        assert_eq!(old.addr, test_addr());
        assert_eq!(manager.find_by_addr(test_addr2()), Some(1));
        assert_eq!(manager.find_by_addr(test_addr()), None);
    }

    #[test]
    fn test_remove_session() {
        let mut manager = ClientManager::new(2, Duration::from_secs(5));
        manager.add_session(1, test_addr(), outbox());

        assert!(manager.remove_session(1).is_some());
        assert!(manager.remove_session(1).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_tick_batches_only_for_pending_sessions() {
        let mut manager = ClientManager::new(4, Duration::from_secs(5));
        manager.add_session(1, test_addr(), outbox());
        manager.add_session(2, test_addr2(), outbox());

        assert!(manager.offer_intent(2, move_to(1, 5.0)));
        assert!(!manager.offer_intent(9, move_to(1, 5.0)));

        let batches = manager.take_tick_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].character_id, 2);
        assert!(manager.take_tick_batches().is_empty());
    }

    #[test]
    fn test_check_timeouts_removes_silent_sessions() {
        let mut manager = ClientManager::new(4, Duration::from_millis(500));
        manager.add_session(1, test_addr(), outbox());
        manager.add_session(2, test_addr2(), outbox());

        if let Some(session) = manager.sessions.get_mut(&1) {
            session.last_seen = Instant::now() - Duration::from_secs(2);
        }

        let removed = manager.check_timeouts();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].character_id, 1);
        assert_eq!(manager.len(), 1);
    }
}
