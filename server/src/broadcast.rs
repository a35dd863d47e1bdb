//! Per-map publish/subscribe with presence tracking.
//!
//! Each connection owns one outbound queue (`Outbox`). Queues are unbounded
//! and drained by a single writer per connection, so events reach a given
//! subscriber in the order they were published. Delivery is best effort and
//! nothing is replayed: a late joiner only sees the join snapshot.

use log::{debug, info};
use shared::{now_millis, CharacterId, CharacterView, DomainEvent, EventEnvelope, MapId, Packet};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type Outbox = mpsc::UnboundedSender<Packet>;

#[derive(Default)]
struct MapChannel {
    subscribers: RwLock<HashMap<CharacterId, Outbox>>,
}

impl MapChannel {
    fn send(&self, envelope: &EventEnvelope, exclude: Option<CharacterId>) -> usize {
        let subscribers = self.subscribers.read();

        let mut delivered = 0;
        for (character_id, outbox) in subscribers.iter() {
            if Some(*character_id) == exclude {
                continue;
            }
            if outbox.send(Packet::Event(envelope.clone())).is_ok() {
                delivered += 1;
            } else {
                debug!(
                    "Dropped {} for character {}: connection closed",
                    envelope.event.kind(),
                    character_id
                );
            }
        }
        delivered
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResult {
    /// Characters already present, excluding the joiner.
    pub others: Vec<CharacterId>,
    /// False when the character was already present and only its outbox was
    /// replaced.
    pub newly_joined: bool,
}

#[derive(Default)]
pub struct MapChannels {
    maps: DashMap<MapId, Arc<MapChannel>>,
}

impl MapChannels {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, map_id: MapId) -> Arc<MapChannel> {
        Arc::clone(self.maps.entry(map_id).or_default().value())
    }

    fn existing_channel(&self, map_id: MapId) -> Option<Arc<MapChannel>> {
        self.maps.get(&map_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Registers presence and announces `character.entered` to everyone
    /// already on the map. Joining twice only swaps the outbox.
    pub fn join(&self, map_id: MapId, character: CharacterView, outbox: Outbox) -> JoinResult {
        let channel = self.channel(map_id);
        let character_id = character.id;

        let (others, newly_joined) = {
            let mut subscribers = channel.subscribers.write();
            let newly_joined = subscribers.insert(character_id, outbox).is_none();
            let mut others: Vec<CharacterId> = subscribers
                .keys()
                .copied()
                .filter(|id| *id != character_id)
                .collect();
            others.sort_unstable();
            (others, newly_joined)
        };

        if newly_joined {
            info!("Character {} joined map {}", character_id, map_id);
            self.publish(
                map_id,
                DomainEvent::CharacterEntered(character),
                Some(character_id),
            );
        } else {
            debug!(
                "Character {} re-joined map {}, outbox replaced",
                character_id, map_id
            );
        }

        JoinResult {
            others,
            newly_joined,
        }
    }

    /// Removes presence and announces `character.left`. Returns false if the
    /// character was not present.
    pub fn leave(&self, map_id: MapId, character_id: CharacterId) -> bool {
        let Some(channel) = self.existing_channel(map_id) else {
            return false;
        };

        let removed = channel
            .subscribers
            .write()
            .remove(&character_id)
            .is_some();

        if removed {
            info!("Character {} left map {}", character_id, map_id);
            self.publish(map_id, DomainEvent::CharacterLeft { character_id }, None);
        }
        removed
    }

    /// Delivers an event to every subscriber of the map except `exclude`.
    /// Returns the number of subscribers it was queued for.
    pub fn publish(&self, map_id: MapId, event: DomainEvent, exclude: Option<CharacterId>) -> usize {
        let Some(channel) = self.existing_channel(map_id) else {
            return 0;
        };

        let envelope = EventEnvelope {
            map_id,
            issued_at: now_millis(),
            event,
        };
        let delivered = channel.send(&envelope, exclude);
        debug!(
            "Published {} on map {} to {} subscribers",
            envelope.event.kind(),
            map_id,
            delivered
        );
        delivered
    }

    pub fn is_present(&self, map_id: MapId, character_id: CharacterId) -> bool {
        self.existing_channel(map_id).is_some_and(|channel| {
            channel.subscribers.read().contains_key(&character_id)
        })
    }

    pub fn present(&self, map_id: MapId) -> Vec<CharacterId> {
        let Some(channel) = self.existing_channel(map_id) else {
            return Vec::new();
        };
        let mut ids: Vec<CharacterId> = channel
            .subscribers
            .read()
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Drops a map's channel and all of its presence without announcements.
    pub fn unload(&self, map_id: MapId) -> usize {
        self.maps
            .remove(&map_id)
            .map_or(0, |(_, channel)| channel.subscribers.read().len())
    }
}
