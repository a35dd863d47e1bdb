//! Short-term suppression of duplicate domain events.
//!
//! Reconnects and redundant triggers can deliver the same event more than
//! once. An event is a duplicate when it is identical to the last event
//! applied about the same entity and arrives within the window. Any other
//! event about that entity replaces the entry, so a value that comes back
//! after a change (damage, heal, the same damage again) is always applied.
//! Events carry resulting values, so dropping a repeat of the latest one
//! never changes visible state.

use shared::events::EventKey;
use shared::{DomainEvent, EntityRef, EventKind, DEDUP_WINDOW_MS};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Seen {
    kind: EventKind,
    fingerprint: u64,
    at: u64,
}

#[derive(Debug)]
pub struct EventDeduplicator {
    window_ms: u64,
    seen: HashMap<EntityRef, Seen>,
    last_prune: u64,
}

impl EventDeduplicator {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            seen: HashMap::new(),
            last_prune: 0,
        }
    }

    /// Records the event and reports whether it should be applied. `now` is
    /// the local clock in milliseconds.
    pub fn should_apply(&mut self, event: &DomainEvent, now: u64) -> bool {
        self.prune(now);

        let EventKey {
            entity,
            kind,
            fingerprint,
        } = event.dedup_key();

        if let Some(seen) = self.seen.get(&entity) {
            if seen.kind == kind
                && seen.fingerprint == fingerprint
                && now.saturating_sub(seen.at) < self.window_ms
            {
                return false;
            }
        }

        self.seen.insert(
            entity,
            Seen {
                kind,
                fingerprint,
                at: now,
            },
        );
        true
    }

    fn prune(&mut self, now: u64) {
        if now.saturating_sub(self.last_prune) < self.window_ms {
            return;
        }
        let window = self.window_ms;
        self.seen
            .retain(|_, seen| now.saturating_sub(seen.at) < window);
        self.last_prune = now;
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for EventDeduplicator {
    fn default() -> Self {
        Self::new(DEDUP_WINDOW_MS)
    }
}
